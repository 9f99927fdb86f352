use log::{debug, warn};

use super::accumulation::{accumulate_months, escalation};
use super::error::EngineError;
use super::stats::aggregate;
use super::tax::{TaxPolicy, compute_tax};
use super::types::{MAX_AGE, Phase, Projection, ProjectionReport, ProjectionRow, ScenarioInput};

pub const MAX_PROJECTION_YEARS: u32 = MAX_AGE + 1;

#[derive(Debug, Clone, Copy)]
struct DrawdownYear {
    ending_balance: f64,
    investment_return: f64,
    withdrawal: f64,
    tax_paid: f64,
}

/// Simulates the whole lifecycle from `current_age` to `life_expectancy`,
/// one row per year of age built from twelve monthly steps.
///
/// Before retirement each month earns its return and then receives the
/// inflation-escalated contribution. From retirement each month earns its
/// return and then pays a twelfth of the year's escalated drawdown; tax on
/// the year's total withdrawal is settled from the fund at year end. No rows
/// follow the year the fund runs dry.
pub fn project(policy: &TaxPolicy, scenario: &ScenarioInput) -> Result<Projection, EngineError> {
    scenario.validate()?;
    policy.validate()?;

    let monthly_rate = scenario.monthly_return_rate();
    let deflator_step = 1.0 + scenario.inflation_pct / 100.0;
    let horizon = (scenario.life_expectancy - scenario.current_age + 1).min(MAX_PROJECTION_YEARS);

    let mut rows = Vec::with_capacity(horizon as usize);
    let mut phase = Phase::Accumulating;
    let mut balance = scenario.starting_balance;
    let mut total_contributed = scenario.starting_balance;
    let mut price_index = 1.0;
    let mut nest_egg = None;
    let mut annual_drawdown = 0.0;

    for period in 0..horizon {
        let age = scenario.current_age + period;
        if phase == Phase::Accumulating && age >= scenario.retirement_age {
            phase = Phase::DrawingDown;
            nest_egg = Some(balance);
            annual_drawdown = balance * scenario.drawdown_rate_pct / 100.0;
        }
        price_index *= deflator_step;

        let row = match phase {
            Phase::Accumulating => {
                let contribution = scenario.monthly_contribution
                    * escalation(scenario.inflation_pct, period);
                let flow = accumulate_months(balance, contribution, monthly_rate, 12);
                total_contributed += flow.contribution;
                ProjectionRow {
                    period,
                    age,
                    phase,
                    beginning_balance: balance,
                    contribution: flow.contribution,
                    investment_return: flow.investment_return,
                    withdrawal: 0.0,
                    tax_paid: 0.0,
                    ending_balance: flow.ending_balance,
                    inflation_adjusted_balance: flow.ending_balance / price_index,
                }
            }
            Phase::DrawingDown => {
                let years_into_retirement = age - scenario.retirement_age;
                let year_draw =
                    annual_drawdown * escalation(scenario.inflation_pct, years_into_retirement);
                let flow = run_drawdown_year(policy, balance, year_draw, monthly_rate, age);
                ProjectionRow {
                    period,
                    age,
                    phase,
                    beginning_balance: balance,
                    contribution: 0.0,
                    investment_return: flow.investment_return,
                    withdrawal: flow.withdrawal,
                    tax_paid: flow.tax_paid,
                    ending_balance: flow.ending_balance,
                    inflation_adjusted_balance: flow.ending_balance / price_index,
                }
            }
            Phase::Depleted | Phase::Completed => break,
        };

        balance = row.ending_balance;
        if row.phase == Phase::DrawingDown && row.is_depleted() {
            warn!("fund depleted at age {age}");
            phase = Phase::Depleted;
        }
        rows.push(row);
    }

    let final_phase = match phase {
        Phase::DrawingDown => Phase::Completed,
        other => other,
    };
    let nest_egg = nest_egg.unwrap_or(balance);
    debug!(
        "projected {} years: nest egg {nest_egg:.2}, final phase {final_phase:?}",
        rows.len()
    );

    Ok(Projection {
        rows,
        nest_egg,
        total_contributed,
        monthly_drawdown: annual_drawdown / 12.0,
        final_phase,
    })
}

pub fn run_projection(
    policy: &TaxPolicy,
    scenario: &ScenarioInput,
) -> Result<ProjectionReport, EngineError> {
    let projection = project(policy, scenario)?;
    let statistics = aggregate(&projection.rows, projection.total_contributed);
    Ok(ProjectionReport {
        nest_egg: projection.nest_egg,
        monthly_drawdown: projection.monthly_drawdown,
        final_phase: projection.final_phase,
        statistics,
        rows: projection.rows,
    })
}

fn run_drawdown_year(
    policy: &TaxPolicy,
    balance: f64,
    year_draw: f64,
    monthly_rate: f64,
    age: u32,
) -> DrawdownYear {
    let monthly_draw = year_draw / 12.0;
    let mut balance = balance;
    let mut investment_return = 0.0;
    let mut withdrawal = 0.0;

    for _ in 0..12 {
        let growth = balance * monthly_rate;
        balance += growth;
        investment_return += growth;

        let paid = monthly_draw.min(balance.max(0.0));
        balance -= paid;
        withdrawal += paid;
    }

    let tax_paid = compute_tax(policy, withdrawal, age).min(balance.max(0.0));
    balance -= tax_paid;

    DrawdownYear {
        ending_balance: balance,
        investment_return,
        withdrawal,
        tax_paid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::accumulation::accumulate;
    use crate::core::types::{DEPLETION_EPSILON, MAX_AMOUNT, MAX_RATE_PCT};
    use approx::assert_abs_diff_eq;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn policy() -> TaxPolicy {
        TaxPolicy::sars_2025_26()
    }

    fn sample_scenario() -> ScenarioInput {
        ScenarioInput {
            current_age: 35,
            retirement_age: 65,
            life_expectancy: 90,
            starting_balance: 100_000.0,
            monthly_contribution: 5_000.0,
            annual_return_pct: 10.0,
            inflation_pct: 6.0,
            drawdown_rate_pct: 4.0,
            gross_annual_income: None,
        }
    }

    fn assert_ledger_invariants(rows: &[ProjectionRow]) {
        for row in rows {
            let scale = row.beginning_balance.abs().max(1.0);
            assert!(
                row.balance_residual().abs() <= 1e-9 * scale,
                "balance identity broken at age {}: residual {}",
                row.age,
                row.balance_residual()
            );
            assert!(row.ending_balance >= 0.0, "negative balance at age {}", row.age);
            assert!(row.ending_balance.is_finite());
        }
        for pair in rows.windows(2) {
            assert_eq!(pair[1].beginning_balance, pair[0].ending_balance);
            assert_eq!(pair[1].period, pair[0].period + 1);
        }
    }

    #[test]
    fn end_to_end_scenario_accumulates_then_draws_down() {
        let scenario = sample_scenario();
        let report = run_projection(&policy(), &scenario).expect("valid scenario");
        let rows = &report.rows;
        assert_ledger_invariants(rows);

        let accumulating: Vec<&ProjectionRow> = rows
            .iter()
            .filter(|row| row.phase == Phase::Accumulating)
            .collect();
        assert_eq!(accumulating.len(), 30);
        for pair in accumulating.windows(2) {
            assert!(pair[1].ending_balance > pair[0].ending_balance);
        }
        assert_eq!(accumulating.last().map(|row| row.age), Some(64));

        let drawing: Vec<&ProjectionRow> = rows
            .iter()
            .filter(|row| row.phase == Phase::DrawingDown)
            .collect();
        assert_eq!(drawing.first().map(|row| row.age), Some(65));
        assert_approx(drawing[0].beginning_balance, report.nest_egg);
        for pair in drawing.windows(2) {
            if pair[1].is_depleted() {
                break;
            }
            assert_abs_diff_eq!(
                pair[1].withdrawal / pair[0].withdrawal,
                1.06,
                epsilon = 1e-9
            );
        }
        for row in &drawing {
            assert_approx(row.tax_paid, compute_tax(&policy(), row.withdrawal, row.age));
        }

        let stats = &report.statistics;
        assert!(stats.wealth_retention_ratio.is_finite());
        assert!(stats.wealth_retention_ratio >= 0.0);
        assert_approx(
            stats.wealth_retention_ratio,
            stats.net_after_tax_income / stats.total_contributed,
        );
        assert!(stats.effective_tax_rate.is_finite());
        assert!((0.0..=100.0).contains(&stats.effective_tax_rate));
        assert_approx(stats.projected_value_at_retirement, report.nest_egg);
    }

    #[test]
    fn nest_egg_matches_accumulation_model() {
        let scenario = sample_scenario();
        let projection = project(&policy(), &scenario).expect("valid scenario");
        let accumulation = accumulate(
            scenario.starting_balance,
            scenario.monthly_contribution,
            scenario.annual_return_pct,
            scenario.inflation_pct,
            scenario.months_until_retirement(),
        );
        assert_eq!(projection.nest_egg, accumulation.final_balance);
        assert_approx(
            projection.total_contributed,
            scenario.starting_balance + accumulation.total_contributed,
        );
        assert_approx(
            projection.monthly_drawdown,
            accumulation.final_balance * 0.04 / 12.0,
        );
    }

    #[test]
    fn oracle_single_accumulation_year_and_single_drawdown_year() {
        let scenario = ScenarioInput {
            current_age: 64,
            retirement_age: 65,
            life_expectancy: 65,
            starting_balance: 1_000_000.0,
            monthly_contribution: 0.0,
            annual_return_pct: 0.0,
            inflation_pct: 5.0,
            drawdown_rate_pct: 12.0,
            gross_annual_income: None,
        };
        let projection = project(&policy(), &scenario).expect("valid scenario");
        assert_eq!(projection.rows.len(), 2);

        let retirement_year = &projection.rows[1];
        // 120 000 drawn at 65: 21 600 gross tax less 26 679 of rebates -> nil
        assert_approx(retirement_year.withdrawal, 120_000.0);
        assert_approx(retirement_year.tax_paid, 0.0);
        assert_approx(retirement_year.ending_balance, 880_000.0);
        assert_approx(retirement_year.inflation_adjusted_balance, 880_000.0 / 1.05 / 1.05);
        assert_eq!(projection.final_phase, Phase::Completed);
    }

    #[test]
    fn drawdown_year_grows_before_each_withdrawal_and_taxes_at_year_end() {
        let monthly_rate = 0.12 / 12.0;
        let flow = run_drawdown_year(&policy(), 1_000_000.0, 600_000.0, monthly_rate, 60);

        let mut expected = 1_000_000.0;
        for _ in 0..12 {
            expected = expected * 1.01 - 50_000.0;
        }
        let tax = compute_tax(&policy(), 600_000.0, 60);
        assert_approx(flow.withdrawal, 600_000.0);
        assert_approx(flow.tax_paid, tax);
        assert_approx(flow.ending_balance, expected - tax);
    }

    #[test]
    fn aggressive_drawdown_depletes_and_stops_emitting_rows() {
        let mut scenario = sample_scenario();
        scenario.drawdown_rate_pct = 25.0;
        scenario.annual_return_pct = 4.0;
        let report = run_projection(&policy(), &scenario).expect("valid scenario");
        assert_ledger_invariants(&report.rows);

        assert_eq!(report.final_phase, Phase::Depleted);
        let last = report.rows.last().expect("rows");
        assert!(last.ending_balance <= DEPLETION_EPSILON);
        assert!(last.age < scenario.life_expectancy);
        assert_eq!(report.statistics.fund_depletion_age, Some(last.age));
        assert_eq!(
            report.rows.iter().filter(|row| row.is_depleted()).count(),
            1
        );
    }

    #[test]
    fn surviving_fund_completes_without_depletion_age() {
        let report = run_projection(&policy(), &sample_scenario()).expect("valid scenario");
        assert_eq!(report.final_phase, Phase::Completed);
        assert_eq!(report.rows.last().map(|row| row.age), Some(90));
        assert_eq!(report.rows.len(), 56);
        assert_eq!(report.statistics.fund_depletion_age, None);
    }

    #[test]
    fn zero_contribution_counts_only_starting_balance() {
        let mut scenario = sample_scenario();
        scenario.monthly_contribution = 0.0;
        let report = run_projection(&policy(), &scenario).expect("valid scenario");
        assert_eq!(report.statistics.total_contributed, scenario.starting_balance);
        assert!(report.rows.iter().all(|row| row.contribution == 0.0));
    }

    #[test]
    fn zero_return_does_not_produce_nan() {
        let mut scenario = sample_scenario();
        scenario.annual_return_pct = 0.0;
        scenario.inflation_pct = 0.0;
        let report = run_projection(&policy(), &scenario).expect("valid scenario");
        assert_ledger_invariants(&report.rows);
        assert_approx(report.nest_egg, 100_000.0 + 5_000.0 * 360.0);
        assert!(report.statistics.wealth_retention_ratio.is_finite());
    }

    #[test]
    fn empty_fund_is_depleted_in_first_drawdown_year() {
        let mut scenario = sample_scenario();
        scenario.starting_balance = 0.0;
        scenario.monthly_contribution = 0.0;
        let report = run_projection(&policy(), &scenario).expect("valid scenario");
        assert_eq!(report.final_phase, Phase::Depleted);
        assert_eq!(report.statistics.fund_depletion_age, Some(65));
        assert_eq!(report.statistics.wealth_retention_ratio, 0.0);
        assert_eq!(report.statistics.effective_tax_rate, 0.0);
    }

    #[test]
    fn invalid_scenario_is_rejected_before_simulation() {
        let mut scenario = sample_scenario();
        scenario.retirement_age = 30;
        let err = project(&policy(), &scenario).expect_err("must reject");
        assert!(matches!(err, EngineError::Validation(ref e) if e.field == "retirement_age"));
    }

    #[test]
    fn runaway_return_is_rejected_before_overflow() {
        let mut scenario = sample_scenario();
        scenario.annual_return_pct = 1.0e6;
        let err = run_projection(&policy(), &scenario).expect_err("must reject");
        assert!(matches!(err, EngineError::Validation(ref e) if e.field == "annual_return_pct"));
    }

    #[test]
    fn extreme_valid_inputs_keep_the_ledger_finite() {
        // Every bound at its limit over the longest possible horizon.
        let scenario = ScenarioInput {
            current_age: 0,
            retirement_age: 119,
            life_expectancy: MAX_AGE,
            starting_balance: MAX_AMOUNT,
            monthly_contribution: MAX_AMOUNT,
            annual_return_pct: MAX_RATE_PCT,
            inflation_pct: MAX_RATE_PCT,
            drawdown_rate_pct: 100.0,
            gross_annual_income: None,
        };
        let report = run_projection(&policy(), &scenario).expect("within bounds");
        assert!(report.final_phase.is_terminal());
        assert!(report.nest_egg.is_finite());
        for row in &report.rows {
            assert!(row.ending_balance.is_finite(), "age {}", row.age);
            assert!(row.investment_return.is_finite(), "age {}", row.age);
            assert!(row.tax_paid.is_finite(), "age {}", row.age);
            assert!(row.inflation_adjusted_balance.is_finite(), "age {}", row.age);
        }
        let stats = &report.statistics;
        assert!(stats.wealth_retention_ratio.is_finite());
        assert!(stats.effective_tax_rate.is_finite());
    }

    #[test]
    fn invalid_policy_is_rejected_before_simulation() {
        let mut broken = policy();
        broken.brackets.remove(3);
        let err = project(&broken, &sample_scenario()).expect_err("must reject");
        assert!(matches!(err, EngineError::Policy(_)));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_ledger_identity_continuity_and_sentinel(
            current_age in 18u32..60,
            working_years in 1u32..40,
            retired_years in 0u32..40,
            start in 0u32..3_000_000,
            contribution in 0u32..40_000,
            return_bp in -300i32..1_500,
            inflation_bp in 0u32..1_000,
            drawdown_bp in 0u32..2_500
        ) {
            let retirement_age = current_age + working_years;
            let scenario = ScenarioInput {
                current_age,
                retirement_age,
                life_expectancy: (retirement_age + retired_years).min(MAX_AGE),
                starting_balance: start as f64,
                monthly_contribution: contribution as f64,
                annual_return_pct: return_bp as f64 / 100.0,
                inflation_pct: inflation_bp as f64 / 100.0,
                drawdown_rate_pct: drawdown_bp as f64 / 100.0,
                gross_annual_income: None,
            };
            let report = run_projection(&policy(), &scenario).expect("generated scenario is valid");
            let rows = &report.rows;
            prop_assert!(!rows.is_empty());
            prop_assert!(rows.len() as u32 <= MAX_PROJECTION_YEARS);

            for row in rows {
                let scale = row.beginning_balance.abs().max(1.0);
                prop_assert!(row.balance_residual().abs() <= 1e-9 * scale);
                prop_assert!(row.ending_balance >= 0.0);
            }
            for pair in rows.windows(2) {
                prop_assert_eq!(pair[1].beginning_balance, pair[0].ending_balance);
            }

            let last = rows.last().expect("non-empty");
            if last.phase == Phase::DrawingDown && last.is_depleted() {
                prop_assert_eq!(report.statistics.fund_depletion_age, Some(last.age));
                prop_assert_eq!(report.final_phase, Phase::Depleted);
            } else {
                prop_assert_eq!(report.statistics.fund_depletion_age, None);
                prop_assert_eq!(last.age, scenario.life_expectancy);
            }
        }
    }
}
