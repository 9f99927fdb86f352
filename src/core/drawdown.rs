use log::debug;

use super::accumulation::escalation;
use super::tax::{TaxPolicy, compute_tax};
use super::types::{DrawdownResult, Phase, ProjectionRow};

/// Annual drawdown schedule from a nest egg.
///
/// The draw is fixed at `drawdown_rate_pct` of the nest egg and escalated
/// with inflation each year after retirement. Each year the gross draw
/// leaves the fund first and the remainder then earns a full year of
/// `annual_return_pct`. Rows carry the member's net income in `withdrawal`
/// and the tax withheld in `tax_paid`.
pub fn drawdown(
    policy: &TaxPolicy,
    nest_egg: f64,
    retirement_age: u32,
    life_expectancy: u32,
    annual_return_pct: f64,
    inflation_pct: f64,
    drawdown_rate_pct: f64,
) -> DrawdownResult {
    let opening = nest_egg.max(0.0);
    let annual_drawdown = opening * drawdown_rate_pct / 100.0;
    let annual_rate = annual_return_pct / 100.0;
    let deflator_step = 1.0 + inflation_pct / 100.0;

    let mut balance = opening;
    let mut price_index = 1.0;
    let mut schedule = Vec::new();

    for (years_into_retirement, age) in (retirement_age..=life_expectancy).enumerate() {
        if balance <= 0.0 {
            break;
        }
        let years_into_retirement = years_into_retirement as u32;

        let planned = annual_drawdown * escalation(inflation_pct, years_into_retirement);
        let gross = planned.min(balance);
        let tax_paid = compute_tax(policy, gross, age);
        let net_income = gross - tax_paid;

        let remaining = (balance - gross).max(0.0);
        let investment_return = remaining * annual_rate;
        let ending_balance = remaining + investment_return;
        price_index *= deflator_step;

        let row = ProjectionRow {
            period: years_into_retirement,
            age,
            phase: Phase::DrawingDown,
            beginning_balance: balance,
            contribution: 0.0,
            investment_return,
            withdrawal: net_income,
            tax_paid,
            ending_balance,
            inflation_adjusted_balance: ending_balance / price_index,
        };
        let depleted = row.is_depleted();
        schedule.push(row);
        balance = ending_balance;

        if depleted {
            debug!("drawdown schedule exhausted at age {age}");
            break;
        }
    }

    DrawdownResult {
        periodic_withdrawal: annual_drawdown / 12.0,
        schedule,
    }
}
