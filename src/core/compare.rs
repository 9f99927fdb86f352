use super::accumulation::accumulate;
use super::engine::project;
use super::error::EngineError;
use super::stats::aggregate;
use super::tax::TaxPolicy;
use super::types::{
    ImpactSummary, ProjectionRow, ScenarioDelta, ScenarioInput, ScenarioProjections,
};

#[derive(Debug, Clone)]
struct ScenarioOutcome {
    nest_egg: f64,
    monthly_drawdown: f64,
    depletion_age: Option<u32>,
    rows: Vec<ProjectionRow>,
}

fn evaluate(policy: &TaxPolicy, scenario: &ScenarioInput) -> Result<ScenarioOutcome, EngineError> {
    let projection = project(policy, scenario)?;
    let accumulation = accumulate(
        scenario.starting_balance,
        scenario.monthly_contribution,
        scenario.annual_return_pct,
        scenario.inflation_pct,
        scenario.months_until_retirement(),
    );
    let statistics = aggregate(&projection.rows, projection.total_contributed);

    Ok(ScenarioOutcome {
        nest_egg: accumulation.final_balance,
        monthly_drawdown: projection.monthly_drawdown,
        depletion_age: statistics.fund_depletion_age,
        rows: projection.rows,
    })
}

pub fn compare(
    policy: &TaxPolicy,
    baseline: &ScenarioInput,
    adjusted: &ScenarioInput,
) -> Result<ScenarioDelta, EngineError> {
    let base = evaluate(policy, baseline)?;
    let next = evaluate(policy, adjusted)?;
    Ok(ScenarioDelta {
        nest_egg_delta: next.nest_egg - base.nest_egg,
        drawdown_delta: next.monthly_drawdown - base.monthly_drawdown,
    })
}

pub fn impact_summary(
    policy: &TaxPolicy,
    baseline: &ScenarioInput,
    adjusted: &ScenarioInput,
) -> Result<(ImpactSummary, ScenarioProjections), EngineError> {
    let base = evaluate(policy, baseline)?;
    let next = evaluate(policy, adjusted)?;

    let summary = ImpactSummary {
        baseline_nest_egg: base.nest_egg,
        adjusted_nest_egg: next.nest_egg,
        nest_egg_delta: next.nest_egg - base.nest_egg,
        baseline_monthly_drawdown: base.monthly_drawdown,
        adjusted_monthly_drawdown: next.monthly_drawdown,
        drawdown_delta: next.monthly_drawdown - base.monthly_drawdown,
        baseline_depletion_age: base.depletion_age,
        adjusted_depletion_age: next.depletion_age,
    };
    Ok((
        summary,
        ScenarioProjections {
            baseline: base.rows,
            adjusted: next.rows,
        },
    ))
}
