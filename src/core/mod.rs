mod accumulation;
mod compare;
mod drawdown;
mod engine;
mod error;
mod stats;
mod tax;
mod types;
mod worker;

pub use accumulation::accumulate;
pub use compare::{compare, impact_summary};
pub use drawdown::drawdown;
pub use engine::{MAX_PROJECTION_YEARS, project, run_projection};
pub use error::{EngineError, PolicyError, ValidationError};
pub use stats::aggregate;
pub use tax::{
    RetirementContributionDeduction, Rebates, SalaryBreakdown, TaxAssessment, TaxBracket,
    TaxPolicy, compute_tax,
};
pub use types::{
    AccumulationResult, DEPLETION_EPSILON, DrawdownResult, ImpactSummary, MAX_AGE, MAX_AMOUNT,
    MAX_RATE_PCT, Phase, Projection, ProjectionReport, ProjectionRow, ScenarioDelta,
    ScenarioInput, ScenarioProjections, Statistics,
};
pub use worker::{
    Adjustments, ProjectionWorker, Recommendation, RequestSequencer, UserProfile, WorkerRequest,
    WorkerResponse, handle_request,
};
