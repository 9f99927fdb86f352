use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::{
    MAX_AMOUNT, ProjectionReport, ProjectionRow, SalaryBreakdown, ScenarioDelta, ScenarioInput,
    TaxPolicy, ValidationError, WorkerRequest, WorkerResponse, accumulate, compare, drawdown,
    handle_request, run_projection,
};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "nestegg",
    about = "Retirement projection under SARS income tax (accumulation, drawdown, depletion)"
)]
pub struct Cli {
    #[arg(long, default_value_t = 35)]
    current_age: u32,
    #[arg(long, default_value_t = 65)]
    retirement_age: u32,
    #[arg(long, default_value_t = 90)]
    life_expectancy: u32,
    #[arg(long, default_value_t = 100_000.0)]
    starting_balance: f64,
    #[arg(long, default_value_t = 5_000.0)]
    monthly_contribution: f64,
    #[arg(long, default_value_t = 10.0, help = "Expected annual return, percent")]
    annual_return: f64,
    #[arg(long, default_value_t = 6.0, help = "Annual inflation, percent")]
    inflation: f64,
    #[arg(
        long,
        default_value_t = 4.0,
        help = "Share of the nest egg drawn in the first retirement year, percent"
    )]
    drawdown_rate: f64,
    #[arg(long, help = "Salary used for the take-home breakdown")]
    gross_annual_income: Option<f64>,
    #[arg(long, help = "JSON tax table to use instead of SARS 2025/26")]
    tax_policy: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    life_expectancy: Option<u32>,
    #[serde(alias = "currentSavings")]
    starting_balance: Option<f64>,
    monthly_contribution: Option<f64>,
    #[serde(alias = "annualReturnPct", alias = "expectedReturn")]
    annual_return: Option<f64>,
    #[serde(alias = "inflationPct", alias = "inflationRate")]
    inflation: Option<f64>,
    #[serde(alias = "drawdownRatePct")]
    drawdown_rate: Option<f64>,
    gross_annual_income: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ComparePayload {
    baseline: ProjectPayload,
    adjusted: ProjectPayload,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DrawdownPayload {
    retirement_age: Option<u32>,
    life_expectancy: Option<u32>,
    #[serde(alias = "annualReturnPct", alias = "expectedReturn")]
    annual_return: Option<f64>,
    #[serde(alias = "inflationPct", alias = "inflationRate")]
    inflation: Option<f64>,
    #[serde(alias = "drawdownRatePct")]
    drawdown_rate: Option<f64>,
    current_age: Option<u32>,
    starting_balance: Option<f64>,
    monthly_contribution: Option<f64>,
    nest_egg: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TaxPayload {
    gross_annual_income: Option<f64>,
    age: Option<u32>,
    annual_retirement_contribution: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    #[serde(flatten)]
    report: ProjectionReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    salary_breakdown: Option<SalaryBreakdown>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DrawdownResponse {
    nest_egg: f64,
    periodic_withdrawal: f64,
    schedule: Vec<ProjectionRow>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

type SharedPolicy = Arc<TaxPolicy>;

fn default_cli() -> Cli {
    Cli {
        current_age: 35,
        retirement_age: 65,
        life_expectancy: 90,
        starting_balance: 100_000.0,
        monthly_contribution: 5_000.0,
        annual_return: 10.0,
        inflation: 6.0,
        drawdown_rate: 4.0,
        gross_annual_income: None,
        tax_policy: None,
    }
}

fn cli_flag(field: &str) -> String {
    let name = match field {
        "annual_return_pct" => "annual_return",
        "inflation_pct" => "inflation",
        "drawdown_rate_pct" => "drawdown_rate",
        other => other,
    };
    format!("--{}", name.replace('_', "-"))
}

fn validation_message(err: &ValidationError) -> String {
    format!("{} {}", cli_flag(err.field), err.message)
}

fn build_scenario(cli: &Cli) -> Result<ScenarioInput, String> {
    let scenario = ScenarioInput {
        current_age: cli.current_age,
        retirement_age: cli.retirement_age,
        life_expectancy: cli.life_expectancy,
        starting_balance: cli.starting_balance,
        monthly_contribution: cli.monthly_contribution,
        annual_return_pct: cli.annual_return,
        inflation_pct: cli.inflation,
        drawdown_rate_pct: cli.drawdown_rate,
        gross_annual_income: cli.gross_annual_income,
    };
    scenario
        .validate()
        .map_err(|err| validation_message(&err))?;
    Ok(scenario)
}

pub fn load_tax_policy(path: Option<&Path>) -> Result<TaxPolicy, String> {
    let Some(path) = path else {
        return Ok(TaxPolicy::sars_2025_26());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("--tax-policy {}: {e}", path.display()))?;
    let policy = serde_json::from_str::<TaxPolicy>(&raw)
        .map_err(|e| format!("--tax-policy {}: invalid JSON: {e}", path.display()))?;
    policy
        .validate()
        .map_err(|e| format!("--tax-policy {}: {e}", path.display()))?;
    Ok(policy)
}

fn project_response(policy: &TaxPolicy, scenario: &ScenarioInput) -> Result<ProjectResponse, String> {
    let report = run_projection(policy, scenario).map_err(|e| e.to_string())?;
    let salary_breakdown = scenario.gross_annual_income.map(|income| {
        policy.salary_breakdown(
            income,
            scenario.current_age,
            scenario.monthly_contribution * 12.0,
        )
    });
    Ok(ProjectResponse {
        report,
        salary_breakdown,
    })
}

pub fn run_project_command(cli: &Cli) -> Result<String, String> {
    let policy = load_tax_policy(cli.tax_policy.as_deref())?;
    let scenario = build_scenario(cli)?;
    let response = project_response(&policy, &scenario)?;
    serde_json::to_string_pretty(&response).map_err(|e| e.to_string())
}

fn overlay(cli: &mut Cli, payload: ProjectPayload) {
    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }
    if let Some(v) = payload.life_expectancy {
        cli.life_expectancy = v;
    }
    if let Some(v) = payload.starting_balance {
        cli.starting_balance = v;
    }
    if let Some(v) = payload.monthly_contribution {
        cli.monthly_contribution = v;
    }
    if let Some(v) = payload.annual_return {
        cli.annual_return = v;
    }
    if let Some(v) = payload.inflation {
        cli.inflation = v;
    }
    if let Some(v) = payload.drawdown_rate {
        cli.drawdown_rate = v;
    }
    if let Some(v) = payload.gross_annual_income {
        cli.gross_annual_income = Some(v);
    }
}

fn scenario_from_payload(payload: ProjectPayload) -> Result<ScenarioInput, String> {
    let mut cli = default_cli();
    overlay(&mut cli, payload);
    build_scenario(&cli)
}

#[cfg(test)]
fn scenario_from_json(json: &str) -> Result<ScenarioInput, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    scenario_from_payload(payload)
}

fn compare_response(policy: &TaxPolicy, payload: ComparePayload) -> Result<ScenarioDelta, String> {
    let baseline = scenario_from_payload(payload.baseline)?;
    let adjusted = scenario_from_payload(payload.adjusted)?;
    compare(policy, &baseline, &adjusted).map_err(|e| e.to_string())
}

fn drawdown_response(
    policy: &TaxPolicy,
    payload: DrawdownPayload,
) -> Result<DrawdownResponse, String> {
    let nest_egg_override = payload.nest_egg;
    let scenario = scenario_from_payload(ProjectPayload {
        current_age: payload.current_age,
        retirement_age: payload.retirement_age,
        life_expectancy: payload.life_expectancy,
        starting_balance: payload.starting_balance,
        monthly_contribution: payload.monthly_contribution,
        annual_return: payload.annual_return,
        inflation: payload.inflation,
        drawdown_rate: payload.drawdown_rate,
        gross_annual_income: None,
    })?;
    policy.validate().map_err(|e| e.to_string())?;

    let nest_egg = match nest_egg_override {
        Some(v) if !v.is_finite() || !(0.0..=MAX_AMOUNT).contains(&v) => {
            return Err(format!("--nest-egg must be an amount between 0 and {MAX_AMOUNT}"));
        }
        Some(v) => v,
        None => {
            accumulate(
                scenario.starting_balance,
                scenario.monthly_contribution,
                scenario.annual_return_pct,
                scenario.inflation_pct,
                scenario.months_until_retirement(),
            )
            .final_balance
        }
    };

    let result = drawdown(
        policy,
        nest_egg,
        scenario.retirement_age,
        scenario.life_expectancy,
        scenario.annual_return_pct,
        scenario.inflation_pct,
        scenario.drawdown_rate_pct,
    );
    Ok(DrawdownResponse {
        nest_egg,
        periodic_withdrawal: result.periodic_withdrawal,
        schedule: result.schedule,
    })
}

fn tax_response(policy: &TaxPolicy, payload: TaxPayload) -> Result<SalaryBreakdown, String> {
    let income = payload
        .gross_annual_income
        .ok_or_else(|| "--gross-annual-income is required".to_string())?;
    if !income.is_finite() || income < 0.0 {
        return Err("--gross-annual-income must be a finite amount >= 0".to_string());
    }
    let contribution = payload.annual_retirement_contribution.unwrap_or(0.0);
    if !contribution.is_finite() || contribution < 0.0 {
        return Err("--annual-retirement-contribution must be a finite amount >= 0".to_string());
    }
    let age = payload.age.unwrap_or(default_cli().current_age);
    Ok(policy.salary_breakdown(income, age, contribution))
}

async fn worker_response(policy: SharedPolicy, request: WorkerRequest) -> WorkerResponse {
    let request_id = request.request_id;
    match tokio::task::spawn_blocking(move || handle_request(&policy, &request)).await {
        Ok(response) => response,
        Err(e) => {
            error!("projection task for request {request_id} failed: {e}");
            WorkerResponse::Error {
                request_id,
                message: format!("projection task failed: {e}"),
            }
        }
    }
}

pub async fn run_http_server(port: u16, policy: TaxPolicy) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route("/api/compare", post(compare_handler))
        .route("/api/drawdown", post(drawdown_handler))
        .route("/api/worker", post(worker_handler))
        .route("/api/tax", get(tax_get_handler).post(tax_post_handler))
        .fallback(not_found_handler)
        .with_state(Arc::new(policy));

    let listener = TcpListener::bind(addr).await?;
    println!("nestegg HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/api/project");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(
    State(policy): State<SharedPolicy>,
    Query(payload): Query<ProjectPayload>,
) -> Response {
    project_handler_impl(&policy, payload)
}

async fn project_post_handler(
    State(policy): State<SharedPolicy>,
    Json(payload): Json<ProjectPayload>,
) -> Response {
    project_handler_impl(&policy, payload)
}

fn project_handler_impl(policy: &TaxPolicy, payload: ProjectPayload) -> Response {
    let result = scenario_from_payload(payload).and_then(|s| project_response(policy, &s));
    respond(result)
}

async fn compare_handler(
    State(policy): State<SharedPolicy>,
    Json(payload): Json<ComparePayload>,
) -> Response {
    respond(compare_response(&policy, payload))
}

async fn drawdown_handler(
    State(policy): State<SharedPolicy>,
    Json(payload): Json<DrawdownPayload>,
) -> Response {
    respond(drawdown_response(&policy, payload))
}

async fn worker_handler(
    State(policy): State<SharedPolicy>,
    Json(request): Json<WorkerRequest>,
) -> Response {
    json_response(StatusCode::OK, worker_response(policy, request).await)
}

async fn tax_get_handler(
    State(policy): State<SharedPolicy>,
    Query(payload): Query<TaxPayload>,
) -> Response {
    respond(tax_response(&policy, payload))
}

async fn tax_post_handler(
    State(policy): State<SharedPolicy>,
    Json(payload): Json<TaxPayload>,
) -> Response {
    respond(tax_response(&policy, payload))
}

fn respond<T: Serialize>(result: Result<T, String>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(msg) => {
            debug!("rejected request: {msg}");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
