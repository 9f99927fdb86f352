use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::compare::impact_summary;
use super::tax::TaxPolicy;
use super::types::{ImpactSummary, ScenarioInput, ScenarioProjections};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
    pub current_savings: f64,
    pub monthly_contribution: f64,
    pub expected_return: f64,
    pub inflation_rate: f64,
    pub drawdown_rate: f64,
    #[serde(default)]
    pub gross_annual_income: Option<f64>,
}

impl UserProfile {
    pub fn to_scenario(&self) -> ScenarioInput {
        ScenarioInput {
            current_age: self.current_age,
            retirement_age: self.retirement_age,
            life_expectancy: self.life_expectancy,
            starting_balance: self.current_savings,
            monthly_contribution: self.monthly_contribution,
            annual_return_pct: self.expected_return,
            inflation_pct: self.inflation_rate,
            drawdown_rate_pct: self.drawdown_rate,
            gross_annual_income: self.gross_annual_income,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Adjustments {
    pub additional_monthly_contribution: f64,
    pub retirement_age_shift: i32,
    pub expected_return: Option<f64>,
    pub inflation_rate: Option<f64>,
    pub drawdown_rate: Option<f64>,
}

impl Adjustments {
    pub fn apply(&self, scenario: &ScenarioInput) -> ScenarioInput {
        let mut adjusted = scenario.clone();
        adjusted.monthly_contribution += self.additional_monthly_contribution;
        adjusted.retirement_age = scenario
            .retirement_age
            .saturating_add_signed(self.retirement_age_shift);
        if let Some(rate) = self.expected_return {
            adjusted.annual_return_pct = rate;
        }
        if let Some(rate) = self.inflation_rate {
            adjusted.inflation_pct = rate;
        }
        if let Some(rate) = self.drawdown_rate {
            adjusted.drawdown_rate_pct = rate;
        }
        adjusted
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Recommendation {
    pub title: String,
    pub adjustments: Adjustments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    #[serde(default)]
    pub request_id: u64,
    pub user_profile: UserProfile,
    #[serde(default)]
    pub adjustments: Adjustments,
    #[serde(default)]
    pub ai_recommendations: Vec<Recommendation>,
}

impl WorkerRequest {
    pub fn baseline(&self) -> ScenarioInput {
        self.user_profile.to_scenario()
    }

    pub fn adjusted(&self) -> ScenarioInput {
        let with_user = self.adjustments.apply(&self.baseline());
        self.ai_recommendations
            .iter()
            .fold(with_user, |scenario, rec| rec.adjustments.apply(&scenario))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerResponse {
    #[serde(rename_all = "camelCase")]
    Success {
        request_id: u64,
        impact_summary: ImpactSummary,
        projections: ScenarioProjections,
    },
    #[serde(rename_all = "camelCase")]
    Error { request_id: u64, message: String },
}

impl WorkerResponse {
    pub fn request_id(&self) -> u64 {
        match self {
            WorkerResponse::Success { request_id, .. } | WorkerResponse::Error { request_id, .. } => {
                *request_id
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkerResponse::Success { .. })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "projection worker panicked".to_string())
}

pub fn handle_request(policy: &TaxPolicy, request: &WorkerRequest) -> WorkerResponse {
    let request_id = request.request_id;
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        impact_summary(policy, &request.baseline(), &request.adjusted())
    }));

    match outcome {
        Ok(Ok((impact_summary, projections))) => WorkerResponse::Success {
            request_id,
            impact_summary,
            projections,
        },
        Ok(Err(err)) => WorkerResponse::Error {
            request_id,
            message: err.to_string(),
        },
        Err(payload) => WorkerResponse::Error {
            request_id,
            message: panic_message(payload.as_ref()),
        },
    }
}

#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, request_id: u64) -> bool {
        request_id == self.latest()
    }
}

pub struct ProjectionWorker {
    requests: Option<Sender<WorkerRequest>>,
    responses: Receiver<WorkerResponse>,
    sequencer: RequestSequencer,
    handle: Option<JoinHandle<()>>,
}

impl ProjectionWorker {
    pub fn spawn(policy: TaxPolicy) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<WorkerRequest>();
        let (response_tx, response_rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            for request in request_rx {
                let response = handle_request(&policy, &request);
                if response_tx.send(response).is_err() {
                    break;
                }
            }
            debug!("projection worker shutting down");
        });

        Self {
            requests: Some(request_tx),
            responses: response_rx,
            sequencer: RequestSequencer::new(),
            handle: Some(handle),
        }
    }

    pub fn submit(
        &self,
        user_profile: UserProfile,
        adjustments: Adjustments,
        ai_recommendations: Vec<Recommendation>,
    ) -> Option<u64> {
        let request_id = self.sequencer.next_id();
        let request = WorkerRequest {
            request_id,
            user_profile,
            adjustments,
            ai_recommendations,
        };
        self.requests.as_ref()?.send(request).ok()?;
        Some(request_id)
    }

    pub fn sequencer(&self) -> &RequestSequencer {
        &self.sequencer
    }

    pub fn next_current(&self) -> Option<WorkerResponse> {
        loop {
            let response = self.responses.recv().ok()?;
            if self.sequencer.is_current(response.request_id()) {
                return Some(response);
            }
            debug!("dropping stale response {}", response.request_id());
        }
    }
}

impl Drop for ProjectionWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("projection worker thread panicked");
            }
        }
    }
}
