use serde::{Deserialize, Serialize};

use super::error::ValidationError;

pub const MAX_AGE: u32 = 120;

// balances at or below this count as exhausted
pub const DEPLETION_EPSILON: f64 = 0.01;

// compounding within these bounds over MAX_AGE years stays finite
pub const MAX_RATE_PCT: f64 = 100.0;
pub const MAX_AMOUNT: f64 = 1.0e12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioInput {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
    pub starting_balance: f64,
    pub monthly_contribution: f64,
    pub annual_return_pct: f64,
    pub inflation_pct: f64,
    pub drawdown_rate_pct: f64,
    #[serde(default)]
    pub gross_annual_income: Option<f64>,
}

impl ScenarioInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.retirement_age <= self.current_age {
            return Err(ValidationError::new(
                "retirement_age",
                "must be greater than current_age",
            ));
        }
        if self.life_expectancy < self.retirement_age {
            return Err(ValidationError::new(
                "life_expectancy",
                "must be at least retirement_age",
            ));
        }
        if self.life_expectancy > MAX_AGE {
            return Err(ValidationError::new(
                "life_expectancy",
                format!("must be at most {MAX_AGE}"),
            ));
        }

        non_negative("starting_balance", self.starting_balance)?;
        non_negative("monthly_contribution", self.monthly_contribution)?;
        bounded_rate("annual_return_pct", self.annual_return_pct)?;
        bounded_rate("inflation_pct", self.inflation_pct)?;

        if !self.drawdown_rate_pct.is_finite() || !(0.0..=100.0).contains(&self.drawdown_rate_pct) {
            return Err(ValidationError::new(
                "drawdown_rate_pct",
                "must be between 0 and 100",
            ));
        }
        if let Some(income) = self.gross_annual_income {
            non_negative("gross_annual_income", income)?;
        }
        Ok(())
    }

    pub fn months_until_retirement(&self) -> u32 {
        self.retirement_age.saturating_sub(self.current_age) * 12
    }

    pub fn monthly_return_rate(&self) -> f64 {
        self.annual_return_pct / 100.0 / 12.0
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || !(0.0..=MAX_AMOUNT).contains(&value) {
        return Err(ValidationError::new(
            field,
            format!("must be an amount between 0 and {MAX_AMOUNT}"),
        ));
    }
    Ok(())
}

fn bounded_rate(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= -100.0 || value > MAX_RATE_PCT {
        return Err(ValidationError::new(
            field,
            format!("must be a percentage above -100 and at most {MAX_RATE_PCT}"),
        ));
    }
    Ok(())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Accumulating,
    DrawingDown,
    Depleted,
    Completed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Depleted | Phase::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionRow {
    pub period: u32,
    pub age: u32,
    pub phase: Phase,
    pub beginning_balance: f64,
    pub contribution: f64,
    pub investment_return: f64,
    pub withdrawal: f64,
    pub tax_paid: f64,
    pub ending_balance: f64,
    pub inflation_adjusted_balance: f64,
}

impl ProjectionRow {
    pub fn balance_residual(&self) -> f64 {
        self.ending_balance
            - (self.beginning_balance + self.investment_return + self.contribution
                - self.withdrawal
                - self.tax_paid)
    }

    pub fn is_depleted(&self) -> bool {
        self.ending_balance <= DEPLETION_EPSILON
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulationResult {
    pub final_balance: f64,
    pub total_contributed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownResult {
    pub periodic_withdrawal: f64,
    pub schedule: Vec<ProjectionRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_contributed: f64,
    pub projected_value_at_retirement: f64,
    pub total_withdrawn: f64,
    pub total_tax_paid: f64,
    pub net_after_tax_income: f64,
    pub final_balance: f64,
    pub fund_depletion_age: Option<u32>,
    pub wealth_retention_ratio: f64,
    pub effective_tax_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub rows: Vec<ProjectionRow>,
    pub nest_egg: f64,
    pub total_contributed: f64,
    pub monthly_drawdown: f64,
    pub final_phase: Phase,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionReport {
    pub nest_egg: f64,
    pub monthly_drawdown: f64,
    pub final_phase: Phase,
    pub statistics: Statistics,
    pub rows: Vec<ProjectionRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDelta {
    pub nest_egg_delta: f64,
    pub drawdown_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactSummary {
    pub baseline_nest_egg: f64,
    pub adjusted_nest_egg: f64,
    pub nest_egg_delta: f64,
    pub baseline_monthly_drawdown: f64,
    pub adjusted_monthly_drawdown: f64,
    pub drawdown_delta: f64,
    pub baseline_depletion_age: Option<u32>,
    pub adjusted_depletion_age: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioProjections {
    pub baseline: Vec<ProjectionRow>,
    pub adjusted: Vec<ProjectionRow>,
}
