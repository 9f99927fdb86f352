use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field} {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("tax table has no brackets")]
    Empty,
    #[error("first tax bracket must start at 0, starts at {0}")]
    FirstBracketMin(f64),
    #[error("tax bracket {index} has a negative or non-finite value")]
    InvalidValue { index: usize },
    #[error("tax bracket {index} is open-ended but is not the top bracket")]
    OpenBracketNotLast { index: usize },
    #[error("top tax bracket {index} must have no upper bound")]
    TopBracketBounded { index: usize },
    #[error("tax bracket {index} starts at {min}, expected {expected}")]
    Discontinuous { index: usize, min: f64, expected: f64 },
    #[error("tax bracket {index} base tax {base_tax} does not match cumulative tax {expected}")]
    BaseTaxMismatch {
        index: usize,
        base_tax: f64,
        expected: f64,
    },
    #[error("rebates must be non-negative and finite")]
    InvalidRebate,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("invalid tax policy: {0}")]
    Policy(#[from] PolicyError),
}
