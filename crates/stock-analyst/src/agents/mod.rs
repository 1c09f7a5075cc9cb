//! Analysis agents
//!
//! Each agent turns the shared run inputs into one [`AgentResult`]. Agents
//! never return `Err`: a failure is captured as [`AgentResult::Failure`] so
//! the coordinator can continue with the others.

pub mod fundamental;
pub mod prediction;
pub mod technical;

pub use fundamental::{FundamentalAgent, FundamentalResult};
pub use prediction::{Direction, PredictionAgent, PredictionResult};
pub use technical::{TechnicalAgent, TechnicalResult, Trend};

use crate::error::{AnalystError, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Named metrics reported by an agent
pub type Metrics = BTreeMap<String, Value>;

/// Which agent produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Prediction,
    Technical,
    Fundamental,
}

impl AgentKind {
    pub const ALL: [Self; 3] = [Self::Prediction, Self::Technical, Self::Fundamental];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prediction => "prediction",
            Self::Technical => "technical",
            Self::Fundamental => "fundamental",
        }
    }

    /// Heading used in reports
    pub fn title(self) -> &'static str {
        match self {
            Self::Prediction => "ML Prediction",
            Self::Technical => "Technical Analysis",
            Self::Fundamental => "Fundamental Analysis",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured failure of one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFailure {
    pub agent: AgentKind,
    pub kind: ErrorKind,
    pub message: String,
}

impl AgentFailure {
    pub fn new(agent: AgentKind, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            agent,
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(agent: AgentKind, error: &AnalystError) -> Self {
        Self::new(agent, error.kind(), error.to_string())
    }
}

impl fmt::Display for AgentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} agent failed ({}): {}", self.agent, self.kind, self.message)
    }
}

/// Outcome of one agent for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentResult {
    Prediction(PredictionResult),
    Technical(TechnicalResult),
    Fundamental(FundamentalResult),
    Failure(AgentFailure),
}

impl AgentResult {
    pub fn failure(agent: AgentKind, error: &AnalystError) -> Self {
        Self::Failure(AgentFailure::from_error(agent, error))
    }

    pub fn agent(&self) -> AgentKind {
        match self {
            Self::Prediction(_) => AgentKind::Prediction,
            Self::Technical(_) => AgentKind::Technical,
            Self::Fundamental(_) => AgentKind::Fundamental,
            Self::Failure(failure) => failure.agent,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn as_failure(&self) -> Option<&AgentFailure> {
        match self {
            Self::Failure(failure) => Some(failure),
            _ => None,
        }
    }

    /// Named metrics of a successful result, `None` for a failure
    pub fn metrics(&self) -> Option<Metrics> {
        match self {
            Self::Prediction(result) => Some(result.metrics()),
            Self::Technical(result) => Some(result.metrics()),
            Self::Fundamental(result) => Some(result.metrics()),
            Self::Failure(_) => None,
        }
    }
}

/// Round to two decimals for reporting
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rounded number, or null when it cannot be represented in JSON
pub(crate) fn metric_number(value: f64) -> Value {
    serde_json::Number::from_f64(round2(value)).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(-0.005_1), -0.01);
        assert_eq!(metric_number(f64::NAN), Value::Null);
    }

    #[test]
    fn test_failure_result() {
        let error = AnalystError::InsufficientData("3 rows".to_string());
        let result = AgentResult::failure(AgentKind::Technical, &error);

        assert!(result.is_failure());
        assert_eq!(result.agent(), AgentKind::Technical);
        assert!(result.metrics().is_none());

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, ErrorKind::InsufficientData);
        assert_eq!(failure.message, "Insufficient data: 3 rows");
        assert_eq!(
            failure.to_string(),
            "technical agent failed (insufficient_data): Insufficient data: 3 rows"
        );
    }
}
