//! Technical reading of the latest session

use super::{AgentKind, AgentResult, Metrics, metric_number};
use crate::error::{AnalystError, Result};
use crate::features::{FeatureFrame, interpret_rsi};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Price position relative to the moving average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
}

impl Trend {
    /// Bullish only when close is strictly above the SMA
    pub fn classify(close: f64, sma: f64) -> Self {
        if close > sma {
            Self::Bullish
        } else {
            Self::Bearish
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bullish => "Bullish",
            Self::Bearish => "Bearish",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicalResult {
    pub rsi: f64,
    pub rsi_signal: &'static str,
    pub trend: Trend,
    pub sma: f64,
    pub close: f64,
}

impl TechnicalResult {
    pub fn metrics(&self) -> Metrics {
        Metrics::from([
            ("rsi".to_string(), metric_number(self.rsi)),
            ("rsi_signal".to_string(), Value::from(self.rsi_signal)),
            ("trend".to_string(), Value::from(self.trend.as_str())),
            ("sma".to_string(), metric_number(self.sma)),
            ("close".to_string(), metric_number(self.close)),
        ])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TechnicalAgent;

impl TechnicalAgent {
    pub fn analyze(frame: &FeatureFrame) -> AgentResult {
        match Self::try_analyze(frame) {
            Ok(result) => AgentResult::Technical(result),
            Err(e) => AgentResult::failure(AgentKind::Technical, &e),
        }
    }

    fn try_analyze(frame: &FeatureFrame) -> Result<TechnicalResult> {
        let latest = frame.live_row().ok_or_else(|| {
            AnalystError::InsufficientData(format!("no feature rows for {}", frame.ticker()))
        })?;

        if ![latest.rsi, latest.sma, latest.close]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(AnalystError::InsufficientData(format!(
                "latest row for {} ({}) has undefined RSI/SMA/close",
                frame.ticker(),
                latest.date
            )));
        }

        Ok(TechnicalResult {
            rsi: latest.rsi,
            rsi_signal: interpret_rsi(latest.rsi),
            trend: Trend::classify(latest.close, latest.sma),
            sma: latest.sma,
            close: latest.close,
        })
    }
}
