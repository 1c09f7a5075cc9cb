//! Valuation and analyst sentiment from provider metadata

use super::{AgentKind, AgentResult, Metrics, metric_number};
use crate::error::{AnalystError, Result};
use crate::market_data::TickerMetadata;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Placeholder for a field the provider did not supply
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundamentalResult {
    pub pe_ratio: Option<f64>,
    pub market_cap: Option<f64>,
    pub analyst_rating: Option<String>,
}

impl FundamentalResult {
    pub fn metrics(&self) -> Metrics {
        let na = || Value::from(NOT_AVAILABLE);

        Metrics::from([
            (
                "pe_ratio".to_string(),
                self.pe_ratio.map_or_else(na, metric_number),
            ),
            (
                "market_cap".to_string(),
                self.market_cap.map_or_else(na, Value::from),
            ),
            (
                "analyst_rating".to_string(),
                self.analyst_rating.clone().map_or_else(na, Value::from),
            ),
            (
                "market_cap_display".to_string(),
                self.market_cap
                    .map_or_else(na, |cap| Value::from(format_market_cap(cap))),
            ),
            (
                "valuation".to_string(),
                self.pe_ratio.map_or_else(na, |pe| Value::from(interpret_pe(pe))),
            ),
        ])
    }

    /// True when the provider supplied none of the fields
    pub fn is_empty(&self) -> bool {
        self.pe_ratio.is_none() && self.market_cap.is_none() && self.analyst_rating.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FundamentalAgent;

impl FundamentalAgent {
    /// Normalize the outcome of a metadata lookup
    ///
    /// Missing fields become N/A. Only a failed lookup fails the agent.
    pub fn analyze(lookup: Result<TickerMetadata>) -> AgentResult {
        match lookup {
            Ok(metadata) => AgentResult::Fundamental(Self::extract(&metadata)),
            Err(e) => {
                let error = match e {
                    AnalystError::Provider(_) => e,
                    other => AnalystError::Provider(other.to_string()),
                };
                AgentResult::failure(AgentKind::Fundamental, &error)
            }
        }
    }

    pub fn extract(metadata: &TickerMetadata) -> FundamentalResult {
        let result = FundamentalResult {
            pe_ratio: number_field(metadata, "trailingPE"),
            market_cap: number_field(metadata, "marketCap"),
            analyst_rating: rating_field(metadata, "recommendationKey"),
        };

        if result.is_empty() {
            debug!("Metadata carries no fundamentals, reporting N/A");
        }
        result
    }
}

/// Finite number, given either as a JSON number or a numeric string
fn number_field(metadata: &TickerMetadata, key: &str) -> Option<f64> {
    let value = match metadata.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

fn rating_field(metadata: &TickerMetadata, key: &str) -> Option<String> {
    let raw = metadata.get(key)?.as_str()?.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return None;
    }
    Some(raw.replace('_', " ").to_uppercase())
}

/// Format market cap in human-readable form
fn format_market_cap(cap: f64) -> String {
    if cap >= 1_000_000_000_000.0 {
        format!("${:.2}T", cap / 1_000_000_000_000.0)
    } else if cap >= 1_000_000_000.0 {
        format!("${:.2}B", cap / 1_000_000_000.0)
    } else if cap >= 1_000_000.0 {
        format!("${:.2}M", cap / 1_000_000.0)
    } else {
        format!("${cap:.2}")
    }
}

/// Interpret P/E ratio
fn interpret_pe(pe: f64) -> &'static str {
    if pe < 0.0 {
        "Negative (company is not profitable)"
    } else if pe < 15.0 {
        "Low (potentially undervalued or slow growth)"
    } else if pe < 25.0 {
        "Moderate (fairly valued)"
    } else if pe < 50.0 {
        "High (potentially overvalued or high growth)"
    } else {
        "Very High (very expensive or very high growth expectations)"
    }
}
