//! Alpha Vantage client for company fundamentals

use crate::error::{AnalystError, Result};
use crate::market_data::TickerMetadata;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Free tier allows 5 requests per minute
const FREE_TIER_RATE_LIMIT: u32 = 5;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Alpha Vantage API client
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
    rate_limiter: SharedRateLimiter,
}

/// Company overview data
///
/// Alpha Vantage reports every number as a string and uses `"None"` or `"-"`
/// for missing values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompanyOverview {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(rename = "MarketCapitalization", default)]
    pub market_cap: Option<String>,
    #[serde(rename = "PERatio", default)]
    pub pe_ratio: Option<String>,
    #[serde(default)]
    pub analyst_rating_strong_buy: Option<String>,
    #[serde(default)]
    pub analyst_rating_buy: Option<String>,
    #[serde(default)]
    pub analyst_rating_hold: Option<String>,
    #[serde(default)]
    pub analyst_rating_sell: Option<String>,
    #[serde(default)]
    pub analyst_rating_strong_sell: Option<String>,
}

impl CompanyOverview {
    /// Consensus label derived from the analyst rating counts
    ///
    /// Ratings are scored 1 (strong buy) to 5 (strong sell) and averaged.
    /// Returns `"none"` when no analyst covers the ticker.
    pub fn recommendation_key(&self) -> &'static str {
        let counts = [
            &self.analyst_rating_strong_buy,
            &self.analyst_rating_buy,
            &self.analyst_rating_hold,
            &self.analyst_rating_sell,
            &self.analyst_rating_strong_sell,
        ]
        .map(|count| parse_number(count.as_deref()).unwrap_or(0.0).max(0.0));

        let total: f64 = counts.iter().sum();
        if total == 0.0 {
            return "none";
        }

        let mean = counts
            .iter()
            .zip(1..=5)
            .map(|(count, score)| count * f64::from(score))
            .sum::<f64>()
            / total;

        if mean <= 1.5 {
            "strong_buy"
        } else if mean <= 2.5 {
            "buy"
        } else if mean <= 3.5 {
            "hold"
        } else if mean <= 4.5 {
            "sell"
        } else {
            "strong_sell"
        }
    }

    /// Map into the provider-neutral metadata keys
    pub fn into_metadata(self) -> TickerMetadata {
        let mut metadata = TickerMetadata::new();

        if let Some(pe) = parse_number(self.pe_ratio.as_deref()) {
            metadata.insert("trailingPE", pe);
        }
        if let Some(cap) = parse_number(self.market_cap.as_deref()) {
            metadata.insert("marketCap", cap);
        }
        metadata.insert("recommendationKey", self.recommendation_key());

        for (key, value) in [
            ("longName", self.name),
            ("sector", self.sector),
            ("industry", self.industry),
        ] {
            if let Some(value) = value.filter(|v| !is_placeholder(v)) {
                metadata.insert(key, value);
            }
        }

        metadata
    }
}

fn is_placeholder(value: &str) -> bool {
    matches!(value.trim(), "" | "None" | "-")
}

fn parse_number(value: Option<&str>) -> Option<f64> {
    value
        .filter(|v| !is_placeholder(v))
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

impl AlphaVantageClient {
    /// Create a new Alpha Vantage client with API key and rate limit
    ///
    /// # Arguments
    /// * `api_key` - Alpha Vantage API key
    /// * `rate_limit` - Maximum requests per minute (5 on the free tier)
    pub fn new(api_key: impl Into<String>, rate_limit: u32) -> Result<Self> {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            rate_limiter,
        })
    }

    /// Create from environment variable ALPHA_VANTAGE_API_KEY with the free-tier rate limit
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ALPHA_VANTAGE_API_KEY").map_err(|_| {
            AnalystError::Config("ALPHA_VANTAGE_API_KEY environment variable not set".to_string())
        })?;

        Self::new(api_key, FREE_TIER_RATE_LIMIT)
    }

    /// Get company overview and fundamental data
    pub async fn get_company_overview(&self, symbol: &str) -> Result<CompanyOverview> {
        self.rate_limiter.until_ready().await;
        debug!(symbol, "Requesting Alpha Vantage OVERVIEW");

        let params = [
            ("function", "OVERVIEW"),
            ("symbol", symbol),
            ("apikey", self.api_key.as_str()),
        ];

        let response = self.client.get(BASE_URL).query(&params).send().await?;

        if !response.status().is_success() {
            return Err(AnalystError::Provider(format!(
                "Alpha Vantage HTTP error: {}",
                response.status()
            )));
        }

        let data: serde_json::Value = response.json().await?;
        parse_overview(symbol, data)
    }
}

fn parse_overview(symbol: &str, data: serde_json::Value) -> Result<CompanyOverview> {
    if let Some(error) = data.get("Error Message") {
        return Err(AnalystError::Provider(format!("Alpha Vantage: {error}")));
    }

    // Both keys signal an exhausted quota
    if data.get("Note").is_some() || data.get("Information").is_some() {
        return Err(AnalystError::Provider(
            "Alpha Vantage rate limit exceeded".to_string(),
        ));
    }

    // Unknown symbols come back as an empty object
    if data.as_object().is_none_or(|obj| obj.is_empty()) {
        debug!(symbol, "Alpha Vantage has no overview for symbol");
        return Ok(CompanyOverview {
            symbol: symbol.to_string(),
            ..Default::default()
        });
    }

    Ok(serde_json::from_value(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = AlphaVantageClient::new("test_key", 5).unwrap();
        assert_eq!(client.api_key, "test_key");
    }

    #[test]
    fn test_overview_to_metadata() {
        let data = json!({
            "Symbol": "IBM",
            "Name": "International Business Machines",
            "Sector": "TECHNOLOGY",
            "Industry": "None",
            "MarketCapitalization": "170000000000",
            "PERatio": "22.5",
            "AnalystRatingStrongBuy": "2",
            "AnalystRatingBuy": "6",
            "AnalystRatingHold": "8",
            "AnalystRatingSell": "1",
            "AnalystRatingStrongSell": "0"
        });

        let metadata = parse_overview("IBM", data).unwrap().into_metadata();
        assert_eq!(metadata.get("trailingPE"), Some(&json!(22.5)));
        assert_eq!(metadata.get("marketCap"), Some(&json!(170_000_000_000.0)));
        // (2*1 + 6*2 + 8*3 + 1*4) / 17 = 2.47
        assert_eq!(metadata.get("recommendationKey"), Some(&json!("buy")));
        assert_eq!(metadata.get("sector"), Some(&json!("TECHNOLOGY")));
        assert!(metadata.get("industry").is_none());
    }

    #[test]
    fn test_placeholders_are_dropped() {
        let overview = CompanyOverview {
            symbol: "XYZ".to_string(),
            pe_ratio: Some("None".to_string()),
            market_cap: Some("-".to_string()),
            ..Default::default()
        };

        let metadata = overview.into_metadata();
        assert!(metadata.get("trailingPE").is_none());
        assert!(metadata.get("marketCap").is_none());
        assert_eq!(metadata.get("recommendationKey"), Some(&json!("none")));
    }

    #[test]
    fn test_unknown_symbol_is_empty_overview() {
        let overview = parse_overview("NOPE", json!({})).unwrap();
        assert_eq!(overview.symbol, "NOPE");
        assert!(overview.pe_ratio.is_none());
    }

    #[test]
    fn test_rate_limit_note() {
        let result = parse_overview("IBM", json!({"Note": "Thank you for using Alpha Vantage!"}));
        assert!(matches!(result, Err(AnalystError::Provider(_))));
    }

    #[tokio::test]
    #[ignore] // Requires API key and network access
    async fn test_get_company_overview() {
        let client = AlphaVantageClient::from_env().unwrap();
        let overview = client.get_company_overview("IBM").await.unwrap();
        assert_eq!(overview.symbol, "IBM");
    }
}
