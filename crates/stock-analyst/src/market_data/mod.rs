//! Market data types and the provider contract
//!
//! - [`PriceSeries`]: validated, ascending daily bars for one ticker
//! - [`TickerMetadata`]: best-effort fundamentals keyed by provider field name
//! - [`MarketDataProvider`]: where both come from
//! - [`YahooFinanceProvider`]: Yahoo Finance prices with Alpha Vantage fundamentals

pub mod alpha_vantage;
pub mod yahoo;

pub use alpha_vantage::{AlphaVantageClient, CompanyOverview};
pub use yahoo::YahooFinanceProvider;

use crate::error::{AnalystError, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One daily OHLCV row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordered price history for one ticker
///
/// Construction guarantees the series is non-empty, strictly ascending by
/// date and contains only finite values. The series cannot be modified
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self> {
        let ticker = ticker.into();

        if bars.is_empty() {
            return Err(AnalystError::data_fetch(&ticker, "price series is empty"));
        }

        if let Some(pair) = bars.windows(2).find(|pair| pair[0].date >= pair[1].date) {
            return Err(AnalystError::data_fetch(
                &ticker,
                format!(
                    "price series not strictly ascending at {} -> {}",
                    pair[0].date, pair[1].date
                ),
            ));
        }

        if let Some(bar) = bars.iter().find(|bar| {
            ![bar.open, bar.high, bar.low, bar.close, bar.volume]
                .iter()
                .all(|v| v.is_finite())
        }) {
            return Err(AnalystError::data_fetch(
                &ticker,
                format!("non-finite value in bar dated {}", bar.date),
            ));
        }

        Ok(Self { ticker, bars })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|bar| bar.close)
    }

    pub fn latest(&self) -> Option<&PriceBar> {
        self.bars.last()
    }
}

/// How far back to fetch price history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookbackPeriod {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl LookbackPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
            Self::FiveYears => "5y",
        }
    }

    /// Calendar span covered by the period
    pub fn duration(self) -> Duration {
        match self {
            Self::OneMonth => Duration::days(30),
            Self::ThreeMonths => Duration::days(90),
            Self::SixMonths => Duration::days(180),
            Self::OneYear => Duration::days(365),
            Self::TwoYears => Duration::days(730),
            Self::FiveYears => Duration::days(1825),
        }
    }
}

impl fmt::Display for LookbackPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LookbackPeriod {
    type Err = AnalystError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1mo" => Ok(Self::OneMonth),
            "3mo" => Ok(Self::ThreeMonths),
            "6mo" => Ok(Self::SixMonths),
            "1y" => Ok(Self::OneYear),
            "2y" => Ok(Self::TwoYears),
            "5y" => Ok(Self::FiveYears),
            other => Err(AnalystError::Config(format!(
                "Invalid lookback period: {other} (expected 1mo, 3mo, 6mo, 1y, 2y or 5y)"
            ))),
        }
    }
}

/// Provider fundamentals keyed by field name (`trailingPE`, `marketCap`, ...)
///
/// Any key may be missing; readers apply their own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerMetadata(BTreeMap<String, serde_json::Value>);

impl TickerMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(String, serde_json::Value)> for TickerMetadata {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Source of price history and fundamentals
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily bars covering `lookback`, ascending by date
    ///
    /// Fails with [`AnalystError::DataFetch`] on network errors or unknown tickers.
    async fn fetch(&self, ticker: &str, lookback: LookbackPeriod) -> Result<PriceSeries>;

    /// Best-effort fundamentals; total failure is [`AnalystError::Provider`]
    async fn metadata(&self, ticker: &str) -> Result<TickerMetadata>;
}
