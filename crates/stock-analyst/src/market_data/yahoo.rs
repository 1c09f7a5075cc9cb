//! Yahoo Finance market data provider

use crate::error::{AnalystError, Result};
use crate::market_data::{
    AlphaVantageClient, LookbackPeriod, MarketDataProvider, PriceBar, PriceSeries, TickerMetadata,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use time::OffsetDateTime;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

/// Daily prices from Yahoo Finance, fundamentals from Alpha Vantage
///
/// Yahoo's chart API carries no fundamentals, so metadata comes from the
/// optional Alpha Vantage client. Without one, metadata is an empty mapping
/// and the fundamental section reports every field as N/A.
#[derive(Debug, Clone, Default)]
pub struct YahooFinanceProvider {
    fundamentals: Option<AlphaVantageClient>,
}

impl YahooFinanceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an Alpha Vantage client for fundamentals
    pub fn with_fundamentals(mut self, client: AlphaVantageClient) -> Self {
        self.fundamentals = Some(client);
        self
    }

    /// Price-only provider, plus Alpha Vantage when `ALPHA_VANTAGE_API_KEY` is set
    pub fn from_env() -> Result<Self> {
        match std::env::var("ALPHA_VANTAGE_API_KEY") {
            Ok(key) if !key.trim().is_empty() => {
                Ok(Self::new().with_fundamentals(AlphaVantageClient::new(key, 5)?))
            }
            _ => Ok(Self::new()),
        }
    }

    pub fn has_fundamentals(&self) -> bool {
        self.fundamentals.is_some()
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    #[instrument(skip(self))]
    async fn fetch(&self, ticker: &str, lookback: LookbackPeriod) -> Result<PriceSeries> {
        let provider =
            yahoo::YahooConnector::new().map_err(|e| AnalystError::data_fetch(ticker, e))?;

        let end = Utc::now();
        let start = end - lookback.duration();

        // Convert chrono DateTime to time OffsetDateTime
        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| AnalystError::data_fetch(ticker, format!("Invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| AnalystError::data_fetch(ticker, format!("Invalid end timestamp: {e}")))?;

        let response = provider
            .get_quote_history(ticker, start_odt, end_odt)
            .await
            .map_err(|e| AnalystError::data_fetch(ticker, e))?;

        let quotes = response
            .quotes()
            .map_err(|e| AnalystError::data_fetch(ticker, e))?;

        debug!(count = quotes.len(), "Received Yahoo Finance quotes");

        let bars = quotes_to_bars(ticker, &quotes)?;
        PriceSeries::new(ticker, bars)
    }

    #[instrument(skip(self))]
    async fn metadata(&self, ticker: &str) -> Result<TickerMetadata> {
        let Some(client) = &self.fundamentals else {
            debug!("No fundamentals source configured, returning empty metadata");
            return Ok(TickerMetadata::new());
        };

        let overview = client
            .get_company_overview(ticker)
            .await
            .map_err(|e| match e {
                AnalystError::Provider(_) => e,
                other => AnalystError::Provider(other.to_string()),
            })?;

        Ok(overview.into_metadata())
    }
}

/// Convert Yahoo quotes to daily bars
///
/// Yahoo occasionally repeats the current session with a newer timestamp;
/// the later quote wins.
fn quotes_to_bars(ticker: &str, quotes: &[yahoo::Quote]) -> Result<Vec<PriceBar>> {
    let mut bars: Vec<PriceBar> = Vec::with_capacity(quotes.len());

    for quote in quotes {
        let date = i64::try_from(quote.timestamp)
            .ok()
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.date_naive())
            .ok_or_else(|| {
                AnalystError::data_fetch(ticker, format!("invalid timestamp {}", quote.timestamp))
            })?;

        let bar = PriceBar {
            date,
            open: quote.open,
            high: quote.high,
            low: quote.low,
            close: quote.close,
            volume: quote.volume as f64,
        };

        match bars.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => bars.push(bar),
        }
    }

    Ok(bars)
}
