//! Feature engineering over a price series
//!
//! Derives the columns both the prediction and technical agents read:
//! simple moving average, RSI, daily return and the forward `next_close`
//! label.

use crate::config::AnalystConfig;
use crate::error::{AnalystError, Result};
use crate::market_data::PriceSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ta::Next;
use ta::indicators::SimpleMovingAverage;

/// Indicator window lengths, in closes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureWindows {
    pub sma: usize,
    pub rsi: usize,
}

impl FeatureWindows {
    pub fn new(sma: usize, rsi: usize) -> Self {
        Self { sma, rsi }
    }

    /// Rows consumed before every indicator is defined
    pub fn warm_up(&self) -> usize {
        self.sma.max(self.rsi) - 1
    }

    /// Smallest series that yields at least one training row
    pub fn min_rows(&self) -> usize {
        self.sma.max(self.rsi) + 1
    }
}

impl From<&AnalystConfig> for FeatureWindows {
    fn from(config: &AnalystConfig) -> Self {
        Self::new(config.sma_window, config.rsi_window)
    }
}

/// One price bar plus its derived features
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub sma: f64,
    pub rsi: f64,
    pub daily_return: f64,
    /// Close of the following session; `None` on the most recent row
    pub next_close: Option<f64>,
}

/// Feature table aligned with the source series after warm-up trimming
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureFrame {
    ticker: String,
    windows: FeatureWindows,
    rows: Vec<FeatureRow>,
}

impl FeatureFrame {
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn windows(&self) -> FeatureWindows {
        self.windows
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with a defined label
    pub fn training_rows(&self) -> impl Iterator<Item = &FeatureRow> {
        self.rows.iter().filter(|row| row.next_close.is_some())
    }

    /// Most recent row, used for live inference
    pub fn live_row(&self) -> Option<&FeatureRow> {
        self.rows.last()
    }

    /// Frame built from precomputed rows
    pub fn from_rows(ticker: impl Into<String>, windows: FeatureWindows, rows: Vec<FeatureRow>) -> Self {
        Self {
            ticker: ticker.into(),
            windows,
            rows,
        }
    }
}

/// Stateless feature derivation
pub struct FeatureEngine;

impl FeatureEngine {
    /// Derive the feature frame for `series`
    ///
    /// The first `max(sma, rsi) - 1` rows are consumed as warm-up, so the
    /// frame holds `N - (max(sma, rsi) - 1)` rows.
    pub fn derive(series: &PriceSeries, windows: FeatureWindows) -> Result<FeatureFrame> {
        if windows.sma < 2 || windows.rsi < 2 {
            return Err(AnalystError::Config(format!(
                "indicator windows must be at least 2 (sma={}, rsi={})",
                windows.sma, windows.rsi
            )));
        }

        let bars = series.bars();
        if bars.len() < windows.min_rows() {
            return Err(AnalystError::InsufficientData(format!(
                "{} has {} rows, need at least {} for sma={} rsi={}",
                series.ticker(),
                bars.len(),
                windows.min_rows(),
                windows.sma,
                windows.rsi
            )));
        }

        let closes: Vec<f64> = series.closes().collect();
        let smas = sma_column(&closes, windows.sma)?;
        let start = windows.warm_up();

        let rows = (start..bars.len())
            .map(|i| {
                let bar = &bars[i];
                FeatureRow {
                    date: bar.date,
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    volume: bar.volume,
                    sma: smas[i],
                    rsi: rsi(&closes[i + 1 - windows.rsi..=i]),
                    daily_return: closes[i] / closes[i - 1] - 1.0,
                    next_close: closes.get(i + 1).copied(),
                }
            })
            .collect();

        Ok(FeatureFrame {
            ticker: series.ticker().to_string(),
            windows,
            rows,
        })
    }
}

fn sma_column(closes: &[f64], period: usize) -> Result<Vec<f64>> {
    let mut sma = SimpleMovingAverage::new(period)
        .map_err(|e| AnalystError::Config(format!("SMA window {period}: {e}")))?;
    Ok(closes.iter().map(|&close| sma.next(close)).collect())
}

/// RSI over a window of closes
///
/// Averages gains and losses over the `window.len() - 1` close-to-close
/// changes. A window without losses is 100.
pub fn rsi(window: &[f64]) -> f64 {
    let changes = window.len().saturating_sub(1);
    if changes == 0 {
        return 100.0;
    }

    let (gains, losses) = window
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0, 0.0), |(gains, losses), change| {
            if change > 0.0 {
                (gains + change, losses)
            } else {
                (gains, losses - change)
            }
        });

    let avg_gain = gains / changes as f64;
    let avg_loss = losses / changes as f64;

    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Reading of an RSI value
pub fn interpret_rsi(rsi: f64) -> &'static str {
    if rsi > 70.0 {
        "Overbought"
    } else if rsi < 30.0 {
        "Oversold"
    } else {
        "Neutral"
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::market_data::PriceBar;
    use chrono::Days;

    pub(crate) fn series_from_closes(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                date: start + Days::new(i as u64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000_000.0 + i as f64 * 1000.0,
            })
            .collect();
        PriceSeries::new("TEST", bars).unwrap()
    }

    #[test]
    fn test_row_count_after_warm_up() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let series = series_from_closes(&closes);

        let frame = FeatureEngine::derive(&series, FeatureWindows::new(20, 14)).unwrap();
        assert_eq!(frame.len(), 40 - 19);
        assert_eq!(frame.training_rows().count(), frame.len() - 1);
        assert!(frame.live_row().unwrap().next_close.is_none());

        for row in frame.rows() {
            assert!((0.0..=100.0).contains(&row.rsi));
        }
    }

    #[test]
    fn test_minimum_series_length() {
        let series = series_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let result = FeatureEngine::derive(&series, FeatureWindows::new(5, 5));
        assert!(matches!(result, Err(AnalystError::InsufficientData(_))));

        let series = series_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let frame = FeatureEngine::derive(&series, FeatureWindows::new(5, 5)).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.training_rows().count(), 1);
    }

    #[test]
    fn test_rejects_degenerate_windows() {
        let series = series_from_closes(&[1.0, 2.0, 3.0]);
        let result = FeatureEngine::derive(&series, FeatureWindows::new(1, 2));
        assert!(matches!(result, Err(AnalystError::Config(_))));
    }

    #[test]
    fn test_rising_series_rsi_is_100() {
        let closes: Vec<f64> = (0..10).map(|i| 50.0 + i as f64).collect();
        let frame = FeatureEngine::derive(&series_from_closes(&closes), FeatureWindows::new(3, 5)).unwrap();
        assert!(frame.rows().iter().all(|row| row.rsi == 100.0));
    }

    #[test]
    fn test_rsi_formula() {
        // gains 2 + 1, losses 1 over 3 changes: RS = 3
        assert!((rsi(&[10.0, 12.0, 11.0, 12.0]) - 75.0).abs() < 1e-9);
        assert_eq!(rsi(&[5.0, 4.0, 3.0]), 0.0);
        assert_eq!(rsi(&[5.0, 5.0, 5.0]), 100.0);
    }

    #[test]
    fn test_columns() {
        let frame = FeatureEngine::derive(
            &series_from_closes(&[10.0, 11.0, 12.0, 13.0]),
            FeatureWindows::new(2, 2),
        )
        .unwrap();

        assert_eq!(frame.len(), 3);
        let first = frame.rows()[0];
        assert!((first.sma - 10.5).abs() < 1e-9);
        assert!((first.daily_return - 0.1).abs() < 1e-9);
        assert_eq!(first.next_close, Some(12.0));
    }

    #[test]
    fn test_interpret_rsi() {
        assert_eq!(interpret_rsi(75.0), "Overbought");
        assert_eq!(interpret_rsi(25.0), "Oversold");
        assert_eq!(interpret_rsi(70.0), "Neutral");
    }
}
