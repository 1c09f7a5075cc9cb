//! Next-session price prediction

use super::{AgentKind, AgentResult, Metrics, metric_number};
use crate::error::{AnalystError, Result};
use crate::features::{FeatureFrame, FeatureRow};
use crate::model::{BaggedForest, ForestParams};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// Feature columns, in model input order
pub const FEATURE_NAMES: [&str; 8] = [
    "open",
    "high",
    "low",
    "close",
    "volume",
    "sma",
    "rsi",
    "daily_return",
];

/// Predicted move relative to the current close
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// UP only on a strictly higher prediction
    pub fn from_prices(current: f64, predicted: f64) -> Self {
        if predicted > current {
            Self::Up
        } else {
            Self::Down
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub current_price: f64,
    pub predicted_price: f64,
    pub direction: Direction,
    pub expected_change_pct: f64,
    pub model_used: String,
    pub training_rows: usize,
}

impl PredictionResult {
    pub fn metrics(&self) -> Metrics {
        Metrics::from([
            ("current_price".to_string(), metric_number(self.current_price)),
            ("predicted_price".to_string(), metric_number(self.predicted_price)),
            ("direction".to_string(), Value::from(self.direction.as_str())),
            (
                "expected_change_pct".to_string(),
                metric_number(self.expected_change_pct),
            ),
            ("model_used".to_string(), Value::from(self.model_used.clone())),
            ("training_rows".to_string(), Value::from(self.training_rows)),
        ])
    }
}

/// Fits a bagged tree ensemble per run and predicts the next close
///
/// The ensemble learns the close-to-next-close change rather than the next
/// close itself, so predictions are not capped by the training price range.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictionAgent {
    params: ForestParams,
}

impl PredictionAgent {
    pub fn new(params: ForestParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> ForestParams {
        self.params
    }

    pub fn predict(&self, frame: &FeatureFrame) -> AgentResult {
        match self.try_predict(frame) {
            Ok(result) => AgentResult::Prediction(result),
            Err(e) => AgentResult::failure(AgentKind::Prediction, &e),
        }
    }

    fn try_predict(&self, frame: &FeatureFrame) -> Result<PredictionResult> {
        let labelled: Vec<(Vec<f64>, f64)> = frame
            .training_rows()
            .filter_map(|row| row.next_close.map(|next| (feature_vector(row), next - row.close)))
            .collect();
        let labelled_rows = labelled.len();

        // Rows with an undefined feature or target are dropped, not fatal
        let (x, y): (Vec<Vec<f64>>, Vec<f64>) = labelled
            .into_iter()
            .filter(|(features, target)| {
                target.is_finite() && features.iter().all(|v| v.is_finite())
            })
            .unzip();

        if labelled_rows > x.len() {
            warn!(
                ticker = frame.ticker(),
                dropped = labelled_rows - x.len(),
                "Dropped training rows with undefined features"
            );
        }
        if x.is_empty() {
            return Err(AnalystError::Training(format!(
                "no labelled rows to train on for {}",
                frame.ticker()
            )));
        }

        let live = frame.live_row().ok_or_else(|| {
            AnalystError::Training(format!("no live row to predict from for {}", frame.ticker()))
        })?;
        let live_features = feature_vector(live);
        if live_features.iter().any(|v| !v.is_finite()) {
            return Err(AnalystError::Training(format!(
                "latest row of {} has undefined features",
                frame.ticker()
            )));
        }

        let forest = BaggedForest::fit(&x, &y, self.params)?;
        let delta = forest.predict(&live_features)?;

        let current_price = live.close;
        let predicted_price = current_price + delta;
        if current_price == 0.0 || !predicted_price.is_finite() {
            return Err(AnalystError::Training(format!(
                "cannot express a change from a close of {current_price}"
            )));
        }

        let expected_change_pct = (predicted_price - current_price) / current_price * 100.0;

        debug!(
            ticker = frame.ticker(),
            training_rows = x.len(),
            current_price,
            predicted_price,
            "Prediction complete"
        );

        Ok(PredictionResult {
            current_price,
            predicted_price,
            direction: Direction::from_prices(current_price, predicted_price),
            expected_change_pct,
            model_used: BaggedForest::NAME.to_string(),
            training_rows: x.len(),
        })
    }
}

fn feature_vector(row: &FeatureRow) -> Vec<f64> {
    vec![
        row.open,
        row.high,
        row.low,
        row.close,
        row.volume,
        row.sma,
        row.rsi,
        row.daily_return,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::series_from_closes;
    use crate::features::{FeatureEngine, FeatureWindows};

    fn frame(closes: &[f64]) -> FeatureFrame {
        FeatureEngine::derive(&series_from_closes(closes), FeatureWindows::new(5, 5)).unwrap()
    }

    fn prediction(result: AgentResult) -> PredictionResult {
        match result {
            AgentResult::Prediction(p) => p,
            other => panic!("expected prediction, got {other:?}"),
        }
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (f64::from(i) * 0.4).sin() * 8.0 + f64::from(i) * 0.1)
            .collect();
        let frame = frame(&closes);
        let agent = PredictionAgent::default();

        let first = prediction(agent.predict(&frame));
        let second = prediction(agent.predict(&frame));
        assert_eq!(first.predicted_price, second.predicted_price);
        assert_eq!(first.training_rows, 60 - 4 - 1);
        assert_eq!(first.model_used, "BaggedRegressionTrees");
    }

    #[test]
    fn test_direction_matches_change() {
        let closes: Vec<f64> = (0..50)
            .map(|i| 50.0 + (f64::from(i) * 0.9).cos() * 3.0)
            .collect();
        let result = prediction(PredictionAgent::default().predict(&frame(&closes)));

        let up = result.predicted_price > result.current_price;
        assert_eq!(result.direction == Direction::Up, up);
        if up {
            assert!(result.expected_change_pct > 0.0);
        } else {
            assert!(result.expected_change_pct <= 0.0);
        }
    }

    #[test]
    fn test_falling_series_predicts_down() {
        let closes: Vec<f64> = (0..30).map(|i| 200.0 - f64::from(i) * 2.0).collect();
        let result = prediction(PredictionAgent::default().predict(&frame(&closes)));

        assert_eq!(result.direction, Direction::Down);
        assert!((result.predicted_price - 140.0).abs() < 1e-9);
        assert!(result.expected_change_pct < 0.0);
    }

    #[test]
    fn test_no_training_rows_is_failure() {
        let windows = FeatureWindows::new(5, 5);
        let mut rows = FeatureEngine::derive(&series_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), windows)
            .unwrap()
            .rows()
            .to_vec();
        rows.truncate(1);
        rows[0].next_close = None;
        let frame = FeatureFrame::from_rows("TEST", windows, rows);

        let result = PredictionAgent::default().predict(&frame);
        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, crate::ErrorKind::Training);
        assert_eq!(failure.agent, AgentKind::Prediction);
    }

    #[test]
    fn test_zero_close_drops_undefined_row() {
        let mut closes: Vec<f64> = (0..40).map(|i| 100.0 + f64::from(i)).collect();
        closes[10] = 0.0;
        let frame = frame(&closes);
        assert_eq!(
            frame.rows().iter().filter(|row| !row.daily_return.is_finite()).count(),
            1
        );

        let result = prediction(PredictionAgent::default().predict(&frame));
        // 36 frame rows, 35 labelled, one with an infinite return
        assert_eq!(result.training_rows, 34);
        assert!(result.predicted_price.is_finite());
        assert_eq!(result.current_price, 139.0);
    }

    #[test]
    fn test_metrics_are_rounded() {
        let result = PredictionResult {
            current_price: 100.0,
            predicted_price: 101.23456,
            direction: Direction::Up,
            expected_change_pct: 1.23456,
            model_used: BaggedForest::NAME.to_string(),
            training_rows: 25,
        };

        let metrics = result.metrics();
        assert_eq!(metrics["predicted_price"], serde_json::json!(101.23));
        assert_eq!(metrics["expected_change_pct"], serde_json::json!(1.23));
        assert_eq!(metrics["direction"], "UP");
        assert_eq!(metrics["training_rows"], 25);
    }
}
