//! Bagged regression-tree ensemble
//!
//! # Prediction
//!
//! 1. Traverse each tree to its leaf value
//! 2. Average across all trees

use super::tree::{RegressionTree, TreeParams};
use crate::error::{AnalystError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ensemble hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub tree: TreeParams,
    /// Seed for bootstrap sampling; equal seeds give identical forests
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            tree: TreeParams::default(),
            seed: 42,
        }
    }
}

/// Bootstrap-aggregated regression trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaggedForest {
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl BaggedForest {
    /// Model name reported in prediction results
    pub const NAME: &'static str = "BaggedRegressionTrees";

    /// Fit the ensemble on feature rows `x` against targets `y`
    ///
    /// # Errors
    /// `Training` when the data is empty, ragged, mismatched in length or
    /// contains non-finite values.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: ForestParams) -> Result<Self> {
        if x.is_empty() {
            return Err(AnalystError::Training("training set is empty".to_string()));
        }
        if x.len() != y.len() {
            return Err(AnalystError::Training(format!(
                "{} feature rows but {} targets",
                x.len(),
                y.len()
            )));
        }
        if params.n_estimators == 0 {
            return Err(AnalystError::Training(
                "n_estimators must be greater than 0".to_string(),
            ));
        }

        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
            return Err(AnalystError::Training(
                "feature rows must share a non-zero width".to_string(),
            ));
        }
        if x.iter().flatten().chain(y).any(|v| !v.is_finite()) {
            return Err(AnalystError::Training(
                "training data contains non-finite values".to_string(),
            ));
        }

        let n = x.len();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees: Vec<RegressionTree> = (0..params.n_estimators)
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, y, &sample, params.tree)
            })
            .collect();

        debug!(
            rows = n,
            n_features,
            trees = trees.len(),
            avg_nodes = trees.iter().map(RegressionTree::n_nodes).sum::<usize>() / trees.len(),
            "Fitted bagged forest"
        );

        Ok(Self { n_features, trees })
    }

    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.n_features {
            return Err(AnalystError::Training(format!(
                "expected {} features, got {}",
                self.n_features,
                features.len()
            )));
        }

        let sum: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        let prediction = sum / self.trees.len() as f64;

        if prediction.is_finite() {
            Ok(prediction)
        } else {
            Err(AnalystError::Training(
                "ensemble produced a non-finite prediction".to_string(),
            ))
        }
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..30)
            .map(|i| {
                let t = f64::from(i);
                vec![t, (t * 0.3).sin()]
            })
            .collect();
        let y = x.iter().map(|row| 2.0 * row[0] + row[1]).collect();
        (x, y)
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = dataset();
        let a = BaggedForest::fit(&x, &y, ForestParams::default()).unwrap();
        let b = BaggedForest::fit(&x, &y, ForestParams::default()).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.predict(&x[10]).unwrap(), b.predict(&x[10]).unwrap());
    }

    #[test]
    fn test_different_seed_changes_bootstrap() {
        let (x, y) = dataset();
        let a = BaggedForest::fit(&x, &y, ForestParams::default()).unwrap();
        let b = BaggedForest::fit(
            &x,
            &y,
            ForestParams {
                seed: 7,
                ..Default::default()
            },
        )
        .unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_prediction_within_target_range() {
        let (x, y) = dataset();
        let forest = BaggedForest::fit(&x, &y, ForestParams::default()).unwrap();
        assert_eq!(forest.n_estimators(), 50);

        let min = y.iter().copied().fold(f64::INFINITY, f64::min);
        let max = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let prediction = forest.predict(&[100.0, 0.0]).unwrap();
        assert!(prediction >= min && prediction <= max);

        // In-sample error stays small for a fully grown ensemble
        let fitted = forest.predict(&x[15]).unwrap();
        assert!((fitted - y[15]).abs() < 3.0);
    }

    #[test]
    fn test_constant_target() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i)]).collect();
        let y = vec![1.5; 10];
        let forest = BaggedForest::fit(&x, &y, ForestParams::default()).unwrap();
        assert_eq!(forest.predict(&[3.0]).unwrap(), 1.5);
    }

    #[test]
    fn test_fit_errors() {
        assert!(matches!(
            BaggedForest::fit(&[], &[], ForestParams::default()),
            Err(AnalystError::Training(_))
        ));
        assert!(matches!(
            BaggedForest::fit(&[vec![1.0]], &[1.0, 2.0], ForestParams::default()),
            Err(AnalystError::Training(_))
        ));
        assert!(matches!(
            BaggedForest::fit(&[vec![f64::NAN]], &[1.0], ForestParams::default()),
            Err(AnalystError::Training(_))
        ));

        let forest = BaggedForest::fit(&[vec![1.0]], &[1.0], ForestParams::default()).unwrap();
        assert!(forest.predict(&[1.0, 2.0]).is_err());
    }
}
