//! CART regression tree
//!
//! Nodes are stored flat in pre-order; children are referenced by index.
//!
//! # Tree Traversal
//!
//! - Start at node 0 (root)
//! - At a split, go left when `features[feature] <= threshold`, right otherwise
//! - Return the value of the leaf reached

use serde::{Deserialize, Serialize};

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Minimum samples on each side of a split
    pub min_samples_leaf: usize,
    /// `None` grows until leaves are pure or too small to split
    pub max_depth: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            min_samples_leaf: 1,
            max_depth: None,
        }
    }
}

/// A single node in the tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Regression tree fitted by recursive variance reduction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

/// Best split found for a node
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    /// Grow a tree on the rows of `x` selected by `sample`
    ///
    /// `sample` may repeat indices (bootstrap). Callers guarantee it is
    /// non-empty and that every index is in range for both `x` and `y`.
    pub fn fit(x: &[Vec<f64>], y: &[f64], sample: &[usize], params: TreeParams) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let mut indices = sample.to_vec();
        tree.grow(x, y, &mut indices, 0, params);
        tree
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    // NaN goes left
                    idx = match features.get(*feature) {
                        Some(v) if *v > *threshold => *right,
                        _ => *left,
                    };
                }
                None => return f64::NAN,
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn depth_from(nodes: &[TreeNode], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(TreeNode::Split { left, right, .. }) => {
                    1 + depth_from(nodes, *left).max(depth_from(nodes, *right))
                }
                _ => 0,
            }
        }
        depth_from(&self.nodes, 0)
    }

    /// Append the subtree for `indices` and return its root index
    fn grow(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: &mut [usize],
        depth: usize,
        params: TreeParams,
    ) -> usize {
        let node_idx = self.nodes.len();
        let mean = mean(y, indices);
        self.nodes.push(TreeNode::Leaf { value: mean });

        let min_leaf = params.min_samples_leaf.max(1);
        if indices.len() < 2 * min_leaf || params.max_depth.is_some_and(|max| depth >= max) {
            return node_idx;
        }

        let parent_sse = sse(y, indices, mean);
        if parent_sse <= f64::EPSILON {
            return node_idx;
        }

        let Some(split) = best_split(x, y, indices, min_leaf, parent_sse) else {
            return node_idx;
        };

        let (left_rows, right_rows) = partition(x, indices, split.feature, split.threshold);
        let left = self.grow(x, y, left_rows, depth + 1, params);
        let right = self.grow(x, y, right_rows, depth + 1, params);

        self.nodes[node_idx] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }
}

fn mean(y: &[f64], indices: &[usize]) -> f64 {
    indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64
}

fn sse(y: &[f64], indices: &[usize], mean: f64) -> f64 {
    indices.iter().map(|&i| (y[i] - mean).powi(2)).sum()
}

/// Lowest total squared error split over all features and thresholds
///
/// Ties keep the first candidate found (lowest feature, lowest threshold).
fn best_split(
    x: &[Vec<f64>],
    y: &[f64],
    indices: &[usize],
    min_leaf: usize,
    parent_sse: f64,
) -> Option<SplitCandidate> {
    let n_features = x.get(indices[0]).map_or(0, Vec::len);
    let n = indices.len();
    let mut order = indices.to_vec();
    let mut best: Option<SplitCandidate> = None;

    for feature in 0..n_features {
        order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let total_sum: f64 = order.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = order.iter().map(|&i| y[i] * y[i]).sum();
        let mut left_sum = 0.0;
        let mut left_sq = 0.0;

        for pos in 0..n - 1 {
            let yi = y[order[pos]];
            left_sum += yi;
            left_sq += yi * yi;

            let left_n = pos + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }

            let here = x[order[pos]][feature];
            let next = x[order[pos + 1]][feature];
            if here >= next {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let split_sse = (left_sq - left_sum * left_sum / left_n as f64)
                + (right_sq - right_sum * right_sum / right_n as f64);

            if best.as_ref().is_none_or(|b| split_sse < b.sse) {
                let mut threshold = here + (next - here) / 2.0;
                // Midpoint can round up to `next` for adjacent floats
                if threshold >= next {
                    threshold = here;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    sse: split_sse,
                });
            }
        }
    }

    best.filter(|b| b.sse < parent_sse - 1e-12 * parent_sse.max(1.0))
}

/// Reorder `indices` so rows going left come first and split the slice
fn partition<'a>(
    x: &[Vec<f64>],
    indices: &'a mut [usize],
    feature: usize,
    threshold: f64,
) -> (&'a mut [usize], &'a mut [usize]) {
    let mut boundary = 0;
    for pos in 0..indices.len() {
        if x[indices[pos]][feature] <= threshold {
            indices.swap(pos, boundary);
            boundary += 1;
        }
    }
    indices.split_at_mut(boundary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0]];
        let y = vec![5.0, 5.0, 5.0];
        let tree = RegressionTree::fit(&x, &y, &all(3), TreeParams::default());

        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict(&[10.0]), 5.0);
    }

    #[test]
    fn test_step_function() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i)]).collect();
        let y: Vec<f64> = (0..10).map(|i| if i < 5 { 1.0 } else { 3.0 }).collect();
        let tree = RegressionTree::fit(&x, &y, &all(10), TreeParams::default());

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(&[2.0]), 1.0);
        assert_eq!(tree.predict(&[7.0]), 3.0);
        // Threshold sits between 4 and 5
        assert_eq!(tree.predict(&[4.4]), 1.0);
        assert_eq!(tree.predict(&[4.6]), 3.0);
    }

    #[test]
    fn test_fully_grown_tree_memorizes() {
        let x: Vec<Vec<f64>> = (0..8).map(|i| vec![f64::from(i), f64::from(i % 3)]).collect();
        let y: Vec<f64> = (0..8).map(|i| f64::from(i * i)).collect();
        let tree = RegressionTree::fit(&x, &y, &all(8), TreeParams::default());

        for (row, target) in x.iter().zip(&y) {
            assert_eq!(tree.predict(row), *target);
        }
    }

    #[test]
    fn test_min_samples_leaf_and_depth() {
        let x: Vec<Vec<f64>> = (0..8).map(|i| vec![f64::from(i)]).collect();
        let y: Vec<f64> = (0..8).map(f64::from).collect();

        let tree = RegressionTree::fit(
            &x,
            &y,
            &all(8),
            TreeParams {
                min_samples_leaf: 4,
                max_depth: None,
            },
        );
        assert_eq!(tree.depth(), 1);

        let stump = RegressionTree::fit(
            &x,
            &y,
            &all(8),
            TreeParams {
                min_samples_leaf: 1,
                max_depth: Some(0),
            },
        );
        assert_eq!(stump.n_nodes(), 1);
        assert_eq!(stump.predict(&[0.0]), 3.5);
    }

    #[test]
    fn test_duplicate_feature_values_cannot_split() {
        let x = vec![vec![1.0], vec![1.0], vec![1.0]];
        let y = vec![1.0, 2.0, 3.0];
        let tree = RegressionTree::fit(&x, &y, &all(3), TreeParams::default());

        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict(&[1.0]), 2.0);
    }

    #[test]
    fn test_partition_splits_on_threshold() {
        let x: Vec<Vec<f64>> = [5.0, 1.0, 4.0, 2.0, 3.0].iter().map(|v| vec![*v]).collect();
        let mut indices = all(5);

        let (left, right) = partition(&x, &mut indices, 0, 2.5);
        let mut left = left.to_vec();
        let mut right = right.to_vec();
        left.sort_unstable();
        right.sort_unstable();

        assert_eq!(left, vec![1, 3]);
        assert_eq!(right, vec![0, 2, 4]);
        // Both halves still index the caller's buffer
        indices.sort_unstable();
        assert_eq!(indices, all(5));
    }
}
