//! Regression models for next-session price prediction
//!
//! A bagged ensemble of CART regression trees: each tree is grown on a
//! bootstrap sample with variance-reduction splits over every feature, and
//! the ensemble prediction is the mean of the tree outputs.

pub mod forest;
pub mod tree;

pub use forest::{BaggedForest, ForestParams};
pub use tree::{RegressionTree, TreeNode, TreeParams};
