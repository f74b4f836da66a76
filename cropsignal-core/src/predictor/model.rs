//! Stateless scorers: a linear model or a gradient-boosted tree ensemble.
//!
//! Tree nodes follow the boosted-regressor convention: a split sends the row
//! left when `x[feature] < threshold`, a missing (NaN) value follows
//! `default_left`, and the prediction is `base_score + sum of leaf values`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("linear model has {actual} weights, expected {expected}")]
    WeightCount { expected: usize, actual: usize },

    #[error("tree {tree} is empty")]
    EmptyTree { tree: usize },

    #[error("tree {tree} node {node}: child index {child} must point forward inside the tree")]
    ChildIndex {
        tree: usize,
        node: usize,
        child: usize,
    },

    #[error("tree {tree} node {node}: feature index {feature} out of range ({features} features)")]
    FeatureIndex {
        tree: usize,
        node: usize,
        feature: usize,
        features: usize,
    },

    #[error("model contains a non-finite parameter")]
    NonFinite,
}

/// One node of a regression tree. Children are indices into the owning tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default = "default_left")]
        default_left: bool,
    },
    Leaf {
        value: f64,
    },
}

fn default_left() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Leaf value reached by `x`. Assumes the tree passed validation.
    fn leaf_value(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let v = x[*feature];
                    let go_left = if v.is_nan() { *default_left } else { v < *threshold };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }

    fn validate(&self, tree: usize, features: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::EmptyTree { tree });
        }
        for (node, n) in self.nodes.iter().enumerate() {
            match n {
                Node::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(ModelError::NonFinite);
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= features {
                        return Err(ModelError::FeatureIndex {
                            tree,
                            node,
                            feature: *feature,
                            features,
                        });
                    }
                    if threshold.is_nan() {
                        return Err(ModelError::NonFinite);
                    }
                    // Forward-only children guarantee traversal terminates.
                    for &child in [left, right] {
                        if child <= node || child >= self.nodes.len() {
                            return Err(ModelError::ChildIndex { tree, node, child });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// A fitted regressor mapping one preprocessed feature vector to a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    Linear {
        intercept: f64,
        weights: Vec<f64>,
    },
    TreeEnsemble {
        base_score: f64,
        trees: Vec<Tree>,
    },
}

impl Model {
    /// Check the model is scoreable against `features` inputs.
    pub fn validate(&self, features: usize) -> Result<(), ModelError> {
        match self {
            Model::Linear { intercept, weights } => {
                if weights.len() != features {
                    return Err(ModelError::WeightCount {
                        expected: features,
                        actual: weights.len(),
                    });
                }
                if !intercept.is_finite() || weights.iter().any(|w| !w.is_finite()) {
                    return Err(ModelError::NonFinite);
                }
            }
            Model::TreeEnsemble { base_score, trees } => {
                if !base_score.is_finite() {
                    return Err(ModelError::NonFinite);
                }
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate(i, features)?;
                }
            }
        }
        Ok(())
    }

    /// Score one preprocessed row.
    pub fn score(&self, x: &[f64]) -> f64 {
        match self {
            Model::Linear { intercept, weights } => {
                intercept + weights.iter().zip(x).map(|(w, v)| w * v).sum::<f64>()
            }
            Model::TreeEnsemble { base_score, trees } => {
                base_score + trees.iter().map(|t| t.leaf_value(x)).sum::<f64>()
            }
        }
    }
}
