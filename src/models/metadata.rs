//! Artifact metadata and decision-tree node tables exported at training time

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::feature_extractor::FEATURE_COLUMNS;

/// Metadata shipped alongside (or as) the model artifact.
///
/// For ONNX artifacts this is an optional sidecar. For tree-ensemble
/// artifacts it is the whole model, with every estimator in `estimators`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Training column order
    #[serde(default = "default_feature_names")]
    pub feature_names: Vec<String>,

    /// Per-feature importance scores, same order as `feature_names`
    #[serde(default)]
    pub feature_importances: Vec<f64>,

    #[serde(default = "default_class_names")]
    pub class_names: Vec<String>,

    #[serde(default)]
    pub estimators: Vec<DecisionTree>,
}

fn default_feature_names() -> Vec<String> {
    FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect()
}

fn default_class_names() -> Vec<String> {
    vec!["Not Fraud".to_string(), "Fraud".to_string()]
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            feature_names: default_feature_names(),
            feature_importances: Vec::new(),
            class_names: default_class_names(),
            estimators: Vec::new(),
        }
    }
}

impl ModelMetadata {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model metadata from {}", path.display()))?;
        let metadata: ModelMetadata = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid model metadata in {}", path.display()))?;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Structural checks on everything the service will index into.
    pub fn validate(&self) -> Result<()> {
        let width = self.feature_names.len();
        if width == 0 {
            anyhow::bail!("Model metadata declares no feature names");
        }
        if !self.feature_importances.is_empty() && self.feature_importances.len() != width {
            anyhow::bail!(
                "Model metadata has {} feature importances for {} features",
                self.feature_importances.len(),
                width
            );
        }
        for (i, tree) in self.estimators.iter().enumerate() {
            tree.validate(width)
                .with_context(|| format!("Invalid estimator {}", i))?;
        }
        Ok(())
    }

    /// The first estimator, used for visualization.
    pub fn sample_tree(&self) -> Option<&DecisionTree> {
        self.estimators.first()
    }
}

/// One node of a fitted decision tree.
///
/// Internal nodes send `x[feature] <= threshold` left and everything else
/// right. Leaves have no children and no feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub feature: Option<usize>,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub left: Option<usize>,
    #[serde(default)]
    pub right: Option<usize>,
    /// Class weights (counts or fractions) of training samples at this node
    pub value: Vec<f64>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() || self.right.is_none() || self.feature.is_none()
    }

    /// Class weights scaled to sum to 1.
    pub fn class_distribution(&self) -> Vec<f64> {
        let total: f64 = self.value.iter().sum();
        if total > 0.0 {
            self.value.iter().map(|v| v / total).collect()
        } else {
            vec![0.0; self.value.len()]
        }
    }

    /// Index of the heaviest class; ties go to the lower index.
    pub fn majority_class(&self) -> usize {
        self.value
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &v)| {
                if v > best.1 {
                    (i, v)
                } else {
                    best
                }
            })
            .0
    }
}

/// A fitted decision tree stored as a node table, root at index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub fn root(&self) -> Option<&TreeNode> {
        self.nodes.first()
    }

    pub fn node(&self, index: usize) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    /// Walk from the root to the leaf reached by `row`.
    pub fn leaf_for(&self, row: &[f32]) -> Option<&TreeNode> {
        let mut node = self.root()?;
        // A valid tree reaches a leaf in at most `nodes.len()` steps.
        for _ in 0..self.nodes.len() {
            if node.is_leaf() {
                return Some(node);
            }
            let feature = node.feature?;
            let x = *row.get(feature)? as f64;
            let next = if x <= node.threshold {
                node.left?
            } else {
                node.right?
            };
            node = self.node(next)?;
        }
        None
    }

    fn validate(&self, width: usize) -> Result<()> {
        if self.nodes.is_empty() {
            anyhow::bail!("tree has no nodes");
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.value.is_empty() {
                anyhow::bail!("node {} has no class weights", i);
            }
            if node.is_leaf() {
                continue;
            }
            if let Some(feature) = node.feature {
                if feature >= width {
                    anyhow::bail!("node {} splits on feature {} of {}", i, feature, width);
                }
            }
            for child in [node.left, node.right].into_iter().flatten() {
                if child <= i || child >= self.nodes.len() {
                    anyhow::bail!("node {} has invalid child {}", i, child);
                }
            }
        }
        Ok(())
    }
}
