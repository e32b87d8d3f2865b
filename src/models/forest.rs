//! In-process tree-ensemble classifier evaluated from an exported node table

use anyhow::Result;

use crate::models::inference::{Classifier, RawOutput};
use crate::models::metadata::{DecisionTree, ModelMetadata};

/// Random-forest style ensemble: the class probability is the mean of each
/// tree's normalized leaf distribution, the label is its argmax.
pub struct ForestClassifier {
    metadata: ModelMetadata,
}

impl ForestClassifier {
    pub fn new(metadata: ModelMetadata) -> Result<Self> {
        metadata.validate()?;
        if metadata.estimators.is_empty() {
            anyhow::bail!("Tree-ensemble artifact contains no estimators");
        }
        Ok(Self { metadata })
    }

    pub fn estimator_count(&self) -> usize {
        self.metadata.estimators.len()
    }

    fn class_count(&self) -> usize {
        self.metadata
            .estimators
            .iter()
            .flat_map(|t| t.nodes.iter())
            .map(|n| n.value.len())
            .max()
            .unwrap_or(0)
    }
}

impl Classifier for ForestClassifier {
    fn name(&self) -> &str {
        "tree_ensemble"
    }

    fn columns(&self) -> &[String] {
        &self.metadata.feature_names
    }

    fn classify(&self, row: &[f32]) -> Result<RawOutput> {
        let classes = self.class_count();
        let mut probabilities = vec![0.0; classes];

        for (i, tree) in self.metadata.estimators.iter().enumerate() {
            let leaf = tree
                .leaf_for(row)
                .ok_or_else(|| anyhow::anyhow!("Estimator {} did not reach a leaf", i))?;
            for (class, p) in leaf.class_distribution().into_iter().enumerate() {
                probabilities[class] += p;
            }
        }

        let trees = self.metadata.estimators.len() as f64;
        for p in probabilities.iter_mut() {
            *p /= trees;
        }

        let label = probabilities
            .iter()
            .enumerate()
            .fold((0usize, f64::NEG_INFINITY), |best, (i, &p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            })
            .0;

        Ok(RawOutput {
            label: label as i64,
            probabilities,
        })
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        if self.metadata.feature_importances.is_empty() {
            None
        } else {
            Some(&self.metadata.feature_importances)
        }
    }

    fn sample_tree(&self) -> Option<&DecisionTree> {
        self.metadata.sample_tree()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn forest() -> ForestClassifier {
        // Tree 0 splits on ratio (column 2), tree 1 on online_order (column 6).
        let metadata: ModelMetadata = serde_json::from_value(json!({
            "feature_importances": [0.1, 0.05, 0.5, 0.05, 0.05, 0.05, 0.2],
            "estimators": [
                { "nodes": [
                    { "feature": 2, "threshold": 2.0, "left": 1, "right": 2, "value": [50.0, 50.0] },
                    { "value": [9.0, 1.0] },
                    { "value": [1.0, 9.0] }
                ]},
                { "nodes": [
                    { "feature": 6, "threshold": 0.5, "left": 1, "right": 2, "value": [50.0, 50.0] },
                    { "value": [0.7, 0.3] },
                    { "value": [0.3, 0.7] }
                ]}
            ]
        }))
        .unwrap();
        ForestClassifier::new(metadata).unwrap()
    }

    #[test]
    fn test_mean_of_leaf_distributions() {
        let forest = forest();
        // ratio 3.0 -> [0.1, 0.9]; online -> [0.3, 0.7]
        let out = forest
            .classify(&[0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 1.0])
            .unwrap();
        assert_eq!(out.label, 1);
        assert!((out.probabilities[0] - 0.2).abs() < 1e-9);
        assert!((out.probabilities[1] - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_low_risk_row() {
        let forest = forest();
        let out = forest
            .classify(&[0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(out.label, 0);
        assert!((out.probabilities[0] - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_tie_goes_to_not_fraud() {
        let tied: ModelMetadata = serde_json::from_value(json!({
            "estimators": [{ "nodes": [{ "value": [5.0, 5.0] }] }]
        }))
        .unwrap();
        let out = ForestClassifier::new(tied).unwrap().classify(&[0.0; 7]).unwrap();
        assert_eq!(out.label, 0);
    }

    #[test]
    fn test_deterministic() {
        let forest = forest();
        let row = [12.0, 0.4, 2.5, 1.0, 0.0, 0.0, 1.0];
        let first = forest.classify(&row).unwrap();
        for _ in 0..10 {
            assert_eq!(forest.classify(&row).unwrap(), first);
        }
    }

    #[test]
    fn test_requires_estimators() {
        assert!(ForestClassifier::new(ModelMetadata::default()).is_err());
    }

    #[test]
    fn test_exposes_metadata() {
        let forest = forest();
        assert_eq!(forest.estimator_count(), 2);
        assert_eq!(forest.columns().len(), 7);
        assert_eq!(forest.feature_importances().unwrap()[2], 0.5);
        assert!(forest.sample_tree().is_some());
    }
}
