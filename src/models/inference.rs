//! Inference adapter: arranges features for the loaded classifier and
//! interprets its output.

use thiserror::Error;
use tracing::debug;

use crate::feature_extractor::{display_name, FeatureSet};
use crate::models::metadata::DecisionTree;
use crate::types::prediction::FeatureImportance;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Feature column '{0}' is not produced by the preprocessor")]
    ColumnMismatch(String),
    #[error("Model expects {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("Invalid model output: {0}")]
    InvalidOutput(String),
    #[error("Inference failed: {0}")]
    Runtime(#[from] anyhow::Error),
}

/// Raw output of one classifier call: predicted label and class probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    pub label: i64,
    pub probabilities: Vec<f64>,
}

/// A loaded binary classifier.
///
/// Implementations run prediction and class-probability for a single row
/// laid out in `columns()` order.
pub trait Classifier: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Training column order expected by `classify`
    fn columns(&self) -> &[String];

    fn classify(&self, row: &[f32]) -> anyhow::Result<RawOutput>;

    /// Number of values `classify` expects per row
    fn input_width(&self) -> usize {
        self.columns().len()
    }

    /// Per-feature importances in `columns()` order, if the artifact ships them
    fn feature_importances(&self) -> Option<&[f64]> {
        None
    }

    /// One ensemble member for visualization
    fn sample_tree(&self) -> Option<&DecisionTree> {
        None
    }
}

/// Validated classifier output for one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// 0 = not fraud, 1 = fraud
    pub label: u8,
    /// `[p(not fraud), p(fraud)]`
    pub probabilities: [f64; 2],
}

impl Prediction {
    pub fn is_fraud(&self) -> bool {
        self.label == 1
    }

    /// Probability mass of the predicted class, in [0, 1].
    pub fn confidence(&self) -> f64 {
        self.probabilities[self.label as usize].clamp(0.0, 1.0)
    }
}

/// Wraps the loaded classifier and keeps its column contract.
pub struct InferenceEngine {
    classifier: Box<dyn Classifier>,
}

impl InferenceEngine {
    pub fn new(classifier: Box<dyn Classifier>) -> Self {
        Self { classifier }
    }

    pub fn model_name(&self) -> &str {
        self.classifier.name()
    }

    pub fn columns(&self) -> &[String] {
        self.classifier.columns()
    }

    pub fn sample_tree(&self) -> Option<&DecisionTree> {
        self.classifier.sample_tree()
    }

    /// Run the classifier on a feature set.
    pub fn predict(&self, features: &FeatureSet) -> Result<Prediction, InferenceError> {
        let row = features
            .to_vector(self.classifier.columns())
            .map_err(InferenceError::ColumnMismatch)?;

        let prediction = self.predict_row(&row)?;

        debug!(
            model = %self.classifier.name(),
            label = prediction.label,
            p_fraud = prediction.probabilities[1],
            "Inference complete"
        );

        Ok(prediction)
    }

    /// Check a raw vector against the model's input width before running it.
    pub fn predict_row(&self, row: &[f32]) -> Result<Prediction, InferenceError> {
        let expected = self.classifier.input_width();
        if row.len() != expected {
            return Err(InferenceError::ShapeMismatch {
                expected,
                actual: row.len(),
            });
        }
        let raw = self.classifier.classify(row)?;
        Self::validate(raw)
    }

    /// Display-name → importance pairs in feature-vector order.
    pub fn feature_importance(&self) -> Option<FeatureImportance> {
        let importances = self.classifier.feature_importances()?;
        let columns = self.classifier.columns();
        if importances.is_empty() || importances.len() != columns.len() {
            return None;
        }

        Some(FeatureImportance(
            columns
                .iter()
                .zip(importances)
                .map(|(c, &score)| (display_name(c).to_string(), score))
                .collect(),
        ))
    }

    fn validate(raw: RawOutput) -> Result<Prediction, InferenceError> {
        let label = match raw.label {
            0 => 0u8,
            1 => 1u8,
            other => {
                return Err(InferenceError::InvalidOutput(format!(
                    "label {} is not binary",
                    other
                )))
            }
        };

        if raw.probabilities.len() != 2 {
            return Err(InferenceError::InvalidOutput(format!(
                "expected 2 class probabilities, got {}",
                raw.probabilities.len()
            )));
        }
        if raw.probabilities.iter().any(|p| !p.is_finite()) {
            return Err(InferenceError::InvalidOutput(
                "non-finite class probability".to_string(),
            ));
        }

        Ok(Prediction {
            label,
            probabilities: [raw.probabilities[0], raw.probabilities[1]],
        })
    }
}
