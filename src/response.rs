//! Shapes inference results into the outbound JSON contract

use crate::feature_extractor::FeatureSet;
use crate::models::inference::Prediction;
use crate::types::prediction::{ClassificationResponse, FeatureImportance, PredictResponse};

/// Probability in [0, 1] → percentage rounded to 2 decimal places.
pub fn confidence_percent(probability: f64) -> f64 {
    let pct = (probability * 100.0).clamp(0.0, 100.0);
    (pct * 100.0).round() / 100.0
}

/// Response for `/api/classify`.
pub fn build_classification(
    prediction: &Prediction,
    features: FeatureSet,
    feature_importance: Option<FeatureImportance>,
    tree_visualization: Option<String>,
) -> ClassificationResponse {
    ClassificationResponse {
        fraudulent: prediction.is_fraud(),
        confidence: confidence_percent(prediction.confidence()),
        feature_importance,
        processed_features: features,
        tree_visualization,
    }
}

/// Response for the legacy `/api/predict`.
pub fn build_prediction(prediction: &Prediction, features: FeatureSet) -> PredictResponse {
    PredictResponse {
        fraudulent: prediction.is_fraud(),
        confidence: confidence_percent(prediction.confidence()),
        features_used: features,
    }
}
