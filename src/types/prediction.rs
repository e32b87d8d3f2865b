//! Outbound response payloads

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::feature_extractor::FeatureSet;

/// Response of `/api/classify`
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResponse {
    pub fraudulent: bool,

    /// Probability of the predicted class as a percentage, 2 decimal places
    pub confidence: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_importance: Option<FeatureImportance>,

    pub processed_features: FeatureSet,

    /// Base64 data URL of one rendered ensemble member, `null` when unavailable
    pub tree_visualization: Option<String>,
}

/// Response of the legacy `/api/predict`
#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    pub fraudulent: bool,
    pub confidence: f64,
    pub features_used: FeatureSet,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistanceResponse {
    /// Kilometers
    pub distance: f64,
}

/// Display name → importance pairs, kept in feature-vector order.
///
/// Serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureImportance(pub Vec<(String, f64)>);

impl FeatureImportance {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for FeatureImportance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, score) in &self.0 {
            map.serialize_entry(name, score)?;
        }
        map.end()
    }
}
