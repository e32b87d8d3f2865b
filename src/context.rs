//! Immutable service context shared by all request handlers

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::distance::DistanceClient;
use crate::error::ServiceError;
use crate::feature_extractor::FeatureExtractor;
use crate::metrics::ServiceMetrics;
use crate::models::inference::InferenceEngine;
use crate::models::loader::ModelLoader;
use crate::response;
use crate::types::prediction::{ClassificationResponse, FeatureImportance, PredictResponse};
use crate::types::transaction::{FlatPredictInput, TransactionInput};
use crate::visualization::TreeRenderer;

/// Everything a request needs, built once at start-up.
///
/// The model is `None` when the artifact failed to load; inference
/// endpoints then answer with [`ServiceError::ModelUnavailable`].
pub struct ServiceContext {
    engine: Option<InferenceEngine>,
    extractor: FeatureExtractor,
    distance: DistanceClient,
    /// Fixed for the model's lifetime, so computed once
    feature_importance: Option<FeatureImportance>,
    tree_visualization: Option<String>,
    metrics: Arc<ServiceMetrics>,
}

impl ServiceContext {
    pub fn new(
        engine: Option<InferenceEngine>,
        config: &AppConfig,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        let feature_importance = engine.as_ref().and_then(|e| e.feature_importance());

        let tree_visualization = match (&engine, config.visualization.enabled) {
            (Some(engine), true) => engine.sample_tree().and_then(|tree| {
                TreeRenderer::new(&config.visualization).render(tree, engine.columns())
            }),
            _ => None,
        };

        Self {
            engine,
            extractor: FeatureExtractor::new(),
            distance: DistanceClient::new(&config.distance),
            feature_importance,
            tree_visualization,
            metrics,
        }
    }

    /// Load the configured model. A load failure is logged and leaves the
    /// service running without a model.
    pub fn from_config(config: &AppConfig, metrics: Arc<ServiceMetrics>) -> Self {
        let loader = ModelLoader::with_threads(config.model.onnx_threads);
        let engine = match loader.load(&config.model) {
            Ok(engine) => {
                info!(
                    path = %config.model.path.display(),
                    model = %engine.model_name(),
                    "Classifier ready"
                );
                Some(engine)
            }
            Err(e) => {
                error!(
                    path = %config.model.path.display(),
                    error = %format!("{:#}", e),
                    "Error loading model"
                );
                None
            }
        };
        Self::new(engine, config, metrics)
    }

    pub fn model_loaded(&self) -> bool {
        self.engine.is_some()
    }

    pub fn metrics(&self) -> &Arc<ServiceMetrics> {
        &self.metrics
    }

    pub fn distance_client(&self) -> &DistanceClient {
        &self.distance
    }

    pub fn engine(&self) -> Result<&InferenceEngine, ServiceError> {
        self.engine.as_ref().ok_or(ServiceError::ModelUnavailable)
    }

    /// Preprocess, infer and shape a `/api/classify` response.
    pub fn classify(&self, input: &TransactionInput) -> Result<ClassificationResponse, ServiceError> {
        let engine = self.engine()?;
        let start = Instant::now();

        let features = self.extractor.extract(input);
        let prediction = engine.predict(&features)?;

        let result = response::build_classification(
            &prediction,
            features,
            self.feature_importance.clone(),
            self.tree_visualization.clone(),
        );

        self.metrics
            .record_prediction(start.elapsed(), result.fraudulent, result.confidence);
        Ok(result)
    }

    /// Preprocess, infer and shape a legacy `/api/predict` response.
    pub fn predict_flat(&self, input: &FlatPredictInput) -> Result<PredictResponse, ServiceError> {
        let engine = self.engine()?;
        let start = Instant::now();

        let features = self.extractor.extract_flat(input);
        let prediction = engine.predict(&features)?;
        let result = response::build_prediction(&prediction, features);

        self.metrics
            .record_prediction(start.elapsed(), result.fraudulent, result.confidence);
        Ok(result)
    }
}
