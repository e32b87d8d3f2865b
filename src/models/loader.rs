//! Model artifact loader

use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::ModelConfig;
use crate::feature_extractor::FEATURE_COLUMNS;
use crate::models::forest::ForestClassifier;
use crate::models::inference::{Classifier, InferenceEngine};
use crate::models::metadata::ModelMetadata;
use crate::models::onnx::OnnxClassifier;

/// Supported artifact formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Onnx,
    TreeEnsemble,
}

impl ArtifactFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("onnx") => Ok(ArtifactFormat::Onnx),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(ArtifactFormat::TreeEnsemble),
            _ => anyhow::bail!(
                "Unsupported model artifact {} (expected .onnx or .json)",
                path.display()
            ),
        }
    }
}

/// Loader for the classifier artifact
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load the artifact described by `config`.
    pub fn load(&self, config: &ModelConfig) -> Result<InferenceEngine> {
        self.load_from_path(&config.path, config.metadata_path.as_deref())
    }

    /// Load an artifact, optionally with an explicit metadata sidecar for ONNX.
    pub fn load_from_path(&self, path: &Path, metadata_path: Option<&Path>) -> Result<InferenceEngine> {
        if !path.exists() {
            anyhow::bail!("Model file not found: {}", path.display());
        }

        let classifier: Box<dyn Classifier> = match ArtifactFormat::from_path(path)? {
            ArtifactFormat::Onnx => {
                let metadata = self.load_sidecar(path, metadata_path)?;
                let session = self.load_session(path)?;
                Box::new(OnnxClassifier::new(session, metadata))
            }
            ArtifactFormat::TreeEnsemble => {
                let metadata = ModelMetadata::from_path(path)?;
                let forest = ForestClassifier::new(metadata)
                    .with_context(|| format!("Failed to load model from {:?}", path))?;
                info!(
                    path = %path.display(),
                    estimators = forest.estimator_count(),
                    "Tree-ensemble model loaded"
                );
                Box::new(forest)
            }
        };

        if classifier.columns().iter().map(String::as_str).ne(FEATURE_COLUMNS) {
            warn!(
                columns = ?classifier.columns(),
                "Model declares a non-canonical column order; features will follow the model"
            );
        }

        info!(
            model = %classifier.name(),
            columns = classifier.columns().len(),
            "Model loaded successfully"
        );

        Ok(InferenceEngine::new(classifier))
    }

    fn load_session(&self, path: &Path) -> Result<Session> {
        info!(path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        Ok(session)
    }

    /// Explicit sidecar must exist; the implicit `<stem>.json` is optional.
    fn load_sidecar(&self, model_path: &Path, explicit: Option<&Path>) -> Result<ModelMetadata> {
        if let Some(path) = explicit {
            return ModelMetadata::from_path(path);
        }

        let implicit = sidecar_path(model_path);
        if implicit.exists() {
            ModelMetadata::from_path(&implicit)
        } else {
            warn!(
                path = %implicit.display(),
                "No model metadata found; using canonical columns without importances"
            );
            Ok(ModelMetadata::default())
        }
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// `model/fraud_detection.onnx` → `model/fraud_detection.json`
pub fn sidecar_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FOREST: &str = r#"{
        "feature_importances": [0.2, 0.1, 0.4, 0.05, 0.05, 0.1, 0.1],
        "estimators": [
            { "nodes": [
                { "feature": 2, "threshold": 2.0, "left": 1, "right": 2, "value": [50.0, 50.0] },
                { "value": [9.0, 1.0] },
                { "value": [1.0, 9.0] }
            ]}
        ]
    }"#;

    #[test]
    fn test_artifact_format() {
        assert_eq!(
            ArtifactFormat::from_path(Path::new("model/a.onnx")).unwrap(),
            ArtifactFormat::Onnx
        );
        assert_eq!(
            ArtifactFormat::from_path(Path::new("model/a.JSON")).unwrap(),
            ArtifactFormat::TreeEnsemble
        );
        assert!(ArtifactFormat::from_path(Path::new("model/a.pkl")).is_err());
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("model/fraud_detection.onnx")),
            PathBuf::from("model/fraud_detection.json")
        );
    }

    #[test]
    fn test_missing_file() {
        let loader = ModelLoader::new();
        let err = loader
            .load_from_path(Path::new("model/missing.json"), None)
            .err()
            .unwrap();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_tree_ensemble() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(FOREST.as_bytes()).unwrap();

        let engine = ModelLoader::new().load_from_path(file.path(), None).unwrap();
        assert_eq!(engine.model_name(), "tree_ensemble");
        assert_eq!(engine.columns().len(), 7);
        assert!(engine.feature_importance().is_some());
        assert!(engine.sample_tree().is_some());
    }

    #[test]
    fn test_invalid_tree_ensemble() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(br#"{ "estimators": [] }"#).unwrap();

        assert!(ModelLoader::new().load_from_path(file.path(), None).is_err());
    }
}
