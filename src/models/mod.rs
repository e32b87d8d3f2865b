//! ML model loading and inference components

pub mod forest;
pub mod inference;
pub mod loader;
pub mod metadata;
pub mod onnx;

pub use forest::ForestClassifier;
pub use inference::{Classifier, InferenceEngine, InferenceError, Prediction};
pub use loader::ModelLoader;
pub use metadata::{DecisionTree, ModelMetadata, TreeNode};
pub use onnx::OnnxClassifier;
