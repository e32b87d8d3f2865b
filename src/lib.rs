//! Fraud Classifier Service Library
//!
//! Wraps a pre-trained binary fraud classifier behind a small JSON HTTP
//! API: feature preprocessing, a fixed-shape inference call, and response
//! shaping, plus a distance-matrix proxy and decision-tree rendering.

pub mod api;
pub mod config;
pub mod context;
pub mod distance;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod response;
pub mod types;
pub mod visualization;

pub use config::AppConfig;
pub use context::ServiceContext;
pub use error::ServiceError;
pub use feature_extractor::{FeatureExtractor, FeatureSet};
pub use models::inference::InferenceEngine;
pub use types::transaction::TransactionInput;
