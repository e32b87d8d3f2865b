//! Request and response types for the classifier service

pub mod prediction;
pub mod transaction;

pub use prediction::{
    ClassificationResponse, DistanceResponse, FeatureImportance, HealthResponse, PredictResponse,
};
pub use transaction::{DistanceRequest, FlatPredictInput, TransactionInput};
