//! Error kinds surfaced at the HTTP boundary

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::distance::DistanceError;
use crate::models::inference::InferenceError;

pub const MODEL_NOT_LOADED: &str = "Model not loaded";

#[derive(Error, Debug)]
pub enum ServiceError {
    /// The artifact failed to load at start-up
    #[error("Model not loaded")]
    ModelUnavailable,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Processing(String),
    /// Non-success status returned by an upstream API, forwarded as-is
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },
}

impl ServiceError {
    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::ModelUnavailable => "model_unavailable",
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::Processing(_) => "processing",
            ServiceError::Upstream { .. } => "upstream",
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::ModelUnavailable | ServiceError::Processing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Upstream { status, .. } => *status,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

impl From<InferenceError> for ServiceError {
    fn from(e: InferenceError) -> Self {
        ServiceError::Processing(e.to_string())
    }
}

impl From<DistanceError> for ServiceError {
    fn from(e: DistanceError) -> Self {
        match e {
            DistanceError::Upstream { status, body } => ServiceError::Upstream {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message: format!("Distance API returned {}: {}", status, body),
            },
            DistanceError::Unparseable(_) => ServiceError::BadRequest(e.to_string()),
            DistanceError::Transport(_) | DistanceError::MissingApiKey => {
                ServiceError::Processing(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServiceError::ModelUnavailable.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Processing("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::Upstream {
                status: StatusCode::FORBIDDEN,
                message: "denied".into()
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_model_unavailable_message() {
        assert_eq!(ServiceError::ModelUnavailable.to_string(), MODEL_NOT_LOADED);
    }

    #[test]
    fn test_distance_errors_map_to_boundary_kinds() {
        let err: ServiceError = DistanceError::Upstream {
            status: 503,
            body: "busy".into(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ServiceError = DistanceError::Unparseable("no rows".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Could not determine distance: no rows");

        let err: ServiceError = DistanceError::MissingApiKey.into();
        assert_eq!(err.kind(), "processing");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
