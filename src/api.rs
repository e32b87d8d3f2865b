//! HTTP routes

use actix_web::{web, HttpResponse};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::ServiceContext;
use crate::error::ServiceError;
use crate::types::prediction::{DistanceResponse, HealthResponse};
use crate::types::transaction::{DistanceRequest, FlatPredictInput, TransactionInput};

pub const NO_FORM_DATA: &str = "No form data provided";
pub const NO_DATA: &str = "No data provided";
pub const MISSING_ENDPOINTS: &str = "Origin and destination are required";

pub async fn health_check(ctx: web::Data<ServiceContext>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        model_loaded: ctx.model_loaded(),
    })
}

pub async fn classify(
    ctx: web::Data<ServiceContext>,
    body: web::Bytes,
) -> Result<HttpResponse, ServiceError> {
    let request_id = Uuid::new_v4();
    let result = ctx
        .engine()
        .and_then(|_| parse_body::<TransactionInput>(&body, NO_FORM_DATA))
        .and_then(|input| ctx.classify(&input));

    match result {
        Ok(response) => {
            info!(
                request_id = %request_id,
                fraudulent = response.fraudulent,
                confidence = response.confidence,
                "Transaction classified"
            );
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => Err(reject(&ctx, request_id, "/api/classify", e)),
    }
}

pub async fn predict(
    ctx: web::Data<ServiceContext>,
    body: web::Bytes,
) -> Result<HttpResponse, ServiceError> {
    let request_id = Uuid::new_v4();
    let result = ctx
        .engine()
        .and_then(|_| parse_body::<FlatPredictInput>(&body, NO_DATA))
        .and_then(|input| ctx.predict_flat(&input));

    match result {
        Ok(response) => {
            info!(
                request_id = %request_id,
                fraudulent = response.fraudulent,
                confidence = response.confidence,
                "Prediction complete"
            );
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => Err(reject(&ctx, request_id, "/api/predict", e)),
    }
}

pub async fn distance(
    ctx: web::Data<ServiceContext>,
    body: web::Bytes,
) -> Result<HttpResponse, ServiceError> {
    let request_id = Uuid::new_v4();

    let (origin, destination) = match endpoints(&body) {
        Ok(pair) => pair,
        Err(e) => return Err(reject(&ctx, request_id, "/api/distance", e)),
    };

    match ctx.distance_client().distance_km(&origin, &destination).await {
        Ok(km) => {
            info!(request_id = %request_id, distance_km = km, "Distance resolved");
            Ok(HttpResponse::Ok().json(DistanceResponse { distance: km }))
        }
        Err(e) => Err(reject(&ctx, request_id, "/api/distance", e.into())),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(web::resource("/health").route(web::get().to(health_check)))
            .service(web::resource("/classify").route(web::post().to(classify)))
            .service(web::resource("/predict").route(web::post().to(predict)))
            .service(web::resource("/distance").route(web::post().to(distance))),
    );
}

fn reject(ctx: &ServiceContext, request_id: Uuid, route: &str, e: ServiceError) -> ServiceError {
    ctx.metrics().record_error(e.kind());
    warn!(
        request_id = %request_id,
        route = route,
        kind = e.kind(),
        error = %e,
        "Request failed"
    );
    e
}

/// Empty or falsy JSON is a bad request; valid JSON of the wrong shape is a
/// processing failure.
fn parse_body<T: DeserializeOwned>(body: &[u8], empty_message: &str) -> Result<T, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ServiceError::BadRequest(empty_message.to_string()));
    }

    let value: Value =
        serde_json::from_slice(body).map_err(|e| ServiceError::BadRequest(e.to_string()))?;
    if is_falsy(&value) {
        return Err(ServiceError::BadRequest(empty_message.to_string()));
    }

    serde_json::from_value(value).map_err(|e| ServiceError::Processing(e.to_string()))
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn endpoints(body: &[u8]) -> Result<(String, String), ServiceError> {
    let missing = || ServiceError::BadRequest(MISSING_ENDPOINTS.to_string());

    let request: DistanceRequest = parse_body(body, MISSING_ENDPOINTS).map_err(|e| match e {
        ServiceError::Processing(_) => missing(),
        other => other,
    })?;

    let origin = request.origin.filter(|s| !s.trim().is_empty()).ok_or_else(missing)?;
    let destination = request
        .destination
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(missing)?;
    Ok((origin, destination))
}
