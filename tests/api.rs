use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App, HttpResponse, HttpServer};
use serde_json::{json, Value};

use fraud_classifier_service::api;
use fraud_classifier_service::config::AppConfig;
use fraud_classifier_service::context::ServiceContext;
use fraud_classifier_service::metrics::ServiceMetrics;
use fraud_classifier_service::models::loader::ModelLoader;

fn sample_model() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("model/fraud_forest.json")
}

fn context_with(config: &AppConfig, metrics: Arc<ServiceMetrics>) -> ServiceContext {
    let engine = ModelLoader::new()
        .load_from_path(&sample_model(), None)
        .unwrap();
    ServiceContext::new(Some(engine), config, metrics)
}

fn context() -> ServiceContext {
    context_with(&AppConfig::default(), Arc::new(ServiceMetrics::new()))
}

macro_rules! service {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($ctx))
                .configure(api::config),
        )
        .await
    };
}

fn repeat_online_customer() -> Value {
    json!({
        "payeeInformation": { "averageSpending": 100 },
        "transactionInformation": {
            "orderAmount": 250,
            "paymentMode": "online",
            "isFirstTime": false
        },
        "distance_from_home": 5,
        "distance_from_last_transaction": 2
    })
}

#[actix_web::test]
async fn test_health_reports_model() {
    let app = service!(context());
    let req = test::TestRequest::get().uri("/api/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "status": "ok", "model_loaded": true }));

    let unloaded = ServiceContext::new(None, &AppConfig::default(), Arc::new(ServiceMetrics::new()));
    let app = service!(unloaded);
    let req = test::TestRequest::get().uri("/api/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["model_loaded"], json!(false));
}

#[actix_web::test]
async fn test_classify_repeat_online_customer() {
    let app = service!(context());
    let req = test::TestRequest::post()
        .uri("/api/classify")
        .set_json(repeat_online_customer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["processed_features"],
        json!({
            "ratio_to_median_purchase_price": 2.5,
            "online_order": true,
            "distance_from_home": 5.0,
            "used_pin": false,
            "used_chip": false,
            "distance_from_last_transaction": 2.0,
            "repeat_retailer": true
        })
    );
    assert_eq!(body["fraudulent"], json!(false));

    let confidence = body["confidence"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&confidence));
    assert!(confidence > 90.0, "confidence {confidence}");
    assert_eq!((confidence * 100.0).round() / 100.0, confidence);

    assert_eq!(body["feature_importance"]["Ratio to median purchase"], json!(0.52));
    assert_eq!(body["feature_importance"].as_object().unwrap().len(), 7);
    assert!(body["tree_visualization"]
        .as_str()
        .unwrap()
        .starts_with("data:image/svg+xml;base64,"));
}

#[actix_web::test]
async fn test_classify_flags_suspicious_transaction() {
    let app = service!(context());
    let req = test::TestRequest::post()
        .uri("/api/classify")
        .set_json(json!({
            "payeeInformation": { "averageSpending": 40 },
            "transactionInformation": {
                "orderAmount": 400,
                "paymentMode": "ONLINE",
                "isFirstTime": true
            },
            "distance": 500,
            "distance_from_last_transaction": 200
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["fraudulent"], json!(true));
    assert_eq!(body["processed_features"]["distance_from_home"], json!(500.0));
    assert_eq!(body["processed_features"]["repeat_retailer"], json!(false));
    let confidence = body["confidence"].as_f64().unwrap();
    assert!(confidence > 50.0 && confidence <= 100.0, "confidence {confidence}");
}

#[actix_web::test]
async fn test_classify_accepts_both_distance_keys() {
    let app = service!(context());
    let mut body = repeat_online_customer();
    body["distance"] = json!(3);
    body["distance_from_home"] = json!(8);

    let req = test::TestRequest::post()
        .uri("/api/classify")
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["processed_features"]["distance_from_home"], json!(8.0));
}

#[actix_web::test]
async fn test_visualization_disabled_serializes_null() {
    let mut config = AppConfig::default();
    config.visualization.enabled = false;
    let app = service!(context_with(&config, Arc::new(ServiceMetrics::new())));

    let req = test::TestRequest::post()
        .uri("/api/classify")
        .set_json(repeat_online_customer())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body.as_object().unwrap().contains_key("tree_visualization"));
    assert_eq!(body["tree_visualization"], Value::Null);
}

#[actix_web::test]
async fn test_classify_empty_body() {
    let metrics = Arc::new(ServiceMetrics::new());
    let app = service!(context_with(&AppConfig::default(), metrics.clone()));

    for payload in ["", "{}"] {
        let req = test::TestRequest::post()
            .uri("/api/classify")
            .insert_header(("content-type", "application/json"))
            .set_payload(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": api::NO_FORM_DATA }));
    }

    assert_eq!(metrics.get_errors_by_kind().get("bad_request"), Some(&2));
}

#[actix_web::test]
async fn test_classify_wrong_types_is_server_error() {
    let app = service!(context());
    let req = test::TestRequest::post()
        .uri("/api/classify")
        .set_json(json!({ "transactionInformation": { "orderAmount": "lots" } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
}

#[actix_web::test]
async fn test_model_unavailable() {
    let ctx = ServiceContext::new(None, &AppConfig::default(), Arc::new(ServiceMetrics::new()));
    let app = service!(ctx);

    for (uri, payload) in [
        ("/api/classify", repeat_online_customer()),
        ("/api/predict", json!({ "ratio_to_median_purchase_price": 1.0 })),
        ("/api/classify", json!({})),
    ] {
        let req = test::TestRequest::post().uri(uri).set_json(payload).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Model not loaded" }));
    }
}

#[actix_web::test]
async fn test_legacy_predict() {
    let app = service!(context());
    let req = test::TestRequest::post()
        .uri("/api/predict")
        .set_json(json!({
            "ratio_to_median_purchase_price": 2.5,
            "distance_from_home": 5,
            "distance_from_last_transaction": 2,
            "isFirstTime": false,
            "paymentMode": "online"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["fraudulent"], json!(false));
    assert_eq!(body["features_used"]["online_order"], json!(true));
    assert_eq!(body["features_used"]["repeat_retailer"], json!(true));
    assert!(body.get("tree_visualization").is_none());

    let req = test::TestRequest::post()
        .uri("/api/predict")
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "error": api::NO_DATA }));
}

#[actix_web::test]
async fn test_distance_requires_both_endpoints() {
    let app = service!(context());
    let req = test::TestRequest::post()
        .uri("/api/distance")
        .set_json(json!({ "origin": "Paris" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "error": api::MISSING_ENDPOINTS }));
}

async fn matrix(query: web::Query<std::collections::HashMap<String, String>>) -> HttpResponse {
    assert_eq!(query.get("key").map(String::as_str), Some("test-key"));
    assert_eq!(query.get("origins").map(String::as_str), Some("Paris"));
    HttpResponse::Ok().json(json!({
        "rows": [{ "elements": [{ "distance": { "text": "465 km", "value": 465_300 } }] }]
    }))
}

async fn no_rows() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "REQUEST_DENIED", "rows": [] }))
}

async fn denied() -> HttpResponse {
    HttpResponse::Forbidden().json(json!({ "error_message": "The provided API key is invalid." }))
}

#[actix_web::test]
async fn test_distance_proxies_upstream() {
    let upstream = HttpServer::new(|| {
        App::new()
            .route("/matrix", web::get().to(matrix))
            .route("/denied", web::get().to(denied))
            .route("/no-rows", web::get().to(no_rows))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();
    let addr = upstream.addrs()[0];
    let server = upstream.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    let mut config = AppConfig::default();
    config.distance.api_key = Some("test-key".to_string());
    config.distance.api_url = format!("http://{}/matrix", addr);
    let app = service!(context_with(&config, Arc::new(ServiceMetrics::new())));

    let req = test::TestRequest::post()
        .uri("/api/distance")
        .set_json(json!({ "origin": "Paris", "destination": "Lyon" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "distance": 465.3 }));

    config.distance.api_url = format!("http://{}/denied", addr);
    let app = service!(context_with(&config, Arc::new(ServiceMetrics::new())));
    let req = test::TestRequest::post()
        .uri("/api/distance")
        .set_json(json!({ "origin": "Paris", "destination": "Lyon" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());

    config.distance.api_url = format!("http://{}/no-rows", addr);
    let app = service!(context_with(&config, Arc::new(ServiceMetrics::new())));
    let req = test::TestRequest::post()
        .uri("/api/distance")
        .set_json(json!({ "origin": "Paris", "destination": "Lyon" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Could not determine distance"), "{message}");
    assert!(message.contains("REQUEST_DENIED"), "{message}");

    handle.stop(true).await;
}

#[actix_web::test]
async fn test_distance_without_api_key() {
    if std::env::var("GOOGLE_MAPS_API_KEY").is_ok() {
        return;
    }
    let metrics = Arc::new(ServiceMetrics::new());
    let app = service!(context_with(&AppConfig::default(), metrics.clone()));

    let req = test::TestRequest::post()
        .uri("/api/distance")
        .set_json(json!({ "origin": "Paris", "destination": "Lyon" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "error": "Distance API key is not configured" }));
    assert_eq!(metrics.get_errors_by_kind().get("processing"), Some(&1));
}

#[actix_web::test]
async fn test_distance_unreachable_upstream() {
    // Reserve a port, then release it so nothing is listening there
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let mut config = AppConfig::default();
    config.distance.api_key = Some("test-key".to_string());
    config.distance.api_url = format!("http://127.0.0.1:{}/matrix", port);
    let app = service!(context_with(&config, Arc::new(ServiceMetrics::new())));

    let req = test::TestRequest::post()
        .uri("/api/distance")
        .set_json(json!({ "origin": "Paris", "destination": "Lyon" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Distance API request failed"));
}
