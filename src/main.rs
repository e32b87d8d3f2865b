//! Fraud Classifier Service - Main Entry Point
//!
//! Loads the classifier once, then serves prediction, health and distance
//! endpoints over HTTP.

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use fraud_classifier_service::{
    api,
    config::{AppConfig, LoggingConfig},
    context::ServiceContext,
    metrics::{MetricsReporter, ServiceMetrics},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Fraud Classifier Service");
    info!(
        model = %config.model.path.display(),
        visualization = config.visualization.enabled,
        "Configuration loaded successfully"
    );

    let metrics = Arc::new(ServiceMetrics::new());

    // Load the model once; the context is immutable from here on
    let context = web::Data::new(ServiceContext::from_config(&config, metrics.clone()));
    info!(
        model_loaded = context.model_loaded(),
        distance_api = context.distance_client().is_configured(),
        "Service context initialized"
    );

    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let bind_address = config.server.bind_address();
    info!("Listening on {}", bind_address);

    let mut server = HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(context.clone())
            .configure(api::config)
    });
    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    server.bind(&bind_address)?.run().await?;

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(format!(
            "fraud_classifier_service={level},actix_web={level}",
            level = logging.level
        ))
    })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
