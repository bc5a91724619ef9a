use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;

use crate::core::metrics;
use crate::web::server::AppState;
use crate::web::models::{CapabilityStatus, StatusResponse};

/// Get the overall service status
pub async fn get_status(data: web::Data<AppState>) -> impl Responder {
    let storage = if data.store.is_persistent() { "sqlite" } else { "memory" };

    let response = StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        records: data.store.len(),
        uptime_seconds: (Utc::now() - data.started_at).num_seconds(),
        storage: storage.to_string(),
        capabilities: CapabilityStatus {
            predictor: data.predictor.is_some(),
            decision_engine: data.decision_engine.is_some(),
        },
    };

    HttpResponse::Ok().json(response)
}

/// Prometheus metrics
pub async fn get_metrics() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::render())
}
