//! # Health and Metrics Endpoints
//!
//! Operational snapshot of the service and its two optional dependencies.
//! The service is "healthy" whenever the process answers: a missing database
//! or a disabled transcription model are degraded-but-intended states and
//! are reported as such, not as failures.

use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let uptime_seconds = state.get_uptime_seconds();

    let database = match &state.store {
        Some(store) => json!({
            "configured": true,
            "reachable": store.ping().await,
        }),
        None => json!({
            "configured": false,
            "reachable": false,
        }),
    };

    let transcription = match &state.transcriber {
        Some(service) => json!({
            "enabled": true,
            "model": service.model_name(),
        }),
        None => json!({
            "enabled": false,
            "model": null,
        }),
    };

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": "cometik-backend",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port,
            "data_dir": config.storage.data_dir,
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
        },
        "database": database,
        "transcription": transcription,
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats = Vec::new();
    for (endpoint, metric) in metrics.endpoint_metrics.iter() {
        endpoint_stats.push(json!({
            "endpoint": endpoint,
            "request_count": metric.request_count,
            "error_count": metric.error_count,
            "error_rate": metric.error_rate(),
            "average_duration_ms": metric.average_duration_ms(),
        }));
    }

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            },
        },
        "endpoints": endpoint_stats,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::persistence::FileStore;
    use crate::scoring::ScoringPolicy;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_health_reports_degraded_adapters() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(
            AppConfig::default(),
            ScoringPolicy::Heuristic,
            None,
            FileStore::new(dir.path()),
            None,
        );

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/health", web::get().to(health_check)),
        )
        .await;

        let request = test::TestRequest::get().uri("/health").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = test::read_body(response).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["database"]["configured"], false);
        assert_eq!(json["transcription"]["enabled"], false);
    }
}
