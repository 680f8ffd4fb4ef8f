//! HTTP exporter: health check and metrics endpoints.

pub mod health;
pub mod metrics;

use crate::metrics::Metrics;
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Shared exporter state
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<Metrics>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            started_at: Instant::now(),
        }
    }
}

/// Create the exporter router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(metrics::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn serve(state: AppState) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let url = serve(AppState::new(Metrics::new())).await;

        let response = reqwest::get(format!("{}/health", url)).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], crate::version::VERSION);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let metrics = Metrics::new();
        metrics.set_files_in_dump_dir(7);
        metrics.record_sent();
        let url = serve(AppState::new(metrics)).await;

        let response = reqwest::get(format!("{}/metrics", url)).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let body = response.text().await.unwrap();
        assert!(body.contains("dumpbeat_count_files_in_dump_directory 7\n"));
        assert!(body.contains("dumpbeat_dumps_sent_total 1\n"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let url = serve(AppState::new(Metrics::new())).await;
        let response = reqwest::get(format!("{}/nope", url)).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
