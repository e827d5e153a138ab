use crate::gauge_store::PrometheusGaugeStore;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Router exposing `GET /metrics`
pub fn metrics_router(store: Arc<PrometheusGaugeStore>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(store)
}

/// GET /metrics - Prometheus text exposition of the sensor gauges
async fn metrics_handler(State(store): State<Arc<PrometheusGaugeStore>>) -> Response {
    match store.encode_text() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to export metrics: {}", e),
        )
            .into_response(),
    }
}

/// Serve the metrics endpoint until the token is cancelled
///
/// Failing to bind the listener is returned as an error.
pub async fn serve_metrics(
    bind: SocketAddr,
    store: Arc<PrometheusGaugeStore>,
    shutdown_token: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %listener.local_addr()?, "serving metrics on /metrics");

    axum::serve(listener, metrics_router(store))
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await?;

    info!("metrics endpoint stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gauge_store::{GaugeStore, AIR_QUALITY_GAUGE, TEMPERATURE_GAUGE};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get_metrics(router: Router) -> (StatusCode, String, String) {
        let response = router
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let store = Arc::new(PrometheusGaugeStore::for_sensors().unwrap());
        store.set_gauge(AIR_QUALITY_GAUGE, 100.0);
        store.set_gauge(TEMPERATURE_GAUGE, 22.5);

        let (status, content_type, body) = get_metrics(metrics_router(store)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains("lora_sensor_airquality 100"));
        assert!(body.contains("lora_sensor_temperature_celsius 22.5"));
    }

    #[tokio::test]
    async fn test_metrics_endpoint_reflects_latest_value() {
        let store = Arc::new(PrometheusGaugeStore::for_sensors().unwrap());
        let router = metrics_router(store.clone());

        store.set_gauge(AIR_QUALITY_GAUGE, 1.0);
        store.set_gauge(AIR_QUALITY_GAUGE, 2.0);

        let (_, _, body) = get_metrics(router).await;
        assert!(body.contains("lora_sensor_airquality 2"));
        assert!(!body.contains("lora_sensor_airquality 1\n"));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let store = Arc::new(PrometheusGaugeStore::for_sensors().unwrap());
        let response = metrics_router(store)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_metrics_stops_on_cancel() {
        let store = Arc::new(PrometheusGaugeStore::for_sensors().unwrap());
        let token = CancellationToken::new();
        let server = tokio::spawn(serve_metrics(
            "127.0.0.1:0".parse().unwrap(),
            store,
            token.clone(),
        ));

        token.cancel();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
