use crate::config::InfluxConfig;
use crate::point::{BatchPoints, PRECISION};
use async_trait::async_trait;
use common::domain::{DomainError, DomainResult};
use reqwest::Url;
use tracing::debug;

/// Trait for writing point batches to a time-series database
///
/// Implementations should:
/// - Send the whole batch in a single request
/// - Return an error on transport failure or a rejected write
/// - Not retry
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PointWriter: Send + Sync {
    async fn write(&self, batch: &BatchPoints) -> DomainResult<()>;
}

/// Writes batches to `{url}/write` using line protocol over HTTP
#[derive(Clone)]
pub struct HttpPointWriter {
    client: reqwest::Client,
    write_url: Url,
    username: Option<String>,
    password: Option<String>,
}

impl HttpPointWriter {
    pub fn new(config: &InfluxConfig) -> DomainResult<Self> {
        let mut base = Url::parse(&config.url).map_err(|e| {
            DomainError::InvalidSinkConfig(format!("Invalid InfluxDB URL '{}': {}", config.url, e))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(DomainError::InvalidSinkConfig(format!(
                "Unsupported InfluxDB URL scheme '{}'",
                base.scheme()
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let write_url = base.join("write").map_err(|e| {
            DomainError::InvalidSinkConfig(format!("Invalid InfluxDB URL '{}': {}", config.url, e))
        })?;

        let client = reqwest::Client::builder().build().map_err(|e| {
            DomainError::InvalidSinkConfig(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            write_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }
}

#[async_trait]
impl PointWriter for HttpPointWriter {
    async fn write(&self, batch: &BatchPoints) -> DomainResult<()> {
        let mut url = self.write_url.clone();
        url.query_pairs_mut()
            .append_pair("db", &batch.database)
            .append_pair("precision", PRECISION);

        let mut request = self.client.post(url).body(batch.to_line_protocol());
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let response = request.send().await.map_err(|e| {
            DomainError::SinkWriteError(
                anyhow::Error::new(e).context("failed to send write request to InfluxDB"),
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::SinkWriteError(anyhow::anyhow!(
                "InfluxDB rejected write with status {}: {}",
                status,
                body.trim()
            )));
        }

        debug!(
            database = %batch.database,
            points = batch.points.len(),
            "wrote points to InfluxDB"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;
    use axum::extract::{RawQuery, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use common::domain::{DevEui, Measurement};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Default)]
    struct CapturedWrite {
        query: String,
        authorization: Option<String>,
        body: String,
    }

    type Captured = Arc<Mutex<Vec<CapturedWrite>>>;

    async fn capture_write(
        State((captured, status)): State<(Captured, StatusCode)>,
        RawQuery(query): RawQuery,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, &'static str) {
        captured.lock().unwrap().push(CapturedWrite {
            query: query.unwrap_or_default(),
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        });
        (status, "{\"error\":\"database not found\"}")
    }

    /// Start a fake write endpoint answering every request with `status`
    async fn fake_influx(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let router = Router::new()
            .route("/write", post(capture_write))
            .with_state((captured.clone(), status));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        (format!("http://{}", addr), captured)
    }

    fn batch() -> BatchPoints {
        let dev_eui: DevEui = "0202020202020202".parse().unwrap();
        let point = Point::from_measurement(&dev_eui, Measurement::AirQuality(100), 1_700_000_000)
            .unwrap();
        BatchPoints::single("sensors", point)
    }

    #[test]
    fn test_write_url() {
        let writer = HttpPointWriter::new(&InfluxConfig::new("http://localhost:8086")).unwrap();
        assert_eq!(writer.write_url().as_str(), "http://localhost:8086/write");

        let writer = HttpPointWriter::new(&InfluxConfig::new("http://proxy/influx")).unwrap();
        assert_eq!(writer.write_url().as_str(), "http://proxy/influx/write");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result = HttpPointWriter::new(&InfluxConfig::new("not a url"));
        assert!(matches!(result, Err(DomainError::InvalidSinkConfig(_))));

        let result = HttpPointWriter::new(&InfluxConfig::new("ftp://localhost"));
        assert!(matches!(result, Err(DomainError::InvalidSinkConfig(_))));
    }

    #[tokio::test]
    async fn test_write_sends_line_protocol() {
        let (url, captured) = fake_influx(StatusCode::NO_CONTENT).await;
        let writer = HttpPointWriter::new(&InfluxConfig::new(url)).unwrap();

        writer.write(&batch()).await.unwrap();

        let writes = captured.lock().unwrap().clone();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].query, "db=sensors&precision=s");
        assert_eq!(
            writes[0].body,
            "air_quality,devEUI=0202020202020202 quality=100i 1700000000"
        );
        assert!(writes[0].authorization.is_none());
    }

    #[tokio::test]
    async fn test_write_uses_basic_auth() {
        let (url, captured) = fake_influx(StatusCode::NO_CONTENT).await;
        let config = InfluxConfig::new(url)
            .with_credentials(Some("bridge".to_string()), Some("secret".to_string()));
        let writer = HttpPointWriter::new(&config).unwrap();

        writer.write(&batch()).await.unwrap();

        let writes = captured.lock().unwrap().clone();
        let expected = format!("Basic {}", STANDARD.encode("bridge:secret"));
        assert_eq!(writes[0].authorization.as_deref(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_rejected_write_is_an_error() {
        let (url, _captured) = fake_influx(StatusCode::NOT_FOUND).await;
        let writer = HttpPointWriter::new(&InfluxConfig::new(url)).unwrap();

        let result = writer.write(&batch()).await;
        match result {
            Err(DomainError::SinkWriteError(e)) => {
                assert!(e.to_string().contains("404"));
                assert!(e.to_string().contains("database not found"));
            }
            other => panic!("expected SinkWriteError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        let writer = HttpPointWriter::new(&InfluxConfig::new("http://127.0.0.1:1")).unwrap();
        let result = writer.write(&batch()).await;
        assert!(matches!(result, Err(DomainError::SinkWriteError(_))));
    }

    #[tokio::test]
    async fn test_send_failure_carries_context() {
        let writer = HttpPointWriter::new(&InfluxConfig::new("http://127.0.0.1:1")).unwrap();
        let err = writer.write(&batch()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Sink write error: failed to send write request to InfluxDB"
        );
        match err {
            DomainError::SinkWriteError(inner) => {
                assert!(inner.downcast_ref::<reqwest::Error>().is_some())
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
