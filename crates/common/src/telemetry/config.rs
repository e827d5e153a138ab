use opentelemetry_sdk::{logs::LoggerProvider, trace::TracerProvider as SdkTracerProvider};
use tracing_subscriber::EnvFilter;

pub const DEFAULT_SERVICE_NAME: &str = "lora-sensor-bridge";

#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Reported as `service.name` on exported traces and logs
    pub service_name: String,
    /// OTLP gRPC collector endpoint
    pub otel_endpoint: String,
    pub otel_enabled: bool,
    /// Fallback filter directive when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            otel_endpoint: "http://localhost:4317".to_string(),
            otel_enabled: false,
            log_level: "info".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// `RUST_LOG` if set and valid, else `log_level`, else `info`
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.log_level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// OTLP providers kept alive for the life of the process and flushed on exit
pub struct TelemetryProviders {
    pub tracer_provider: SdkTracerProvider,
    pub logger_provider: LoggerProvider,
}

impl TelemetryProviders {
    /// Flush and stop both providers; both are attempted even if the first fails
    pub fn shutdown(self) -> anyhow::Result<()> {
        let traces = self.tracer_provider.shutdown();
        let logs = self.logger_provider.shutdown();

        traces.map_err(|e| anyhow::anyhow!("tracer provider shutdown failed: {:?}", e))?;
        logs.map_err(|e| anyhow::anyhow!("logger provider shutdown failed: {:?}", e))?;
        Ok(())
    }
}
