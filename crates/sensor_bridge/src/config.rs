use clap::{Parser, ValueEnum};
use common::domain::{DevEui, DomainResult};
use common::telemetry::TelemetryConfig;
use influx_sink::InfluxConfig;
use mqtt_listener::{DeviceSelector, MqttListenerConfig};
use std::net::SocketAddr;

/// Backend the decoded measurements are delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    /// Prometheus gauges served on /metrics
    Gauge,
    /// Points written to InfluxDB
    Influx,
}

/// Bridge LoRaWAN sensor uplinks from MQTT to Prometheus or InfluxDB.
#[derive(Parser, Debug, Clone)]
#[command(name = "lora-sensor-bridge", version, about)]
pub struct BridgeConfig {
    /// MQTT broker address
    #[arg(long, env = "MQTT_SERVER", default_value = "tcp://localhost:1883")]
    pub mqtt_server: String,

    #[arg(long, env = "MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub mqtt_password: Option<String>,

    /// InfluxDB base URL, used with `--sink influx`
    #[arg(long, env = "INFLUX_URL", default_value = "http://localhost:8086")]
    pub influx_url: String,

    #[arg(long, env = "INFLUX_USER")]
    pub influx_user: Option<String>,

    #[arg(long, env = "INFLUX_PASSWORD", hide_env_values = true)]
    pub influx_password: Option<String>,

    #[arg(long, env = "SINK", value_enum, default_value_t = SinkKind::Gauge)]
    pub sink: SinkKind,

    /// Network server application whose uplinks are consumed
    #[arg(long, env = "APPLICATION_ID", default_value = "0101010101010101")]
    pub application_id: String,

    /// Restrict the subscription to one device (16 hex digits); all devices when unset
    #[arg(long, env = "DEV_EUI")]
    pub dev_eui: Option<String>,

    /// Listen address of the /metrics endpoint, used with `--sink gauge`
    #[arg(long, env = "METRICS_BIND", default_value = "0.0.0.0:8080")]
    pub metrics_bind: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "OTEL_ENABLED")]
    pub otel_enabled: bool,

    #[arg(long, env = "OTEL_ENDPOINT", default_value = "http://localhost:4317")]
    pub otel_endpoint: String,

    #[arg(long, env = "OTEL_SERVICE_NAME", default_value = "lora-sensor-bridge")]
    pub otel_service_name: String,
}

impl BridgeConfig {
    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.otel_service_name.clone(),
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
        }
    }

    pub fn device_selector(&self) -> DomainResult<DeviceSelector> {
        match non_empty(&self.dev_eui) {
            Some(hex) => Ok(DeviceSelector::Device(hex.parse::<DevEui>()?)),
            None => Ok(DeviceSelector::Any),
        }
    }

    pub fn mqtt_listener_config(&self) -> DomainResult<MqttListenerConfig> {
        let config = MqttListenerConfig::new(&self.mqtt_server, &self.application_id)
            .with_credentials(
                non_empty(&self.mqtt_username),
                non_empty(&self.mqtt_password),
            )
            .with_device(self.device_selector()?);

        // Surface a bad application ID before any connection attempt
        config.topic_filter()?;
        Ok(config)
    }

    pub fn influx_config(&self) -> InfluxConfig {
        InfluxConfig::new(&self.influx_url).with_credentials(
            self.influx_user.clone(),
            self.influx_password.clone(),
        )
    }

    pub fn metrics_bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.metrics_bind.parse().map_err(|e| {
            anyhow::anyhow!("invalid metrics bind address '{}': {}", self.metrics_bind, e)
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
}
