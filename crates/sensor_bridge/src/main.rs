mod config;

use clap::Parser;
use common::domain::{MeasurementSink, UplinkService};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryProviders};
use config::{BridgeConfig, SinkKind};
use influx_sink::TimeSeriesSink;
use metrics_sink::{serve_metrics, GaugeSink, PrometheusGaugeStore};
use mqtt_listener::run_mqtt_listener;
use sensor_runner::Runner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = BridgeConfig::parse();

    let telemetry_providers: Option<TelemetryProviders> =
        match init_telemetry(&config.telemetry_config()) {
            Ok(providers) => providers,
            Err(e) => {
                eprintln!("Failed to initialize telemetry: {}", e);
                std::process::exit(1);
            }
        };

    info!(
        sink = ?config.sink,
        mqtt_server = %config.mqtt_server,
        application_id = %config.application_id,
        otel_enabled = config.otel_enabled,
        "Starting lora-sensor-bridge"
    );
    debug!("Configuration: {:?}", config);

    let mqtt_config = match config.mqtt_listener_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Invalid MQTT configuration: {}", e);
            std::process::exit(1);
        }
    };

    let mut runner = Runner::new();

    // Gauge mode additionally serves the store it writes to
    let sink: Arc<dyn MeasurementSink> = match config.sink {
        SinkKind::Gauge => {
            let bind = match config.metrics_bind_addr() {
                Ok(addr) => addr,
                Err(e) => {
                    error!("{}", e);
                    std::process::exit(1);
                }
            };
            let store = match PrometheusGaugeStore::for_sensors() {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    error!("Failed to register sensor gauges: {}", e);
                    std::process::exit(1);
                }
            };

            let metrics_store = store.clone();
            runner = runner.with_app_process(move |shutdown| async move {
                serve_metrics(bind, metrics_store, shutdown).await
            });

            Arc::new(GaugeSink::new(store))
        }
        SinkKind::Influx => match TimeSeriesSink::connect(&config.influx_config()) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                error!("Failed to create InfluxDB sink: {}", e);
                std::process::exit(1);
            }
        },
    };

    let uplink_service = Arc::new(UplinkService::new(sink));
    info!(sink = uplink_service.sink_type(), "Uplink service ready");

    runner = runner
        .with_app_process(move |shutdown| async move {
            run_mqtt_listener(mqtt_config, &uplink_service, shutdown)
                .await
                .map_err(anyhow::Error::from)
        })
        .with_closer(move || async move {
            info!("Flushing telemetry");
            shutdown_telemetry(telemetry_providers)
        })
        .with_closer_timeout(Duration::from_secs(10));

    runner.run().await;
}
