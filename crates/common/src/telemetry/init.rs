use anyhow::Result;
use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    logs::LoggerProvider,
    propagation::TraceContextPropagator,
    runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider as SdkTracerProvider},
    Resource,
};
use opentelemetry_semantic_conventions::resource::SERVICE_NAME;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use super::{TelemetryConfig, TelemetryProviders};

const TRACER_NAME: &str = "lora-sensor-bridge";

/// Install the global subscriber: JSON lines on stdout, plus OTLP trace and
/// log export when `config.otel_enabled` is set.
///
/// Returns the OTLP providers so the caller can flush them on shutdown, or
/// `None` when export is disabled. Fails if a subscriber is already installed
/// or an exporter cannot be built.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Option<TelemetryProviders>> {
    let providers = if config.otel_enabled {
        Some(build_providers(config)?)
    } else {
        None
    };

    let trace_layer = providers.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer_provider.tracer(TRACER_NAME))
    });
    let log_layer = providers
        .as_ref()
        .map(|p| OpenTelemetryTracingBridge::new(&p.logger_provider));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_span_list(true)
        .with_current_span(true);

    // The span layer must precede the log bridge so exported log records
    // carry the active trace context
    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(trace_layer)
        .with(log_layer)
        .with(stdout_layer)
        .try_init()?;

    Ok(providers)
}

/// Flush pending spans and log records; a no-op when export was disabled
pub fn shutdown_telemetry(providers: Option<TelemetryProviders>) -> Result<()> {
    match providers {
        Some(providers) => providers.shutdown(),
        None => Ok(()),
    }
}

fn build_providers(config: &TelemetryConfig) -> Result<TelemetryProviders> {
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let resource = Resource::new([KeyValue::new(SERVICE_NAME, config.service_name.clone())]);

    let span_exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_endpoint)
        .build()?;
    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter, runtime::Tokio)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource.clone())
        .build();

    let log_exporter = LogExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_endpoint)
        .build()?;
    let logger_provider = LoggerProvider::builder()
        .with_batch_exporter(log_exporter, runtime::Tokio)
        .with_resource(resource)
        .build();

    Ok(TelemetryProviders {
        tracer_provider,
        logger_provider,
    })
}
