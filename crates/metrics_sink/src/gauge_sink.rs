use crate::gauge_store::{GaugeStore, AIR_QUALITY_GAUGE, TEMPERATURE_GAUGE};
use async_trait::async_trait;
use common::domain::{DevEui, DomainResult, Measurement, MeasurementKind, MeasurementSink};
use std::sync::Arc;
use tracing::debug;

/// Gauge that receives measurements of the given kind
pub fn gauge_name(kind: MeasurementKind) -> &'static str {
    match kind {
        MeasurementKind::AirQuality => AIR_QUALITY_GAUGE,
        MeasurementKind::Temperature => TEMPERATURE_GAUGE,
    }
}

/// Sink that overwrites one gauge per measurement kind
///
/// Gauges carry no device label, so with several devices the gauge reflects
/// whichever device reported last.
pub struct GaugeSink {
    store: Arc<dyn GaugeStore>,
}

impl GaugeSink {
    pub fn new(store: Arc<dyn GaugeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MeasurementSink for GaugeSink {
    async fn record(&self, dev_eui: &DevEui, measurement: Measurement) -> DomainResult<()> {
        let name = gauge_name(measurement.kind());
        self.store.set_gauge(name, measurement.as_f64());

        debug!(dev_eui = %dev_eui, gauge = name, value = measurement.as_f64(), "gauge updated");
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "gauge"
    }
}
