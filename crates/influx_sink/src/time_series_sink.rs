use crate::config::InfluxConfig;
use crate::point::{BatchPoints, Point};
use crate::writer::{HttpPointWriter, PointWriter};
use async_trait::async_trait;
use common::domain::{DevEui, DomainResult, Measurement, MeasurementSink};
use std::sync::Arc;
use tracing::{debug, info};

/// Sink that writes every measurement as its own one-point batch
pub struct TimeSeriesSink {
    writer: Arc<dyn PointWriter>,
    database: String,
}

impl TimeSeriesSink {
    pub fn new(writer: Arc<dyn PointWriter>, database: impl Into<String>) -> Self {
        Self {
            writer,
            database: database.into(),
        }
    }

    /// Build the HTTP write client from `config`; an invalid URL is an error
    pub fn connect(config: &InfluxConfig) -> DomainResult<Self> {
        let writer = HttpPointWriter::new(config)?;
        info!(
            url = %writer.write_url(),
            database = %config.database,
            authenticated = config.username.is_some(),
            "InfluxDB write client ready"
        );
        Ok(Self::new(Arc::new(writer), config.database.clone()))
    }
}

#[async_trait]
impl MeasurementSink for TimeSeriesSink {
    async fn record(&self, dev_eui: &DevEui, measurement: Measurement) -> DomainResult<()> {
        let timestamp = chrono::Utc::now().timestamp();
        let point = Point::from_measurement(dev_eui, measurement, timestamp)?;
        let batch = BatchPoints::single(self.database.clone(), point);

        self.writer.write(&batch).await?;

        debug!(
            dev_eui = %dev_eui,
            measurement = measurement.kind().name(),
            timestamp,
            "point written"
        );
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "influx"
    }
}
