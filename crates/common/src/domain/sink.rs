use crate::domain::envelope::DevEui;
use crate::domain::result::DomainResult;
use async_trait::async_trait;
use sensor_payload::Measurement;

/// Destination for decoded measurements
///
/// Implementations should:
/// - Record the measurement against the originating device
/// - Return an error if the backend rejects or cannot receive the write
/// - Never retry or buffer; a failed write is dropped by the caller
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MeasurementSink: Send + Sync {
    /// Record a single measurement
    ///
    /// # Arguments
    /// * `dev_eui` - Device the uplink originated from
    /// * `measurement` - Decoded reading
    async fn record(&self, dev_eui: &DevEui, measurement: Measurement) -> DomainResult<()>;

    /// Short name of the backend, used in logs
    fn sink_type(&self) -> &'static str;
}
