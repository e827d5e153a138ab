use crate::domain::envelope::UplinkEnvelope;
use crate::domain::result::DomainResult;
use crate::domain::sink::MeasurementSink;
use sensor_payload::{Measurement, MeasurementKind};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// What happened to an uplink after dispatch
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DispatchOutcome {
    /// The measurement was decoded and handed to the sink
    Recorded(Measurement),
    /// The FPort is not one this bridge decodes; nothing was written
    UnknownFPort(u8),
}

/// Routes a decoded envelope to the measurement decoder selected by its FPort
/// and forwards the result to the configured sink
pub struct UplinkService {
    sink: Arc<dyn MeasurementSink>,
}

impl UplinkService {
    pub fn new(sink: Arc<dyn MeasurementSink>) -> Self {
        Self { sink }
    }

    pub fn sink_type(&self) -> &'static str {
        self.sink.sink_type()
    }

    #[instrument(
        name = "process_uplink",
        skip_all,
        fields(dev_eui = %envelope.dev_eui, fport = envelope.fport)
    )]
    pub async fn process_envelope(&self, envelope: &UplinkEnvelope) -> DomainResult<DispatchOutcome> {
        let Some(kind) = MeasurementKind::from_fport(envelope.fport) else {
            info!(fport = envelope.fport, "unknown FPort: {}", envelope.fport);
            return Ok(DispatchOutcome::UnknownFPort(envelope.fport));
        };

        let measurement = Measurement::decode(kind, &envelope.data)?;
        info!(kind = %kind, value = measurement.as_f64(), "{}", measurement);

        self.sink.record(&envelope.dev_eui, measurement).await?;

        debug!(sink = self.sink.sink_type(), "measurement recorded");
        Ok(DispatchOutcome::Recorded(measurement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DevEui, DomainError, MockMeasurementSink, PayloadError};
    use std::fmt;
    use std::sync::Mutex;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// Collects the formatted message of every event
    #[derive(Clone, Default)]
    struct CapturedMessages(Arc<Mutex<Vec<String>>>);

    impl CapturedMessages {
        fn matching(&self, needle: &str) -> usize {
            self.0.lock().unwrap().iter().filter(|m| m.contains(needle)).count()
        }
    }

    struct MessageVisitor(String);

    impl Visit for MessageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{:?}", value);
            }
        }
    }

    impl<S: Subscriber> Layer<S> for CapturedMessages {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            self.0.lock().unwrap().push(visitor.0);
        }
    }

    fn envelope(fport: u8, data: Vec<u8>) -> UplinkEnvelope {
        UplinkEnvelope {
            dev_eui: "0202020202020202".parse().unwrap(),
            fport,
            data,
            time: None,
            fcnt: None,
            gateway_count: None,
            rssi: None,
        }
    }

    #[tokio::test]
    async fn test_air_quality_is_recorded() {
        let mut mock_sink = MockMeasurementSink::new();
        mock_sink
            .expect_record()
            .withf(|dev_eui: &DevEui, measurement: &Measurement| {
                dev_eui.to_string() == "0202020202020202"
                    && *measurement == Measurement::AirQuality(100)
            })
            .times(1)
            .returning(|_, _| Ok(()));
        mock_sink.expect_sink_type().return_const("mock");

        let service = UplinkService::new(Arc::new(mock_sink));
        let outcome = service
            .process_envelope(&envelope(1, vec![0x64, 0x00]))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Recorded(Measurement::AirQuality(100)));
    }

    #[tokio::test]
    async fn test_temperature_is_recorded() {
        let mut mock_sink = MockMeasurementSink::new();
        mock_sink
            .expect_record()
            .withf(|_: &DevEui, measurement: &Measurement| {
                *measurement == Measurement::Temperature(22.5)
            })
            .times(1)
            .returning(|_, _| Ok(()));
        mock_sink.expect_sink_type().return_const("mock");

        let service = UplinkService::new(Arc::new(mock_sink));
        let outcome = service
            .process_envelope(&envelope(2, 22.5f32.to_le_bytes().to_vec()))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Recorded(Measurement::Temperature(22.5)));
    }

    #[tokio::test]
    async fn test_unknown_fport_skips_sink() {
        let mut mock_sink = MockMeasurementSink::new();
        // Should NOT be called for an unknown port
        mock_sink.expect_record().times(0);

        let service = UplinkService::new(Arc::new(mock_sink));
        let outcome = service
            .process_envelope(&envelope(99, vec![0x64, 0x00]))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::UnknownFPort(99));
    }

    #[tokio::test]
    async fn test_unknown_fport_logs_once() {
        let captured = CapturedMessages::default();
        let subscriber = tracing_subscriber::registry().with(captured.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut mock_sink = MockMeasurementSink::new();
        mock_sink.expect_record().times(0);

        let service = UplinkService::new(Arc::new(mock_sink));
        service
            .process_envelope(&envelope(99, vec![0x64, 0x00]))
            .await
            .unwrap();

        assert_eq!(captured.matching("unknown FPort: 99"), 1);
        assert_eq!(captured.matching("unknown FPort"), 1);
    }

    #[tokio::test]
    async fn test_known_fport_does_not_log_unknown() {
        let captured = CapturedMessages::default();
        let subscriber = tracing_subscriber::registry().with(captured.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut mock_sink = MockMeasurementSink::new();
        mock_sink.expect_record().times(1).returning(|_, _| Ok(()));
        mock_sink.expect_sink_type().return_const("mock");

        let service = UplinkService::new(Arc::new(mock_sink));
        service
            .process_envelope(&envelope(1, vec![0x64, 0x00]))
            .await
            .unwrap();

        assert_eq!(captured.matching("unknown FPort"), 0);
        assert_eq!(captured.matching("air-quality: 100"), 1);
    }

    #[tokio::test]
    async fn test_short_payload_skips_sink() {
        let mut mock_sink = MockMeasurementSink::new();
        mock_sink.expect_record().times(0);

        let service = UplinkService::new(Arc::new(mock_sink));
        let result = service.process_envelope(&envelope(2, vec![0x00, 0x00])).await;

        assert!(matches!(
            result,
            Err(DomainError::PayloadDecode(PayloadError::PayloadTooShort {
                expected: 4,
                actual: 2
            }))
        ));
    }

    #[tokio::test]
    async fn test_sink_error_is_propagated() {
        let mut mock_sink = MockMeasurementSink::new();
        mock_sink
            .expect_record()
            .times(1)
            .returning(|_, _| Err(DomainError::SinkWriteError(anyhow::anyhow!("backend down"))));

        let service = UplinkService::new(Arc::new(mock_sink));
        let result = service.process_envelope(&envelope(1, vec![0x64, 0x00])).await;

        assert!(matches!(result, Err(DomainError::SinkWriteError(_))));
    }
}
