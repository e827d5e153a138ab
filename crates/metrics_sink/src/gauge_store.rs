use prometheus::{Encoder, Gauge, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use tracing::warn;

pub const TEMPERATURE_GAUGE: &str = "lora_sensor_temperature_celsius";
pub const AIR_QUALITY_GAUGE: &str = "lora_sensor_airquality";

/// Name and help text of a gauge to register
#[derive(Debug, Clone, Copy)]
pub struct GaugeDefinition {
    pub name: &'static str,
    pub help: &'static str,
}

pub const SENSOR_GAUGES: [GaugeDefinition; 2] = [
    GaugeDefinition {
        name: TEMPERATURE_GAUGE,
        help: "Current temperature in C",
    },
    GaugeDefinition {
        name: AIR_QUALITY_GAUGE,
        help: "Current air quality",
    },
];

/// Named gauges with last-write-wins semantics
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait GaugeStore: Send + Sync {
    /// Overwrite the gauge called `name` with `value`
    fn set_gauge(&self, name: &str, value: f64);
}

/// Gauge store backed by its own Prometheus registry
pub struct PrometheusGaugeStore {
    registry: Registry,
    gauges: HashMap<&'static str, Gauge>,
}

impl PrometheusGaugeStore {
    /// Register `definitions` on `registry`
    pub fn new(registry: Registry, definitions: &[GaugeDefinition]) -> Result<Self, prometheus::Error> {
        let mut gauges = HashMap::with_capacity(definitions.len());
        for definition in definitions {
            let gauge = Gauge::with_opts(Opts::new(definition.name, definition.help))?;
            registry.register(Box::new(gauge.clone()))?;
            gauges.insert(definition.name, gauge);
        }

        Ok(Self { registry, gauges })
    }

    /// Store holding the temperature and air-quality gauges on a fresh registry
    pub fn for_sensors() -> Result<Self, prometheus::Error> {
        Self::new(Registry::new(), &SENSOR_GAUGES)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.gauges.get(name).map(Gauge::get)
    }

    /// Render every registered gauge in the Prometheus text exposition format
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl GaugeStore for PrometheusGaugeStore {
    fn set_gauge(&self, name: &str, value: f64) {
        match self.gauges.get(name) {
            Some(gauge) => gauge.set(value),
            None => warn!(gauge = name, "attempted to set unregistered gauge"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauges_start_at_zero() {
        let store = PrometheusGaugeStore::for_sensors().unwrap();
        assert_eq!(store.get(TEMPERATURE_GAUGE), Some(0.0));
        assert_eq!(store.get(AIR_QUALITY_GAUGE), Some(0.0));
    }

    #[test]
    fn test_last_write_wins() {
        let store = PrometheusGaugeStore::for_sensors().unwrap();
        store.set_gauge(AIR_QUALITY_GAUGE, 100.0);
        store.set_gauge(AIR_QUALITY_GAUGE, 42.0);
        store.set_gauge(AIR_QUALITY_GAUGE, 7.0);

        assert_eq!(store.get(AIR_QUALITY_GAUGE), Some(7.0));
        assert_eq!(store.get(TEMPERATURE_GAUGE), Some(0.0));
    }

    #[test]
    fn test_unknown_gauge_is_ignored() {
        let store = PrometheusGaugeStore::for_sensors().unwrap();
        store.set_gauge("lora_sensor_humidity", 55.0);

        assert_eq!(store.get("lora_sensor_humidity"), None);
        assert!(!store.encode_text().unwrap().contains("humidity"));
    }

    #[test]
    fn test_stores_are_independent() {
        let a = PrometheusGaugeStore::for_sensors().unwrap();
        let b = PrometheusGaugeStore::for_sensors().unwrap();
        a.set_gauge(TEMPERATURE_GAUGE, 22.5);

        assert_eq!(a.get(TEMPERATURE_GAUGE), Some(22.5));
        assert_eq!(b.get(TEMPERATURE_GAUGE), Some(0.0));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        let _first = PrometheusGaugeStore::new(registry.clone(), &SENSOR_GAUGES).unwrap();
        assert!(PrometheusGaugeStore::new(registry, &SENSOR_GAUGES).is_err());
    }

    #[test]
    fn test_encode_text() {
        let store = PrometheusGaugeStore::for_sensors().unwrap();
        store.set_gauge(TEMPERATURE_GAUGE, 22.5);
        store.set_gauge(AIR_QUALITY_GAUGE, 100.0);

        let text = store.encode_text().unwrap();
        assert!(text.contains("# HELP lora_sensor_temperature_celsius Current temperature in C"));
        assert!(text.contains("# TYPE lora_sensor_airquality gauge"));
        assert!(text.contains("lora_sensor_temperature_celsius 22.5"));
        assert!(text.contains("lora_sensor_airquality 100"));
    }
}
