//! InfluxDB line protocol points.
//!
//! A point serializes as
//! `measurement,tag=value field=value timestamp`, with tags sorted by key.
//! Integer fields carry an `i` suffix; floats are written in plain decimal.

use common::domain::{DevEui, DomainError, DomainResult, Measurement};
use std::collections::BTreeMap;
use std::fmt::{self, Write};

/// Timestamp precision of every point this crate writes
pub const PRECISION: &str = "s";

pub const TAG_DEV_EUI: &str = "devEUI";
pub const MEASUREMENT_AIR_QUALITY: &str = "air_quality";
pub const MEASUREMENT_TEMPERATURE: &str = "temperature";
pub const FIELD_QUALITY: &str = "quality";
// Spelling matches the existing dashboards
pub const FIELD_CELSIUS: &str = "celcius";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(value) => write!(f, "{}i", value),
            FieldValue::Float(value) => write!(f, "{}", value),
        }
    }
}

/// A single time-series point with a timestamp in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp: i64,
}

impl Point {
    pub fn builder(measurement: impl Into<String>) -> PointBuilder {
        PointBuilder {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp: None,
        }
    }

    /// Point for a decoded sensor reading, tagged with its device
    pub fn from_measurement(
        dev_eui: &DevEui,
        measurement: Measurement,
        timestamp: i64,
    ) -> DomainResult<Self> {
        let builder = match measurement {
            Measurement::AirQuality(quality) => Point::builder(MEASUREMENT_AIR_QUALITY)
                .field(FIELD_QUALITY, FieldValue::Integer(i64::from(quality))),
            Measurement::Temperature(celsius) => Point::builder(MEASUREMENT_TEMPERATURE)
                .field(FIELD_CELSIUS, FieldValue::Float(f64::from(celsius))),
        };

        builder
            .tag(TAG_DEV_EUI, dev_eui.to_string())
            .timestamp(timestamp)
            .build()
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn field(&self, key: &str) -> Option<FieldValue> {
        self.fields.get(key).copied()
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn to_line_protocol(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            let _ = write!(
                line,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(value, &[',', '=', ' '])
            );
        }

        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape(key, &[',', '=', ' ']), value))
            .collect();
        let _ = write!(line, " {} {}", fields.join(","), self.timestamp);

        line
    }
}

pub struct PointBuilder {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp: Option<i64>,
}

impl PointBuilder {
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn timestamp(mut self, seconds: i64) -> Self {
        self.timestamp = Some(seconds);
        self
    }

    pub fn build(self) -> DomainResult<Point> {
        if self.measurement.is_empty() {
            return Err(DomainError::PointConstruction(
                "measurement name cannot be empty".to_string(),
            ));
        }
        if self.fields.is_empty() {
            return Err(DomainError::PointConstruction(format!(
                "point '{}' has no fields",
                self.measurement
            )));
        }
        if let Some(key) = self.tags.iter().find_map(|(k, v)| {
            (k.is_empty() || v.is_empty()).then_some(k)
        }) {
            return Err(DomainError::PointConstruction(format!(
                "tag '{}' on point '{}' has an empty key or value",
                key, self.measurement
            )));
        }
        for (key, value) in &self.fields {
            if key.is_empty() {
                return Err(DomainError::PointConstruction(format!(
                    "point '{}' has a field with an empty key",
                    self.measurement
                )));
            }
            if let FieldValue::Float(f) = value {
                if !f.is_finite() {
                    return Err(DomainError::PointConstruction(format!(
                        "field '{}' on point '{}' is not a finite number: {}",
                        key, self.measurement, f
                    )));
                }
            }
        }
        let timestamp = self.timestamp.ok_or_else(|| {
            DomainError::PointConstruction(format!("point '{}' has no timestamp", self.measurement))
        })?;

        Ok(Point {
            measurement: self.measurement,
            tags: self.tags,
            fields: self.fields,
            timestamp,
        })
    }
}

/// Points sent together in one write request
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPoints {
    pub database: String,
    pub points: Vec<Point>,
}

impl BatchPoints {
    pub fn single(database: impl Into<String>, point: Point) -> Self {
        Self {
            database: database.into(),
            points: vec![point],
        }
    }

    pub fn to_line_protocol(&self) -> String {
        self.points
            .iter()
            .map(Point::to_line_protocol)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn escape(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
