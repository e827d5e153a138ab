//! Fixed-width sensor payload decoding.
//!
//! Each uplink carries exactly one reading. The FPort of the uplink selects how
//! the leading bytes of the payload are interpreted:
//!
//! | FPort | Kind        | Encoding                                  |
//! |-------|-------------|-------------------------------------------|
//! | 1     | air quality | `u16`, little-endian, bytes `[0, 2)`      |
//! | 2     | temperature | IEEE-754 `f32`, little-endian, `[0, 4)`   |
//!
//! Trailing bytes beyond the required width are ignored.

use crate::{PayloadError, Result};
use std::fmt;

pub const FPORT_AIR_QUALITY: u8 = 1;
pub const FPORT_TEMPERATURE: u8 = 2;

pub const SIZE_AIR_QUALITY: usize = 2;
pub const SIZE_TEMPERATURE: usize = 4;

/// The kind of reading carried on a given FPort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementKind {
    AirQuality,
    Temperature,
}

impl MeasurementKind {
    /// Map an FPort to its measurement kind, `None` for ports this bridge does not know
    pub fn from_fport(fport: u8) -> Option<Self> {
        match fport {
            FPORT_AIR_QUALITY => Some(Self::AirQuality),
            FPORT_TEMPERATURE => Some(Self::Temperature),
            _ => None,
        }
    }

    pub fn fport(self) -> u8 {
        match self {
            Self::AirQuality => FPORT_AIR_QUALITY,
            Self::Temperature => FPORT_TEMPERATURE,
        }
    }

    /// Minimum payload length needed to decode this kind
    pub fn required_len(self) -> usize {
        match self {
            Self::AirQuality => SIZE_AIR_QUALITY,
            Self::Temperature => SIZE_TEMPERATURE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::AirQuality => "air_quality",
            Self::Temperature => "temperature",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single decoded sensor reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    /// Air-quality index, unitless
    AirQuality(u16),
    /// Temperature in degrees Celsius
    Temperature(f32),
}

impl Measurement {
    /// Decode `data` as a reading of `kind`
    pub fn decode(kind: MeasurementKind, data: &[u8]) -> Result<Self> {
        match kind {
            MeasurementKind::AirQuality => decode_air_quality(data).map(Self::AirQuality),
            MeasurementKind::Temperature => decode_temperature(data).map(Self::Temperature),
        }
    }

    pub fn kind(&self) -> MeasurementKind {
        match self {
            Self::AirQuality(_) => MeasurementKind::AirQuality,
            Self::Temperature(_) => MeasurementKind::Temperature,
        }
    }

    /// The reading widened to `f64`, as stored by gauges
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::AirQuality(quality) => f64::from(quality),
            Self::Temperature(celsius) => f64::from(celsius),
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AirQuality(quality) => write!(f, "air-quality: {}", quality),
            Self::Temperature(celsius) => write!(f, "temperature: {:.6}", celsius),
        }
    }
}

fn ensure_len(data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(PayloadError::PayloadTooShort {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Read the air-quality index from the first two bytes (little-endian)
pub fn decode_air_quality(data: &[u8]) -> Result<u16> {
    ensure_len(data, SIZE_AIR_QUALITY)?;
    Ok(u16::from_le_bytes([data[0], data[1]]))
}

/// Read the temperature from the first four bytes, reinterpreting the
/// little-endian `u32` as an IEEE-754 single-precision float
pub fn decode_temperature(data: &[u8]) -> Result<f32> {
    ensure_len(data, SIZE_TEMPERATURE)?;
    let bits = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    Ok(f32::from_bits(bits))
}
