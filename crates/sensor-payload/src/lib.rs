pub mod measurement;
mod error;

pub use error::{PayloadError, Result};
pub use measurement::{decode_air_quality, decode_temperature, Measurement, MeasurementKind};
