mod envelope;
mod result;
mod sink;
mod uplink_service;

pub use envelope::*;
pub use result::*;
pub use sink::*;
pub use uplink_service::*;

pub use sensor_payload::{Measurement, MeasurementKind, PayloadError};
