//! Push-based measurement sink writing to the InfluxDB 1.x HTTP API.

mod config;
mod point;
mod time_series_sink;
mod writer;

pub use config::*;
pub use point::*;
pub use time_series_sink::*;
pub use writer::*;

#[cfg(any(test, feature = "testing"))]
pub use writer::MockPointWriter;
