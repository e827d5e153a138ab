//! Pull-based measurement sink.
//!
//! Measurements overwrite one Prometheus gauge per kind; a scrape of `/metrics`
//! reads whatever value was set last.

mod gauge_sink;
mod gauge_store;
mod http;

pub use gauge_sink::*;
pub use gauge_store::*;
pub use http::*;
