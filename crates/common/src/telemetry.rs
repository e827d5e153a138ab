//! Process-wide logging and OTLP export setup.

mod config;
mod init;

pub use config::*;
pub use init::*;
