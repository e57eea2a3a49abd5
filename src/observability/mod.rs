//! Structured logging setup for adapter deployments

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
