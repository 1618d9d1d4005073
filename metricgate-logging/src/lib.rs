//! Logging initialisation for metricgate
//!
//! Every crate logs through `tracing` (the resilience crate through `log`,
//! which the subscriber bridges). This crate only installs the global
//! subscriber from a [`LoggingConfig`].

pub mod init;

pub use init::{build_filter, init_logging};
pub use metricgate_config::LoggingConfig;
