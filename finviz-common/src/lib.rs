//! Finviz Common - Shared configuration, validation, and logging for the finviz proxy.
//!
//! This crate provides:
//! - Configuration types and loading (file + `FINVIZ_*` environment overrides)
//! - Configuration validation
//! - Logging setup with noise filtering
//! - Small helpers for durations and log redaction

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    Config, EliteConfig, NetworkConfig, ObservabilityConfig, RefreshConfig, ServerConfig,
    UpstreamConfig,
};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::logging::init_logging;
    pub use crate::validation::{Validate, ValidationError};
}
