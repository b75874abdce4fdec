//! Infrastructure - configuration, errors, metrics and logging
//!
//! This module contains infrastructure concerns:
//! - `config` - Engine configuration (TOML loading, defaults, validation)
//! - `error` - Error taxonomy
//! - `metrics` - Lock-free metrics collection
//! - `logging` - tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

// Re-export commonly used types
pub use config::Config;
pub use error::{EngineError, InferenceFailure, InvalidDetection};
pub use metrics::Metrics;
