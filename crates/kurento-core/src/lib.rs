//! Shared pieces for the Kurento client crates.

pub mod tracing;

pub use tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};

/// Prefix of every crate target in this workspace, used for default log filters.
pub const LOG_TARGET_PREFIX: &str = "kurento";
