pub mod config;
pub mod ice;
pub mod ipc;
pub mod murmur;
mod telemetry;

pub use telemetry::{init_tracing, log_content_enabled, redact_params};
