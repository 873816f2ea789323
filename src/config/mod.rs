//! Command-line and environment configuration.

mod validation;

use crate::murmur::{SessionSettings, DEFAULT_ICE_PORT};
use clap::Parser;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "mumble";
pub const DEFAULT_SERVER_ID: i32 = 1;
pub const DEFAULT_SLICE_MODULE: &str = "Murmur";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
pub const MAX_CONNECT_TIMEOUT_MS: u64 = 120_000;

/// Options for the Murmur ICE bridge. Everything is normally supplied through
/// the environment inherited from the parent process.
#[derive(Parser, Clone)]
#[command(
    name = "murmur-ice",
    about = "Murmur ICE admin bridge speaking JSON lines on stdin/stdout",
    author,
    version
)]
pub struct BridgeConfig {
    /// Murmur host (service name or IP)
    #[arg(long, env = "MUMBLE_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Murmur ICE admin port
    #[arg(long = "ice-port", env = "MUMBLE_ICE_PORT", default_value_t = DEFAULT_ICE_PORT)]
    pub port: u16,

    /// ICE write secret (icesecretwrite); empty sends no secret
    #[arg(
        long = "ice-secret",
        env = "MUMBLE_ICE_SECRET",
        default_value = "",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub secret: String,

    /// Virtual server to administer
    #[arg(long = "server-id", env = "MUMBLE_SERVER_ID", default_value_t = DEFAULT_SERVER_ID)]
    pub server_id: i32,

    /// Slice module the admin interfaces live in (MumbleServer on 1.5+)
    #[arg(
        long = "slice-module",
        env = "MUMBLE_ICE_MODULE",
        default_value = DEFAULT_SLICE_MODULE
    )]
    pub slice_module: String,

    /// Timeout for opening the ICE connection (milliseconds)
    #[arg(
        long = "connect-timeout-ms",
        env = "MUMBLE_ICE_CONNECT_TIMEOUT_MS",
        default_value_t = DEFAULT_CONNECT_TIMEOUT_MS
    )]
    pub connect_timeout_ms: u64,

    /// Enable diagnostic logging (stderr unless --trace-log is set)
    #[arg(long = "logs", env = "MURMUR_ICE_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all logging (overrides --logs)
    #[arg(long = "no-logs", env = "MURMUR_ICE_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging request parameters (passwords stay redacted)
    #[arg(
        long = "log-content",
        env = "MURMUR_ICE_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,

    /// Emit log records as JSON
    #[arg(long = "log-json", default_value_t = false)]
    pub log_json: bool,

    /// Write log records to this file instead of stderr
    #[arg(long = "trace-log", env = "MURMUR_ICE_TRACE_LOG")]
    pub trace_log: Option<PathBuf>,
}

impl BridgeConfig {
    pub fn logging_enabled(&self) -> bool {
        self.logs && !self.no_logs
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            host: self.host.clone(),
            port: self.port,
            secret: self.secret.clone(),
            server_id: self.server_id,
            module: self.slice_module.clone(),
            connect_timeout: Some(self.connect_timeout()),
        }
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret_set", &!self.secret.is_empty())
            .field("server_id", &self.server_id)
            .field("slice_module", &self.slice_module)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("logs", &self.logs)
            .field("no_logs", &self.no_logs)
            .field("log_content", &self.log_content)
            .field("log_json", &self.log_json)
            .field("trace_log", &self.trace_log)
            .finish()
    }
}
