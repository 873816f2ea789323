use super::{BridgeConfig, MAX_CONNECT_TIMEOUT_MS, MIN_CONNECT_TIMEOUT_MS};
use anyhow::{bail, Context, Result};
use std::fs::OpenOptions;

impl BridgeConfig {
    /// Check values and normalize the host.
    pub fn validate(&mut self) -> Result<()> {
        self.host = self.host.trim().to_string();
        if self.host.is_empty() {
            bail!("--host must not be empty");
        }
        if self.host.chars().any(char::is_whitespace) {
            bail!("--host must not contain whitespace, got {:?}", self.host);
        }
        if self.port == 0 {
            bail!("--ice-port must be between 1 and 65535");
        }
        if self.server_id < 1 {
            bail!("--server-id must be at least 1, got {}", self.server_id);
        }
        if !is_slice_identifier(&self.slice_module) {
            bail!(
                "--slice-module must be a Slice identifier, got {:?}",
                self.slice_module
            );
        }
        if !(MIN_CONNECT_TIMEOUT_MS..=MAX_CONNECT_TIMEOUT_MS).contains(&self.connect_timeout_ms) {
            bail!(
                "--connect-timeout-ms must be between {MIN_CONNECT_TIMEOUT_MS} and {MAX_CONNECT_TIMEOUT_MS}, got {}",
                self.connect_timeout_ms
            );
        }
        if self.logging_enabled() {
            if let Some(path) = &self.trace_log {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("--trace-log {} is not writable", path.display()))?;
            }
        }
        Ok(())
    }
}

pub(super) fn is_slice_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
