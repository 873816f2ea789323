use crate::config::BridgeConfig;
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();
static LOG_CONTENT_ENABLED: AtomicBool = AtomicBool::new(false);

const REDACTED: &str = "<redacted>";

/// Install the global subscriber. Stdout carries the protocol, so records go
/// to stderr or to the configured trace log file.
pub fn init_tracing(config: &BridgeConfig) {
    let enabled = config.logging_enabled();
    LOG_CONTENT_ENABLED.store(enabled && config.log_content, Ordering::Relaxed);
    if !enabled {
        return;
    }

    let _ = TRACING_INIT.get_or_init(|| {
        let builder = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_timer(UtcTime::rfc_3339())
            .with_ansi(false);
        let _ = match (&config.trace_log, config.log_json) {
            (Some(path), json) => {
                let file = match OpenOptions::new().create(true).append(true).open(path) {
                    Ok(file) => file,
                    Err(_) => return,
                };
                let writer = Mutex::new(file);
                if json {
                    tracing::subscriber::set_global_default(
                        builder.json().with_writer(writer).finish(),
                    )
                } else {
                    tracing::subscriber::set_global_default(builder.with_writer(writer).finish())
                }
            }
            (None, true) => tracing::subscriber::set_global_default(
                builder.json().with_writer(io::stderr).finish(),
            ),
            (None, false) => {
                tracing::subscriber::set_global_default(builder.with_writer(io::stderr).finish())
            }
        };
    });
}

/// Whether request parameters may be logged.
pub fn log_content_enabled() -> bool {
    LOG_CONTENT_ENABLED.load(Ordering::Relaxed)
}

/// Copy of `params` safe for logs: every `password` value, at any depth, is
/// replaced.
pub fn redact_params(params: &Map<String, Value>) -> Value {
    Value::Object(
        params
            .iter()
            .map(|(key, value)| (key.clone(), redact_value(key, value)))
            .collect(),
    )
}

fn redact_value(key: &str, value: &Value) -> Value {
    if key.eq_ignore_ascii_case("password") {
        return Value::String(REDACTED.to_string());
    }
    match value {
        Value::Object(map) => redact_params(map),
        Value::Array(items) => Value::Array(items.iter().map(|item| redact_value("", item)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
pub(crate) fn set_log_content_for_tests(enabled: bool) {
    LOG_CONTENT_ENABLED.store(enabled, Ordering::Relaxed);
}
