use crate::murmur::AdminServer;
use crate::telemetry::{log_content_enabled, redact_params};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::time::Instant;

use super::failure::failure_message;
use super::protocol::{ReadySignal, Request, Response};
use super::router::dispatch;

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub requests: u64,
    pub failures: u64,
}

// ============================================================================
// Output
// ============================================================================

/// Writes one JSON line and flushes so the parent sees it immediately.
pub fn send_line<W: Write, T: Serialize>(output: &mut W, message: &T) -> io::Result<()> {
    let json = serde_json::to_string(message)?;
    writeln!(output, "{json}")?;
    output.flush()
}

pub fn send_ready<W: Write>(output: &mut W) -> io::Result<()> {
    send_line(output, &ReadySignal::READY)
}

// ============================================================================
// Request Handling
// ============================================================================

/// Turns one trimmed, non-blank input line into exactly one response.
pub fn handle_line(server: &mut dyn AdminServer, line: &str) -> Response {
    let request = match Request::parse(line) {
        Ok(request) => request,
        Err(malformed) => {
            tracing::warn!(error = %malformed.message, "malformed request line");
            return Response::failure(malformed.id, malformed.message);
        }
    };

    if log_content_enabled() {
        tracing::debug!(
            id = %request.id,
            method = %request.method,
            params = %redact_params(&request.params),
            "dispatching request"
        );
    } else {
        tracing::debug!(id = %request.id, method = %request.method, "dispatching request");
    }

    let started = Instant::now();
    match dispatch(server, &request.method, &request.params) {
        Ok(result) => {
            tracing::debug!(
                id = %request.id,
                method = %request.method,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "request completed"
            );
            Response::success(request.id, result)
        }
        Err(err) => {
            let message = failure_message(&err);
            tracing::warn!(
                id = %request.id,
                method = %request.method,
                error = %message,
                "request failed"
            );
            Response::failure(request.id, message)
        }
    }
}

// ============================================================================
// Command Loop
// ============================================================================

/// Serves requests from `input` until end of input, strictly in order.
///
/// Per-request problems become error responses. Only a failure to read input
/// or to write a response ends the loop early.
pub fn run_ipc_loop<R: BufRead, W: Write>(
    server: &mut dyn AdminServer,
    mut input: R,
    mut output: W,
) -> io::Result<LoopStats> {
    let mut stats = LoopStats::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = handle_line(server, trimmed);
        stats.requests += 1;
        if response.is_failure() {
            stats.failures += 1;
        }
        send_line(&mut output, &response)?;
    }

    tracing::info!(
        requests = stats.requests,
        failures = stats.failures,
        "input closed; command loop finished"
    );
    Ok(stats)
}
