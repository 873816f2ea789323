//! Murmur ICE bridge entrypoint: one admin session per process, driven by
//! JSON lines on stdin.
//!
//! # Lifecycle
//!
//! - Parse and validate configuration from flags and environment
//! - Open the ICE session and resolve the virtual server
//! - Announce readiness on stdout, then serve requests until stdin closes
//! - Close the session and exit

use clap::error::ErrorKind;
use clap::Parser;
use murmur_ice_bridge::config::BridgeConfig;
use murmur_ice_bridge::init_tracing;
use murmur_ice_bridge::ipc::{run_ipc_loop, send_ready};
use murmur_ice_bridge::murmur::RemoteSession;
use std::fmt::Display;
use std::io;
use std::process::ExitCode;

fn fatal(err: impl Display) -> ExitCode {
    eprintln!("[murmur-ice] Fatal: {err}");
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let mut config = match BridgeConfig::try_parse() {
        Ok(config) => config,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => return fatal(err.render().to_string().trim_end()),
        },
    };
    if let Err(err) = config.validate() {
        return fatal(format!("{err:#}"));
    }
    init_tracing(&config);
    tracing::debug!(?config, "configuration loaded");

    let settings = config.session_settings();
    let mut session = match RemoteSession::establish(&settings) {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(error = %err, "session setup failed");
            return fatal(err);
        }
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let served = send_ready(&mut stdout.lock())
        .and_then(|()| run_ipc_loop(&mut session, stdin.lock(), stdout.lock()));

    if let Err(err) = session.close() {
        tracing::warn!(error = %err, "closing ICE connection failed");
    }

    match served {
        Ok(stats) => {
            tracing::info!(
                requests = stats.requests,
                failures = stats.failures,
                "bridge exiting"
            );
            ExitCode::SUCCESS
        }
        Err(err) => fatal(format!("stdout/stdin failure: {err}")),
    }
}
