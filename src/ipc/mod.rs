//! JSON-lines command loop bridging the parent process to the Murmur admin
//! server.
//!
//! Architecture:
//! - Protocol: request/response envelopes and the readiness signal
//! - Router: the fixed method table, parameter coercion, result shaping
//! - Failure: request-level error taxonomy and its string translation
//! - Session: the synchronous read/dispatch/write loop
//!
//! Protocol:
//! - Ready (Rust → client, once): {"ready": true}
//! - Requests (client → Rust): {"id": "...", "method": "...", "params": {...}}
//! - Responses (Rust → client): {"id": "...", "result": ...} or {"id": "...", "error": "..."}

mod failure;
mod params;
mod protocol;
mod router;
mod session;


pub use failure::{failure_message, DispatchError, INVALID_SECRET_MESSAGE};
pub use protocol::{MalformedRequest, ReadySignal, Request, Response};
pub use router::{dispatch, Method};
pub use session::{handle_line, run_ipc_loop, send_line, send_ready, LoopStats};
