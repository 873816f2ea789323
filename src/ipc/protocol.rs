//! JSON-lines protocol spoken with the parent process.
//!
//! Every input line is one request object; every processed line produces
//! exactly one response line. A single readiness line precedes all responses.

use serde::Serialize;
use serde_json::{Map, Value};

/// Written once, after the remote session is usable.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReadySignal {
    pub ready: bool,
}

impl ReadySignal {
    pub const READY: Self = Self { ready: true };
}

/// Response envelope: `{id, result}` or `{id, error}`, never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Success { id: Value, result: Value },
    Failure { id: Value, error: String },
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self::Success { id, result }
    }

    pub fn failure(id: Value, error: impl Into<String>) -> Self {
        Self::Failure {
            id,
            error: error.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// A request line after envelope parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: Value,
    pub method: String,
    pub params: Map<String, Value>,
}

/// Envelope problems. The id, when one could be read, is kept so the error
/// response can still be correlated.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedRequest {
    pub id: Value,
    pub message: String,
}

fn empty_id() -> Value {
    Value::String(String::new())
}

impl Request {
    /// Parses one trimmed, non-blank line.
    pub fn parse(line: &str) -> Result<Self, MalformedRequest> {
        let value: Value = serde_json::from_str(line).map_err(|err| MalformedRequest {
            id: empty_id(),
            message: format!("Invalid JSON: {err}"),
        })?;
        let Value::Object(mut object) = value else {
            return Err(MalformedRequest {
                id: empty_id(),
                message: "Invalid request: expected a JSON object".to_string(),
            });
        };

        let id = object.remove("id").unwrap_or_else(empty_id);
        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            Some(_) => {
                return Err(MalformedRequest {
                    id,
                    message: "Invalid request: method must be a string".to_string(),
                })
            }
            None => {
                return Err(MalformedRequest {
                    id,
                    message: "Invalid request: missing method".to_string(),
                })
            }
        };
        let params = match object.remove("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(params)) => params,
            Some(_) => {
                return Err(MalformedRequest {
                    id,
                    message: "Invalid request: params must be an object".to_string(),
                })
            }
        };
        Ok(Self { id, method, params })
    }
}
