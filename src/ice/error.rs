use super::encoding::{DecodeError, Identity};
use super::protocol::OperationMode;
use std::io;
use thiserror::Error;

/// Transport and protocol failures from the Ice client.
#[derive(Debug, Error)]
pub enum IceError {
    #[error("connection to {endpoint} failed: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("connection lost: {0}")]
    Io(#[from] io::Error),
    /// Nothing reached the server, so the request may be sent again.
    #[error("request not sent: {0}")]
    SendFailed(#[source] io::Error),
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("marshal error: {0}")]
    Marshal(#[from] DecodeError),
    #[error("object does not exist: {identity} (operation {operation})")]
    ObjectNotExist { identity: Identity, operation: String },
    #[error("facet {facet:?} does not exist on {identity} (operation {operation})")]
    FacetNotExist {
        identity: Identity,
        facet: String,
        operation: String,
    },
    #[error("operation does not exist: {operation} on {identity}")]
    OperationNotExist { identity: Identity, operation: String },
    #[error("unknown local exception: {0}")]
    UnknownLocal(String),
    #[error("unknown user exception: {0}")]
    UnknownUser(String),
    #[error("unknown exception: {0}")]
    Unknown(String),
    /// A Slice-declared exception raised by the servant.
    #[error("user exception {type_id}")]
    UserException { type_id: String },
}

impl IceError {
    /// Whether a failed request can be retried on a fresh connection without
    /// risking a second dispatch. A graceful close from the server guarantees
    /// the request was not dispatched; other losses only allow retrying
    /// idempotent operations.
    pub fn is_retryable(&self, mode: OperationMode) -> bool {
        match self {
            Self::SendFailed(_) | Self::ConnectionClosed => true,
            Self::Io(_) => mode != OperationMode::Normal,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graceful_close_and_unsent_requests_always_retry() {
        let unsent = IceError::SendFailed(io::ErrorKind::BrokenPipe.into());
        assert!(unsent.is_retryable(OperationMode::Normal));
        assert!(IceError::ConnectionClosed.is_retryable(OperationMode::Normal));
    }

    #[test]
    fn lost_connection_retries_only_idempotent_calls() {
        let lost = IceError::Io(io::ErrorKind::ConnectionReset.into());
        assert!(!lost.is_retryable(OperationMode::Normal));
        assert!(lost.is_retryable(OperationMode::Idempotent));
        assert!(lost.is_retryable(OperationMode::Nonmutating));
    }

    #[test]
    fn server_side_failures_never_retry() {
        let err = IceError::UserException {
            type_id: "::Murmur::InvalidUserException".to_string(),
        };
        assert!(!err.is_retryable(OperationMode::Idempotent));
        assert!(!IceError::Protocol("bad".to_string()).is_retryable(OperationMode::Idempotent));
    }
}
