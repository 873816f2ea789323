//! Request-level failures and their translation into the `error` string of a
//! response. Nothing here is fatal: the session stays usable afterwards.

use crate::murmur::{MurmurException, RemoteError};
use thiserror::Error;

/// Shown when the server rejects the write secret.
pub const INVALID_SECRET_MESSAGE: &str = "Murmur: InvalidSecret - check MUMBLE_ICE_SECRET";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown method: {0}")]
    UnknownMethod(String),
    #[error("Missing parameter: {0}")]
    MissingParam(String),
    #[error("Invalid {field}: {reason}")]
    InvalidParam { field: String, reason: String },
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Error text for a failed request.
pub fn failure_message(err: &DispatchError) -> String {
    match err {
        DispatchError::Remote(RemoteError::Murmur(MurmurException::InvalidSecret)) => {
            INVALID_SECRET_MESSAGE.to_string()
        }
        DispatchError::Remote(RemoteError::Murmur(kind)) if kind.is_not_found() => {
            format!("Murmur: {}", kind.name())
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ice::IceError;

    #[test]
    fn not_found_exceptions_use_kind_name() {
        let err = DispatchError::from(RemoteError::Murmur(MurmurException::InvalidUser));
        assert_eq!(failure_message(&err), "Murmur: InvalidUserException");
        let err = DispatchError::from(RemoteError::Murmur(MurmurException::InvalidChannel));
        assert_eq!(failure_message(&err), "Murmur: InvalidChannelException");
    }

    #[test]
    fn invalid_secret_points_at_configuration() {
        let err = DispatchError::from(RemoteError::Murmur(MurmurException::InvalidSecret));
        assert_eq!(failure_message(&err), INVALID_SECRET_MESSAGE);
    }

    #[test]
    fn other_failures_use_display_text() {
        let err = DispatchError::UnknownMethod("frobnicate".to_string());
        assert_eq!(failure_message(&err), "Unknown method: frobnicate");

        let err = DispatchError::from(RemoteError::Murmur(MurmurException::ServerBooted));
        assert_eq!(failure_message(&err), "Murmur: ServerBootedException");

        let err = DispatchError::from(RemoteError::Transport(IceError::ConnectionClosed));
        assert_eq!(failure_message(&err), "connection closed by peer");
    }
}
