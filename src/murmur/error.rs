use crate::ice::IceError;
use thiserror::Error;

/// Exceptions declared by the Murmur admin Slice definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MurmurException {
    InvalidSession,
    InvalidChannel,
    InvalidServer,
    ServerBooted,
    ServerFailure,
    InvalidUser,
    InvalidTexture,
    InvalidCallback,
    InvalidSecret,
    NestingLimit,
    WriteOnly,
    InvalidInputData,
}

impl MurmurException {
    const ALL: [Self; 12] = [
        Self::InvalidSession,
        Self::InvalidChannel,
        Self::InvalidServer,
        Self::ServerBooted,
        Self::ServerFailure,
        Self::InvalidUser,
        Self::InvalidTexture,
        Self::InvalidCallback,
        Self::InvalidSecret,
        Self::NestingLimit,
        Self::WriteOnly,
        Self::InvalidInputData,
    ];

    /// Unqualified Slice name, e.g. `InvalidUserException`.
    pub fn name(self) -> &'static str {
        match self {
            Self::InvalidSession => "InvalidSessionException",
            Self::InvalidChannel => "InvalidChannelException",
            Self::InvalidServer => "InvalidServerException",
            Self::ServerBooted => "ServerBootedException",
            Self::ServerFailure => "ServerFailureException",
            Self::InvalidUser => "InvalidUserException",
            Self::InvalidTexture => "InvalidTextureException",
            Self::InvalidCallback => "InvalidCallbackException",
            Self::InvalidSecret => "InvalidSecretException",
            Self::NestingLimit => "NestingLimitException",
            Self::WriteOnly => "WriteOnlyException",
            Self::InvalidInputData => "InvalidInputDataException",
        }
    }

    /// Resolves a type id such as `::Murmur::InvalidUserException` raised by
    /// servants of `module`.
    pub fn from_type_id(module: &str, type_id: &str) -> Option<Self> {
        let name = type_id
            .strip_prefix("::")?
            .strip_prefix(module)?
            .strip_prefix("::")?;
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Unknown ids or channels the caller referred to.
    pub fn is_not_found(self) -> bool {
        matches!(self, Self::InvalidUser | Self::InvalidChannel)
    }
}

/// Failure of one remote admin call.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Murmur: {}", .0.name())]
    Murmur(MurmurException),
    #[error(transparent)]
    Transport(#[from] IceError),
}

impl RemoteError {
    /// Lifts Slice user exceptions of `module` into [`RemoteError::Murmur`].
    pub(crate) fn from_ice(module: &str, err: IceError) -> Self {
        if let IceError::UserException { type_id } = &err {
            if let Some(kind) = MurmurException::from_type_id(module, type_id) {
                return Self::Murmur(kind);
            }
        }
        Self::Transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_type_ids_for_module() {
        assert_eq!(
            MurmurException::from_type_id("Murmur", "::Murmur::InvalidChannelException"),
            Some(MurmurException::InvalidChannel)
        );
        assert_eq!(
            MurmurException::from_type_id("MumbleServer", "::MumbleServer::InvalidSecretException"),
            Some(MurmurException::InvalidSecret)
        );
        assert_eq!(
            MurmurException::from_type_id("Murmur", "::MumbleServer::InvalidUserException"),
            None
        );
        assert_eq!(
            MurmurException::from_type_id("Murmur", "::Murmur::SomethingNew"),
            None
        );
    }

    #[test]
    fn only_user_and_channel_are_not_found() {
        let not_found: Vec<_> = MurmurException::ALL
            .into_iter()
            .filter(|kind| kind.is_not_found())
            .collect();
        assert_eq!(
            not_found,
            vec![MurmurException::InvalidChannel, MurmurException::InvalidUser]
        );
    }

    #[test]
    fn unrecognized_user_exception_stays_transport_error() {
        let err = RemoteError::from_ice(
            "Murmur",
            IceError::UserException {
                type_id: "::Other::Thing".to_string(),
            },
        );
        assert!(matches!(
            err,
            RemoteError::Transport(IceError::UserException { .. })
        ));
    }
}
