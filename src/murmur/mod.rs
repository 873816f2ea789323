//! Murmur admin API: the collaborator seam used by the request dispatcher
//! and the Ice-backed session that implements it.

mod error;
mod session;
mod types;

pub use error::{MurmurException, RemoteError};
pub use session::{RemoteSession, SessionError, SessionSettings, DEFAULT_ICE_PORT};
pub use types::{AclEntry, AclSnapshot, Group, NameMap, UserInfoField, UserInfoMap};

/// Remote procedures of one virtual server that the bridge exposes.
pub trait AdminServer {
    fn register_user(&mut self, info: &UserInfoMap) -> Result<i32, RemoteError>;

    fn unregister_user(&mut self, user_id: i32) -> Result<(), RemoteError>;

    fn update_registration(&mut self, user_id: i32, info: &UserInfoMap)
        -> Result<(), RemoteError>;

    fn get_registered_users(&mut self, filter: &str) -> Result<NameMap, RemoteError>;

    /// Replaces the channel's ACL; `acls` order is kept on the wire.
    fn set_acl(
        &mut self,
        channel_id: i32,
        acls: &[AclEntry],
        groups: &[Group],
        inherit: bool,
    ) -> Result<(), RemoteError>;

    fn get_acl(&mut self, channel_id: i32) -> Result<AclSnapshot, RemoteError>;

    fn get_registration(&mut self, user_id: i32) -> Result<UserInfoMap, RemoteError>;
}
