//! Authenticated session against one Murmur virtual server.

use super::error::RemoteError;
use super::types::{
    read_acl_snapshot, read_name_map, read_user_info_map, write_acl_list, write_group_list,
    write_user_info_map, AclEntry, AclSnapshot, Group, NameMap, UserInfoMap,
};
use super::AdminServer;
use crate::ice::{Connection, Encapsulation, IceError, Identity, OperationMode, OutputStream};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ICE_PORT: u16 = 6502;

/// Context key the server reads the write secret from.
const SECRET_CONTEXT_KEY: &str = "secret";

/// Everything needed to open a session.
#[derive(Clone)]
pub struct SessionSettings {
    pub host: String,
    pub port: u16,
    /// Empty means no secret is sent.
    pub secret: String,
    pub server_id: i32,
    /// Slice module the servants are declared in (`Murmur` or `MumbleServer`).
    pub module: String,
    pub connect_timeout: Option<Duration>,
}

impl fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret", &if self.secret.is_empty() { "" } else { "<redacted>" })
            .field("server_id", &self.server_id)
            .field("module", &self.module)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Fatal failures while opening the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Connect(IceError),
    #[error("Cannot cast ICE proxy to {module}.Meta - wrong host/port?")]
    NotMeta { module: String },
    #[error("getServer({server_id}) returned null - is virtual server {server_id} running?")]
    ServerNotRunning { server_id: i32 },
    #[error("{operation} failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: RemoteError,
    },
}

/// Open connection plus the resolved server servant.
///
/// A connection lost mid-session is reopened on the next call, with the
/// secret restored and the server proxy resolved again. Dropping the session
/// closes the connection.
pub struct RemoteSession {
    connection: Connection,
    settings: SessionSettings,
    server: Identity,
}

impl RemoteSession {
    pub fn establish(settings: &SessionSettings) -> Result<Self, SessionError> {
        let mut connection = open_connection(settings).map_err(SessionError::Connect)?;

        let meta_type_id = format!("::{}::Meta", settings.module);
        let is_meta = check_type(&mut connection, &meta_identity(), &meta_type_id).map_err(
            |source| SessionError::Remote {
                operation: "ice_isA",
                source: RemoteError::from_ice(&settings.module, source),
            },
        )?;
        if !is_meta {
            return Err(SessionError::NotMeta {
                module: settings.module.clone(),
            });
        }

        let server = resolve_server(&mut connection, settings).map_err(|source| {
            SessionError::Remote {
                operation: "getServer",
                source,
            }
        })?;
        let Some(server) = server else {
            return Err(SessionError::ServerNotRunning {
                server_id: settings.server_id,
            });
        };

        tracing::info!(
            endpoint = connection.endpoint(),
            server = %server,
            server_id = settings.server_id,
            "murmur session established"
        );
        Ok(Self {
            connection,
            settings: settings.clone(),
            server,
        })
    }

    pub fn server_id(&self) -> i32 {
        self.settings.server_id
    }

    /// Releases the connection. Dropping the session does the same.
    pub fn close(mut self) -> Result<(), IceError> {
        self.connection.close()
    }

    /// Replaces a lost connection. The server must still be running.
    fn reconnect(&mut self) -> Result<(), RemoteError> {
        tracing::info!(
            endpoint = self.connection.endpoint(),
            "ice connection lost; reconnecting"
        );
        let mut connection = open_connection(&self.settings)?;
        let server = resolve_server(&mut connection, &self.settings)?.ok_or_else(|| {
            IceError::Protocol(format!(
                "getServer({}) returned null after reconnect",
                self.settings.server_id
            ))
        })?;
        self.connection = connection;
        self.server = server;
        Ok(())
    }

    fn call(
        &mut self,
        operation: &str,
        mode: OperationMode,
        params: OutputStream,
    ) -> Result<Encapsulation, RemoteError> {
        if self.connection.is_closed() {
            self.reconnect()?;
        }
        tracing::debug!(operation, server = %self.server, "invoking remote procedure");
        let result = self
            .connection
            .invoke(&self.server, operation, mode, params.as_bytes());
        let result = match result {
            Err(err) if err.is_retryable(mode) => {
                tracing::warn!(operation, error = %err, "retrying on a new connection");
                self.reconnect()?;
                self.connection
                    .invoke(&self.server, operation, mode, params.as_bytes())
            }
            other => other,
        };
        result.map_err(|err| RemoteError::from_ice(&self.settings.module, err))
    }
}

fn meta_identity() -> Identity {
    Identity::new("Meta")
}

fn open_connection(settings: &SessionSettings) -> Result<Connection, IceError> {
    let mut connection =
        Connection::connect(&settings.host, settings.port, settings.connect_timeout)?;
    if !settings.secret.is_empty() {
        connection.put_implicit_context(SECRET_CONTEXT_KEY, &settings.secret);
    }
    Ok(connection)
}

fn check_type(
    connection: &mut Connection,
    identity: &Identity,
    type_id: &str,
) -> Result<bool, IceError> {
    let mut params = OutputStream::new();
    params.write_string(type_id);
    let reply = connection.invoke(identity, "ice_isA", OperationMode::Nonmutating, params.as_bytes())?;
    Ok(reply.stream().read_bool()?)
}

/// Asks `Meta` for the configured virtual server; `None` when it is not
/// running.
fn resolve_server(
    connection: &mut Connection,
    settings: &SessionSettings,
) -> Result<Option<Identity>, RemoteError> {
    let mut params = OutputStream::new();
    params.write_int(settings.server_id);
    let reply = connection
        .invoke(&meta_identity(), "getServer", OperationMode::Idempotent, params.as_bytes())
        .map_err(|err| RemoteError::from_ice(&settings.module, err))?;
    Ok(read_proxy_identity(&reply)?)
}

/// Reads a proxy return value; `None` for a null proxy. Only the identity is
/// needed since calls go over the existing connection.
fn read_proxy_identity(reply: &Encapsulation) -> Result<Option<Identity>, IceError> {
    let identity = reply.stream().read_identity()?;
    if identity.name.is_empty() {
        Ok(None)
    } else {
        Ok(Some(identity))
    }
}

impl AdminServer for RemoteSession {
    fn register_user(&mut self, info: &UserInfoMap) -> Result<i32, RemoteError> {
        let mut params = OutputStream::new();
        write_user_info_map(&mut params, info);
        let reply = self.call("registerUser", OperationMode::Normal, params)?;
        Ok(reply.stream().read_int().map_err(IceError::from)?)
    }

    fn unregister_user(&mut self, user_id: i32) -> Result<(), RemoteError> {
        let mut params = OutputStream::new();
        params.write_int(user_id);
        self.call("unregisterUser", OperationMode::Normal, params)?;
        Ok(())
    }

    fn update_registration(
        &mut self,
        user_id: i32,
        info: &UserInfoMap,
    ) -> Result<(), RemoteError> {
        let mut params = OutputStream::new();
        params.write_int(user_id);
        write_user_info_map(&mut params, info);
        self.call("updateRegistration", OperationMode::Normal, params)?;
        Ok(())
    }

    fn get_registered_users(&mut self, filter: &str) -> Result<NameMap, RemoteError> {
        let mut params = OutputStream::new();
        params.write_string(filter);
        let reply = self.call("getRegisteredUsers", OperationMode::Idempotent, params)?;
        Ok(read_name_map(&mut reply.stream()).map_err(IceError::from)?)
    }

    fn set_acl(
        &mut self,
        channel_id: i32,
        acls: &[AclEntry],
        groups: &[Group],
        inherit: bool,
    ) -> Result<(), RemoteError> {
        let mut params = OutputStream::new();
        params.write_int(channel_id);
        write_acl_list(&mut params, acls);
        write_group_list(&mut params, groups);
        params.write_bool(inherit);
        self.call("setACL", OperationMode::Normal, params)?;
        Ok(())
    }

    fn get_acl(&mut self, channel_id: i32) -> Result<AclSnapshot, RemoteError> {
        let mut params = OutputStream::new();
        params.write_int(channel_id);
        let reply = self.call("getACL", OperationMode::Idempotent, params)?;
        Ok(read_acl_snapshot(&mut reply.stream()).map_err(IceError::from)?)
    }

    fn get_registration(&mut self, user_id: i32) -> Result<UserInfoMap, RemoteError> {
        let mut params = OutputStream::new();
        params.write_int(user_id);
        let reply = self.call("getRegistration", OperationMode::Idempotent, params)?;
        Ok(read_user_info_map(&mut reply.stream()).map_err(IceError::from)?)
    }
}
