//! Minimal ZeroC Ice client: protocol 1.0 framing and encoding 1.0 data,
//! enough to call the Murmur admin servants over one TCP connection.

mod connection;
pub mod encoding;
mod error;
pub mod protocol;

pub use connection::Connection;
pub use encoding::{DecodeError, Identity, InputStream, OutputStream};
pub use error::IceError;
pub use protocol::{Encapsulation, OperationMode};
