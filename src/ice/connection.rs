//! Blocking two-way Ice connection over TCP.
//!
//! One request is in flight at a time: `invoke` writes a request and reads
//! until the matching reply arrives. Heartbeat validation messages from the
//! server are skipped. The connection is closed exactly once, either through
//! [`Connection::close`] or on drop. Once the server closes it, or the byte
//! stream can no longer be trusted, the connection is marked lost and every
//! later `invoke` fails fast; the owner is expected to open a new one.

use super::encoding::{Identity, ENCODING_1_0};
use super::error::IceError;
use super::protocol::{
    Encapsulation, MessageHeader, MessageType, OperationMode, Reply, ReplyBody, Request,
    HEADER_SIZE,
};
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

pub struct Connection {
    stream: TcpStream,
    endpoint: String,
    next_request_id: i32,
    implicit_context: BTreeMap<String, String>,
    closed: bool,
}

impl Connection {
    /// Connects to `tcp -h <host> -p <port>` and waits for the server's
    /// connection validation message.
    pub fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<Self, IceError> {
        let endpoint = format!("tcp -h {host} -p {port}");
        let stream = open_stream(host, port, timeout).map_err(|source| IceError::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;
        let _ = stream.set_nodelay(true);

        let mut connection = Self {
            stream,
            endpoint,
            next_request_id: 1,
            implicit_context: BTreeMap::new(),
            closed: false,
        };
        if let Some(timeout) = timeout {
            connection.stream.set_read_timeout(Some(timeout))?;
        }
        let (header, _) = connection.read_message()?;
        if header.message_type != MessageType::ValidateConnection {
            return Err(IceError::Protocol(format!(
                "expected validate connection, got {}",
                header.message_type
            )));
        }
        // remote calls themselves are not bounded
        connection.stream.set_read_timeout(None)?;
        tracing::debug!(endpoint = %connection.endpoint, "ice connection validated");
        Ok(connection)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sets a key sent in the context of every subsequent request.
    pub fn put_implicit_context(&mut self, key: &str, value: &str) {
        self.implicit_context
            .insert(key.to_string(), value.to_string());
    }

    /// Sends one two-way request and returns the successful reply payload.
    pub fn invoke(
        &mut self,
        identity: &Identity,
        operation: &str,
        mode: OperationMode,
        params: &[u8],
    ) -> Result<Encapsulation, IceError> {
        if self.closed {
            return Err(IceError::ConnectionClosed);
        }
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.checked_add(1).unwrap_or(1);

        let frame = Request {
            request_id,
            identity,
            operation,
            mode,
            context: &self.implicit_context,
            encoding: ENCODING_1_0,
            params,
        }
        .encode();
        if let Err(err) = self.stream.write_all(&frame).and_then(|()| self.stream.flush()) {
            self.mark_lost();
            return Err(IceError::SendFailed(err));
        }

        loop {
            let (header, body) = self.read_message()?;
            match header.message_type {
                MessageType::Reply => {
                    let reply = Reply::decode(&body)?;
                    if reply.request_id != request_id {
                        tracing::debug!(
                            expected = request_id,
                            got = reply.request_id,
                            "discarding stale reply"
                        );
                        continue;
                    }
                    return reply_result(reply.body);
                }
                MessageType::ValidateConnection => continue,
                MessageType::CloseConnection => {
                    tracing::debug!(endpoint = %self.endpoint, "server closed the connection");
                    self.mark_lost();
                    return Err(IceError::ConnectionClosed);
                }
                other => {
                    self.mark_lost();
                    return Err(IceError::Protocol(format!(
                        "unexpected {other} message from server"
                    )));
                }
            }
        }
    }

    /// Sends a graceful close and shuts the socket down. Safe to call more
    /// than once; only the first call touches the socket.
    pub fn close(&mut self) -> Result<(), IceError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let header = MessageHeader::encode(MessageType::CloseConnection, 0);
        let sent = self
            .stream
            .write_all(&header)
            .and_then(|()| self.stream.flush());
        let _ = self.stream.shutdown(Shutdown::Both);
        tracing::debug!(endpoint = %self.endpoint, "ice connection closed");
        sent.map_err(IceError::from)
    }

    /// True once closed locally or lost; no further requests can be sent.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Gives up on the socket without the close handshake.
    fn mark_lost(&mut self) {
        self.closed = true;
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    /// Reads one whole message. Any failure leaves the stream at an unknown
    /// offset, so the connection is marked lost.
    fn read_message(&mut self) -> Result<(MessageHeader, Vec<u8>), IceError> {
        let result = self.read_frame();
        if result.is_err() {
            self.mark_lost();
        }
        result
    }

    fn read_frame(&mut self) -> Result<(MessageHeader, Vec<u8>), IceError> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        self.stream
            .read_exact(&mut header_bytes)
            .map_err(peer_hangup)?;
        let header = MessageHeader::decode(&header_bytes)?;
        let mut body = vec![0u8; header.body_len()];
        self.stream.read_exact(&mut body).map_err(peer_hangup)?;
        Ok((header, body))
    }
}

fn peer_hangup(err: io::Error) -> IceError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        IceError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "server hung up without closing the connection",
        ))
    } else {
        IceError::Io(err)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn open_stream(host: &str, port: u16, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let Some(timeout) = timeout else {
        return TcpStream::connect((host, port));
    };
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{host} did not resolve to any address"),
        )
    }))
}

fn reply_result(body: ReplyBody) -> Result<Encapsulation, IceError> {
    match body {
        ReplyBody::Ok(encapsulation) => Ok(encapsulation),
        ReplyBody::UserException(encapsulation) => Err(IceError::UserException {
            type_id: encapsulation.exception_type_id()?,
        }),
        ReplyBody::ObjectNotExist {
            identity,
            operation,
        } => Err(IceError::ObjectNotExist {
            identity,
            operation,
        }),
        ReplyBody::FacetNotExist {
            identity,
            facet,
            operation,
        } => Err(IceError::FacetNotExist {
            identity,
            facet,
            operation,
        }),
        ReplyBody::OperationNotExist {
            identity,
            operation,
        } => Err(IceError::OperationNotExist {
            identity,
            operation,
        }),
        ReplyBody::UnknownLocalException(message) => Err(IceError::UnknownLocal(message)),
        ReplyBody::UnknownUserException(message) => Err(IceError::UnknownUser(message)),
        ReplyBody::UnknownException(message) => Err(IceError::Unknown(message)),
    }
}
