//! In-process stand-in for a Murmur ICE endpoint. Speaks just enough of the
//! Ice protocol to answer the bridge, and records every request it sees.

#![allow(dead_code)]

use murmur_ice_bridge::ice::encoding::ENCODING_1_0;
use murmur_ice_bridge::ice::protocol::{MessageHeader, MessageType, HEADER_SIZE};
use murmur_ice_bridge::ice::{Identity, InputStream, OutputStream};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

/// How the fake answers.
#[derive(Debug, Clone)]
pub struct Behavior {
    pub is_meta: bool,
    /// `None` answers `getServer` with a null proxy.
    pub server: Option<Identity>,
    pub users: Vec<(i32, String)>,
    pub registered_id: i32,
    /// User exception raised by `getACL`, e.g. `::Murmur::InvalidChannelException`.
    pub acl_exception: Option<String>,
    /// Drop the first connection after this many requests, then serve a
    /// second one normally.
    pub disconnect: Option<Disconnect>,
}

#[derive(Debug, Clone, Copy)]
pub struct Disconnect {
    pub after_requests: usize,
    /// Send CloseConnection and wait for the client to hang up, rather than
    /// just dropping the socket.
    pub graceful: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            is_meta: true,
            server: Some(Identity {
                name: "1".to_string(),
                category: "s".to_string(),
            }),
            users: vec![(7, "alice".to_string())],
            registered_id: 42,
            acl_exception: Some("::Murmur::InvalidChannelException".to_string()),
            disconnect: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub identity: Identity,
    pub operation: String,
    pub mode: u8,
    pub context: BTreeMap<String, String>,
    pub params: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct Recording {
    /// Requests the fake answered, across all connections.
    pub requests: Vec<RecordedRequest>,
    /// Whether the client ended the last connection with CloseConnection.
    pub closed_gracefully: bool,
    pub connections: usize,
}

impl Recording {
    pub fn operations(&self) -> Vec<&str> {
        self.requests.iter().map(|r| r.operation.as_str()).collect()
    }

    pub fn find(&self, operation: &str) -> Option<&RecordedRequest> {
        self.requests.iter().find(|r| r.operation == operation)
    }
}

pub struct FakeMurmur {
    pub port: u16,
    handle: JoinHandle<Recording>,
}

impl FakeMurmur {
    /// Serves one connection on a loopback port, or two when the behavior
    /// drops the first.
    pub fn spawn(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake murmur");
        let port = listener.local_addr().expect("local addr").port();
        let handle = thread::spawn(move || {
            let mut recording = Recording::default();
            let (stream, _) = listener.accept().expect("accept bridge connection");
            recording.connections += 1;
            let dropped = serve(stream, &behavior, behavior.disconnect, &mut recording);
            if dropped {
                let (stream, _) = listener.accept().expect("accept reconnection");
                recording.connections += 1;
                serve(stream, &behavior, None, &mut recording);
            }
            recording
        });
        Self { port, handle }
    }

    /// Waits for the connection to end and returns what was seen.
    pub fn finish(self) -> Recording {
        self.handle.join().expect("fake murmur thread panicked")
    }
}

/// A loopback port with nothing listening on it.
pub fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe");
    listener.local_addr().expect("local addr").port()
}

/// Serves one connection. Returns true when the fake dropped it on purpose.
fn serve(
    mut stream: TcpStream,
    behavior: &Behavior,
    disconnect: Option<Disconnect>,
    recording: &mut Recording,
) -> bool {
    recording.closed_gracefully = false;
    stream
        .write_all(&MessageHeader::encode(MessageType::ValidateConnection, 0))
        .expect("send validate");

    let mut answered = 0;
    loop {
        if let Some(disconnect) = disconnect.filter(|d| d.after_requests == answered) {
            if disconnect.graceful {
                stream
                    .write_all(&MessageHeader::encode(MessageType::CloseConnection, 0))
                    .expect("send close");
                // requests arriving after the close are never dispatched
                while read_frame(&mut stream).is_some() {}
            }
            return true;
        }

        let Some((message_type, body)) = read_frame(&mut stream) else {
            break;
        };
        match message_type {
            MessageType::CloseConnection => {
                recording.closed_gracefully = true;
                break;
            }
            MessageType::Request => {
                let (request_id, request) = parse_request(&body);
                let reply = answer(request_id, &request, behavior);
                recording.requests.push(request);
                answered += 1;
                let mut frame = MessageHeader::encode(MessageType::Reply, reply.len()).to_vec();
                frame.extend_from_slice(&reply);
                stream.write_all(&frame).expect("send reply");
            }
            other => panic!("unexpected {other} from bridge"),
        }
    }
    false
}

fn read_frame(stream: &mut TcpStream) -> Option<(MessageType, Vec<u8>)> {
    let mut header = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header).ok()?;
    let header = MessageHeader::decode(&header).expect("valid header from bridge");
    let mut body = vec![0u8; header.body_len()];
    stream.read_exact(&mut body).ok()?;
    Some((header.message_type, body))
}

fn parse_request(body: &[u8]) -> (i32, RecordedRequest) {
    let mut input = InputStream::new(body);
    let request_id = input.read_int().unwrap();
    let identity = input.read_identity().unwrap();
    let facet = input.read_string_seq().unwrap();
    assert!(facet.is_empty(), "bridge never targets facets");
    let operation = input.read_string().unwrap();
    let mode = input.read_byte().unwrap();
    let mut context = BTreeMap::new();
    for _ in 0..input.read_size().unwrap() {
        let key = input.read_string().unwrap();
        let value = input.read_string().unwrap();
        context.insert(key, value);
    }
    let (_, params) = input.read_encapsulation().unwrap();
    assert!(input.is_empty());
    (
        request_id,
        RecordedRequest {
            identity,
            operation,
            mode,
            context,
            params: params.to_vec(),
        },
    )
}

fn answer(request_id: i32, request: &RecordedRequest, behavior: &Behavior) -> Vec<u8> {
    let mut payload = OutputStream::new();
    let mut status = 0u8;
    match request.operation.as_str() {
        "ice_isA" => payload.write_bool(behavior.is_meta),
        "getServer" => match &behavior.server {
            Some(identity) => {
                payload.write_identity(identity);
                payload.write_string_seq(&[]);
                payload.write_byte(0);
                payload.write_bool(false);
                payload.write_size(0);
                payload.write_string("");
            }
            None => payload.write_identity(&Identity::default()),
        },
        "getRegisteredUsers" => {
            payload.write_size(behavior.users.len());
            for (id, name) in &behavior.users {
                payload.write_int(*id);
                payload.write_string(name);
            }
        }
        "registerUser" => payload.write_int(behavior.registered_id),
        "unregisterUser" | "updateRegistration" | "setACL" => {}
        "getACL" => match &behavior.acl_exception {
            Some(type_id) => {
                status = 1;
                payload.write_bool(false);
                payload.write_string(type_id);
                payload.write_int(4);
            }
            None => {
                payload.write_size(0);
                payload.write_size(0);
                payload.write_bool(true);
            }
        },
        _ => {
            let mut reply = OutputStream::new();
            reply.write_int(request_id);
            reply.write_byte(4);
            reply.write_identity(&request.identity);
            reply.write_string_seq(&[]);
            reply.write_string(&request.operation);
            return reply.into_bytes();
        }
    }

    let mut reply = OutputStream::new();
    reply.write_int(request_id);
    reply.write_byte(status);
    reply.write_encapsulation(ENCODING_1_0, payload.as_bytes());
    reply.into_bytes()
}
