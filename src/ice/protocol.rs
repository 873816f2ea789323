//! Ice protocol 1.0 message framing: the 14-byte header, request bodies and
//! reply decoding.

use super::encoding::{DecodeError, EncodingVersion, Identity, InputStream, OutputStream};
use super::error::IceError;
use std::collections::BTreeMap;
use std::fmt;

pub const MAGIC: [u8; 4] = *b"IceP";
pub const PROTOCOL_MAJOR: u8 = 1;
pub const PROTOCOL_MINOR: u8 = 0;
pub const PROTOCOL_ENCODING_MAJOR: u8 = 1;
pub const PROTOCOL_ENCODING_MINOR: u8 = 0;

/// Header: magic(4) + protocol(2) + encoding(2) + type(1) + compression(1) + size(4).
pub const HEADER_SIZE: usize = 14;

/// Largest message accepted from the peer (Ice's default `MessageSizeMax`).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Wire message type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request,
    BatchRequest,
    Reply,
    ValidateConnection,
    CloseConnection,
}

impl MessageType {
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Request => 0,
            Self::BatchRequest => 1,
            Self::Reply => 2,
            Self::ValidateConnection => 3,
            Self::CloseConnection => 4,
        }
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Request),
            1 => Some(Self::BatchRequest),
            2 => Some(Self::Reply),
            3 => Some(Self::ValidateConnection),
            4 => Some(Self::CloseConnection),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Request => "request",
            Self::BatchRequest => "batch request",
            Self::Reply => "reply",
            Self::ValidateConnection => "validate connection",
            Self::CloseConnection => "close connection",
        };
        f.write_str(label)
    }
}

/// Operation mode sent with each request; the server checks it against the
/// Slice declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    Normal,
    Nonmutating,
    Idempotent,
}

impl OperationMode {
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Nonmutating => 1,
            Self::Idempotent => 2,
        }
    }
}

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_type: MessageType,
    pub compression: u8,
    /// Total message size, header included.
    pub size: usize,
}

impl MessageHeader {
    pub fn encode(message_type: MessageType, body_len: usize) -> [u8; HEADER_SIZE] {
        let mut header = [0u8; HEADER_SIZE];
        header[..4].copy_from_slice(&MAGIC);
        header[4] = PROTOCOL_MAJOR;
        header[5] = PROTOCOL_MINOR;
        header[6] = PROTOCOL_ENCODING_MAJOR;
        header[7] = PROTOCOL_ENCODING_MINOR;
        header[8] = message_type.to_u8();
        header[9] = 0;
        let size = i32::try_from(HEADER_SIZE + body_len).unwrap_or(i32::MAX);
        header[10..].copy_from_slice(&size.to_le_bytes());
        header
    }

    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Result<Self, IceError> {
        if bytes[..4] != MAGIC {
            return Err(IceError::Protocol(format!(
                "bad magic {:02x?}",
                &bytes[..4]
            )));
        }
        if bytes[4] != PROTOCOL_MAJOR {
            return Err(IceError::Protocol(format!(
                "unsupported protocol {}.{}",
                bytes[4], bytes[5]
            )));
        }
        if bytes[6] != PROTOCOL_ENCODING_MAJOR {
            return Err(IceError::Protocol(format!(
                "unsupported protocol encoding {}.{}",
                bytes[6], bytes[7]
            )));
        }
        let message_type = MessageType::from_u8(bytes[8])
            .ok_or_else(|| IceError::Protocol(format!("unknown message type {}", bytes[8])))?;
        let compression = bytes[9];
        if compression == 2 {
            return Err(IceError::Protocol(
                "compressed messages are not supported".to_string(),
            ));
        }
        let raw_size = i32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]);
        let size = usize::try_from(raw_size)
            .ok()
            .filter(|size| (HEADER_SIZE..=MAX_MESSAGE_SIZE).contains(size))
            .ok_or_else(|| IceError::Protocol(format!("invalid message size {raw_size}")))?;
        Ok(Self {
            message_type,
            compression,
            size,
        })
    }

    pub fn body_len(&self) -> usize {
        self.size - HEADER_SIZE
    }
}

/// A two-way request ready to be framed.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub request_id: i32,
    pub identity: &'a Identity,
    pub operation: &'a str,
    pub mode: OperationMode,
    pub context: &'a BTreeMap<String, String>,
    pub encoding: EncodingVersion,
    pub params: &'a [u8],
}

impl Request<'_> {
    /// Encodes header and body into one contiguous frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = OutputStream::new();
        body.write_int(self.request_id);
        body.write_identity(self.identity);
        body.write_string_seq(&[]);
        body.write_string(self.operation);
        body.write_byte(self.mode.to_u8());
        body.write_size(self.context.len());
        for (key, value) in self.context {
            body.write_string(key);
            body.write_string(value);
        }
        body.write_encapsulation(self.encoding, self.params);

        let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
        frame.extend_from_slice(&MessageHeader::encode(MessageType::Request, body.len()));
        frame.extend_from_slice(body.as_bytes());
        frame
    }
}

/// Encapsulated payload from a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encapsulation {
    pub encoding: EncodingVersion,
    pub data: Vec<u8>,
}

impl Encapsulation {
    pub fn stream(&self) -> InputStream<'_> {
        InputStream::new(&self.data)
    }

    /// Type id of the most-derived slice of an encoded user exception.
    pub fn exception_type_id(&self) -> Result<String, DecodeError> {
        let mut input = self.stream();
        if self.encoding.minor == 0 {
            // usesClasses flag precedes the first slice
            input.read_bool()?;
            input.read_string()
        } else {
            let flags = input.read_byte()?;
            if flags & 0x03 != 0x01 {
                return Err(DecodeError::MissingTypeId(flags));
            }
            input.read_string()
        }
    }
}

/// Reply status and whatever body accompanies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    Ok(Encapsulation),
    UserException(Encapsulation),
    ObjectNotExist { identity: Identity, operation: String },
    FacetNotExist { identity: Identity, facet: String, operation: String },
    OperationNotExist { identity: Identity, operation: String },
    UnknownLocalException(String),
    UnknownUserException(String),
    UnknownException(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub request_id: i32,
    pub body: ReplyBody,
}

impl Reply {
    /// Decodes a reply body (the bytes following the header).
    pub fn decode(bytes: &[u8]) -> Result<Self, IceError> {
        let mut input = InputStream::new(bytes);
        let request_id = input.read_int()?;
        let status = input.read_byte()?;
        let body = match status {
            0 | 1 => {
                let (encoding, data) = input.read_encapsulation()?;
                let encapsulation = Encapsulation {
                    encoding,
                    data: data.to_vec(),
                };
                if status == 0 {
                    ReplyBody::Ok(encapsulation)
                } else {
                    ReplyBody::UserException(encapsulation)
                }
            }
            2..=4 => {
                let identity = input.read_identity()?;
                let facet = input.read_string_seq()?.into_iter().next().unwrap_or_default();
                let operation = input.read_string()?;
                match status {
                    2 => ReplyBody::ObjectNotExist {
                        identity,
                        operation,
                    },
                    3 => ReplyBody::FacetNotExist {
                        identity,
                        facet,
                        operation,
                    },
                    _ => ReplyBody::OperationNotExist {
                        identity,
                        operation,
                    },
                }
            }
            5 => ReplyBody::UnknownLocalException(input.read_string()?),
            6 => ReplyBody::UnknownUserException(input.read_string()?),
            7 => ReplyBody::UnknownException(input.read_string()?),
            other => {
                return Err(IceError::Protocol(format!("unknown reply status {other}")));
            }
        };
        Ok(Self { request_id, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ice::encoding::{ENCODING_1_0, ENCODING_1_1};

    #[test]
    fn header_round_trips_type_and_size() {
        let bytes = MessageHeader::encode(MessageType::Reply, 10);
        assert_eq!(&bytes[..4], b"IceP");
        let header = MessageHeader::decode(&bytes).unwrap();
        assert_eq!(header.message_type, MessageType::Reply);
        assert_eq!(header.size, 24);
        assert_eq!(header.body_len(), 10);
    }

    #[test]
    fn header_rejects_bad_magic() {
        let mut bytes = MessageHeader::encode(MessageType::Reply, 0);
        bytes[0] = b'X';
        assert!(matches!(
            MessageHeader::decode(&bytes),
            Err(IceError::Protocol(_))
        ));
    }

    #[test]
    fn header_rejects_oversized_messages() {
        let bytes = MessageHeader::encode(MessageType::Reply, MAX_MESSAGE_SIZE);
        assert!(MessageHeader::decode(&bytes).is_err());
    }

    #[test]
    fn header_rejects_compressed_messages() {
        let mut bytes = MessageHeader::encode(MessageType::Reply, 0);
        bytes[9] = 2;
        assert!(MessageHeader::decode(&bytes).is_err());
    }

    #[test]
    fn request_layout_matches_wire_format() {
        let identity = Identity::new("Meta");
        let mut context = BTreeMap::new();
        context.insert("secret".to_string(), "s3".to_string());
        let request = Request {
            request_id: 7,
            identity: &identity,
            operation: "ice_isA",
            mode: OperationMode::Nonmutating,
            context: &context,
            encoding: ENCODING_1_0,
            params: &[1, b'x'],
        };
        let frame = request.encode();
        let header = MessageHeader::decode(frame[..HEADER_SIZE].try_into().unwrap()).unwrap();
        assert_eq!(header.message_type, MessageType::Request);
        assert_eq!(header.size, frame.len());

        let mut input = InputStream::new(&frame[HEADER_SIZE..]);
        assert_eq!(input.read_int().unwrap(), 7);
        assert_eq!(input.read_identity().unwrap(), identity);
        assert!(input.read_string_seq().unwrap().is_empty());
        assert_eq!(input.read_string().unwrap(), "ice_isA");
        assert_eq!(input.read_byte().unwrap(), 1);
        assert_eq!(input.read_size().unwrap(), 1);
        assert_eq!(input.read_string().unwrap(), "secret");
        assert_eq!(input.read_string().unwrap(), "s3");
        let (version, params) = input.read_encapsulation().unwrap();
        assert_eq!(version, ENCODING_1_0);
        assert_eq!(params, &[1, b'x']);
        assert!(input.is_empty());
    }

    #[test]
    fn decodes_successful_reply() {
        let mut out = OutputStream::new();
        out.write_int(3);
        out.write_byte(0);
        out.write_encapsulation(ENCODING_1_0, &[1]);
        let reply = Reply::decode(out.as_bytes()).unwrap();
        assert_eq!(reply.request_id, 3);
        assert_eq!(
            reply.body,
            ReplyBody::Ok(Encapsulation {
                encoding: ENCODING_1_0,
                data: vec![1],
            })
        );
    }

    #[test]
    fn decodes_object_not_exist_reply() {
        let mut out = OutputStream::new();
        out.write_int(4);
        out.write_byte(2);
        out.write_identity(&Identity::new("s/9"));
        out.write_string_seq(&[]);
        out.write_string("getACL");
        let reply = Reply::decode(out.as_bytes()).unwrap();
        assert_eq!(
            reply.body,
            ReplyBody::ObjectNotExist {
                identity: Identity::new("s/9"),
                operation: "getACL".to_string(),
            }
        );
    }

    #[test]
    fn decodes_unknown_exception_message() {
        let mut out = OutputStream::new();
        out.write_int(5);
        out.write_byte(7);
        out.write_string("boom");
        let reply = Reply::decode(out.as_bytes()).unwrap();
        assert_eq!(reply.body, ReplyBody::UnknownException("boom".to_string()));
    }

    #[test]
    fn rejects_unknown_reply_status() {
        let mut out = OutputStream::new();
        out.write_int(5);
        out.write_byte(42);
        assert!(matches!(
            Reply::decode(out.as_bytes()),
            Err(IceError::Protocol(_))
        ));
    }

    #[test]
    fn user_exception_type_id_reads_both_encodings() {
        let mut legacy = OutputStream::new();
        legacy.write_bool(false);
        legacy.write_string("::Murmur::InvalidUserException");
        legacy.write_int(4);
        let encap = Encapsulation {
            encoding: ENCODING_1_0,
            data: legacy.into_bytes(),
        };
        assert_eq!(
            encap.exception_type_id().unwrap(),
            "::Murmur::InvalidUserException"
        );

        let mut sliced = OutputStream::new();
        sliced.write_byte(0x01 | 0x20);
        sliced.write_string("::Murmur::InvalidChannelException");
        let encap = Encapsulation {
            encoding: ENCODING_1_1,
            data: sliced.into_bytes(),
        };
        assert_eq!(
            encap.exception_type_id().unwrap(),
            "::Murmur::InvalidChannelException"
        );
    }
}
