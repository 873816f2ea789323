//! Ice data encoding (version 1.0) for the small set of types the Murmur admin
//! operations exchange: little-endian primitives, compact sizes, strings,
//! sequences, dictionaries, identities and encapsulations.

use thiserror::Error;

/// Encoding version carried in every encapsulation header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingVersion {
    pub major: u8,
    pub minor: u8,
}

pub const ENCODING_1_0: EncodingVersion = EncodingVersion { major: 1, minor: 0 };
pub const ENCODING_1_1: EncodingVersion = EncodingVersion { major: 1, minor: 1 };

/// Size of the encapsulation header: int32 size + major + minor.
const ENCAPSULATION_HEADER: usize = 6;

/// Errors from decoding encoded data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of buffer: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },
    #[error("negative size {0}")]
    NegativeSize(i32),
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("unsupported encoding {major}.{minor}")]
    UnsupportedEncoding { major: u8, minor: u8 },
    #[error("encapsulation size {size} does not fit in {remaining} remaining bytes")]
    BadEncapsulation { size: i32, remaining: usize },
    #[error("exception slice carries no type id (flags {0:#04x})")]
    MissingTypeId(u8),
}

/// Object identity: the `name`/`category` pair addressing a servant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub category: String,
}

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: String::new(),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.category.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}/{}", self.category, self.name)
        }
    }
}

/// Growable buffer for marshaling parameters and messages.
#[derive(Debug, Default, Clone)]
pub struct OutputStream {
    buf: Vec<u8>,
}

impl OutputStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_byte(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_int(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Compact size: one byte below 255, otherwise 255 followed by an int32.
    pub fn write_size(&mut self, size: usize) {
        if size < 255 {
            self.buf.push(size as u8);
        } else {
            self.buf.push(255);
            self.write_int(i32::try_from(size).unwrap_or(i32::MAX));
        }
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_size(value.len());
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub fn write_string_seq(&mut self, values: &[String]) {
        self.write_size(values.len());
        for value in values {
            self.write_string(value);
        }
    }

    pub fn write_int_seq(&mut self, values: &[i32]) {
        self.write_size(values.len());
        for value in values {
            self.write_int(*value);
        }
    }

    pub fn write_identity(&mut self, identity: &Identity) {
        self.write_string(&identity.name);
        self.write_string(&identity.category);
    }

    /// Wraps `body` in an encapsulation tagged with `version`.
    pub fn write_encapsulation(&mut self, version: EncodingVersion, body: &[u8]) {
        let size = body.len() + ENCAPSULATION_HEADER;
        self.write_int(i32::try_from(size).unwrap_or(i32::MAX));
        self.write_byte(version.major);
        self.write_byte(version.minor);
        self.buf.extend_from_slice(body);
    }
}

/// Cursor over an encoded buffer.
#[derive(Debug, Clone)]
pub struct InputStream<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> InputStream<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.remaining();
        if count > remaining {
            return Err(DecodeError::UnexpectedEof {
                needed: count,
                remaining,
            });
        }
        let start = self.pos;
        self.pos += count;
        Ok(&self.buf[start..self.pos])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_byte()? != 0)
    }

    pub fn read_int(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_size(&mut self) -> Result<usize, DecodeError> {
        match self.read_byte()? {
            255 => {
                let size = self.read_int()?;
                usize::try_from(size).map_err(|_| DecodeError::NegativeSize(size))
            }
            small => Ok(usize::from(small)),
        }
    }

    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_size()?;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    pub fn read_string_seq(&mut self) -> Result<Vec<String>, DecodeError> {
        let count = self.read_size()?;
        let mut out = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            out.push(self.read_string()?);
        }
        Ok(out)
    }

    pub fn read_int_seq(&mut self) -> Result<Vec<i32>, DecodeError> {
        let count = self.read_size()?;
        let mut out = Vec::with_capacity(count.min(self.remaining() / 4));
        for _ in 0..count {
            out.push(self.read_int()?);
        }
        Ok(out)
    }

    pub fn read_identity(&mut self) -> Result<Identity, DecodeError> {
        let name = self.read_string()?;
        let category = self.read_string()?;
        Ok(Identity { name, category })
    }

    /// Reads an encapsulation and returns its encoding version and body.
    pub fn read_encapsulation(&mut self) -> Result<(EncodingVersion, &'a [u8]), DecodeError> {
        let size = self.read_int()?;
        let remaining = self.remaining();
        let body_len = usize::try_from(size)
            .ok()
            .and_then(|size| size.checked_sub(ENCAPSULATION_HEADER))
            .filter(|len| len + 2 <= remaining)
            .ok_or(DecodeError::BadEncapsulation { size, remaining })?;
        let major = self.read_byte()?;
        let minor = self.read_byte()?;
        if major != 1 || minor > 1 {
            return Err(DecodeError::UnsupportedEncoding { major, minor });
        }
        let body = self.read_bytes(body_len)?;
        Ok((EncodingVersion { major, minor }, body))
    }
}
