//! OSC 1.0 messages and packets
//!
//! ## Wire Format
//!
//! ```text
//! Message:  address (padded string) | type tags ",ihfs..." (padded) | arguments
//! Bundle:   "#bundle\0" | timetag (8 bytes) | { size (i32) | element }*
//! ```
//!
//! Every field is big-endian and 4-byte aligned. Strings are NUL terminated
//! and padded with NULs to the next multiple of four.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Marker that opens every bundle
pub const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// Timetag meaning "process immediately"
pub const IMMEDIATE: u64 = 1;

/// Errors during packet parsing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OscError {
    #[error("packet truncated while reading {0}")]
    Truncated(&'static str),
    #[error("address must start with '/', got {0:?}")]
    InvalidAddress(String),
    #[error("type tag string must start with ','")]
    MissingTypeTags,
    #[error("unsupported type tag {0:?}")]
    UnsupportedType(char),
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
    #[error("bundle element size {size} exceeds remaining {remaining} bytes")]
    BadElementSize { size: i32, remaining: usize },
    #[error("argument {index} of {address}: expected {expected}")]
    ArgumentType {
        address: String,
        index: usize,
        expected: &'static str,
    },
    #[error("{address}: expected at least {expected} arguments, got {actual}")]
    MissingArgument {
        address: String,
        expected: usize,
        actual: usize,
    },
}

/// A single typed OSC argument
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Bool(bool),
}

impl OscArg {
    fn tag(&self) -> u8 {
        match self {
            OscArg::Int(_) => b'i',
            OscArg::Long(_) => b'h',
            OscArg::Float(_) => b'f',
            OscArg::Double(_) => b'd',
            OscArg::Str(_) => b's',
            OscArg::Bool(true) => b'T',
            OscArg::Bool(false) => b'F',
        }
    }

    fn payload_len(&self) -> usize {
        match self {
            OscArg::Int(_) | OscArg::Float(_) => 4,
            OscArg::Long(_) | OscArg::Double(_) => 8,
            OscArg::Str(s) => padded_len(s.len()),
            OscArg::Bool(_) => 0,
        }
    }

    fn write(&self, buf: &mut BytesMut) {
        match self {
            OscArg::Int(v) => buf.put_i32(*v),
            OscArg::Long(v) => buf.put_i64(*v),
            OscArg::Float(v) => buf.put_f32(*v),
            OscArg::Double(v) => buf.put_f64(*v),
            OscArg::Str(s) => put_padded_str(buf, s),
            OscArg::Bool(_) => {}
        }
    }
}

impl From<i32> for OscArg {
    fn from(v: i32) -> Self {
        OscArg::Int(v)
    }
}

impl From<i64> for OscArg {
    fn from(v: i64) -> Self {
        OscArg::Long(v)
    }
}

impl From<f32> for OscArg {
    fn from(v: f32) -> Self {
        OscArg::Float(v)
    }
}

impl From<bool> for OscArg {
    fn from(v: bool) -> Self {
        OscArg::Bool(v)
    }
}

impl From<&str> for OscArg {
    fn from(v: &str) -> Self {
        OscArg::Str(v.to_string())
    }
}

impl From<String> for OscArg {
    fn from(v: String) -> Self {
        OscArg::Str(v)
    }
}

/// An address-tagged OSC message
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument (builder style)
    pub fn arg(mut self, arg: impl Into<OscArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append an argument in place
    pub fn push(&mut self, arg: impl Into<OscArg>) {
        self.args.push(arg.into());
    }

    /// Exact encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        padded_len(self.address.len())
            + padded_len(self.args.len() + 1)
            + self.args.iter().map(OscArg::payload_len).sum::<usize>()
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write(&mut buf);
        buf.freeze()
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        put_padded_str(buf, &self.address);

        let mut tags = String::with_capacity(self.args.len() + 1);
        tags.push(',');
        for arg in &self.args {
            tags.push(arg.tag() as char);
        }
        put_padded_str(buf, &tags);

        for arg in &self.args {
            arg.write(buf);
        }
    }

    /// Decode a bare message
    pub fn decode(data: &[u8]) -> Result<Self, OscError> {
        let mut cursor = data;
        let address = read_padded_str(&mut cursor, "address")?;
        if !address.starts_with('/') {
            return Err(OscError::InvalidAddress(address));
        }

        // Messages without a type tag string are legal in OSC 1.0 and carry no args
        if cursor.is_empty() {
            return Ok(Self {
                address,
                args: Vec::new(),
            });
        }

        let tags = read_padded_str(&mut cursor, "type tags")?;
        let tags = tags.strip_prefix(',').ok_or(OscError::MissingTypeTags)?;

        let mut args = Vec::with_capacity(tags.len());
        for tag in tags.chars() {
            let arg = match tag {
                'i' => OscArg::Int(read_i32(&mut cursor)?),
                'h' => {
                    ensure(&cursor, 8, "int64")?;
                    OscArg::Long(cursor.get_i64())
                }
                'f' => {
                    ensure(&cursor, 4, "float32")?;
                    OscArg::Float(cursor.get_f32())
                }
                'd' => {
                    ensure(&cursor, 8, "float64")?;
                    OscArg::Double(cursor.get_f64())
                }
                's' => OscArg::Str(read_padded_str(&mut cursor, "string argument")?),
                'T' => OscArg::Bool(true),
                'F' => OscArg::Bool(false),
                other => return Err(OscError::UnsupportedType(other)),
            };
            args.push(arg);
        }

        Ok(Self { address, args })
    }

    fn require(&self, index: usize) -> Result<&OscArg, OscError> {
        self.args.get(index).ok_or_else(|| OscError::MissingArgument {
            address: self.address.clone(),
            expected: index + 1,
            actual: self.args.len(),
        })
    }

    fn type_error(&self, index: usize, expected: &'static str) -> OscError {
        OscError::ArgumentType {
            address: self.address.clone(),
            index,
            expected,
        }
    }

    /// 64-bit integer argument; 32-bit integers are widened.
    pub fn arg_i64(&self, index: usize) -> Result<i64, OscError> {
        match self.require(index)? {
            OscArg::Long(v) => Ok(*v),
            OscArg::Int(v) => Ok(i64::from(*v)),
            _ => Err(self.type_error(index, "int64")),
        }
    }

    /// 32-bit integer argument; 64-bit integers are accepted when they fit.
    pub fn arg_i32(&self, index: usize) -> Result<i32, OscError> {
        match self.require(index)? {
            OscArg::Int(v) => Ok(*v),
            OscArg::Long(v) => i32::try_from(*v).map_err(|_| self.type_error(index, "int32")),
            _ => Err(self.type_error(index, "int32")),
        }
    }

    /// Float argument; doubles are narrowed and integers converted.
    pub fn arg_f32(&self, index: usize) -> Result<f32, OscError> {
        match self.require(index)? {
            OscArg::Float(v) => Ok(*v),
            OscArg::Double(v) => Ok(*v as f32),
            OscArg::Int(v) => Ok(*v as f32),
            _ => Err(self.type_error(index, "float32")),
        }
    }

    pub fn arg_str(&self, index: usize) -> Result<&str, OscError> {
        match self.require(index)? {
            OscArg::Str(v) => Ok(v),
            _ => Err(self.type_error(index, "string")),
        }
    }

    /// Boolean argument; integers are truthy when non-zero.
    pub fn arg_bool(&self, index: usize) -> Result<bool, OscError> {
        match self.require(index)? {
            OscArg::Bool(v) => Ok(*v),
            OscArg::Int(v) => Ok(*v != 0),
            _ => Err(self.type_error(index, "bool")),
        }
    }
}

/// A decoded datagram: one message or a (possibly nested) bundle
#[derive(Debug, Clone, PartialEq)]
pub enum OscPacket {
    Message(OscMessage),
    Bundle {
        timetag: u64,
        content: Vec<OscPacket>,
    },
}

impl OscPacket {
    pub fn decode(data: &[u8]) -> Result<Self, OscError> {
        if data.starts_with(BUNDLE_TAG) {
            let mut cursor = &data[BUNDLE_TAG.len()..];
            ensure(&cursor, 8, "timetag")?;
            let timetag = cursor.get_u64();

            let mut content = Vec::new();
            while !cursor.is_empty() {
                let size = read_i32(&mut cursor)?;
                if size < 0 || size as usize > cursor.len() {
                    return Err(OscError::BadElementSize {
                        size,
                        remaining: cursor.len(),
                    });
                }
                let (element, rest) = cursor.split_at(size as usize);
                content.push(OscPacket::decode(element)?);
                cursor = rest;
            }

            Ok(OscPacket::Bundle { timetag, content })
        } else {
            OscMessage::decode(data).map(OscPacket::Message)
        }
    }

    /// Flatten nested bundles into their messages, in order
    pub fn into_messages(self) -> Vec<OscMessage> {
        let mut out = Vec::new();
        self.collect_messages(&mut out);
        out
    }

    fn collect_messages(self, out: &mut Vec<OscMessage>) {
        match self {
            OscPacket::Message(msg) => out.push(msg),
            OscPacket::Bundle { content, .. } => {
                for packet in content {
                    packet.collect_messages(out);
                }
            }
        }
    }
}

/// Length of a string once NUL terminated and padded to 4 bytes
pub fn padded_len(len: usize) -> usize {
    (len + 4) & !3
}

fn put_padded_str(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    let pad = padded_len(s.len()) - s.len();
    buf.put_bytes(0, pad);
}

fn ensure(cursor: &&[u8], needed: usize, what: &'static str) -> Result<(), OscError> {
    if cursor.remaining() < needed {
        Err(OscError::Truncated(what))
    } else {
        Ok(())
    }
}

fn read_i32(cursor: &mut &[u8]) -> Result<i32, OscError> {
    ensure(cursor, 4, "int32")?;
    Ok(cursor.get_i32())
}

fn read_padded_str(cursor: &mut &[u8], what: &'static str) -> Result<String, OscError> {
    let nul = cursor
        .iter()
        .position(|b| *b == 0)
        .ok_or(OscError::Truncated(what))?;
    let s = std::str::from_utf8(&cursor[..nul])
        .map_err(|_| OscError::InvalidUtf8(what))?
        .to_string();
    let consumed = padded_len(nul);
    ensure(cursor, consumed, what)?;
    cursor.advance(consumed);
    Ok(s)
}
