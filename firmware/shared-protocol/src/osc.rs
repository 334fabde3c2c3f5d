//! OSC 1.0 message encoding and decoding.
//!
//! Packet format (one message per datagram):
//! - ADDRESS: `/`-prefixed string, NUL-terminated, zero-padded to 4 bytes
//! - TYPE TAGS: `,` followed by one tag per argument, padded the same way
//! - ARGUMENTS: big-endian `i` (int32) and `f` (float32), padded `s` strings;
//!   `T`, `F`, `N` and `I` carry no payload
//!
//! Bundles and blob/64-bit arguments are not supported.

use heapless::{String, Vec};

/// Maximum address length in bytes (without terminator).
pub const MAX_ADDRESS_LEN: usize = 64;

/// Maximum number of arguments carried by one message.
pub const MAX_ARGS: usize = 8;

/// Maximum length of a string argument in bytes.
pub const MAX_STRING_LEN: usize = 64;

/// Largest datagram the codec will produce.
pub const MAX_PACKET_SIZE: usize = 512;

const BUNDLE_TAG: &[u8] = b"#bundle";

/// Errors from OSC encoding or decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscError {
    /// Input ended before the message was complete.
    Truncated,
    /// A string was not NUL-terminated.
    MissingTerminator,
    /// Padding after a string was not zero.
    BadPadding,
    /// A string was not valid UTF-8.
    InvalidUtf8,
    /// Address does not start with `/`.
    InvalidAddress,
    /// Type-tag string does not start with `,`.
    MissingTypeTags,
    /// Argument type tag the codec does not handle.
    UnsupportedType(char),
    /// Packet is an OSC bundle.
    Bundle,
    /// Address, string or argument list exceeds its fixed capacity.
    CapacityExceeded,
    /// Output buffer too small for encoding.
    BufferTooSmall,
}

impl core::fmt::Display for OscError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Truncated => write!(f, "packet truncated"),
            Self::MissingTerminator => write!(f, "string not terminated"),
            Self::BadPadding => write!(f, "non-zero string padding"),
            Self::InvalidUtf8 => write!(f, "string is not UTF-8"),
            Self::InvalidAddress => write!(f, "address must start with '/'"),
            Self::MissingTypeTags => write!(f, "type tags must start with ','"),
            Self::UnsupportedType(tag) => write!(f, "unsupported type tag '{}'", tag),
            Self::Bundle => write!(f, "bundles are not supported"),
            Self::CapacityExceeded => write!(f, "message exceeds capacity"),
            Self::BufferTooSmall => write!(f, "output buffer too small"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for OscError {}

/// A single OSC argument.
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String<MAX_STRING_LEN>),
    True,
    False,
    Nil,
    Impulse,
}

impl OscArg {
    /// Type tag character for this argument.
    pub fn tag(&self) -> char {
        match self {
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::Str(_) => 's',
            OscArg::True => 'T',
            OscArg::False => 'F',
            OscArg::Nil => 'N',
            OscArg::Impulse => 'I',
        }
    }

    /// Build a string argument, failing if it exceeds [`MAX_STRING_LEN`].
    pub fn string(s: &str) -> Result<Self, OscError> {
        let mut out = String::new();
        out.push_str(s).map_err(|_| OscError::CapacityExceeded)?;
        Ok(OscArg::Str(out))
    }
}

/// An OSC message: address plus ordered arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    address: String<MAX_ADDRESS_LEN>,
    args: Vec<OscArg, MAX_ARGS>,
}

impl OscMessage {
    /// Create a message with no arguments.
    pub fn new(address: &str) -> Result<Self, OscError> {
        if !address.starts_with('/') {
            return Err(OscError::InvalidAddress);
        }
        let mut addr = String::new();
        addr.push_str(address)
            .map_err(|_| OscError::CapacityExceeded)?;
        Ok(Self {
            address: addr,
            args: Vec::new(),
        })
    }

    /// Append an argument.
    pub fn push(&mut self, arg: OscArg) -> Result<(), OscError> {
        self.args.push(arg).map_err(|_| OscError::CapacityExceeded)
    }

    /// Builder form of [`push`](Self::push).
    pub fn with_arg(mut self, arg: OscArg) -> Result<Self, OscError> {
        self.push(arg)?;
        Ok(self)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn args(&self) -> &[OscArg] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&OscArg> {
        self.args.get(index)
    }

    /// Argument `index` if it is an `i` argument.
    pub fn int(&self, index: usize) -> Option<i32> {
        match self.arg(index) {
            Some(OscArg::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Argument `index` if it is an `f` argument.
    pub fn float(&self, index: usize) -> Option<f32> {
        match self.arg(index) {
            Some(OscArg::Float(v)) => Some(*v),
            _ => None,
        }
    }

    /// Decode one message from a datagram.
    ///
    /// The whole packet is validated, but only leading arguments that fit
    /// are kept. Once one argument is dropped (an oversized string or a
    /// full argument list) every later one is dropped too, so indices stay
    /// stable. An oversized first argument is an error.
    pub fn decode(bytes: &[u8]) -> Result<Self, OscError> {
        if bytes.starts_with(BUNDLE_TAG) {
            return Err(OscError::Bundle);
        }

        let mut pos = 0;
        let address = read_str(bytes, &mut pos)?;
        let mut msg = Self::new(address)?;

        // Type tags are optional in OSC 1.0; no tags means no arguments.
        if pos == bytes.len() {
            return Ok(msg);
        }

        let tags = read_str(bytes, &mut pos)?;
        let tags = tags.strip_prefix(',').ok_or(OscError::MissingTypeTags)?;

        let mut keeping = true;
        for tag in tags.chars() {
            let arg = match tag {
                'i' => Some(OscArg::Int(i32::from_be_bytes(read_word(bytes, &mut pos)?))),
                'f' => Some(OscArg::Float(f32::from_be_bytes(read_word(bytes, &mut pos)?))),
                's' => OscArg::string(read_str(bytes, &mut pos)?).ok(),
                'T' => Some(OscArg::True),
                'F' => Some(OscArg::False),
                'N' => Some(OscArg::Nil),
                'I' => Some(OscArg::Impulse),
                other => return Err(OscError::UnsupportedType(other)),
            };
            if !keeping {
                continue;
            }
            let pushed = match arg {
                Some(arg) => msg.push(arg).is_ok(),
                None => false,
            };
            if !pushed {
                if msg.args.is_empty() {
                    return Err(OscError::CapacityExceeded);
                }
                keeping = false;
            }
        }

        Ok(msg)
    }

    /// Encode this message into `buf`.
    ///
    /// Returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, OscError> {
        let mut w = Writer { buf, pos: 0 };
        w.put_str(&self.address)?;

        let mut tags: String<{ MAX_ARGS + 1 }> = String::new();
        tags.push(',').map_err(|_| OscError::CapacityExceeded)?;
        for arg in &self.args {
            tags.push(arg.tag()).map_err(|_| OscError::CapacityExceeded)?;
        }
        w.put_str(&tags)?;

        for arg in &self.args {
            match arg {
                OscArg::Int(v) => w.put(&v.to_be_bytes())?,
                OscArg::Float(v) => w.put(&v.to_be_bytes())?,
                OscArg::Str(s) => w.put_str(s)?,
                OscArg::True | OscArg::False | OscArg::Nil | OscArg::Impulse => {}
            }
        }

        Ok(w.pos)
    }

    /// Encode this message into a heapless Vec.
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_PACKET_SIZE>, OscError> {
        let mut buffer = [0u8; MAX_PACKET_SIZE];
        let len = self.encode(&mut buffer)?;
        let mut vec = Vec::new();
        vec.extend_from_slice(&buffer[..len])
            .map_err(|_| OscError::BufferTooSmall)?;
        Ok(vec)
    }
}

const fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

fn read_str<'a>(bytes: &'a [u8], pos: &mut usize) -> Result<&'a str, OscError> {
    let rest = bytes.get(*pos..).ok_or(OscError::Truncated)?;
    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(OscError::MissingTerminator)?;
    let end = padded_len(nul + 1);
    if rest.len() < end {
        return Err(OscError::Truncated);
    }
    if rest[nul..end].iter().any(|&b| b != 0) {
        return Err(OscError::BadPadding);
    }
    let s = core::str::from_utf8(&rest[..nul]).map_err(|_| OscError::InvalidUtf8)?;
    *pos += end;
    Ok(s)
}

fn read_word(bytes: &[u8], pos: &mut usize) -> Result<[u8; 4], OscError> {
    let word = bytes
        .get(*pos..*pos + 4)
        .ok_or(OscError::Truncated)?;
    *pos += 4;
    let mut out = [0u8; 4];
    out.copy_from_slice(word);
    Ok(out)
}

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Writer<'_> {
    fn put(&mut self, data: &[u8]) -> Result<(), OscError> {
        let end = self.pos + data.len();
        let dst = self
            .buf
            .get_mut(self.pos..end)
            .ok_or(OscError::BufferTooSmall)?;
        dst.copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    fn put_str(&mut self, s: &str) -> Result<(), OscError> {
        self.put(s.as_bytes())?;
        let padding = padded_len(s.len() + 1) - s.len();
        for _ in 0..padding {
            self.put(&[0])?;
        }
        Ok(())
    }
}
