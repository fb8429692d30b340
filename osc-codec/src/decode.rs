//! Datagram → message
//!
//! The decoder is forgiving on purpose. The mixer, the timer and the cue tool
//! each bend the octet layout a little (trailing bytes, missing commas,
//! odd tags), and a partial message is more useful to them than none.

use thiserror::Error;

use crate::message::{Argument, Message};

/// A non-fatal irregularity found while decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// No NUL terminator after the address
    #[error("address is not NUL-terminated")]
    UnterminatedAddress,

    /// Address lacks its leading `/`
    #[error("address `{0}` does not start with '/'")]
    MissingLeadingSlash(String),

    /// Address ends with `/`
    #[error("address `{0}` ends with '/'")]
    TrailingSlash(String),

    /// Address has no segments
    #[error("address is empty")]
    EmptyAddress,

    /// Two slashes with nothing between them; the empty segment is dropped
    #[error("address `{0}` has an empty segment")]
    EmptySegment(String),

    /// Type-tag string does not begin with `,`
    #[error("type tag string does not start with ','")]
    MissingTypeTagComma,

    /// Unrecognised tag; it and every later tag were not interpreted
    #[error("unknown type tag {tag:?}; {ignored} tag(s) from there on ignored")]
    UnknownTypeTag { tag: char, ignored: usize },

    /// An argument ran past the end of the buffer
    #[error("argument {index} ({tag:?}) truncated at byte {offset}")]
    Truncated { index: usize, tag: char, offset: usize },

    /// Consumed bytes differ from the datagram length
    #[error("message spans {consumed} bytes but datagram holds {actual}")]
    LengthMismatch { consumed: usize, actual: usize },
}

/// Best-effort decode result.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub message: Message,
    pub anomalies: Vec<Anomaly>,
}

impl Decoded {
    /// True when nothing had to be glossed over.
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}

/// Decode a datagram. Never fails; see [`Anomaly`] for what can go wrong.
pub fn decode(buf: &[u8]) -> Decoded {
    let mut reader = Reader::new(buf);
    let mut anomalies = Vec::new();

    let raw_address = match reader.read_str() {
        Some(s) => s,
        None => {
            anomalies.push(Anomaly::UnterminatedAddress);
            reader.take_rest()
        }
    };
    let address = split_address(&raw_address, &mut anomalies);

    let tags = read_type_tags(&mut reader, &mut anomalies);

    let mut arguments = Vec::with_capacity(tags.len());
    for (index, tag) in tags.into_iter().enumerate() {
        let offset = reader.pos;
        let argument = match tag {
            'i' => reader.read_i32().map(Argument::Int),
            'f' => reader.read_f32().map(Argument::Float),
            's' => reader.read_str().map(Argument::String),
            'b' => reader.read_blob().map(Argument::Blob),
            _ => None,
        };
        match argument {
            Some(argument) => arguments.push(argument),
            None => {
                anomalies.push(Anomaly::Truncated { index, tag, offset });
                break;
            }
        }
    }

    if reader.pos != buf.len() {
        anomalies.push(Anomaly::LengthMismatch {
            consumed: reader.pos,
            actual: buf.len(),
        });
    }

    Decoded {
        message: Message { address, arguments },
        anomalies,
    }
}

fn split_address(raw: &str, anomalies: &mut Vec<Anomaly>) -> Vec<String> {
    let mut trimmed = match raw.strip_prefix('/') {
        Some(rest) => rest,
        None => {
            if !raw.is_empty() {
                anomalies.push(Anomaly::MissingLeadingSlash(raw.to_string()));
            }
            raw
        }
    };
    if let Some(rest) = trimmed.strip_suffix('/') {
        anomalies.push(Anomaly::TrailingSlash(raw.to_string()));
        trimmed = rest;
    }
    if trimmed.is_empty() {
        anomalies.push(Anomaly::EmptyAddress);
        return Vec::new();
    }
    let segments: Vec<String> = trimmed
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();
    if segments.len() != trimmed.split('/').count() {
        anomalies.push(Anomaly::EmptySegment(raw.to_string()));
        if segments.is_empty() {
            anomalies.push(Anomaly::EmptyAddress);
        }
    }
    segments
}

/// Reads the tag string and returns the tags that will be interpreted.
///
/// A datagram that ends right after the address carries no arguments.
fn read_type_tags(reader: &mut Reader<'_>, anomalies: &mut Vec<Anomaly>) -> Vec<char> {
    if reader.is_empty() {
        return Vec::new();
    }
    let block_start = reader.pos;
    if reader.peek() == Some(b',') {
        reader.pos += 1;
    } else {
        anomalies.push(Anomaly::MissingTypeTagComma);
    }

    // Padding is measured from the comma, not from the first tag.
    let raw = reader.read_str_from(block_start).unwrap_or_default();

    let mut tags = Vec::with_capacity(raw.len());
    for (i, tag) in raw.chars().enumerate() {
        if matches!(tag, 'i' | 'f' | 's' | 'b') {
            tags.push(tag);
        } else {
            anomalies.push(Anomaly::UnknownTypeTag {
                tag,
                ignored: raw.chars().count() - i,
            });
            break;
        }
    }
    tags
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn remaining(&self) -> &'a [u8] {
        self.buf.get(self.pos..).unwrap_or_default()
    }

    /// NUL-terminated string starting at the current position; the position
    /// moves to the first 4-byte boundary after the terminator.
    fn read_str(&mut self) -> Option<String> {
        self.read_str_from(self.pos)
    }

    /// Like [`read_str`](Self::read_str), but the padding boundary is
    /// measured from `block_start` instead of the current position.
    fn read_str_from(&mut self, block_start: usize) -> Option<String> {
        let rest = self.remaining();
        let nul = rest.iter().position(|&b| b == 0)?;
        let text = String::from_utf8_lossy(&rest[..nul]).into_owned();
        let terminator = self.pos + nul;
        let len = terminator - block_start;
        self.pos = block_start + len + (4 - len % 4);
        Some(text)
    }

    fn take_rest(&mut self) -> String {
        let text = String::from_utf8_lossy(self.remaining()).into_owned();
        self.pos = self.buf.len();
        text
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes: [u8; N] = self.remaining().get(..N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_i32(&mut self) -> Option<i32> {
        self.read_array().map(i32::from_be_bytes)
    }

    fn read_f32(&mut self) -> Option<f32> {
        self.read_array().map(f32::from_be_bytes)
    }

    /// Big-endian size, then that many bytes, then padding to 4.
    fn read_blob(&mut self) -> Option<Vec<u8>> {
        let start = self.pos;
        let size = usize::try_from(self.read_i32()?).ok();
        let data = size.and_then(|size| self.remaining().get(..size));
        match data {
            Some(data) => {
                let data = data.to_vec();
                self.pos += data.len() + (4 - data.len() % 4) % 4;
                Some(data)
            }
            None => {
                self.pos = start;
                None
            }
        }
    }
}
