//! Message → datagram

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{EncodeError, Result};
use crate::message::{Argument, Message};

/// Encode a message into a datagram.
///
/// Layout: padded address, padded type-tag string (`,` plus one tag per
/// argument), then the arguments. Ints and floats are 4 bytes big-endian,
/// strings are NUL-terminated and zero-padded to a 4-byte boundary. The
/// result length is always a multiple of 4.
///
/// Blob arguments are rejected; devices send blobs but never receive them.
pub fn encode(message: &Message) -> Result<Bytes> {
    if message.address.is_empty() {
        return Err(EncodeError::EmptyAddress);
    }
    if let Some(segment) = message
        .address
        .iter()
        .find(|s| s.is_empty() || s.contains(['/', '\0']))
    {
        return Err(EncodeError::InvalidSegment(segment.clone()));
    }

    let mut tags = String::with_capacity(message.arguments.len() + 1);
    let mut payload = BytesMut::new();
    tags.push(',');
    for (index, argument) in message.arguments.iter().enumerate() {
        match argument {
            Argument::Int(v) => payload.put_i32(*v),
            Argument::Float(v) => payload.put_f32(*v),
            Argument::String(s) if s.contains('\0') => {
                return Err(EncodeError::NulInString { index })
            }
            Argument::String(s) => put_padded_str(&mut payload, s),
            Argument::Blob(_) => return Err(EncodeError::BlobArgument { index }),
        }
        tags.push(argument.type_tag());
    }

    let path = message.path();
    let mut buf =
        BytesMut::with_capacity(padded_len(path.len()) + padded_len(tags.len()) + payload.len());
    put_padded_str(&mut buf, &path);
    put_padded_str(&mut buf, &tags);
    buf.put(payload);

    Ok(buf.freeze())
}

/// Length of a NUL-terminated string once padded to a 4-byte boundary.
pub(crate) fn padded_len(len: usize) -> usize {
    len + (4 - len % 4)
}

fn put_padded_str(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_bytes(0, 4 - s.len() % 4);
}
