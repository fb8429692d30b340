//! # osc-codec
//!
//! Encoder and decoder for the OSC-like datagrams exchanged with the mixing
//! console, the countdown timer and the cue-automation tool.
//!
//! The grammar is deliberately narrow: an address, a type-tag string and a
//! run of `i` (int32), `f` (float32), `s` (string) and `b` (blob) arguments.
//! Encoding is strict. Decoding is lenient and never fails: it returns the
//! best-effort [`Message`] together with every [`Anomaly`] it had to step
//! over, so callers decide whether to log and carry on.
//!
//! ## Usage
//!
//! ```rust
//! use osc_codec::{decode, encode, Argument, Message};
//!
//! let message = Message::new(["reset"]).with_arg(10.0f32);
//! let bytes = encode(&message).unwrap();
//! assert_eq!(bytes.len() % 4, 0);
//!
//! let decoded = decode(&bytes);
//! assert!(decoded.is_clean());
//! assert_eq!(decoded.message.arguments, vec![Argument::Float(10.0)]);
//! ```

pub mod decode;
pub mod encode;
pub mod error;
pub mod message;

pub use decode::{decode, Anomaly, Decoded};
pub use encode::encode;
pub use error::{EncodeError, Result};
pub use message::{Argument, Message};
