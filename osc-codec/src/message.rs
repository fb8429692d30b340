//! In-memory message representation

use std::fmt;

/// A single typed argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Signed 32-bit integer (`i`)
    Int(i32),
    /// IEEE-754 single precision float (`f`)
    Float(f32),
    /// UTF-8 string without embedded NUL (`s`)
    String(String),
    /// Opaque bytes with a device-defined layout (`b`)
    Blob(Vec<u8>),
}

impl Argument {
    /// The type-tag character for this argument
    pub fn type_tag(&self) -> char {
        match self {
            Argument::Int(_) => 'i',
            Argument::Float(_) => 'f',
            Argument::String(_) => 's',
            Argument::Blob(_) => 'b',
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Argument::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Argument::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Argument::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Argument::Blob(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i32> for Argument {
    fn from(value: i32) -> Self {
        Argument::Int(value)
    }
}

impl From<f32> for Argument {
    fn from(value: f32) -> Self {
        Argument::Float(value)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::String(value.to_string())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::String(value)
    }
}

/// An address plus its ordered arguments.
///
/// The address is kept as segments; `/cue_id/42/start` is
/// `["cue_id", "42", "start"]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub address: Vec<String>,
    pub arguments: Vec<Argument>,
}

impl Message {
    /// Create a message with no arguments.
    pub fn new<I, S>(address: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            address: address.into_iter().map(Into::into).collect(),
            arguments: Vec::new(),
        }
    }

    /// Append an argument.
    pub fn with_arg(mut self, argument: impl Into<Argument>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    /// The address as it appears on the wire, e.g. `/ch/01/mix/fader`.
    pub fn path(&self) -> String {
        format!("/{}", self.address.join("/"))
    }

    /// True if the address equals `segments` exactly.
    pub fn is_address(&self, segments: &[&str]) -> bool {
        self.address.len() == segments.len()
            && self.address.iter().zip(segments).all(|(a, b)| a == b)
    }

    /// The address with a leading `prefix` segment removed, if present.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&[String]> {
        match self.address.split_first() {
            Some((first, rest)) if first == prefix => Some(rest),
            _ => None,
        }
    }

    /// First argument, if any.
    pub fn first_arg(&self) -> Option<&Argument> {
        self.arguments.first()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())?;
        for argument in &self.arguments {
            match argument {
                Argument::Int(v) => write!(f, " {v}")?,
                Argument::Float(v) => write!(f, " {v}")?,
                Argument::String(v) => write!(f, " {v:?}")?,
                Argument::Blob(v) => write!(f, " <{} bytes>", v.len())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_and_display() {
        let message = Message::new(["cue_id", "42", "start"]);
        assert_eq!(message.path(), "/cue_id/42/start");

        let message = Message::new(["meters"])
            .with_arg("/meters/6")
            .with_arg(3)
            .with_arg(Argument::Blob(vec![0; 8]));
        assert_eq!(message.to_string(), "/meters \"/meters/6\" 3 <8 bytes>");
    }

    #[test]
    fn test_strip_prefix() {
        let reply = Message::new(["reply", "cueLists", "cues"]);
        assert_eq!(
            reply.strip_prefix("reply"),
            Some(&["cueLists".to_string(), "cues".to_string()][..])
        );
        assert_eq!(reply.strip_prefix("cueLists"), None);
        assert_eq!(Message::default().strip_prefix("reply"), None);
    }

    #[test]
    fn test_is_address() {
        let message = Message::new(["state"]).with_arg(12);
        assert!(message.is_address(&["state"]));
        assert!(!message.is_address(&["state", "extra"]));
        assert!(!message.is_address(&[]));
    }

    #[test]
    fn test_argument_accessors() {
        assert_eq!(Argument::Int(4).as_int(), Some(4));
        assert_eq!(Argument::Int(4).as_float(), None);
        assert_eq!(Argument::from("ready").as_str(), Some("ready"));
        assert_eq!(Argument::Blob(vec![1, 2]).as_blob(), Some(&[1u8, 2][..]));
        assert_eq!(Argument::Float(0.5).type_tag(), 'f');
    }
}
