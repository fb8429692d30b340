//! Cue tool payload decoder
//!
//! Replies arrive on `/reply/<original address>` with a single JSON string
//! argument: `{"status":"ok","data":...}`. Only the cue list reply carries
//! data worth projecting.

use osc_codec::{Argument, Message};
use serde::Deserialize;

use crate::error::{Result, StateError};
use crate::event::Cue;
use crate::store::StateChange;

/// Body of a cue tool reply.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyBody<T> {
    pub status: Option<String>,
    pub data: Option<T>,
}

/// Parse the JSON body of a reply message.
pub fn reply_body<T>(message: &Message) -> Result<ReplyBody<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let text = message
        .first_arg()
        .and_then(Argument::as_str)
        .ok_or_else(|| StateError::UnexpectedArgument {
            address: message.path(),
            expected: "JSON string",
        })?;
    Ok(serde_json::from_str(text)?)
}

pub fn decode(message: &Message) -> Result<Vec<StateChange>> {
    if !message.is_address(&["reply", "cueLists", "cues"]) {
        return Ok(vec![]);
    }

    let body: ReplyBody<Vec<Cue>> = reply_body(message)?;
    match body.status.as_deref() {
        Some("ok") => {}
        Some(other) => return Err(StateError::Status(other.to_string())),
        None => return Err(StateError::Status("<missing>".to_string())),
    }
    let tree = body
        .data
        .ok_or_else(|| StateError::Parse("cue list reply has no data".to_string()))?;
    Ok(vec![StateChange::CueTree(tree)])
}
