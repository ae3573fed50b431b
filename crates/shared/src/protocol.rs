//! Text wire protocol spoken between the companion device and the display.
//!
//! Every frame is a comma separated ASCII line whose first field is a
//! case-insensitive tag:
//!
//! ```text
//! notes,<text>
//! web,<text>
//! d_coordinates,<dx>,<dy>,<true|false>
//! ```
//!
//! Decoding never fails. Anything that does not match the grammar comes back
//! as [`InputEvent::Unknown`] carrying the raw frame.

use crate::error::ProtocolError;

/// Largest payload a single transport read is expected to carry.
pub const MAX_FRAME_BYTES: usize = 1024;

pub const TAG_NOTES: &str = "notes";
pub const TAG_WEB: &str = "web";
pub const TAG_MOVE: &str = "d_coordinates";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Notes(String),
    Web(String),
    Move { dx: i32, dy: i32, clicked: bool },
    Unknown(String),
}

impl InputEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            InputEvent::Notes(_) => TAG_NOTES,
            InputEvent::Web(_) => TAG_WEB,
            InputEvent::Move { .. } => TAG_MOVE,
            InputEvent::Unknown(_) => "unknown",
        }
    }
}

pub fn decode(raw: &str) -> InputEvent {
    let (tag, rest) = match raw.split_once(',') {
        Some((tag, rest)) => (tag.trim().to_ascii_lowercase(), rest),
        None => return InputEvent::Unknown(raw.to_string()),
    };

    match tag.as_str() {
        // Free text keeps its commas, only the tag separator is consumed.
        TAG_NOTES => InputEvent::Notes(rest.to_string()),
        TAG_WEB => InputEvent::Web(rest.to_string()),
        TAG_MOVE => decode_move(rest).unwrap_or_else(|| InputEvent::Unknown(raw.to_string())),
        _ => InputEvent::Unknown(raw.to_string()),
    }
}

fn decode_move(fields: &str) -> Option<InputEvent> {
    let mut parts = fields.split(',');
    let dx = parts.next()?.trim().parse::<i32>().ok()?;
    let dy = parts.next()?.trim().parse::<i32>().ok()?;
    let clicked = parse_flag(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some(InputEvent::Move { dx, dy, clicked })
}

fn parse_flag(field: &str) -> Option<bool> {
    let field = field.trim();
    if field.eq_ignore_ascii_case("true") {
        Some(true)
    } else if field.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

pub fn encode(event: &InputEvent) -> Result<String, ProtocolError> {
    match event {
        InputEvent::Notes(text) => Ok(format!("{TAG_NOTES},{text}")),
        InputEvent::Web(text) => Ok(format!("{TAG_WEB},{text}")),
        InputEvent::Move { dx, dy, clicked } => Ok(format!("{TAG_MOVE},{dx},{dy},{clicked}")),
        InputEvent::Unknown(raw) => Err(ProtocolError::Unencodable { raw: raw.clone() }),
    }
}

/// Splits one transport read into individual frames.
///
/// A read normally carries exactly one frame, but a stream transport may
/// coalesce several newline terminated frames into a single read.
pub fn split_frames(chunk: &str) -> impl Iterator<Item = &str> {
    chunk
        .split('\n')
        .map(|frame| frame.trim_end_matches('\r'))
        .filter(|frame| !frame.trim().is_empty())
}
