//! Incoming frame decoding
//!
//! A console message is a block of newline-separated lines. Each line decodes
//! to exactly one [`Frame`]; decoding never fails; lines that cannot be
//! understood become [`Frame::Unrecognized`] so the caller can log and move on.

use std::collections::VecDeque;

use crate::error::ProtocolError;
use crate::{FIELD_SEPARATOR, PING};

/// Payload category (first `^`-delimited token)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Category {
    /// Numeric parameter update
    Setd,
    /// String parameter update
    Sets,
    /// Real-time analyzer data
    Rta,
    /// Per-channel VU meters
    Vu2,
    /// Aux VU meters
    Vua,
    /// Media player playlist refresh
    UpdatePlaylist,
}

impl Category {
    /// Parse a category tag; unknown tags yield `None`
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "SETD" => Some(Self::Setd),
            "SETS" => Some(Self::Sets),
            "RTA" => Some(Self::Rta),
            "VU2" => Some(Self::Vu2),
            "VUA" => Some(Self::Vua),
            "UPDATE_PLAYLIST" => Some(Self::UpdatePlaylist),
            _ => None,
        }
    }

    /// Wire tag for this category
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Setd => "SETD",
            Self::Sets => "SETS",
            Self::Rta => "RTA",
            Self::Vu2 => "VU2",
            Self::Vua => "VUA",
            Self::UpdatePlaylist => "UPDATE_PLAYLIST",
        }
    }

    /// High-frequency telemetry that is never cached
    pub fn is_telemetry(&self) -> bool {
        matches!(self, Self::Rta | Self::Vu2 | Self::Vua | Self::UpdatePlaylist)
    }
}

/// A decoded incoming line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Keep-alive probe; must be answered with `ALIVE`
    KeepAlivePing,
    /// Meter or playlist telemetry
    Ignorable {
        /// Which telemetry stream the line belonged to
        category: Category,
    },
    /// Parameter value pushed by the console
    StateUpdate {
        /// Parameter path, category included (e.g. `SETD^i.4.mix`)
        path: String,
        /// Raw wire value
        value: String,
    },
    /// Anything else
    Unrecognized {
        /// The line as received
        raw: String,
    },
}

impl Frame {
    /// Decode a single line (without its trailing newline)
    pub fn decode(line: &str) -> Frame {
        if line == PING {
            return Frame::KeepAlivePing;
        }

        // rsplit always yields at least one item
        let payload = line.rsplit(':').next().unwrap_or(line);
        let tokens: Vec<&str> = payload.split(FIELD_SEPARATOR).collect();

        match Category::parse(tokens[0]) {
            Some(category) if category.is_telemetry() => Frame::Ignorable { category },
            Some(_) => match split_update(&tokens) {
                Ok((path, value)) => Frame::StateUpdate { path, value },
                Err(e) => {
                    tracing::debug!("Failed to parse console frame: {}", e);
                    Frame::Unrecognized {
                        raw: line.to_string(),
                    }
                }
            },
            None => Frame::Unrecognized {
                raw: line.to_string(),
            },
        }
    }

    /// Whether this frame updates the parameter cache
    pub fn is_state_update(&self) -> bool {
        matches!(self, Frame::StateUpdate { .. })
    }
}

/// Split `category^...^value` tokens into the path (category included) and value
fn split_update(tokens: &[&str]) -> Result<(String, String), ProtocolError> {
    match tokens.split_last() {
        Some((value, path)) if path.len() >= 2 => Ok((path.join("^"), value.to_string())),
        _ => Err(ProtocolError::MalformedFrame(tokens.join("^"))),
    }
}

/// Streaming decoder for whole console messages
///
/// Messages are split into lines as they are pushed; frames come out in the
/// order their lines were received. Blank lines are skipped.
#[derive(Debug, Default)]
pub struct FrameCodec {
    lines: VecDeque<String>,
}

impl FrameCodec {
    /// Create an empty codec
    pub fn new() -> Self {
        Self {
            lines: VecDeque::new(),
        }
    }

    /// Queue every line of a received message
    pub fn push_message(&mut self, message: &str) {
        for line in message.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if !line.is_empty() {
                self.lines.push_back(line.to_string());
            }
        }
    }

    /// Decode the next queued line
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.lines.pop_front().map(|line| Frame::decode(&line))
    }

    /// Decode the next queued line, returning the line alongside the frame
    ///
    /// Useful when the raw text is wanted for logging.
    pub fn next_frame_with_line(&mut self) -> Option<(Frame, String)> {
        self.lines.pop_front().map(|line| (Frame::decode(&line), line))
    }

    /// Number of lines waiting to be decoded
    pub fn pending(&self) -> usize {
        self.lines.len()
    }

    /// Drop all queued lines
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
