//! Error types for console protocol parsing and encoding

use thiserror::Error;

/// Errors that can occur while decoding or encoding protocol values
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// Line does not carry a `category^...^value` payload
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Value is not a number
    #[error("invalid level: {0:?}")]
    InvalidLevel(String),

    /// Number parsed but lies outside [0.0, 1.0]
    #[error("level out of range: {0}")]
    LevelOutOfRange(f64),

    /// Value is neither "0" nor "1"
    #[error("invalid boolean: {0:?}")]
    InvalidBool(String),

    /// Path is empty or contains a field separator in the wrong place
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
}
