//! Ui Console Protocol Library
//!
//! This crate provides parsing and encoding for the text protocol spoken by
//! Soundcraft Ui-series digital mixing consoles over a WebSocket.
//!
//! # Format
//!
//! Every WebSocket text message carries one or more newline-separated lines.
//!
//! - `2::` - keep-alive probe sent by the console; the client answers `3:::ALIVE`
//! - `3:::SETD^i.4.mix^0.5` - numeric parameter update (or set command)
//! - `3:::SETS^i.4.name^Vocal` - string parameter update (or set command)
//! - `3:::VU2^...`, `3:::RTA^...` - meter telemetry, not cached
//!
//! The payload of a line is its last colon-delimited segment. The payload is
//! split on `^`: the first token is the category, the last token is the value,
//! and everything in between (joined back with `^`, category included) is the
//! parameter path.
//!
//! # Architecture
//!
//! - [`frame`]: decoding of incoming lines into [`Frame`]s, plus a streaming
//!   [`FrameCodec`] for whole messages
//! - [`command`]: encoding of outgoing [`Command`]s
//! - [`value`]: typed wire values ([`Level`], `bool`) with strict domains
//! - [`path`]: parameter path templates for inputs, auxes and aux sends
//!
//! # Example
//!
//! ```rust
//! use ui24_protocol::{Command, EncodeCommand, Frame, FrameCodec};
//!
//! let mut codec = FrameCodec::new();
//! codec.push_message("2::\n3:::SETD^i.4.mix^0.75");
//!
//! assert_eq!(codec.next_frame(), Some(Frame::KeepAlivePing));
//! assert!(matches!(
//!     codec.next_frame(),
//!     Some(Frame::StateUpdate { ref path, ref value }) if path == "SETD^i.4.mix" && value == "0.75"
//! ));
//!
//! assert_eq!(Command::Alive.encode(), "3:::ALIVE");
//! ```

pub mod command;
pub mod error;
pub mod frame;
pub mod path;
pub mod value;

pub use command::{Command, EncodeCommand};
pub use error::ProtocolError;
pub use frame::{Category, Frame, FrameCodec};
pub use path::ParameterPath;
pub use value::{Level, WireValue};

/// Envelope marker prefixed to every command sent to the console
pub const COMMAND_PREFIX: &str = "3:::";

/// Keep-alive probe sent by the console
pub const PING: &str = "2::";

/// Command body answering a keep-alive probe
pub const ALIVE: &str = "ALIVE";

/// Separator between path tokens and the value in a payload
pub const FIELD_SEPARATOR: char = '^';

/// Path whose appearance confirms the console has started streaming state
pub const MODEL_PATH: &str = "SETS^model";

/// Default console WebSocket port
pub const DEFAULT_PORT: u16 = 80;
