//! Error types for the console session

use std::time::Duration;

use thiserror::Error;
use ui24_protocol::ProtocolError;

/// Errors surfaced to callers of the session and fader APIs
///
/// Socket failures are handled by the reconnection loop and only show up
/// here indirectly, as [`SessionError::NotConnected`] or a read timeout.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The console did not finish its handshake during `start`
    #[error("console handshake not completed within {0:?}")]
    ConnectTimeout(Duration),

    /// A parameter never appeared in the cache
    #[error("timed out after {timeout:?} waiting for {path}")]
    Timeout {
        /// Parameter that was awaited
        path: String,
        /// How long the caller waited
        timeout: Duration,
    },

    /// A cached value does not fit the type the caller asked for
    #[error("protocol violation at {path}: {source}")]
    ProtocolViolation {
        /// Parameter holding the bad value
        path: String,
        /// Decode failure
        #[source]
        source: ProtocolError,
    },

    /// Caller-supplied value rejected before any I/O
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No open connection to the console
    #[error("not connected to console")]
    NotConnected,

    /// The session has been stopped
    #[error("session stopped")]
    Stopped,

    /// Socket-level failure inside the connection task
    ///
    /// Logged and answered with a reconnect; accessor callers see
    /// [`SessionError::NotConnected`] instead.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SessionError {
    /// Whether this error means "not known yet" rather than "known bad"
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SessionError::Timeout { .. } | SessionError::ConnectTimeout(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        SessionError::Transport(e.to_string())
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        SessionError::Transport(e.to_string())
    }
}
