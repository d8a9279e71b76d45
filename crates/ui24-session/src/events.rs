//! Session event stream
//!
//! Everything the receive loop observes is also published on a broadcast
//! channel so observers (loggers, UIs, automation bridges) can follow the
//! console without polling the cache.

use crate::state::ConnectionState;

/// Who produced a parameter change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOrigin {
    /// Pushed by the console
    Console,
    /// Mirrored locally right after this session sent a set command
    Local,
}

/// Unified event enum for session activity
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The connection state changed
    StateChanged(ConnectionState),

    /// The console identified itself on a fresh socket
    HandshakeComplete {
        /// Model string reported by the console
        model: String,
    },

    /// A cached parameter was written
    ParameterChanged {
        /// Parameter path
        path: String,
        /// New raw value
        value: String,
        /// Console push or local echo
        origin: UpdateOrigin,
    },

    /// A line the codec could not classify
    UnrecognizedFrame {
        /// The line as received
        raw: String,
    },
}
