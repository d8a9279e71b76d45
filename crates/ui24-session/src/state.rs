//! Connection state tracking

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a console session
///
/// `Idle → Connecting → Open`, back to `Connecting` whenever the socket drops,
/// and `Closed` once stopped. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Constructed, not started
    #[default]
    Idle,
    /// Opening a socket or waiting for its handshake
    Connecting,
    /// Socket open and the console has identified itself
    Open,
    /// Stopped; no further reconnection
    Closed,
}

impl ConnectionState {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    /// Whether commands can be written right now
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
