//! Session configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use ui24_protocol::DEFAULT_PORT;

/// Number of addressable channels on the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleLayout {
    /// Input channels (`i.0` .. `i.{inputs-1}`)
    pub inputs: u8,
    /// Aux buses (`a.0` .. `a.{auxes-1}`)
    pub auxes: u8,
}

impl Default for ConsoleLayout {
    fn default() -> Self {
        Self {
            inputs: 24,
            auxes: 10,
        }
    }
}

/// Tunables for a [`ConsoleSession`](crate::ConsoleSession)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// WebSocket port on the console
    pub port: u16,
    /// How long `start` waits for the handshake, and how long each
    /// reconnected socket gets to deliver the model frame (ms)
    pub connect_timeout_ms: u64,
    /// How long a read waits for a parameter to appear (ms)
    pub read_timeout_ms: u64,
    /// Pause between a drop and the next connection attempt (ms)
    pub reconnect_delay_ms: u64,
    /// Silence on an open socket after which it is treated as dropped (ms, 0 = never)
    pub idle_timeout_ms: u64,
    /// Amount moved by a single volume step
    pub volume_step: f64,
    /// Capacity of the session event channel
    pub event_capacity: usize,
    /// Channel counts used to validate fader identities
    pub layout: ConsoleLayout,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout_ms: 5000,
            read_timeout_ms: 5000,
            reconnect_delay_ms: 1000,
            idle_timeout_ms: 15000,
            volume_step: 0.05,
            event_capacity: 256,
            layout: ConsoleLayout::default(),
        }
    }
}

impl SessionConfig {
    /// Handshake window
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Per-key read ceiling
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Reconnect backoff
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Idle limit, if enabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }
}
