//! Outgoing commands (client → console)

use crate::path::ParameterPath;
use crate::value::WireValue;
use crate::{ALIVE, COMMAND_PREFIX, FIELD_SEPARATOR};

/// A command sent to the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set a parameter; the console echoes it back as a state update
    Set {
        /// Parameter to change
        path: ParameterPath,
        /// Raw wire value
        value: String,
    },
    /// Answer to the keep-alive probe
    Alive,
}

impl Command {
    /// Build a set command from a typed value
    pub fn set<V: WireValue>(path: ParameterPath, value: &V) -> Self {
        Command::Set {
            path,
            value: value.to_wire(),
        }
    }

    /// Command body without the envelope marker
    pub fn body(&self) -> String {
        match self {
            Command::Set { path, value } => format!("{path}{FIELD_SEPARATOR}{value}"),
            Command::Alive => ALIVE.to_string(),
        }
    }

    /// Whether this command is routine keep-alive traffic
    pub fn is_keep_alive(&self) -> bool {
        matches!(self, Command::Alive)
    }
}

/// Trait for commands that can be encoded to a wire line
pub trait EncodeCommand {
    /// Encode this command to its wire format
    fn encode(&self) -> String;
}

impl EncodeCommand for Command {
    fn encode(&self) -> String {
        format!("{COMMAND_PREFIX}{}", self.body())
    }
}
