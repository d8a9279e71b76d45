//! Virtual console state
//!
//! Holds the parameter table a real console would stream on connect and
//! applies the set commands clients send back. Transport lives in
//! [`server`](crate::server); this type is plain data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ui24_protocol::{Command, EncodeCommand, Frame, ParameterPath, COMMAND_PREFIX, MODEL_PATH};

/// Configuration for a virtual console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualConsoleConfig {
    /// Model string reported in the handshake frame
    pub model: String,
    /// Number of input channels seeded into the table
    pub inputs: u8,
    /// Number of aux buses seeded into the table
    pub auxes: u8,
    /// Interval between keep-alive probes (ms, 0 = never)
    pub ping_interval_ms: u64,
    /// Interval between `VU2` meter frames (ms, 0 = never)
    pub meter_interval_ms: u64,
    /// Client lines kept for inspection; older ones are discarded
    pub history_limit: usize,
}

impl Default for VirtualConsoleConfig {
    fn default() -> Self {
        Self {
            model: "ui24".to_string(),
            inputs: 24,
            auxes: 10,
            ping_interval_ms: 1000,
            meter_interval_ms: 0,
            history_limit: 1024,
        }
    }
}

/// What a received line meant
#[derive(Debug, Clone, PartialEq)]
pub enum ClientLine {
    /// A parameter was set
    Set { path: String, value: String },
    /// Keep-alive answer
    Alive,
    /// Anything else
    Other,
}

/// A simulated console parameter table
#[derive(Debug)]
pub struct VirtualConsole {
    model: String,
    params: BTreeMap<String, String>,
    alive_count: u64,
}

impl VirtualConsole {
    /// Create a console seeded from the configuration
    pub fn from_config(config: &VirtualConsoleConfig) -> Self {
        let mut console = Self {
            model: config.model.clone(),
            params: BTreeMap::new(),
            alive_count: 0,
        };
        console.seed(config.inputs, config.auxes);
        console
    }

    /// Create a default 24-input, 10-aux console
    pub fn new() -> Self {
        Self::from_config(&VirtualConsoleConfig::default())
    }

    fn seed(&mut self, inputs: u8, auxes: u8) {
        for i in 0..inputs {
            self.set(ParameterPath::input_name(i).as_str(), "");
            self.set(ParameterPath::input_mix(i).as_str(), "0.5");
            self.set(ParameterPath::input_force_unmute(i).as_str(), "1");
            for a in 0..auxes {
                self.set(ParameterPath::aux_send_level(i, a).as_str(), "0.0");
                self.set(ParameterPath::aux_send_mute(i, a).as_str(), "0");
            }
        }
        for a in 0..auxes {
            self.set(ParameterPath::aux_name(a).as_str(), "");
            self.set(ParameterPath::aux_mix(a).as_str(), "0.75");
            self.set(ParameterPath::aux_mute(a).as_str(), "0");
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Current value of a parameter
    pub fn get(&self, path: &str) -> Option<&str> {
        self.params.get(path).map(String::as_str)
    }

    /// Overwrite a parameter, returning the line to broadcast
    pub fn set(&mut self, path: &str, value: &str) -> String {
        self.params.insert(path.to_string(), value.to_string());
        update_line(path, value)
    }

    /// Number of parameters in the table (model excluded)
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Keep-alive answers received so far
    pub fn alive_count(&self) -> u64 {
        self.alive_count
    }

    /// Lines sent to a freshly connected client
    ///
    /// Every parameter in path order, then the model frame unless suppressed.
    pub fn dump(&self, include_model: bool) -> Vec<String> {
        let mut lines: Vec<String> = self
            .params
            .iter()
            .map(|(path, value)| update_line(path, value))
            .collect();
        if include_model {
            lines.push(update_line(MODEL_PATH, &self.model));
        }
        lines
    }

    /// Apply one line received from a client
    pub fn apply_line(&mut self, line: &str) -> ClientLine {
        if line == Command::Alive.encode() {
            self.alive_count += 1;
            return ClientLine::Alive;
        }
        match Frame::decode(line) {
            Frame::StateUpdate { path, value } if path != MODEL_PATH => {
                self.set(&path, &value);
                ClientLine::Set { path, value }
            }
            _ => ClientLine::Other,
        }
    }
}

impl Default for VirtualConsole {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a state update the way the console pushes it
pub fn update_line(path: &str, value: &str) -> String {
    format!("{COMMAND_PREFIX}{path}^{value}")
}
