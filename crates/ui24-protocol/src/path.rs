//! Parameter paths
//!
//! A path names one console parameter, e.g. `SETD^i.4.mix`. Paths are
//! case-sensitive and compared exactly. The category tag at the front tells
//! whether the console stores the value as a number (`SETD`) or a string
//! (`SETS`).

use std::borrow::Borrow;
use std::fmt;

use crate::error::ProtocolError;
use crate::MODEL_PATH;

/// Key identifying one console parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterPath(String);

impl ParameterPath {
    /// Wrap an arbitrary path, rejecting empty strings and line breaks
    pub fn new(path: impl Into<String>) -> Result<Self, ProtocolError> {
        let path = path.into();
        if path.trim().is_empty() || path.contains(['\n', '\r']) {
            return Err(ProtocolError::InvalidPath(path));
        }
        Ok(Self(path))
    }

    /// Console model identity (`SETS^model`)
    pub fn model() -> Self {
        Self(MODEL_PATH.to_string())
    }

    /// Display name of an input channel
    pub fn input_name(input: u8) -> Self {
        Self(format!("SETS^i.{input}.name"))
    }

    /// Main-mix level of an input channel
    pub fn input_mix(input: u8) -> Self {
        Self(format!("SETD^i.{input}.mix"))
    }

    /// Force-unmute flag of an input channel ("1" means audible)
    pub fn input_force_unmute(input: u8) -> Self {
        Self(format!("SETD^i.{input}.forceunmute"))
    }

    /// Display name of an aux bus
    pub fn aux_name(aux: u8) -> Self {
        Self(format!("SETS^a.{aux}.name"))
    }

    /// Master level of an aux bus
    pub fn aux_mix(aux: u8) -> Self {
        Self(format!("SETD^a.{aux}.mix"))
    }

    /// Mute flag of an aux bus
    pub fn aux_mute(aux: u8) -> Self {
        Self(format!("SETD^a.{aux}.mute"))
    }

    /// Send level from an input channel into an aux bus
    pub fn aux_send_level(input: u8, aux: u8) -> Self {
        Self(format!("SETD^i.{input}.aux.{aux}.value"))
    }

    /// Mute flag of the send from an input channel into an aux bus
    pub fn aux_send_mute(input: u8, aux: u8) -> Self {
        Self(format!("SETD^i.{input}.aux.{aux}.mute"))
    }

    /// The path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ParameterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ParameterPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ParameterPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ParameterPath {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ParameterPath {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
