//! Typed wire values
//!
//! The console stores every parameter as a string. Three shapes are understood:
//!
//! - levels: decimal numbers in [0.0, 1.0], sent with at most 11 decimals
//! - flags: the literals `"1"` and `"0"`
//! - text: names and other free-form strings, passed through untouched
//!
//! Decoding is strict: anything outside a shape's domain is an error, never a
//! default.

use std::fmt;

use crate::error::ProtocolError;

/// Decimal places kept when a level is sent to the console
pub const LEVEL_DECIMALS: usize = 11;

/// A value with a string representation on the wire
pub trait WireValue: Sized {
    /// Encode to the wire representation
    fn to_wire(&self) -> String;

    /// Decode from the wire representation
    fn from_wire(raw: &str) -> Result<Self, ProtocolError>;
}

/// A normalized fader level in [0.0, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Level(f64);

impl Level {
    /// Fader fully down
    pub const MIN: Level = Level(0.0);
    /// Fader fully up
    pub const MAX: Level = Level(1.0);

    /// Create a level, rejecting NaN and values outside [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self, ProtocolError> {
        if value.is_nan() {
            return Err(ProtocolError::InvalidLevel(value.to_string()));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(ProtocolError::LevelOutOfRange(value));
        }
        // Normalize -0.0 so it never reaches the wire
        Ok(Self(value + 0.0))
    }

    /// Create a level, clamping into [0.0, 1.0] (NaN becomes 0.0)
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self::MIN;
        }
        Self(value.clamp(0.0, 1.0) + 0.0)
    }

    /// Move by `delta`, clamping at the ends of the travel
    pub fn offset(self, delta: f64) -> Self {
        Self::clamped(self.0 + delta)
    }

    /// The level as a float
    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Level {
    type Error = ProtocolError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Level::new(value)
    }
}

impl From<Level> for f64 {
    fn from(level: Level) -> f64 {
        level.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_level(self.0))
    }
}

impl WireValue for Level {
    fn to_wire(&self) -> String {
        encode_level(self.0)
    }

    fn from_wire(raw: &str) -> Result<Self, ProtocolError> {
        let value = raw
            .parse::<f64>()
            .map_err(|_| ProtocolError::InvalidLevel(raw.to_string()))?;
        if value.is_nan() {
            return Err(ProtocolError::InvalidLevel(raw.to_string()));
        }
        Level::new(value)
    }
}

impl WireValue for bool {
    fn to_wire(&self) -> String {
        if *self { "1" } else { "0" }.to_string()
    }

    fn from_wire(raw: &str) -> Result<Self, ProtocolError> {
        match raw {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(ProtocolError::InvalidBool(other.to_string())),
        }
    }
}

impl WireValue for String {
    fn to_wire(&self) -> String {
        self.clone()
    }

    fn from_wire(raw: &str) -> Result<Self, ProtocolError> {
        Ok(raw.to_string())
    }
}

/// Round to [`LEVEL_DECIMALS`] places and print in plain decimal notation
///
/// Trailing zeros are dropped but at least one fractional digit is kept, so
/// `0.5` prints as `0.5` and `1.0` as `1.0`.
fn encode_level(value: f64) -> String {
    let mut text = format!("{:.*}", LEVEL_DECIMALS, value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').len();
        text.truncate(trimmed);
        if text.ends_with('.') {
            text.push('0');
        }
    }
    if text == "-0.0" {
        text.remove(0);
    }
    text
}
