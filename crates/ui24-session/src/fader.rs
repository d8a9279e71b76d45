//! Typed fader accessors
//!
//! A fader is a volume + mute control over one audio path. It owns no state:
//! every call computes a path from its [`FaderKind`] and goes through the
//! session's cache or send queue.
//!
//! | Kind | Name | Volume | Mute |
//! |---|---|---|---|
//! | `Aux { a }` | `SETS^a.{a}.name` | `SETD^a.{a}.mix` | `SETD^a.{a}.mute` |
//! | `Input { i }` | `SETS^i.{i}.name` | `SETD^i.{i}.mix` | `SETD^i.{i}.forceunmute` (inverted) |
//! | `InputAux { i, a }` | both names | `SETD^i.{i}.aux.{a}.value` | `SETD^i.{i}.aux.{a}.mute` |

use std::fmt;
use std::str::FromStr;

use tracing::debug;
use ui24_protocol::{Level, ParameterPath};

use crate::config::ConsoleLayout;
use crate::error::SessionError;
use crate::session::ConsoleSession;

/// Which audio path a fader controls (0-based protocol indices)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaderKind {
    /// Master of an aux bus
    Aux { aux: u8 },
    /// Main-mix level of an input channel
    Input { input: u8 },
    /// Send from an input channel into an aux bus
    InputAux { input: u8, aux: u8 },
}

impl FaderKind {
    /// Path of the display name (the input's name for sends)
    pub fn name_path(&self) -> ParameterPath {
        match *self {
            Self::Aux { aux } => ParameterPath::aux_name(aux),
            Self::Input { input } | Self::InputAux { input, .. } => ParameterPath::input_name(input),
        }
    }

    pub fn volume_path(&self) -> ParameterPath {
        match *self {
            Self::Aux { aux } => ParameterPath::aux_mix(aux),
            Self::Input { input } => ParameterPath::input_mix(input),
            Self::InputAux { input, aux } => ParameterPath::aux_send_level(input, aux),
        }
    }

    pub fn mute_path(&self) -> ParameterPath {
        match *self {
            Self::Aux { aux } => ParameterPath::aux_mute(aux),
            Self::Input { input } => ParameterPath::input_force_unmute(input),
            Self::InputAux { input, aux } => ParameterPath::aux_send_mute(input, aux),
        }
    }

    /// Whether the mute parameter stores "audible" rather than "muted"
    pub fn mute_inverted(&self) -> bool {
        matches!(self, Self::Input { .. })
    }

    /// Stable identifier derived from kind and indices (1-based)
    pub fn unique_id(&self) -> String {
        match *self {
            Self::Aux { aux } => format!("aux{}", aux as u16 + 1),
            Self::Input { input } => format!("input{}", input as u16 + 1),
            Self::InputAux { input, aux } => {
                format!("input{}aux{}", input as u16 + 1, aux as u16 + 1)
            }
        }
    }

    /// Label used when the console has no name for the path
    pub fn fallback_label(&self) -> String {
        match *self {
            Self::Aux { aux } => aux_label(aux),
            Self::Input { input } => input_label(input),
            Self::InputAux { input, aux } => compose_label(&input_label(input), &aux_label(aux)),
        }
    }

    /// Reject indices the console does not have
    pub fn validate(&self, layout: &ConsoleLayout) -> Result<(), SessionError> {
        let (input, aux) = match *self {
            Self::Aux { aux } => (None, Some(aux)),
            Self::Input { input } => (Some(input), None),
            Self::InputAux { input, aux } => (Some(input), Some(aux)),
        };
        if let Some(input) = input.filter(|i| *i >= layout.inputs) {
            return Err(SessionError::InvalidArgument(format!(
                "input {} out of range (console has {} inputs)",
                input, layout.inputs
            )));
        }
        if let Some(aux) = aux.filter(|a| *a >= layout.auxes) {
            return Err(SessionError::InvalidArgument(format!(
                "aux {} out of range (console has {} auxes)",
                aux, layout.auxes
            )));
        }
        Ok(())
    }
}

fn input_label(input: u8) -> String {
    format!("CH {}", input as u16 + 1)
}

fn aux_label(aux: u8) -> String {
    format!("AUX {}", aux as u16 + 1)
}

fn compose_label(input: &str, aux: &str) -> String {
    format!("{input} em {aux}")
}

impl fmt::Display for FaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aux { aux } => write!(f, "aux:{aux}"),
            Self::Input { input } => write!(f, "input:{input}"),
            Self::InputAux { input, aux } => write!(f, "input:{input}/aux:{aux}"),
        }
    }
}

impl FromStr for FaderKind {
    type Err = SessionError;

    /// Parse `input:N`, `aux:N` or `input:N/aux:M`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            SessionError::InvalidArgument(format!(
                "bad fader '{s}' (expected input:N, aux:N or input:N/aux:M)"
            ))
        };
        let index = |part: &str, prefix: &str| -> Result<u8, SessionError> {
            part.strip_prefix(prefix)
                .and_then(|n| n.trim().parse::<u8>().ok())
                .ok_or_else(invalid)
        };

        let s = s.trim();
        match s.split_once('/') {
            Some((input, aux)) => Ok(Self::InputAux {
                input: index(input.trim(), "input:")?,
                aux: index(aux.trim(), "aux:")?,
            }),
            None if s.starts_with("input:") => Ok(Self::Input {
                input: index(s, "input:")?,
            }),
            None if s.starts_with("aux:") => Ok(Self::Aux {
                aux: index(s, "aux:")?,
            }),
            None => Err(invalid()),
        }
    }
}

/// Volume + mute control bound to a session
///
/// Borrows the session, so it can never outlive it. Cheap to copy and to
/// recreate.
#[derive(Debug, Clone, Copy)]
pub struct Fader<'s> {
    session: &'s ConsoleSession,
    kind: FaderKind,
}

impl<'s> Fader<'s> {
    pub(crate) fn new(session: &'s ConsoleSession, kind: FaderKind) -> Self {
        Self { session, kind }
    }

    pub fn kind(&self) -> FaderKind {
        self.kind
    }

    /// Stable identifier, no I/O
    pub fn unique_id(&self) -> String {
        self.kind.unique_id()
    }

    /// Display name, falling back to a generated label when the console has none
    ///
    /// Sends compose the input's and the aux's names.
    pub async fn name(&self) -> Result<String, SessionError> {
        match self.kind {
            FaderKind::InputAux { input, aux } => {
                let input_name = self.read_name(FaderKind::Input { input }).await?;
                let aux_name = self.read_name(FaderKind::Aux { aux }).await?;
                Ok(compose_label(&input_name, &aux_name))
            }
            kind => self.read_name(kind).await,
        }
    }

    async fn read_name(&self, kind: FaderKind) -> Result<String, SessionError> {
        let name: String = self.session.read(&kind.name_path()).await?;
        if name.is_empty() {
            Ok(kind.fallback_label())
        } else {
            Ok(name)
        }
    }

    /// Current level in [0.0, 1.0]
    pub async fn volume(&self) -> Result<Level, SessionError> {
        self.session.read(&self.kind.volume_path()).await
    }

    /// Set the level; values outside [0.0, 1.0] are rejected before any I/O
    pub async fn set_volume(&self, volume: f64) -> Result<(), SessionError> {
        let level = Level::new(volume).map_err(|e| {
            SessionError::InvalidArgument(format!("volume for {}: {}", self.kind, e))
        })?;
        self.set_level(level).await
    }

    async fn set_level(&self, level: Level) -> Result<(), SessionError> {
        debug!("Setting {} volume to {}", self.kind, level);
        self.session
            .send_value(&self.kind.volume_path(), &level)
            .await
    }

    /// Raise the level by the configured step, stopping at full
    pub async fn volume_up(&self) -> Result<Level, SessionError> {
        self.step(self.session.config().volume_step).await
    }

    /// Lower the level by the configured step, stopping at zero
    pub async fn volume_down(&self) -> Result<Level, SessionError> {
        self.step(-self.session.config().volume_step).await
    }

    async fn step(&self, delta: f64) -> Result<Level, SessionError> {
        let level = self.volume().await?.offset(delta);
        self.set_level(level).await?;
        Ok(level)
    }

    pub async fn mute(&self) -> Result<bool, SessionError> {
        let stored: bool = self.session.read(&self.kind.mute_path()).await?;
        Ok(stored != self.kind.mute_inverted())
    }

    pub async fn set_mute(&self, muted: bool) -> Result<(), SessionError> {
        debug!("Setting {} mute to {}", self.kind, muted);
        let stored = muted != self.kind.mute_inverted();
        self.session
            .send_value(&self.kind.mute_path(), &stored)
            .await
    }

    /// Flip the mute state and return the new value
    ///
    /// Read-then-write: a mute change made elsewhere between the two steps is
    /// overwritten.
    pub async fn toggle_mute(&self) -> Result<bool, SessionError> {
        let muted = !self.mute().await?;
        self.set_mute(muted).await?;
        Ok(muted)
    }

    /// Read everything about the fader at once
    pub async fn snapshot(&self) -> Result<FaderSnapshot, SessionError> {
        Ok(FaderSnapshot {
            kind: self.kind,
            unique_id: self.unique_id(),
            name: self.name().await?,
            volume: self.volume().await?,
            muted: self.mute().await?,
        })
    }
}

/// Point-in-time view of one fader
#[derive(Debug, Clone, PartialEq)]
pub struct FaderSnapshot {
    pub kind: FaderKind,
    pub unique_id: String,
    pub name: String,
    pub volume: Level,
    pub muted: bool,
}

impl fmt::Display for FaderSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} {:<24} {:>5.1}%  {}",
            self.unique_id,
            self.name,
            self.volume.value() * 100.0,
            if self.muted { "MUTED" } else { "on" }
        )
    }
}
