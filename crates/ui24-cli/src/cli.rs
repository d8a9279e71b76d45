//! Command-line interface

use clap::{Parser, Subcommand, ValueEnum};
use ui24_session::FaderKind;

use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "ui24ctl")]
#[command(version)]
#[command(about = "Control a Soundcraft Ui-series mixing console")]
pub struct Cli {
    /// Console host name or IP (overrides the settings file)
    #[arg(short, long, global = true)]
    pub address: Option<String>,

    /// Console WebSocket port (overrides the settings file)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(address) = &self.address {
            settings.address = address.clone();
        }
        if let Some(port) = self.port {
            settings.session.port = port;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the console model and every input and aux fader
    Info,
    /// Show one fader (input:N, aux:N or input:N/aux:M, 0-based)
    Show { fader: FaderKind },
    /// Set a fader level between 0.0 and 1.0
    Volume { fader: FaderKind, level: f64 },
    /// Move a fader by the configured step
    Step {
        fader: FaderKind,
        #[arg(value_enum)]
        direction: Direction,
    },
    /// Mute or unmute a fader
    Mute {
        fader: FaderKind,
        #[arg(value_enum)]
        state: Switch,
    },
    /// Flip a fader's mute
    Toggle { fader: FaderKind },
    /// Print parameter changes until Ctrl-C
    Watch,
    /// Run a virtual console on a TCP port
    Simulate {
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: String,
    },
    /// Print the effective settings
    Config {
        /// Write them to the settings file
        #[arg(long)]
        save: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}
