//! Ui Console Command-Line Tool
//!
//! Reads and writes faders on a Soundcraft Ui-series console, follows its
//! parameter changes, and can stand in for a console during development.

mod cli;
mod commands;
mod settings;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Include all our crates in the default filter
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ui24ctl={level},ui24_protocol={level},ui24_session={level},ui24_sim={level}")
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut settings = Settings::load();
    cli.apply_to(&mut settings);

    commands::run(cli.command, settings).await
}
