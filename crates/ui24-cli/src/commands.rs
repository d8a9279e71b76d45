//! Subcommand handlers

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use ui24_session::{ConsoleSession, FaderKind, SessionEvent, UpdateOrigin};
use ui24_sim::ConsoleServer;

use crate::cli::{Commands, Direction, Switch};
use crate::settings::Settings;

pub async fn run(command: Commands, settings: Settings) -> Result<()> {
    match command {
        Commands::Simulate { listen } => simulate(&listen, settings).await,
        Commands::Config { save } => config(&settings, save),
        command => {
            let session = connect(&settings).await?;
            let result = run_on_session(&session, command).await;
            session.close().await;
            result
        }
    }
}

async fn connect(settings: &Settings) -> Result<ConsoleSession> {
    ConsoleSession::connect(settings.address.clone(), settings.session.clone())
        .await
        .with_context(|| {
            format!(
                "Could not connect to console at {}:{}",
                settings.address, settings.session.port
            )
        })
}

async fn run_on_session(session: &ConsoleSession, command: Commands) -> Result<()> {
    match command {
        Commands::Info => info_all(session).await,
        Commands::Show { fader } => show(session, fader).await,
        Commands::Volume { fader, level } => {
            session.fader(fader)?.set_volume(level).await?;
            show(session, fader).await
        }
        Commands::Step { fader, direction } => {
            let handle = session.fader(fader)?;
            match direction {
                Direction::Up => handle.volume_up().await?,
                Direction::Down => handle.volume_down().await?,
            };
            show(session, fader).await
        }
        Commands::Mute { fader, state } => {
            session.fader(fader)?.set_mute(state == Switch::On).await?;
            show(session, fader).await
        }
        Commands::Toggle { fader } => {
            session.fader(fader)?.toggle_mute().await?;
            show(session, fader).await
        }
        Commands::Watch => watch(session).await,
        Commands::Simulate { .. } | Commands::Config { .. } => Ok(()),
    }
}

async fn show(session: &ConsoleSession, fader: FaderKind) -> Result<()> {
    let snapshot = session
        .fader(fader)?
        .snapshot()
        .await
        .with_context(|| format!("Could not read {fader}"))?;
    println!("{snapshot}");
    Ok(())
}

async fn info_all(session: &ConsoleSession) -> Result<()> {
    let layout = session.config().layout;
    println!(
        "{} at {}",
        session.model().unwrap_or_else(|| "unknown console".into()),
        session.address()
    );
    println!("{} parameters cached", session.cache().len());

    let kinds = (0..layout.inputs)
        .map(|input| FaderKind::Input { input })
        .chain((0..layout.auxes).map(|aux| FaderKind::Aux { aux }));
    for kind in kinds {
        match session.fader(kind)?.snapshot().await {
            Ok(snapshot) => println!("{snapshot}"),
            Err(e) => println!("{:<16} {}", kind.unique_id(), e),
        }
    }
    Ok(())
}

async fn watch(session: &ConsoleSession) -> Result<()> {
    let mut events = session.subscribe();
    info!("Watching {} (Ctrl-C to stop)", session.address());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::ParameterChanged { path, value, origin: UpdateOrigin::Console }) => {
                    println!("{path} = {value}");
                }
                Ok(SessionEvent::StateChanged(state)) => println!("-- {state}"),
                Ok(SessionEvent::HandshakeComplete { model }) => println!("-- connected to {model}"),
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!("Missed {} events", n),
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

async fn simulate(listen: &str, settings: Settings) -> Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Could not listen on {listen}"))?;
    let addr = listener.local_addr()?;
    let server = ConsoleServer::new(settings.simulator);

    println!("Virtual console on ws://{addr} (Ctrl-C to stop)");
    tokio::select! {
        result = server.clone().run_listener(listener) => {
            result.context("Virtual console listener failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            let stats = server.stats();
            info!(
                "Virtual console stopped after {} connections (max {} at once)",
                stats.total_connections, stats.max_concurrent
            );
        }
    }
    Ok(())
}

fn config(settings: &Settings, save: bool) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    if save {
        let path = settings.save()?;
        println!("Saved to {}", path.display());
    } else if let Some(path) = Settings::settings_path() {
        println!("Settings file: {}", path.display());
    }
    Ok(())
}
