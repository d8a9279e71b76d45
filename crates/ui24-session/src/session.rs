//! Console session
//!
//! A [`ConsoleSession`] owns the connection to one console. Starting it spawns
//! a single background task that loops forever through:
//!
//! 1. open a socket through the [`Connector`] and run the WebSocket handshake
//! 2. read frames, answer keep-alive probes, write updates into the
//!    [`StateCache`], and write queued set commands to the socket
//! 3. on drop (close frame, read error, idle timeout, missing handshake),
//!    wait the reconnect delay and go back to 1
//!
//! The task is the only place that touches the socket, and it processes one
//! connection at a time, so there is never more than one receive loop writing
//! the cache. Callers talk to it through a command channel.
//!
//! A socket only counts as `Open` once the console has sent its model frame
//! (`SETS^model`) on it; that is the handshake `start` waits for.
//!
//! # Example
//!
//! ```rust,no_run
//! use ui24_session::{ConsoleSession, FaderKind, SessionConfig};
//!
//! # async fn demo() -> Result<(), ui24_session::SessionError> {
//! let session = ConsoleSession::connect("192.168.1.50", SessionConfig::default()).await?;
//!
//! let vocal = session.fader(FaderKind::Input { input: 4 })?;
//! vocal.set_volume(0.8).await?;
//! vocal.set_mute(false).await?;
//! println!("{} at {}", vocal.name().await?, vocal.volume().await?);
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};
use ui24_protocol::{
    Command, EncodeCommand, Frame, FrameCodec, ParameterPath, WireValue, MODEL_PATH,
};

use crate::cache::StateCache;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::events::{SessionEvent, UpdateOrigin};
use crate::fader::{Fader, FaderKind};
use crate::state::ConnectionState;
use crate::transport::{self, Connector, TcpConnector, WsReader, WsWriter};

/// Placeholder deadline while idle detection is off
const IDLE_DISABLED: Duration = Duration::from_secs(3600);

/// How long `stop` waits for the background task before aborting it
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Depth of the command queue into the background task
const COMMAND_QUEUE: usize = 64;

/// Commands sent to the session task
#[derive(Debug)]
enum SessionCommand {
    /// Write a command to the console and mirror it into the cache
    Send {
        command: Command,
        done: oneshot::Sender<Result<(), SessionError>>,
    },
    /// Close the socket and end the task
    Shutdown,
}

/// State shared between the session handle and its background task
#[derive(Debug)]
struct Shared {
    cache: StateCache,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            debug!("Session state -> {}", state);
            let _ = self.events_tx.send(SessionEvent::StateChanged(state));
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn record(&self, path: String, value: String, origin: UpdateOrigin) {
        self.cache.put(path.clone(), value.clone());
        let _ = self
            .events_tx
            .send(SessionEvent::ParameterChanged { path, value, origin });
    }
}

/// Handle to the running background task
struct Running {
    cmd_tx: mpsc::Sender<SessionCommand>,
    task: JoinHandle<()>,
}

/// Connection to one console
pub struct ConsoleSession {
    address: String,
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for ConsoleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleSession")
            .field("address", &self.address)
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}

impl ConsoleSession {
    /// Create an idle session for a console reachable over TCP
    pub fn new(address: impl Into<String>, config: SessionConfig) -> Result<Self, SessionError> {
        Self::with_connector(address, config, Arc::new(TcpConnector))
    }

    /// Create an idle session using a custom connector
    pub fn with_connector(
        address: impl Into<String>,
        config: SessionConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, SessionError> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(SessionError::InvalidArgument(
                "console address must not be empty".into(),
            ));
        }

        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));

        Ok(Self {
            address: address.trim().to_string(),
            config,
            connector,
            shared: Arc::new(Shared {
                cache: StateCache::new(),
                state_tx,
                events_tx,
            }),
            running: Mutex::new(None),
        })
    }

    /// Create a session and start it
    pub async fn connect(
        address: impl Into<String>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let session = Self::new(address, config)?;
        session.start().await?;
        Ok(session)
    }

    /// Console address this session targets
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Parameter cache fed by the receive loop
    pub fn cache(&self) -> &StateCache {
        &self.shared.cache
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Receiver that observes every connection state change
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events_tx.subscribe()
    }

    /// Console model, once the first handshake has completed
    pub fn model(&self) -> Option<String> {
        self.shared.cache.get(MODEL_PATH)
    }

    /// Open the connection and wait for the console handshake
    ///
    /// Returns once the session is `Open`, or fails with
    /// [`SessionError::ConnectTimeout`] after the configured window, in which
    /// case the background task is torn down and the session is `Idle` again.
    /// Starting a session that is already running just waits for `Open`.
    pub async fn start(&self) -> Result<(), SessionError> {
        {
            let mut running = self.running.lock();
            match self.shared.state() {
                ConnectionState::Closed => return Err(SessionError::Stopped),
                ConnectionState::Idle if running.is_none() => {
                    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
                    let ctx = LoopContext {
                        address: self.address.clone(),
                        config: self.config.clone(),
                        connector: self.connector.clone(),
                        shared: self.shared.clone(),
                    };
                    info!("Starting session for console {}", self.address);
                    self.shared.set_state(ConnectionState::Connecting);
                    let task = tokio::spawn(run_session_loop(ctx, cmd_rx));
                    *running = Some(Running { cmd_tx, task });
                }
                _ => {}
            }
        }

        let timeout = self.config.connect_timeout();
        match self.wait_for_state(ConnectionState::Open, timeout).await {
            Ok(()) => Ok(()),
            Err(ConnectionState::Closed) => Err(SessionError::Stopped),
            Err(_) => {
                warn!(
                    "Console {} did not complete handshake within {:?}",
                    self.address, timeout
                );
                self.halt().await;
                if self.shared.state() != ConnectionState::Closed {
                    self.shared.set_state(ConnectionState::Idle);
                }
                Err(SessionError::ConnectTimeout(timeout))
            }
        }
    }

    /// Close the socket and stop reconnecting
    ///
    /// Safe to call more than once and from any task.
    pub async fn stop(&self) {
        let was_running = self.halt().await;
        if was_running || self.shared.state() != ConnectionState::Closed {
            info!("Session for console {} stopped", self.address);
        }
        self.shared.set_state(ConnectionState::Closed);
    }

    /// Alias for [`stop`](Self::stop)
    pub async fn close(&self) {
        self.stop().await;
    }

    /// Tear down the background task, if any; returns whether one was running
    async fn halt(&self) -> bool {
        let running = self.running.lock().take();
        let Some(Running { cmd_tx, mut task }) = running else {
            return false;
        };

        if cmd_tx.try_send(SessionCommand::Shutdown).is_err() {
            task.abort();
        }
        drop(cmd_tx);

        if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
            warn!("Session task did not stop in time, aborting");
            task.abort();
            let _ = task.await;
        }
        true
    }

    /// Wait until the state equals `wanted`; on failure returns the last state seen
    async fn wait_for_state(
        &self,
        wanted: ConnectionState,
        timeout: Duration,
    ) -> Result<(), ConnectionState> {
        let deadline = Instant::now() + timeout;
        let mut states = self.shared.state_tx.subscribe();

        loop {
            let current = *states.borrow_and_update();
            if current == wanted {
                return Ok(());
            }
            if matches!(current, ConnectionState::Closed | ConnectionState::Idle) {
                return Err(current);
            }
            match tokio::time::timeout_at(deadline, states.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) | Err(_) => return Err(*states.borrow()),
            }
        }
    }

    /// Write a raw value to a parameter
    ///
    /// Waits up to the read timeout for the connection to be `Open`. If the
    /// socket fails while writing, the command is retried on the next
    /// connection within the same window. Once the command is on the wire the
    /// value is mirrored into the cache, so an immediate read sees it without
    /// waiting for the console's echo.
    pub async fn send(
        &self,
        path: &ParameterPath,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        let command = Command::Set {
            path: path.clone(),
            value: value.into(),
        };
        let deadline = Instant::now() + self.config.read_timeout();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.wait_for_state(ConnectionState::Open, remaining).await {
                Ok(()) => {}
                Err(ConnectionState::Closed) => return Err(SessionError::Stopped),
                Err(_) => return Err(SessionError::NotConnected),
            }

            let cmd_tx = match self.running.lock().as_ref() {
                Some(running) => running.cmd_tx.clone(),
                None => return Err(SessionError::Stopped),
            };

            let (done, result) = oneshot::channel();
            cmd_tx
                .send(SessionCommand::Send {
                    command: command.clone(),
                    done,
                })
                .await
                .map_err(|_| SessionError::Stopped)?;

            match result.await.map_err(|_| SessionError::Stopped)? {
                // Socket went away under us; retry on the next one
                Err(SessionError::NotConnected) if Instant::now() < deadline => {
                    debug!("Console {} not writable, retrying {}", self.address, path);
                }
                result => return result,
            }
        }
    }

    /// Encode and write a typed value
    pub async fn send_value<V: WireValue>(
        &self,
        path: &ParameterPath,
        value: &V,
    ) -> Result<(), SessionError> {
        self.send(path, value.to_wire()).await
    }

    /// Read a raw value, waiting up to the read timeout for it to appear
    pub async fn read_raw(&self, path: &ParameterPath) -> Result<String, SessionError> {
        self.shared
            .cache
            .wait_for(path.as_str(), self.config.read_timeout())
            .await
    }

    /// Read and decode a typed value
    pub async fn read<V: WireValue>(&self, path: &ParameterPath) -> Result<V, SessionError> {
        let raw = self.read_raw(path).await?;
        V::from_wire(&raw).map_err(|source| SessionError::ProtocolViolation {
            path: path.to_string(),
            source,
        })
    }

    /// Typed accessor for one fader
    pub fn fader(&self, kind: FaderKind) -> Result<Fader<'_>, SessionError> {
        kind.validate(&self.config.layout)?;
        Ok(Fader::new(self, kind))
    }

    /// Main-mix fader of an input channel
    pub fn input(&self, input: u8) -> Result<Fader<'_>, SessionError> {
        self.fader(FaderKind::Input { input })
    }

    /// Master fader of an aux bus
    pub fn aux(&self, aux: u8) -> Result<Fader<'_>, SessionError> {
        self.fader(FaderKind::Aux { aux })
    }

    /// Send from an input channel into an aux bus
    pub fn input_aux(&self, input: u8, aux: u8) -> Result<Fader<'_>, SessionError> {
        self.fader(FaderKind::InputAux { input, aux })
    }
}

impl Drop for ConsoleSession {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.task.abort();
        }
    }
}

/// Everything the background task needs
struct LoopContext {
    address: String,
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
}

/// Why a connection ended
enum ConnectionEnd {
    /// Socket lost; reconnect after the delay
    Dropped,
    /// Stop requested; leave the loop
    Shutdown,
}

/// Reply to a command that arrived while no socket is usable
fn refuse(cmd: Option<SessionCommand>) -> Option<ConnectionEnd> {
    match cmd {
        Some(SessionCommand::Send { done, .. }) => {
            let _ = done.send(Err(SessionError::NotConnected));
            None
        }
        Some(SessionCommand::Shutdown) | None => Some(ConnectionEnd::Shutdown),
    }
}

/// Main reconnection loop - runs until shutdown is requested or the handle is dropped
async fn run_session_loop(ctx: LoopContext, mut cmd_rx: mpsc::Receiver<SessionCommand>) {
    let delay = ctx.config.reconnect_delay();
    let mut attempt: u32 = 0;

    loop {
        ctx.shared.set_state(ConnectionState::Connecting);
        attempt = attempt.saturating_add(1);

        if let ConnectionEnd::Shutdown = connect_and_run(&ctx, &mut cmd_rx, attempt).await {
            break;
        }

        info!(
            "Reconnecting to console {} in {:.1}s",
            ctx.address,
            delay.as_secs_f32()
        );
        ctx.shared.set_state(ConnectionState::Connecting);

        let backoff = tokio::time::sleep(delay);
        tokio::pin!(backoff);
        loop {
            tokio::select! {
                _ = &mut backoff => break,
                cmd = cmd_rx.recv() => {
                    if let Some(ConnectionEnd::Shutdown) = refuse(cmd) {
                        info!("Shutdown requested during reconnect backoff");
                        return;
                    }
                }
            }
        }
    }

    info!("Session loop ended for console {}", ctx.address);
}

/// Open one socket and service it until it drops
async fn connect_and_run(
    ctx: &LoopContext,
    cmd_rx: &mut mpsc::Receiver<SessionCommand>,
    attempt: u32,
) -> ConnectionEnd {
    let url = transport::ws_url(&ctx.address, ctx.config.port);
    debug!("Connecting to {} (attempt {})", url, attempt);

    let open = tokio::time::timeout(ctx.config.connect_timeout(), async {
        let stream = ctx
            .connector
            .connect(&ctx.address, ctx.config.port)
            .await?;
        transport::handshake(stream, &url)
            .await
            .map_err(SessionError::from)
    });
    tokio::pin!(open);

    let (writer, reader) = loop {
        tokio::select! {
            result = &mut open => match result {
                Ok(Ok(halves)) => break halves,
                Ok(Err(e)) => {
                    error!("Failed to connect to {}: {}", url, e);
                    return ConnectionEnd::Dropped;
                }
                Err(_) => {
                    error!("Timed out connecting to {}", url);
                    return ConnectionEnd::Dropped;
                }
            },
            cmd = cmd_rx.recv() => {
                if let Some(end) = refuse(cmd) {
                    return end;
                }
            }
        }
    };

    debug!("Socket to {} open, waiting for console handshake", url);
    Connection {
        ctx,
        writer,
        reader,
        codec: FrameCodec::new(),
        handshaken: false,
    }
    .run(cmd_rx)
    .await
}

/// One live socket
struct Connection<'a> {
    ctx: &'a LoopContext,
    writer: WsWriter,
    reader: WsReader,
    codec: FrameCodec,
    handshaken: bool,
}

impl Connection<'_> {
    async fn run(mut self, cmd_rx: &mut mpsc::Receiver<SessionCommand>) -> ConnectionEnd {
        let handshake_deadline = tokio::time::sleep(self.ctx.config.connect_timeout());
        tokio::pin!(handshake_deadline);

        let idle_timeout = self.ctx.config.idle_timeout();
        let mut last_activity = Instant::now();

        loop {
            let idle_deadline = last_activity + idle_timeout.unwrap_or(IDLE_DISABLED);

            tokio::select! {
                msg = self.reader.recv() => {
                    last_activity = Instant::now();
                    match msg {
                        Some(Ok(transport::Incoming::Text(text))) => {
                            self.codec.push_message(&text);
                            if let Err(e) = self.drain_frames().await {
                                error!("Failed to answer console: {}", e);
                                return ConnectionEnd::Dropped;
                            }
                        }
                        Some(Ok(transport::Incoming::Other)) => {}
                        Some(Ok(transport::Incoming::Closed)) | None => {
                            info!("Connection closed by console {}", self.ctx.address);
                            return ConnectionEnd::Dropped;
                        }
                        Some(Err(e)) => {
                            error!("WebSocket error from console {}: {}", self.ctx.address, e);
                            return ConnectionEnd::Dropped;
                        }
                    }
                }

                cmd = cmd_rx.recv() => match cmd {
                    Some(SessionCommand::Send { command, done }) => {
                        if !self.handshaken {
                            let _ = done.send(Err(SessionError::NotConnected));
                        } else if let Err(e) = self.write_command(command).await {
                            error!("Failed to write to console {}: {}", self.ctx.address, e);
                            self.ctx.shared.set_state(ConnectionState::Connecting);
                            let _ = done.send(Err(SessionError::NotConnected));
                            return ConnectionEnd::Dropped;
                        } else {
                            let _ = done.send(Ok(()));
                        }
                    }
                    Some(SessionCommand::Shutdown) | None => {
                        info!("Shutdown requested for console {}", self.ctx.address);
                        let _ = self.writer.close().await;
                        return ConnectionEnd::Shutdown;
                    }
                },

                _ = &mut handshake_deadline, if !self.handshaken => {
                    warn!(
                        "Console {} sent no model frame within {:?}",
                        self.ctx.address,
                        self.ctx.config.connect_timeout()
                    );
                    return ConnectionEnd::Dropped;
                }

                _ = tokio::time::sleep_until(idle_deadline), if idle_timeout.is_some() => {
                    warn!(
                        "Console {} silent for {:?}, dropping connection",
                        self.ctx.address,
                        last_activity.elapsed()
                    );
                    return ConnectionEnd::Dropped;
                }
            }
        }
    }

    /// Apply every queued frame in arrival order
    async fn drain_frames(&mut self) -> Result<(), SessionError> {
        while let Some((frame, line)) = self.codec.next_frame_with_line() {
            match frame {
                Frame::KeepAlivePing => {
                    trace!("<< {}", line);
                    self.writer.send_text(Command::Alive.encode()).await?;
                    trace!(">> {}", Command::Alive.body());
                }
                Frame::StateUpdate { path, value } => {
                    debug!("<< {}^{}", path, value);
                    let is_model = path == MODEL_PATH;
                    self.ctx
                        .shared
                        .record(path, value.clone(), UpdateOrigin::Console);
                    if is_model && !self.handshaken {
                        self.complete_handshake(value);
                    }
                }
                Frame::Ignorable { .. } => {}
                Frame::Unrecognized { raw } => {
                    warn!("Unrecognized message from console: {}", raw);
                    let _ = self
                        .ctx
                        .shared
                        .events_tx
                        .send(SessionEvent::UnrecognizedFrame { raw });
                }
            }
        }
        Ok(())
    }

    fn complete_handshake(&mut self, model: String) {
        self.handshaken = true;
        info!("Console {} identified as {}", self.ctx.address, model);
        self.ctx.shared.set_state(ConnectionState::Open);
        let _ = self
            .ctx
            .shared
            .events_tx
            .send(SessionEvent::HandshakeComplete { model });
    }

    /// Write a command and mirror it into the cache; requires a completed handshake
    async fn write_command(&mut self, command: Command) -> Result<(), SessionError> {
        self.writer.send_text(command.encode()).await?;

        match command {
            Command::Set { path, value } => {
                debug!(">> {}^{}", path, value);
                self.ctx
                    .shared
                    .record(path.into_string(), value, UpdateOrigin::Local);
            }
            Command::Alive => trace!(">> {}", command.body()),
        }
        Ok(())
    }
}
