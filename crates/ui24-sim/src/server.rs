//! Virtual console server
//!
//! Serves a [`VirtualConsole`] over WebSocket, either to in-memory duplex
//! streams (tests) or to a TCP listener (`ui24ctl simulate`). Each connection
//! runs its own task with a select! loop over:
//! - text frames from the client (set commands and keep-alive answers)
//! - updates broadcast to every client (echoes, pushes, injected lines)
//! - the keep-alive probe and meter timers
//! - the drop-all signal used to simulate network loss

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rand::Rng;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval_at, Instant, Interval};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};
use ui24_protocol::PING;

use crate::console::{update_line, ClientLine, VirtualConsole, VirtualConsoleConfig};

/// Buffer size of each in-memory connection
const DUPLEX_BUFFER: usize = 64 * 1024;

/// Depth of the per-client update queue
const UPDATE_QUEUE: usize = 1024;

/// Connection counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Connections accepted since the server was created
    pub total_connections: u64,
    /// Connections currently open
    pub active_connections: usize,
    /// Highest number of simultaneously open connections
    pub max_concurrent: usize,
}

#[derive(Debug)]
struct Inner {
    config: VirtualConsoleConfig,
    console: Mutex<VirtualConsole>,
    updates_tx: broadcast::Sender<String>,
    drop_tx: broadcast::Sender<()>,
    suppress_model: AtomicBool,
    received: Mutex<VecDeque<String>>,
    stats: Mutex<ServerStats>,
    next_id: AtomicU64,
}

/// Handle to a running virtual console; clones share the same console
#[derive(Debug, Clone)]
pub struct ConsoleServer {
    inner: Arc<Inner>,
}

impl Default for ConsoleServer {
    fn default() -> Self {
        Self::new(VirtualConsoleConfig::default())
    }
}

impl ConsoleServer {
    pub fn new(config: VirtualConsoleConfig) -> Self {
        let (updates_tx, _) = broadcast::channel(UPDATE_QUEUE);
        let (drop_tx, _) = broadcast::channel(4);
        Self {
            inner: Arc::new(Inner {
                console: Mutex::new(VirtualConsole::from_config(&config)),
                config,
                updates_tx,
                drop_tx,
                suppress_model: AtomicBool::new(false),
                received: Mutex::new(VecDeque::new()),
                stats: Mutex::new(ServerStats::default()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &VirtualConsoleConfig {
        &self.inner.config
    }

    /// Open an in-memory connection and serve it on a new task
    ///
    /// The returned stream is the client end; run a WebSocket client
    /// handshake over it.
    pub fn connect_duplex(&self) -> DuplexStream {
        let (client, server) = tokio::io::duplex(DUPLEX_BUFFER);
        tokio::spawn(self.clone().serve_connection(server));
        client
    }

    /// Accept TCP clients until the listener fails
    pub async fn run_listener(self, listener: TcpListener) -> io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!("Virtual console listening on ws://{}", addr);
        }
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!("Accepted TCP client {}", peer);
            let _ = stream.set_nodelay(true);
            tokio::spawn(self.clone().serve_connection(stream));
        }
    }

    /// Bind a TCP listener and serve it in the background
    pub async fn spawn_listener(&self, addr: &str) -> io::Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        let server = self.clone();
        tokio::spawn(async move {
            if let Err(e) = server.run_listener(listener).await {
                warn!("Virtual console listener stopped: {}", e);
            }
        });
        Ok(local)
    }

    /// Serve one client stream until it closes or is dropped
    pub async fn serve_connection<S>(self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let ws = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!("WebSocket handshake with client failed: {}", e);
                return;
            }
        };

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.register(id);
        if let Err(e) = self.run_connection(id, ws).await {
            debug!("Client {} ended with error: {}", id, e);
        }
        self.unregister(id);
    }

    async fn run_connection<S>(
        &self,
        id: u64,
        ws: tokio_tungstenite::WebSocketStream<S>,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut sink, mut source) = ws.split();

        // Subscribe before the dump so nothing set in between is missed
        let mut updates = self.inner.updates_tx.subscribe();
        let mut drops = self.inner.drop_tx.subscribe();

        let include_model = !self.inner.suppress_model.load(Ordering::SeqCst);
        let dump = self.inner.console.lock().dump(include_model);
        debug!("Client {}: sending {} parameters", id, dump.len());
        sink.send(Message::Text(dump.join("\n"))).await?;

        let mut ping = timer(self.inner.config.ping_interval_ms);
        let mut meters = timer(self.inner.config.meter_interval_ms);

        loop {
            tokio::select! {
                msg = source.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        for line in text.lines().filter(|l| !l.trim().is_empty()) {
                            self.handle_line(id, line);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client {} disconnected", id);
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e),
                },

                update = updates.recv() => match update {
                    Ok(line) => sink.send(Message::Text(line)).await?,
                    Err(RecvError::Lagged(n)) => warn!("Client {} missed {} updates", id, n),
                    Err(RecvError::Closed) => return Ok(()),
                },

                _ = drops.recv() => {
                    info!("Dropping client {}", id);
                    return Ok(());
                }

                _ = tick(&mut ping) => {
                    trace!("Client {}: ping", id);
                    sink.send(Message::Text(PING.to_string())).await?;
                }

                _ = tick(&mut meters) => {
                    sink.send(Message::Text(meter_line(self.inner.config.inputs))).await?;
                }
            }
        }
    }

    fn handle_line(&self, id: u64, line: &str) {
        let result = self.inner.console.lock().apply_line(line);
        if result != ClientLine::Alive {
            self.remember(line);
        }
        match result {
            ClientLine::Set { path, value } => {
                debug!("Client {} set {} = {}", id, path, value);
                let _ = self.inner.updates_tx.send(update_line(&path, &value));
            }
            ClientLine::Alive => trace!("Client {}: alive", id),
            ClientLine::Other => debug!("Client {} sent unknown line: {}", id, line),
        }
    }

    fn remember(&self, line: &str) {
        let limit = self.inner.config.history_limit;
        let mut received = self.inner.received.lock();
        received.push_back(line.to_string());
        while received.len() > limit {
            received.pop_front();
        }
    }

    fn register(&self, id: u64) {
        let mut stats = self.inner.stats.lock();
        stats.total_connections += 1;
        stats.active_connections += 1;
        stats.max_concurrent = stats.max_concurrent.max(stats.active_connections);
        info!(
            "Client {} connected ({} active)",
            id, stats.active_connections
        );
    }

    fn unregister(&self, id: u64) {
        let mut stats = self.inner.stats.lock();
        stats.active_connections = stats.active_connections.saturating_sub(1);
        info!(
            "Client {} closed ({} active)",
            id, stats.active_connections
        );
    }

    /// Change a parameter as if moved on the console and push it to every client
    pub fn push(&self, path: &str, value: &str) {
        let line = self.inner.console.lock().set(path, value);
        let _ = self.inner.updates_tx.send(line);
    }

    /// Send a raw line to every client without touching the table
    pub fn inject(&self, line: impl Into<String>) {
        let _ = self.inner.updates_tx.send(line.into());
    }

    /// Cut every open connection without a close frame
    pub fn drop_connections(&self) {
        let _ = self.inner.drop_tx.send(());
    }

    /// Leave the model frame out of the dump sent to new clients
    pub fn set_model_suppressed(&self, suppressed: bool) {
        self.inner.suppress_model.store(suppressed, Ordering::SeqCst);
    }

    /// Current table value of a parameter
    pub fn value(&self, path: &str) -> Option<String> {
        self.inner.console.lock().get(path).map(str::to_string)
    }

    /// Recent lines received from any client, in arrival order
    ///
    /// Keep-alive answers are only counted (see [`alive_count`](Self::alive_count)),
    /// and at most `history_limit` lines are kept.
    pub fn received(&self) -> Vec<String> {
        self.inner.received.lock().iter().cloned().collect()
    }

    /// Received lines that were set commands for `path`
    pub fn writes_to(&self, path: &str) -> Vec<String> {
        let prefix = format!("{}{}^", ui24_protocol::COMMAND_PREFIX, path);
        self.inner
            .received
            .lock()
            .iter()
            .filter_map(|line| line.strip_prefix(&prefix))
            .map(str::to_string)
            .collect()
    }

    /// Keep-alive answers received from all clients
    pub fn alive_count(&self) -> u64 {
        self.inner.console.lock().alive_count()
    }

    pub fn stats(&self) -> ServerStats {
        *self.inner.stats.lock()
    }
}

fn timer(period_ms: u64) -> Option<Interval> {
    (period_ms > 0).then(|| {
        let period = Duration::from_millis(period_ms);
        interval_at(Instant::now() + period, period)
    })
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// One `VU2` frame of random meter bytes
fn meter_line(channels: u8) -> String {
    let mut rng = rand::rng();
    let levels: String = (0..channels.max(1))
        .map(|_| format!("{:02x}", rng.random::<u8>()))
        .collect();
    format!("{}VU2^{}", ui24_protocol::COMMAND_PREFIX, levels)
}
