//! Integration tests for the console session
//!
//! These tests run a real `ConsoleSession` against the virtual console over
//! in-memory streams carrying real WebSocket framing, and verify:
//! - Connection lifecycle, handshake and reconnection
//! - Keep-alive handling and its log level
//! - Fader reads and writes as they appear on the wire
//! - Ordering of console pushes and local echoes

use std::time::Duration;

use ui24_protocol::ParameterPath;
use ui24_session::{
    ConnectionState, ConsoleLayout, ConsoleSession, FaderKind, Level, SessionConfig, SessionError,
    SessionEvent, UpdateOrigin,
};
use ui24_sim::{ConsoleServer, VirtualConsoleConfig};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
    use tokio::time::Instant;
    use tracing_subscriber::fmt::MakeWriter;
    use ui24_session::{BoxedStream, Connector};

    /// Connector that opens in-memory connections to a virtual console
    pub struct SimConnector(pub ConsoleServer);

    impl Connector for SimConnector {
        fn connect<'a>(
            &'a self,
            _host: &'a str,
            _port: u16,
        ) -> BoxFuture<'a, io::Result<BoxedStream>> {
            let stream = self.0.connect_duplex();
            async move { Ok(Box::new(stream) as BoxedStream) }.boxed()
        }
    }

    /// Byte stream whose writes fail once `broken` is set
    pub struct FlakyStream {
        inner: DuplexStream,
        broken: Arc<AtomicBool>,
    }

    impl AsyncRead for FlakyStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for FlakyStream {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.broken.load(Ordering::SeqCst) {
                return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
            }
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    /// Connector whose first connection can be broken on demand
    pub struct FlakyConnector {
        pub server: ConsoleServer,
        pub broken: Arc<AtomicBool>,
        handed_out: AtomicBool,
    }

    impl FlakyConnector {
        pub fn new(server: ConsoleServer) -> Self {
            Self {
                server,
                broken: Arc::new(AtomicBool::new(false)),
                handed_out: AtomicBool::new(false),
            }
        }
    }

    impl Connector for FlakyConnector {
        fn connect<'a>(
            &'a self,
            _host: &'a str,
            _port: u16,
        ) -> BoxFuture<'a, io::Result<BoxedStream>> {
            let broken = if self.handed_out.swap(true, Ordering::SeqCst) {
                Arc::new(AtomicBool::new(false))
            } else {
                self.broken.clone()
            };
            let stream = FlakyStream {
                inner: self.server.connect_duplex(),
                broken,
            };
            async move { Ok(Box::new(stream) as BoxedStream) }.boxed()
        }
    }

    /// Log output collected by a test subscriber
    #[derive(Clone, Default)]
    pub struct CapturedLogs(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Small console without automatic pings
    pub fn sim() -> ConsoleServer {
        sim_with_pings(0)
    }

    pub fn sim_with_pings(ping_interval_ms: u64) -> ConsoleServer {
        ConsoleServer::new(VirtualConsoleConfig {
            inputs: 8,
            auxes: 4,
            ping_interval_ms,
            ..Default::default()
        })
    }

    /// Short timeouts so failures surface quickly
    pub fn fast_config() -> SessionConfig {
        SessionConfig {
            connect_timeout_ms: 1000,
            read_timeout_ms: 500,
            reconnect_delay_ms: 50,
            idle_timeout_ms: 0,
            layout: ConsoleLayout {
                inputs: 8,
                auxes: 4,
            },
            ..Default::default()
        }
    }

    pub fn session_for(server: &ConsoleServer, config: SessionConfig) -> ConsoleSession {
        ConsoleSession::with_connector(
            "ui24.test",
            config,
            Arc::new(SimConnector(server.clone())),
        )
        .unwrap()
    }

    pub async fn connected(server: &ConsoleServer) -> ConsoleSession {
        let session = session_for(server, fast_config());
        session.start().await.unwrap();
        session
    }

    /// Poll until `check` holds, failing after two seconds
    pub async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !check() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Wait for the next `HandshakeComplete` after a `StateChanged(Connecting)`
    pub async fn wait_for_reconnect(events: &mut tokio::sync::broadcast::Receiver<SessionEvent>) {
        let mut saw_connecting = false;
        tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::StateChanged(ConnectionState::Connecting)) => {
                        saw_connecting = true
                    }
                    Ok(SessionEvent::HandshakeComplete { .. }) if saw_connecting => break,
                    Ok(_) => {}
                    Err(e) => panic!("event stream failed: {e}"),
                }
            }
        })
        .await
        .expect("session did not reconnect");
    }
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

mod lifecycle_tests {
    use super::helpers::*;
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[tokio::test]
    async fn start_opens_and_reports_model() {
        let server = sim();
        let session = connected(&server).await;

        assert_eq!(session.state(), ConnectionState::Open);
        assert_eq!(session.model().as_deref(), Some("ui24"));
        assert_eq!(session.cache().get("SETD^i.0.mix").as_deref(), Some("0.5"));
        assert_eq!(server.stats().active_connections, 1);

        session.close().await;
        assert_eq!(session.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn start_times_out_without_model_frame() {
        let server = sim();
        server.set_model_suppressed(true);

        let session = session_for(
            &server,
            SessionConfig {
                connect_timeout_ms: 300,
                ..fast_config()
            },
        );
        let err = session.start().await.unwrap_err();
        assert!(matches!(err, SessionError::ConnectTimeout(_)), "{err:?}");
        assert_eq!(session.state(), ConnectionState::Idle);
        assert!(session.model().is_none());

        // Once the console identifies itself the same session can start
        server.set_model_suppressed(false);
        session.start().await.unwrap();
        assert_eq!(session.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn empty_address_is_rejected() {
        for address in ["", "   "] {
            let err = ConsoleSession::new(address, SessionConfig::default()).unwrap_err();
            assert!(matches!(err, SessionError::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn send_before_start_is_not_connected() {
        let server = sim();
        let session = session_for(&server, fast_config());
        let err = session
            .send(&ParameterPath::input_mix(0), "0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
    }

    #[tokio::test]
    async fn stop_is_terminal_and_idempotent() {
        let server = sim();
        let session = connected(&server).await;

        session.stop().await;
        session.stop().await;
        assert_eq!(session.state(), ConnectionState::Closed);

        let err = session.input(0).unwrap().set_volume(0.3).await.unwrap_err();
        assert!(matches!(err, SessionError::Stopped));
        assert!(matches!(session.start().await, Err(SessionError::Stopped)));

        // Cached values stay readable after stop
        let volume = session.input(0).unwrap().volume().await.unwrap();
        assert_eq!(volume.value(), 0.5);

        eventually("server to see the close", || {
            server.stats().active_connections == 0
        })
        .await;
    }

    #[tokio::test]
    async fn reconnects_after_connection_drop() {
        let server = sim();
        let session = connected(&server).await;
        let mut events = session.subscribe();

        server.drop_connections();
        wait_for_reconnect(&mut events).await;

        assert_eq!(session.state(), ConnectionState::Open);
        let stats = server.stats();
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.max_concurrent, 1);

        // The new socket is usable
        session.aux(0).unwrap().set_mute(true).await.unwrap();
        eventually("write after reconnect", || {
            server.writes_to("SETD^a.0.mute") == vec!["1"]
        })
        .await;
    }

    #[tokio::test]
    async fn send_waits_for_reconnect() {
        let server = sim();
        let session = connected(&server).await;
        let mut events = session.subscribe();

        server.drop_connections();
        loop {
            if let SessionEvent::StateChanged(ConnectionState::Connecting) =
                events.recv().await.unwrap()
            {
                break;
            }
        }

        session.input(1).unwrap().set_volume(0.9).await.unwrap();
        eventually("write on the new socket", || {
            server.value("SETD^i.1.mix").as_deref() == Some("0.9")
        })
        .await;
    }

    #[tokio::test]
    async fn failed_write_is_retried_on_the_next_socket() {
        let server = sim();
        let connector = Arc::new(FlakyConnector::new(server.clone()));
        let session =
            ConsoleSession::with_connector("ui24.test", fast_config(), connector.clone())
                .unwrap();
        session.start().await.unwrap();

        connector.broken.store(true, Ordering::SeqCst);
        session.input(0).unwrap().set_volume(0.3).await.unwrap();

        eventually("write on the replacement socket", || {
            server.value("SETD^i.0.mix").as_deref() == Some("0.3")
        })
        .await;
        assert_eq!(session.state(), ConnectionState::Open);
        assert_eq!(server.stats().total_connections, 2);
    }

    #[tokio::test]
    async fn failed_write_without_reconnect_is_not_connected() {
        let server = sim();
        let connector = Arc::new(FlakyConnector::new(server.clone()));
        let session =
            ConsoleSession::with_connector("ui24.test", fast_config(), connector.clone())
                .unwrap();
        session.start().await.unwrap();

        server.set_model_suppressed(true);
        connector.broken.store(true, Ordering::SeqCst);
        let result = session.input(0).unwrap().set_volume(0.3).await;

        assert!(
            matches!(result, Err(SessionError::NotConnected)),
            "unexpected result: {result:?}"
        );
        assert!(server.writes_to("SETD^i.0.mix").is_empty());
    }

    #[tokio::test]
    async fn idle_socket_is_replaced() {
        let server = sim();
        let session = session_for(
            &server,
            SessionConfig {
                idle_timeout_ms: 200,
                ..fast_config()
            },
        );
        session.start().await.unwrap();
        let mut events = session.subscribe();

        wait_for_reconnect(&mut events).await;
        assert!(server.stats().total_connections >= 2);
        assert_eq!(server.stats().max_concurrent, 1);
    }

    #[tokio::test]
    async fn pings_keep_socket_alive() {
        let server = sim_with_pings(50);
        let session = session_for(
            &server,
            SessionConfig {
                idle_timeout_ms: 300,
                ..fast_config()
            },
        );
        session.start().await.unwrap();

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(session.state(), ConnectionState::Open);
        assert_eq!(server.stats().total_connections, 1);
        assert!(server.alive_count() >= 5);
    }
}

// ============================================================================
// Keep-Alive Tests
// ============================================================================

mod keep_alive_tests {
    use super::helpers::*;
    use super::*;

    #[tokio::test]
    async fn ping_gets_exactly_one_alive() {
        let server = sim();
        let session = connected(&server).await;

        server.inject("2::");
        eventually("alive reply", || server.alive_count() == 1).await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(server.alive_count(), 1);
        assert_eq!(session.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn keep_alive_traffic_stays_out_of_debug_logs() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let server = sim();
        let session = connected(&server).await;
        server.inject("2::");
        eventually("alive reply", || server.alive_count() == 1).await;
        session.input(0).unwrap().set_volume(0.4).await.unwrap();
        session.close().await;

        let text = logs.text();
        assert!(text.contains("SETD^i.0.mix"), "nothing captured:\n{text}");
        for line in text.lines() {
            assert!(
                !line.contains("ALIVE") && !line.contains("2::"),
                "keep-alive logged: {line}"
            );
        }
    }

    #[tokio::test]
    async fn ping_is_not_cached() {
        let server = sim();
        let session = connected(&server).await;
        let before = session.cache().len();

        server.inject("2::");
        server.inject("3:::VU2^00ff00ff");
        eventually("alive reply", || server.alive_count() == 1).await;

        assert_eq!(session.cache().len(), before);
    }
}

// ============================================================================
// Fader Tests
// ============================================================================

mod fader_tests {
    use super::helpers::*;
    use super::*;

    #[tokio::test]
    async fn input_mute_is_inverted_on_the_wire() {
        let server = sim();
        let session = connected(&server).await;
        let fader = session.input(4).unwrap();

        fader.set_mute(true).await.unwrap();
        eventually("forceunmute write", || {
            server
                .received()
                .contains(&"3:::SETD^i.4.forceunmute^0".to_string())
        })
        .await;
        assert!(fader.mute().await.unwrap());
    }

    #[tokio::test]
    async fn input_mute_reads_inverted() {
        let server = sim();
        let session = connected(&server).await;
        let fader = session.input(4).unwrap();

        assert_eq!(
            session.cache().get("SETD^i.4.forceunmute").as_deref(),
            Some("1")
        );
        assert!(!fader.mute().await.unwrap());

        server.push("SETD^i.4.forceunmute", "0");
        eventually("pushed unmute flag", || {
            session.cache().get("SETD^i.4.forceunmute").as_deref() == Some("0")
        })
        .await;
        assert!(fader.mute().await.unwrap());
    }

    #[tokio::test]
    async fn set_mute_twice_writes_twice() {
        let server = sim();
        let session = connected(&server).await;
        let fader = session.aux(1).unwrap();

        fader.set_mute(true).await.unwrap();
        fader.set_mute(true).await.unwrap();

        assert!(fader.mute().await.unwrap());
        eventually("two writes", || server.writes_to("SETD^a.1.mute").len() == 2).await;
        assert_eq!(server.writes_to("SETD^a.1.mute"), vec!["1", "1"]);
    }

    #[tokio::test]
    async fn toggle_mute_flips_and_returns_new_state() {
        let server = sim();
        let session = connected(&server).await;
        let fader = session.input_aux(2, 3).unwrap();

        assert!(!fader.mute().await.unwrap());
        assert!(fader.toggle_mute().await.unwrap());
        assert!(!fader.toggle_mute().await.unwrap());
        eventually("toggle writes", || {
            server.writes_to("SETD^i.2.aux.3.mute") == vec!["1", "0"]
        })
        .await;
    }

    #[tokio::test]
    async fn name_falls_back_to_channel_label() {
        let server = sim();
        let session = connected(&server).await;

        assert_eq!(session.input(3).unwrap().name().await.unwrap(), "CH 4");
        assert_eq!(session.aux(0).unwrap().name().await.unwrap(), "AUX 1");

        server.push("SETS^i.3.name", "Vocal");
        eventually("pushed name", || {
            session.cache().get("SETS^i.3.name").as_deref() == Some("Vocal")
        })
        .await;
        assert_eq!(session.input(3).unwrap().name().await.unwrap(), "Vocal");
    }

    #[tokio::test]
    async fn send_name_composes_input_and_aux() {
        let server = sim();
        let session = connected(&server).await;

        server.push("SETS^i.0.name", "Kick");
        eventually("pushed name", || {
            session.cache().get("SETS^i.0.name").as_deref() == Some("Kick")
        })
        .await;

        let send = session.input_aux(0, 1).unwrap();
        assert_eq!(send.name().await.unwrap(), "Kick em AUX 2");
    }

    #[tokio::test]
    async fn set_volume_is_visible_immediately() {
        let server = sim();
        let session = connected(&server).await;
        let fader = session.input(2).unwrap();

        fader.set_volume(0.8).await.unwrap();
        assert_eq!(fader.volume().await.unwrap().value(), 0.8);

        eventually("console applied level", || {
            server.value("SETD^i.2.mix").as_deref() == Some("0.8")
        })
        .await;
    }

    #[tokio::test]
    async fn send_level_uses_aux_value_path() {
        let server = sim();
        let session = connected(&server).await;

        session.input_aux(2, 3).unwrap().set_volume(0.25).await.unwrap();
        eventually("send level write", || {
            server.writes_to("SETD^i.2.aux.3.value") == vec!["0.25"]
        })
        .await;
    }

    #[tokio::test]
    async fn out_of_range_volume_is_rejected_before_io() {
        let server = sim();
        let session = connected(&server).await;
        let fader = session.aux(2).unwrap();

        for bad in [1.5, -0.1, f64::NAN, f64::INFINITY] {
            let err = fader.set_volume(bad).await.unwrap_err();
            assert!(matches!(err, SessionError::InvalidArgument(_)), "{bad}");
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(server.writes_to("SETD^a.2.mix").is_empty());
        assert_eq!(session.cache().get("SETD^a.2.mix").as_deref(), Some("0.75"));
    }

    #[tokio::test]
    async fn fader_outside_layout_is_rejected() {
        let server = sim();
        let session = connected(&server).await;

        assert!(matches!(
            session.input(8),
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(matches!(
            session.fader(FaderKind::InputAux { input: 0, aux: 4 }),
            Err(SessionError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn malformed_cached_values_are_protocol_violations() {
        let server = sim();
        let session = connected(&server).await;

        server.push("SETD^i.0.mix", "loud");
        server.push("SETD^i.1.mix", "1.5");
        server.push("SETD^a.0.mute", "2");
        eventually("malformed values", || {
            session.cache().get("SETD^a.0.mute").as_deref() == Some("2")
        })
        .await;

        for result in [
            session.input(0).unwrap().volume().await.map(|_| ()),
            session.input(1).unwrap().volume().await.map(|_| ()),
            session.aux(0).unwrap().mute().await.map(|_| ()),
        ] {
            assert!(matches!(
                result,
                Err(SessionError::ProtocolViolation { .. })
            ));
        }
    }

    #[tokio::test]
    async fn missing_parameter_times_out() {
        let server = sim();
        let session = connected(&server).await;

        let started = tokio::time::Instant::now();
        let path = ParameterPath::new("SETD^f.0.mix").unwrap();
        let err = session.read_raw(&path).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn volume_steps_clamp_at_the_top() {
        let server = sim();
        let session = connected(&server).await;
        let fader = session.input(0).unwrap();

        server.push("SETD^i.0.mix", "0.98");
        eventually("pushed level", || {
            session.cache().get("SETD^i.0.mix").as_deref() == Some("0.98")
        })
        .await;

        assert_eq!(fader.volume_up().await.unwrap(), Level::MAX);
        assert_eq!(fader.volume_up().await.unwrap(), Level::MAX);
        eventually("clamped writes", || {
            server.writes_to("SETD^i.0.mix") == vec!["1.0", "1.0"]
        })
        .await;
    }

    #[tokio::test]
    async fn volume_down_moves_by_step() {
        let server = sim();
        let session = connected(&server).await;
        let fader = session.input(5).unwrap();

        let level = fader.volume_down().await.unwrap();
        assert!((level.value() - 0.45).abs() < 1e-9);
        eventually("step write", || {
            server.writes_to("SETD^i.5.mix") == vec!["0.45"]
        })
        .await;
    }

    #[tokio::test]
    async fn snapshot_collects_fader_state() {
        let server = sim();
        let session = connected(&server).await;

        let snapshot = session.input(0).unwrap().snapshot().await.unwrap();
        assert_eq!(snapshot.unique_id, "input1");
        assert_eq!(snapshot.name, "CH 1");
        assert_eq!(snapshot.volume.value(), 0.5);
        assert!(!snapshot.muted);
        assert!(snapshot.to_string().contains("CH 1"));
    }
}

// ============================================================================
// Ordering Tests
// ============================================================================

mod ordering_tests {
    use super::helpers::*;
    use super::*;

    #[tokio::test]
    async fn console_updates_apply_in_arrival_order() {
        let server = sim();
        let session = connected(&server).await;
        let mut events = session.subscribe();

        server.inject("3:::SETD^i.0.mix^0.1\n3:::SETD^i.0.mix^0.2\n3:::SETD^i.0.mix^0.3");
        server.inject("3:::SETD^i.0.mix^0.4");

        let mut seen = Vec::new();
        while seen.len() < 4 {
            if let SessionEvent::ParameterChanged { path, value, origin } =
                events.recv().await.unwrap()
            {
                if path == "SETD^i.0.mix" {
                    assert_eq!(origin, UpdateOrigin::Console);
                    seen.push(value);
                }
            }
        }
        assert_eq!(seen, vec!["0.1", "0.2", "0.3", "0.4"]);
        assert_eq!(session.cache().get("SETD^i.0.mix").as_deref(), Some("0.4"));
    }

    #[tokio::test]
    async fn local_write_is_mirrored_then_echoed() {
        let server = sim();
        let session = connected(&server).await;
        let mut events = session.subscribe();

        session.aux(3).unwrap().set_volume(0.3).await.unwrap();

        let mut origins = Vec::new();
        while origins.len() < 2 {
            if let SessionEvent::ParameterChanged { path, value, origin } =
                events.recv().await.unwrap()
            {
                if path == "SETD^a.3.mix" {
                    assert_eq!(value, "0.3");
                    origins.push(origin);
                }
            }
        }
        assert_eq!(origins, vec![UpdateOrigin::Local, UpdateOrigin::Console]);
    }

    #[tokio::test]
    async fn disagreeing_echo_does_not_corrupt_cache() {
        let server = sim();
        let session = connected(&server).await;
        let fader = session.input(1).unwrap();

        let (set, _) = tokio::join!(fader.set_volume(0.6), async {
            server.inject("3:::SETD^i.1.mix^0.4");
        });
        set.unwrap();

        eventually("both values delivered", || {
            server.writes_to("SETD^i.1.mix") == vec!["0.6"]
        })
        .await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let volume = fader.volume().await.unwrap().value();
        assert!(volume == 0.4 || volume == 0.6, "unexpected {volume}");
        assert_eq!(session.state(), ConnectionState::Open);

        fader.set_volume(0.7).await.unwrap();
        assert_eq!(fader.volume().await.unwrap().value(), 0.7);
    }

    #[tokio::test]
    async fn concurrent_writers_all_reach_the_console() {
        let server = sim();
        let session = connected(&server).await;

        let faders: Vec<_> = (0..8).map(|i| session.input(i).unwrap()).collect();
        let writes = faders
            .iter()
            .enumerate()
            .map(|(i, f)| f.set_volume(i as f64 / 10.0));
        for result in futures_util::future::join_all(writes).await {
            result.unwrap();
        }

        eventually("all writes applied", || {
            (0..8).all(|i| {
                server.value(&format!("SETD^i.{i}.mix"))
                    == Some(Level::new(i as f64 / 10.0).unwrap().to_string())
            })
        })
        .await;
    }
}
