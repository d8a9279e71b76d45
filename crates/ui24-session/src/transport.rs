//! Socket transport
//!
//! The session talks to the console through a [`Connector`], which produces
//! a raw byte stream, and then runs the WebSocket client handshake over that
//! stream with `tokio-tungstenite`. Real consoles use [`TcpConnector`]; tests
//! plug in in-memory duplex streams served by a virtual console.

use std::io;

use futures_util::future::BoxFuture;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

/// Byte stream a WebSocket can run over
pub trait ConsoleStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ConsoleStream for T {}

/// Boxed byte stream returned by connectors
pub type BoxedStream = Box<dyn ConsoleStream>;

/// Opens byte streams to a console
pub trait Connector: Send + Sync {
    /// Open a fresh stream to `host:port`
    fn connect<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, io::Result<BoxedStream>>;
}

/// Plain TCP connector for real consoles
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, io::Result<BoxedStream>> {
        async move {
            let stream = TcpStream::connect((host, port)).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream) as BoxedStream)
        }
        .boxed()
    }
}

/// WebSocket URL for a console address
pub fn ws_url(host: &str, port: u16) -> String {
    format!("ws://{host}:{port}")
}

type WsStream = WebSocketStream<BoxedStream>;

/// Message read from the console socket
#[derive(Debug)]
pub enum Incoming {
    /// UTF-8 text frame
    Text(String),
    /// Close frame from the console
    Closed,
    /// Ping/pong/binary traffic; proves the link is alive
    Other,
}

/// Write half of a console WebSocket
pub struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

impl WsWriter {
    /// Send a text frame
    pub async fn send_text(&mut self, text: String) -> Result<(), tungstenite::Error> {
        self.sink.send(Message::Text(text)).await
    }

    /// Send a close frame and shut the sink
    pub async fn close(&mut self) -> Result<(), tungstenite::Error> {
        self.sink.close().await
    }
}

/// Read half of a console WebSocket
pub struct WsReader {
    stream: SplitStream<WsStream>,
}

impl WsReader {
    /// Receive the next message, returning `None` when the stream ends
    pub async fn recv(&mut self) -> Option<Result<Incoming, tungstenite::Error>> {
        let msg = match self.stream.next().await? {
            Ok(msg) => msg,
            Err(e) => return Some(Err(e)),
        };
        Some(Ok(match msg {
            Message::Text(text) => Incoming::Text(text),
            Message::Close(_) => Incoming::Closed,
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                Incoming::Other
            }
        }))
    }
}

/// Run the client handshake over an already connected stream
pub async fn handshake(
    stream: BoxedStream,
    url: &str,
) -> Result<(WsWriter, WsReader), tungstenite::Error> {
    let (ws, _response) = tokio_tungstenite::client_async(url, stream).await?;
    let (sink, stream) = ws.split();
    Ok((WsWriter { sink }, WsReader { stream }))
}
