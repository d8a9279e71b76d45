//! Ui Console Session
//!
//! Keeps a live connection to a Soundcraft Ui-series console and exposes its
//! parameters through a local cache and typed fader accessors.
//!
//! # Architecture
//!
//! ```text
//! socket ─► FrameCodec ─► StateCache ◄─ Fader reads (wait_for)
//!    ▲                        ▲
//!    └──── send queue ◄───────┴──────── Fader writes (mirrored locally)
//! ```
//!
//! - [`ConsoleSession`]: connection lifecycle, keep-alive, reconnection
//! - [`StateCache`]: last known value of every parameter
//! - [`Fader`]: volume/mute/name for inputs, aux masters and aux sends
//! - [`SessionEvent`]: broadcast of everything the session observes

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod fader;
pub mod session;
pub mod state;
pub mod transport;

pub use cache::StateCache;
pub use config::{ConsoleLayout, SessionConfig};
pub use error::SessionError;
pub use events::{SessionEvent, UpdateOrigin};
pub use fader::{Fader, FaderKind, FaderSnapshot};
pub use session::ConsoleSession;
pub use state::ConnectionState;
pub use transport::{BoxedStream, Connector, TcpConnector};

pub use ui24_protocol::Level;
