//! Ui Console Simulation Library
//!
//! This crate provides a virtual Soundcraft Ui-series console for testing
//! clients without hardware. It includes:
//!
//! - **VirtualConsole**: the parameter table and command handling
//! - **ConsoleServer**: serves the console over WebSocket, in memory or on TCP,
//!   with controls for pushing updates and simulating network loss
//!
//! # Example
//!
//! ```rust,no_run
//! use ui24_sim::{ConsoleServer, VirtualConsoleConfig};
//!
//! # async fn demo() {
//! let server = ConsoleServer::new(VirtualConsoleConfig::default());
//!
//! // Hand this stream to a WebSocket client
//! let stream = server.connect_duplex();
//!
//! // Move a fader on the "console"
//! server.push("SETD^i.0.mix", "0.8");
//!
//! // Simulate the network going away
//! server.drop_connections();
//! # drop(stream);
//! # }
//! ```

pub mod console;
pub mod server;

pub use console::{ClientLine, VirtualConsole, VirtualConsoleConfig};
pub use server::{ConsoleServer, ServerStats};
