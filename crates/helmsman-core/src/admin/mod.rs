//! Admin-socket protocol — one command per connection over a Unix socket.
//!
//! The balancer's administrative socket speaks a bare text protocol: the
//! client connects, writes a single `\n`-terminated command, half-closes
//! the write side, and buffers the response until the peer closes. There
//! is no framing and no multiplexing; every command owns its connection.
//!
//! ```text
//! ┌──────────┐    connect, write, half-close   ┌───────────────┐
//! │ Command  │────────────────────────────────▶│ Admin socket  │
//! │ (client) │◀────────────────────────────────│ (balancer)    │
//! └──────────┘    response bytes until EOF     └───────────────┘
//! ```
//!
//! Responses are decoded by a per-command strategy (see [`Decoder`]); the
//! default auto-detection reproduces the peer's fault-reporting
//! convention, where a single non-empty line is an error message.

pub mod client;
pub mod command;
pub mod decode;

use std::path::PathBuf;

pub use client::{AdminClient, Command, DEFAULT_SOCKET_PATH, DownEvent};
pub use command::render;
pub use decode::{Decoder, Reply};

/// Errors from the admin-socket client.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// The peer could not be reached at connect time. This also raises a
    /// [`DownEvent`] on the owning client: an unreachable admin socket
    /// usually means the balancer is not running at all.
    #[error("admin socket unreachable at {path}: {source}")]
    Unreachable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The peer answered with its single-line error convention.
    #[error("command {command:?} failed: {message}")]
    Protocol { command: String, message: String },

    /// A structured decoder could not make sense of the response.
    #[error("failed to decode response to {command:?}: {reason}")]
    Decode { command: String, reason: String },

    /// I/O failure after the connection was established.
    #[error("admin socket I/O error: {0}")]
    Io(#[from] std::io::Error),
}
