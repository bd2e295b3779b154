//! Admin-socket client — one-shot commands over a Unix domain socket.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::broadcast;
use tracing::debug;

use super::AdminError;
use super::decode::{Decoder, Reply, decode};

/// Conventional location of the balancer's admin socket.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/haproxy.sock";

/// Notification that the admin socket could not be reached at connect
/// time — the balancer is most likely not running at all.
#[derive(Debug, Clone)]
pub struct DownEvent {
    /// The command whose connection attempt failed.
    pub command: String,
}

/// Client for the balancer's administrative Unix socket.
///
/// Commands are independent per invocation: each opens its own connection
/// and buffer, so outstanding commands interleave freely with no shared
/// state between them.
pub struct AdminClient {
    socket_path: PathBuf,
    down_tx: broadcast::Sender<DownEvent>,
}

impl AdminClient {
    /// Create a client targeting the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        let (down_tx, _) = broadcast::channel(8);
        Self {
            socket_path: socket_path.into(),
            down_tx,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Subscribe to [`DownEvent`]s raised when the peer is unreachable.
    pub fn subscribe_down(&self) -> broadcast::Receiver<DownEvent> {
        self.down_tx.subscribe()
    }

    /// Build a command for this client. The line is trimmed; decoding
    /// defaults to [`Decoder::Auto`] and can be overridden per command.
    pub fn command(&self, line: impl Into<String>) -> Command<'_> {
        Command {
            client: self,
            line: line.into().trim().to_string(),
            decoder: Decoder::Auto,
        }
    }

    /// One connect / write / half-close / read-to-EOF exchange.
    async fn exchange(&self, line: &str) -> Result<String, AdminError> {
        let mut stream = match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => stream,
            Err(source) => {
                let _ = self.down_tx.send(DownEvent {
                    command: line.to_string(),
                });
                return Err(AdminError::Unreachable {
                    path: self.socket_path.clone(),
                    source,
                });
            }
        };

        debug!(command = line, "admin command");
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        // Half-close: the peer reads until EOF before answering.
        stream.shutdown().await?;

        let mut buffer = String::new();
        stream.read_to_string(&mut buffer).await?;
        Ok(buffer)
    }
}

/// A single prepared admin command.
///
/// Running it opens a dedicated connection; the future resolves once the
/// peer closes and the response has been decoded.
#[must_use = "the command is only sent when run"]
pub struct Command<'a> {
    client: &'a AdminClient,
    line: String,
    decoder: Decoder,
}

impl Command<'_> {
    /// Override the response decoder for this command.
    pub fn decode(mut self, decoder: Decoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// The command line that will be sent (without the terminator).
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Send the command and decode the response.
    pub async fn run(self) -> Result<Reply, AdminError> {
        let buffer = self.client.exchange(&self.line).await?;
        decode(&self.decoder, &buffer, &self.line)
    }
}
