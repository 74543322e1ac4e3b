//! Plain TCP transport with newline framing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Longest line accepted from the server (1 MiB).
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// A TCP connection that frames messages as `\n`-terminated lines.
///
/// The read and write halves sit behind separate locks so the receive task
/// can block in `recv` while the writer task keeps sending.
pub struct TcpLineConnection {
    id: ConnectionId,
    peer: String,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpLineConnection {
    /// Opens a TCP connection to `addr`, giving up after `timeout`.
    ///
    /// # Errors
    /// - [`TransportError::ConnectTimeout`] if the handshake doesn't finish
    ///   in time.
    /// - [`TransportError::ConnectFailed`] on refusal or resolution failure.
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self, TransportError> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(TransportError::ConnectFailed {
                    addr: addr.to_owned(),
                    source,
                });
            }
            Err(_) => {
                return Err(TransportError::ConnectTimeout {
                    addr: addr.to_owned(),
                });
            }
        };
        // Position updates are tiny and latency-sensitive.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }
        Ok(Self::from_stream(stream, addr.to_owned()))
    }

    /// Wraps an already-connected stream.
    pub fn from_stream(stream: TcpStream, peer: String) -> Self {
        let (read, write) = stream.into_split();
        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %peer, "tcp connection established");
        Self {
            id,
            peer,
            reader: Mutex::new(BufReader::new(read)),
            writer: Mutex::new(write),
        }
    }

    /// The address this connection was opened to.
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl Connection for TcpLineConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(data)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        let mut line = Vec::new();
        let mut limited = (&mut *reader).take(MAX_LINE_BYTES as u64 + 1);
        let n = limited
            .read_until(b'\n', &mut line)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            return Ok(None);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        } else if line.len() > MAX_LINE_BYTES {
            return Err(TransportError::LineTooLong {
                limit: MAX_LINE_BYTES,
            });
        }
        // A final unterminated line before EOF is still delivered; the next
        // call returns `None`.
        Ok(Some(line))
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
