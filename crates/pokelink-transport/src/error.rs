/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server actively refused the connection or the address could not
    /// be reached.
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The TCP connect did not finish within the configured bound.
    #[error("connect to {addr} timed out")]
    ConnectTimeout { addr: String },

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The peer sent a line longer than the framing limit.
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}
