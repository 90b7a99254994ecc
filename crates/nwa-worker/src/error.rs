//! Worker error types

#[derive(Debug, thiserror::Error)]
pub enum StompError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed frame: {0}")]
    Protocol(String),

    /// The broker answered with an `ERROR` frame
    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Connection closed by broker")]
    ConnectionClosed,
}
