use crate::codec::CodecError;
use async_trait::async_trait;
use jsbridge_core::{BridgeError, ProcessMessage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<TransportError> for BridgeError {
    fn from(err: TransportError) -> Self {
        BridgeError::transport(err.to_string())
    }
}

/// Inbound half of a link. Outbound traffic goes through
/// [`jsbridge_core::ProcessMessageSender`].
#[async_trait]
pub trait MessageSource: Send {
    /// Next message, or `None` once the peer has closed the link.
    async fn recv(&mut self) -> Result<Option<ProcessMessage>, TransportError>;
}
