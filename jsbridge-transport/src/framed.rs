use crate::codec::{FramedConfig, ProcessMessageCodec};
use crate::transport::{MessageSource, TransportError};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use jsbridge_core::{BridgeError, ProcessId, ProcessMessage, ProcessMessageSender};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

/// Link over any byte stream (pipe, socket, child stdio).
///
/// Outbound messages are queued and written by a background task so that
/// [`ProcessMessageSender::send_process_message`] never blocks.
#[derive(Debug)]
pub struct FramedLink;

impl FramedLink {
    /// Must be called inside a Tokio runtime.
    pub fn spawn<T>(
        io: T,
        local: ProcessId,
        config: &FramedConfig,
    ) -> (Arc<FramedSender>, FramedReceiver<T>, JoinHandle<()>)
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(io);
        let (tx, mut rx) = mpsc::unbounded_channel::<ProcessMessage>();

        let mut sink = FramedWrite::new(write_half, ProcessMessageCodec::from_config(config));
        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let name = message.name.clone();
                if let Err(e) = sink.send(message).await {
                    warn!(message = %name, error = %e, "Failed to write frame, closing link");
                    break;
                }
            }
            debug!("Framed writer finished");
        });

        let sender = Arc::new(FramedSender { local, tx });
        let receiver = FramedReceiver {
            frames: FramedRead::new(read_half, ProcessMessageCodec::from_config(config)),
        };
        (sender, receiver, writer)
    }
}

#[derive(Debug)]
pub struct FramedSender {
    local: ProcessId,
    tx: mpsc::UnboundedSender<ProcessMessage>,
}

impl ProcessMessageSender for FramedSender {
    fn send_process_message(&self, target: ProcessId, message: ProcessMessage) -> Result<(), BridgeError> {
        if target != self.local.peer() {
            return Err(TransportError::Protocol(format!(
                "{} cannot send to itself through a framed link",
                self.local
            ))
            .into());
        }
        self.tx
            .send(message)
            .map_err(|_| TransportError::ConnectionClosed.into())
    }
}

#[derive(Debug)]
pub struct FramedReceiver<T> {
    frames: FramedRead<ReadHalf<T>, ProcessMessageCodec>,
}

#[async_trait]
impl<T> MessageSource for FramedReceiver<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn recv(&mut self) -> Result<Option<ProcessMessage>, TransportError> {
        match self.frames.next().await {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplex_round_trip() {
        let (a, b) = tokio::io::duplex(1024);
        let config = FramedConfig::default();
        let (browser_tx, mut browser_rx, _w1) = FramedLink::spawn(a, ProcessId::Browser, &config);
        let (renderer_tx, mut renderer_rx, _w2) = FramedLink::spawn(b, ProcessId::Renderer, &config);

        let mut message = ProcessMessage::new("Hello");
        message.arguments.push(jsbridge_core::Value::Int(7)).unwrap();
        browser_tx
            .send_process_message(ProcessId::Renderer, message.clone())
            .unwrap();
        assert_eq!(renderer_rx.recv().await.unwrap(), Some(message));

        renderer_tx
            .send_process_message(ProcessId::Browser, ProcessMessage::new("Back"))
            .unwrap();
        assert_eq!(browser_rx.recv().await.unwrap().unwrap().name, "Back");
    }

    #[tokio::test]
    async fn test_peer_close_ends_stream() {
        let (a, b) = tokio::io::duplex(64);
        let (_tx, mut rx, _writer) = FramedLink::spawn(a, ProcessId::Browser, &FramedConfig::default());
        drop(b);
        assert!(rx.recv().await.unwrap().is_none());
    }
}
