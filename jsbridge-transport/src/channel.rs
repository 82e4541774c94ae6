use crate::transport::{MessageSource, TransportError};
use async_trait::async_trait;
use jsbridge_core::{BridgeError, ProcessId, ProcessMessage, ProcessMessageSender};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// In-memory link between a browser and a renderer end.
#[derive(Debug)]
pub struct ChannelTransport;

/// One end of a [`ChannelTransport`] pair.
#[derive(Debug)]
pub struct ChannelEndpoint {
    pub sender: Arc<ChannelSender>,
    pub receiver: ChannelReceiver,
}

impl ChannelTransport {
    /// Returns the browser end and the renderer end.
    pub fn pair() -> (ChannelEndpoint, ChannelEndpoint) {
        let (to_renderer, from_browser) = mpsc::unbounded_channel();
        let (to_browser, from_renderer) = mpsc::unbounded_channel();

        let browser = ChannelEndpoint {
            sender: Arc::new(ChannelSender {
                local: ProcessId::Browser,
                tx: to_renderer,
            }),
            receiver: ChannelReceiver { rx: from_renderer },
        };
        let renderer = ChannelEndpoint {
            sender: Arc::new(ChannelSender {
                local: ProcessId::Renderer,
                tx: to_browser,
            }),
            receiver: ChannelReceiver { rx: from_browser },
        };
        (browser, renderer)
    }
}

#[derive(Debug)]
pub struct ChannelSender {
    local: ProcessId,
    tx: mpsc::UnboundedSender<ProcessMessage>,
}

impl ChannelSender {
    pub fn local(&self) -> ProcessId {
        self.local
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl ProcessMessageSender for ChannelSender {
    fn send_process_message(&self, target: ProcessId, message: ProcessMessage) -> Result<(), BridgeError> {
        if target != self.local.peer() {
            return Err(TransportError::Protocol(format!(
                "{} cannot send to itself through a channel link",
                self.local
            ))
            .into());
        }
        trace!(message = %message.name, %target, "Sending over channel");
        self.tx
            .send(message)
            .map_err(|_| TransportError::ConnectionClosed.into())
    }
}

#[derive(Debug)]
pub struct ChannelReceiver {
    rx: mpsc::UnboundedReceiver<ProcessMessage>,
}

#[async_trait]
impl MessageSource for ChannelReceiver {
    async fn recv(&mut self) -> Result<Option<ProcessMessage>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsbridge_core::ErrorCode;

    #[tokio::test]
    async fn test_pair_delivers_both_ways() {
        let (browser, renderer) = ChannelTransport::pair();
        let mut browser_rx = browser.receiver;
        let mut renderer_rx = renderer.receiver;

        browser
            .sender
            .send_process_message(ProcessId::Renderer, ProcessMessage::new("ToRenderer"))
            .unwrap();
        renderer
            .sender
            .send_process_message(ProcessId::Browser, ProcessMessage::new("ToBrowser"))
            .unwrap();

        assert_eq!(renderer_rx.recv().await.unwrap().unwrap().name, "ToRenderer");
        assert_eq!(browser_rx.recv().await.unwrap().unwrap().name, "ToBrowser");
    }

    #[tokio::test]
    async fn test_wrong_target_rejected() {
        let (browser, _renderer) = ChannelTransport::pair();
        let err = browser
            .sender
            .send_process_message(ProcessId::Browser, ProcessMessage::new("Loop"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Transport);
    }

    #[tokio::test]
    async fn test_closed_peer_reports_error() {
        let (browser, renderer) = ChannelTransport::pair();
        drop(renderer);
        assert!(browser.sender.is_closed());
        let err = browser
            .sender
            .send_process_message(ProcessId::Renderer, ProcessMessage::new("Late"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Transport);
        assert!(err.message.contains("Connection closed"));
    }

    #[tokio::test]
    async fn test_receiver_ends_when_sender_dropped() {
        let (browser, renderer) = ChannelTransport::pair();
        let mut renderer_rx = renderer.receiver;
        drop(browser);
        assert!(renderer_rx.recv().await.unwrap().is_none());
    }
}
