use crate::transport::{MessageSource, TransportError};
use jsbridge_core::{MessageDispatcher, ProcessId, ProcessMessageSender};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Feeds every message arriving on a [`MessageSource`] into a dispatcher.
///
/// Inbound argument lists are marked read only before dispatch.
#[derive(Debug, Clone)]
pub struct MessagePump {
    dispatcher: Arc<MessageDispatcher>,
    sender: Arc<dyn ProcessMessageSender>,
    source: ProcessId,
}

impl MessagePump {
    /// `sender` is the reply path handed to handlers; `source` names the
    /// process the messages come from.
    pub fn new(
        dispatcher: Arc<MessageDispatcher>,
        sender: Arc<dyn ProcessMessageSender>,
        source: ProcessId,
    ) -> Self {
        MessagePump {
            dispatcher,
            sender,
            source,
        }
    }

    /// Runs until the peer closes the link or the transport fails.
    pub async fn run<S: MessageSource>(self, mut inbound: S) -> Result<(), TransportError> {
        while let Some(mut message) = inbound.recv().await? {
            debug!(message = %message.name, source = %self.source, "Received message");
            message.arguments.make_read_only();
            self.dispatcher
                .dispatch_message(self.sender.clone(), self.source, message);
        }
        info!(source = %self.source, "Link closed");
        Ok(())
    }

    pub fn spawn<S: MessageSource + 'static>(self, inbound: S) -> JoinHandle<Result<(), TransportError>> {
        tokio::spawn(self.run(inbound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelTransport;
    use jsbridge_core::{MessageReceived, ProcessMessage, Value};
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_pump_dispatches_read_only_messages() {
        let (browser, renderer) = ChannelTransport::pair();
        let dispatcher = Arc::new(MessageDispatcher::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        dispatcher.register_message_handler("Ping", move |m: &MessageReceived| {
            sink.lock()
                .unwrap()
                .push((m.source, m.message.arguments.is_read_only()));
        });

        let pump = MessagePump::new(dispatcher, browser.sender.clone(), ProcessId::Renderer);
        let handle = pump.spawn(browser.receiver);

        let mut ping = ProcessMessage::new("Ping");
        ping.arguments.push(Value::Int(1)).unwrap();
        renderer
            .sender
            .send_process_message(ProcessId::Browser, ping)
            .unwrap();
        drop(renderer);

        handle.await.unwrap().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(ProcessId::Renderer, true)]);
    }
}
