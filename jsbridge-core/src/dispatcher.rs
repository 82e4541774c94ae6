use crate::channel::{ProcessId, ProcessMessageSender};
use crate::messages::ProcessMessage;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, trace};

/// Inbound message together with the link it arrived on, so handlers can
/// reply through the same sender.
#[derive(Debug, Clone)]
pub struct MessageReceived {
    pub browser: Arc<dyn ProcessMessageSender>,
    pub source: ProcessId,
    pub message: ProcessMessage,
}

pub type MessageHandler = Arc<dyn Fn(&MessageReceived) + Send + Sync>;

/// Routes inbound messages to the handlers registered for their name, in
/// registration order. Unknown names are ignored so that peers running a
/// different set of messages keep working.
#[derive(Default)]
pub struct MessageDispatcher {
    handlers: RwLock<HashMap<String, Vec<MessageHandler>>>,
}

impl fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = handlers.keys().collect();
        names.sort();
        f.debug_struct("MessageDispatcher")
            .field("messages", &names)
            .finish()
    }
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_message_handler<F>(&self, message_name: impl Into<String>, handler: F)
    where
        F: Fn(&MessageReceived) + Send + Sync + 'static,
    {
        let message_name = message_name.into();
        trace!(message = %message_name, "Registering message handler");
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(message_name)
            .or_default()
            .push(Arc::new(handler));
    }

    pub fn has_handlers(&self, message_name: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(message_name)
            .is_some_and(|h| !h.is_empty())
    }

    /// Runs every handler for the message name. A panicking handler is
    /// logged and does not stop the remaining ones.
    pub fn dispatch_message(
        &self,
        browser: Arc<dyn ProcessMessageSender>,
        source: ProcessId,
        message: ProcessMessage,
    ) {
        let handlers = {
            let table = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            match table.get(&message.name) {
                Some(handlers) => handlers.clone(),
                None => {
                    debug!(message = %message.name, %source, "No handler registered, ignoring message");
                    return;
                }
            }
        };

        debug!(message = %message.name, %source, handlers = handlers.len(), "Dispatching message");
        let received = MessageReceived {
            browser,
            source,
            message,
        };
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&received))).is_err() {
                error!(message = %received.message.name, "Message handler panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct NullSender;

    impl ProcessMessageSender for NullSender {
        fn send_process_message(&self, _: ProcessId, _: ProcessMessage) -> Result<(), BridgeError> {
            Ok(())
        }
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let dispatcher = MessageDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = seen.clone();
            dispatcher.register_message_handler("Ping", move |m: &MessageReceived| {
                seen.lock().unwrap().push(format!("{}:{}", tag, m.message.name));
            });
        }

        dispatcher.dispatch_message(Arc::new(NullSender), ProcessId::Renderer, ProcessMessage::new("Ping"));
        assert_eq!(*seen.lock().unwrap(), vec!["first:Ping", "second:Ping"]);
    }

    #[test]
    fn test_unknown_message_is_ignored() {
        let dispatcher = MessageDispatcher::new();
        dispatcher.dispatch_message(Arc::new(NullSender), ProcessId::Browser, ProcessMessage::new("Nope"));
        assert!(!dispatcher.has_handlers("Nope"));
    }

    #[test]
    fn test_panicking_handler_does_not_stop_chain() {
        let dispatcher = MessageDispatcher::new();
        let hits = Arc::new(Mutex::new(0));
        dispatcher.register_message_handler("Boom", |_: &MessageReceived| panic!("handler failure"));
        let counter = hits.clone();
        dispatcher.register_message_handler("Boom", move |_: &MessageReceived| {
            *counter.lock().unwrap() += 1;
        });

        dispatcher.dispatch_message(Arc::new(NullSender), ProcessId::Browser, ProcessMessage::new("Boom"));
        assert_eq!(*hits.lock().unwrap(), 1);
    }
}
