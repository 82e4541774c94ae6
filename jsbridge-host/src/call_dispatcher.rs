use crate::binding::MethodArguments;
use crate::registry::NativeObjectRegistry;
use jsbridge_core::{
    deserialize_carrier_list, node_to_value, BridgeError, BridgeMessage, CallArguments, CallId,
    MessageDispatcher, MessageReceived, NativeObjectCallRequest, NativeObjectCallResult,
    ProcessId, ProcessMessageSender,
};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Serves `NativeObjectCallRequest` messages against the registry and
/// replies with exactly one `NativeObjectCallResult` per request.
#[derive(Debug, Clone)]
pub struct NativeCallHandler {
    registry: Arc<NativeObjectRegistry>,
}

impl NativeCallHandler {
    pub fn new(registry: Arc<NativeObjectRegistry>) -> Self {
        NativeCallHandler { registry }
    }

    pub fn install(self, dispatcher: &MessageDispatcher) {
        dispatcher.register_message_handler(NativeObjectCallRequest::NAME, move |m: &MessageReceived| {
            self.handle(m)
        });
    }

    fn handle(&self, received: &MessageReceived) {
        let request = match NativeObjectCallRequest::from_process_message(&received.message) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "Malformed native call request");
                return;
            }
        };
        trace!(
            call_id = %request.call_id,
            object = %request.object_name,
            method = %request.member_name,
            "Native call request"
        );

        let browser = Arc::clone(&received.browser);
        let target = received.source;
        let call_id = request.call_id;

        let Some(object) = self.registry.get(&request.object_name) else {
            reply(
                browser.as_ref(),
                target,
                NativeObjectCallResult::failure(
                    call_id,
                    format!("Object named {} was not registered.", request.object_name),
                ),
            );
            return;
        };
        let Some(method) = object.object.method(&request.member_name) else {
            reply(
                browser.as_ref(),
                target,
                NativeObjectCallResult::failure(
                    call_id,
                    format!("Object does not have a {} method.", request.member_name),
                ),
            );
            return;
        };

        let arguments = match request.arguments {
            CallArguments::Values(list) => match deserialize_carrier_list(&list) {
                Ok(nodes) => MethodArguments::Nodes(nodes),
                Err(e) => {
                    reply(browser.as_ref(), target, NativeObjectCallResult::failure(call_id, e.message));
                    return;
                }
            },
            CallArguments::Json(wire) => MethodArguments::Json(wire),
        };

        method.execute(arguments, object.interceptor.as_ref(), move |outcome| {
            reply(browser.as_ref(), target, call_result(call_id, outcome));
        });
    }
}

fn call_result(call_id: CallId, outcome: Result<jsbridge_core::Node, BridgeError>) -> NativeObjectCallResult {
    match outcome.and_then(|node| node_to_value(&node)) {
        Ok(value) => NativeObjectCallResult {
            call_id,
            success: true,
            result: value,
            exception: None,
        },
        Err(e) => {
            debug!(call_id = %call_id, error = %e, "Native call failed");
            NativeObjectCallResult::failure(call_id, e.message)
        }
    }
}

fn reply(browser: &dyn ProcessMessageSender, target: ProcessId, result: NativeObjectCallResult) {
    let call_id = result.call_id;
    let sent = result
        .to_process_message()
        .and_then(|message| browser.send_process_message(target, message));
    if let Err(e) = sent {
        warn!(call_id = %call_id, error = %e, "Failed to deliver native call result");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ObjectBuilder;
    use jsbridge_core::{ListValue, ProcessMessage, Value};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingSender {
        sent: Mutex<Vec<ProcessMessage>>,
    }

    impl ProcessMessageSender for RecordingSender {
        fn send_process_message(&self, _target: ProcessId, message: ProcessMessage) -> Result<(), BridgeError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn setup() -> (MessageDispatcher, Arc<RecordingSender>) {
        let registry = Arc::new(NativeObjectRegistry::new());
        registry.register(
            "calc",
            ObjectBuilder::new()
                .method("add", |a: i32, b: i32| a + b)
                .build()
                .unwrap(),
        );
        let dispatcher = MessageDispatcher::new();
        NativeCallHandler::new(registry).install(&dispatcher);
        (dispatcher, Arc::new(RecordingSender::default()))
    }

    fn call(dispatcher: &MessageDispatcher, sender: &Arc<RecordingSender>, object: &str, method: &str) -> NativeObjectCallResult {
        let request = NativeObjectCallRequest {
            call_id: CallId::new(7),
            object_name: object.into(),
            member_name: method.into(),
            arguments: CallArguments::Values(ListValue::from_values(vec![Value::Int(2), Value::Int(3)])),
        };
        dispatcher.dispatch_message(
            sender.clone(),
            ProcessId::Renderer,
            request.to_process_message().unwrap(),
        );
        let sent = sender.sent.lock().unwrap();
        NativeObjectCallResult::from_process_message(sent.last().unwrap()).unwrap()
    }

    #[test]
    fn test_successful_call() {
        let (dispatcher, sender) = setup();
        let result = call(&dispatcher, &sender, "calc", "add");
        assert!(result.success);
        assert_eq!(result.call_id, CallId::new(7));
        assert_eq!(result.result, Value::Int(5));
    }

    #[test]
    fn test_unknown_object() {
        let (dispatcher, sender) = setup();
        let result = call(&dispatcher, &sender, "nope", "add");
        assert!(!result.success);
        assert_eq!(result.exception.as_deref(), Some("Object named nope was not registered."));
    }

    #[test]
    fn test_unknown_method() {
        let (dispatcher, sender) = setup();
        let result = call(&dispatcher, &sender, "calc", "sub");
        assert!(!result.success);
        assert_eq!(result.exception.as_deref(), Some("Object does not have a sub method."));
    }
}
