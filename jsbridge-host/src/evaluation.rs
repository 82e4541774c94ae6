//! Script evaluation requests to the renderer and script lifecycle events
//! coming back from it.

use dashmap::DashMap;
use jsbridge_core::{
    from_node, value_to_node, BridgeError, BridgeMessage, JsContextCreated, JsContextReleased,
    JsEvaluationRequest, JsEvaluationResult, JsUncaughtException, MessageDispatcher,
    MessageReceived, Node, ProcessId, ProcessMessageSender, TaskId, TaskIdAllocator,
    UnhandledException,
};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Script lifecycle notifications raised by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptEvent {
    ContextCreated,
    ContextReleased,
    UncaughtException(JsUncaughtException),
    RendererException(UnhandledException),
}

type PendingTable = DashMap<TaskId, oneshot::Sender<JsEvaluationResult>>;

/// Forgets an evaluation when its caller stops waiting, however that
/// happens. Removing an already delivered entry is a no-op.
struct PendingEntry<'a> {
    pending: &'a PendingTable,
    task_id: TaskId,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        if self.pending.remove(&self.task_id).is_some() {
            debug!(task_id = %self.task_id, "Evaluation forgotten before a result arrived");
        }
    }
}

pub struct JavascriptExecutionEngine {
    browser: RwLock<Option<Arc<dyn ProcessMessageSender>>>,
    pending: PendingTable,
    task_ids: TaskIdAllocator,
    events: broadcast::Sender<ScriptEvent>,
    main_context_ready: AtomicBool,
}

impl fmt::Debug for JavascriptExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JavascriptExecutionEngine")
            .field("pending", &self.pending.len())
            .field("main_context_ready", &self.is_main_frame_context_initialized())
            .finish_non_exhaustive()
    }
}

impl Default for JavascriptExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl JavascriptExecutionEngine {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        JavascriptExecutionEngine {
            browser: RwLock::new(None),
            pending: DashMap::new(),
            task_ids: TaskIdAllocator::new(),
            events,
            main_context_ready: AtomicBool::new(false),
        }
    }

    pub fn set_browser(&self, browser: Arc<dyn ProcessMessageSender>) {
        *self.browser.write().unwrap_or_else(PoisonError::into_inner) = Some(browser);
    }

    pub fn install(self: &Arc<Self>, dispatcher: &MessageDispatcher) {
        let engine = Arc::clone(self);
        dispatcher.register_message_handler(JsEvaluationResult::NAME, move |m: &MessageReceived| {
            engine.on_evaluation_result(m)
        });

        let engine = Arc::clone(self);
        dispatcher.register_message_handler(JsContextCreated::NAME, move |_: &MessageReceived| {
            engine.main_context_ready.store(true, Ordering::SeqCst);
            info!("Main frame script context created");
            engine.publish(ScriptEvent::ContextCreated);
        });

        let engine = Arc::clone(self);
        dispatcher.register_message_handler(JsContextReleased::NAME, move |_: &MessageReceived| {
            engine.main_context_ready.store(false, Ordering::SeqCst);
            info!("Main frame script context released");
            engine.publish(ScriptEvent::ContextReleased);
        });

        let engine = Arc::clone(self);
        dispatcher.register_message_handler(JsUncaughtException::NAME, move |m: &MessageReceived| {
            match JsUncaughtException::from_process_message(&m.message) {
                Ok(exception) => {
                    warn!(message = %exception.message, frames = exception.stack_frames.len(), "Uncaught script exception");
                    engine.publish(ScriptEvent::UncaughtException(exception));
                }
                Err(e) => error!(error = %e, "Malformed uncaught exception message"),
            }
        });

        let engine = Arc::clone(self);
        dispatcher.register_message_handler(UnhandledException::NAME, move |m: &MessageReceived| {
            match UnhandledException::from_process_message(&m.message) {
                Ok(exception) => {
                    error!(
                        kind = %exception.exception_type,
                        message = %exception.message,
                        "Unhandled exception in renderer"
                    );
                    engine.publish(ScriptEvent::RendererException(exception));
                }
                Err(e) => error!(error = %e, "Malformed unhandled exception message"),
            }
        });
    }

    pub fn is_main_frame_context_initialized(&self) -> bool {
        self.main_context_ready.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScriptEvent> {
        self.events.subscribe()
    }

    pub fn pending_evaluations(&self) -> usize {
        self.pending.len()
    }

    fn publish(&self, event: ScriptEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn on_evaluation_result(&self, received: &MessageReceived) {
        let result = match JsEvaluationResult::from_process_message(&received.message) {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Malformed evaluation result");
                return;
            }
        };
        match self.pending.remove(&result.task_id) {
            Some((task_id, waiter)) => {
                if waiter.send(result).is_err() {
                    debug!(task_id = %task_id, "Evaluation caller went away before the result arrived");
                }
            }
            None => warn!(task_id = %result.task_id, "Discarding result of an unknown evaluation"),
        }
    }

    /// Evaluates `script` in the renderer's main frame context. With a
    /// timeout, an evaluation that does not finish in time is forgotten and
    /// fails as canceled; a late result is then discarded. Dropping the
    /// returned future forgets the evaluation as well.
    pub async fn evaluate(
        &self,
        script: &str,
        url: &str,
        line: i32,
        timeout: Option<Duration>,
    ) -> Result<Node, BridgeError> {
        let browser = self
            .browser
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| BridgeError::invalid_operation("No renderer is attached"))?;

        let task_id = self.task_ids.allocate();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(task_id, tx);
        let _entry = PendingEntry {
            pending: &self.pending,
            task_id,
        };

        let request = JsEvaluationRequest {
            task_id,
            script: script.to_string(),
            url: url.to_string(),
            line,
        };
        let sent = request
            .to_process_message()
            .and_then(|message| browser.send_process_message(ProcessId::Renderer, message));
        sent?;
        debug!(task_id = %task_id, url = %url, "Script evaluation requested");

        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    warn!(task_id = %task_id, timeout_ms = limit.as_millis() as u64, "Script evaluation timed out");
                    return Err(BridgeError::canceled("Script evaluation timed out"));
                }
            },
            None => rx.await,
        };
        let result = received.map_err(|_| BridgeError::canceled("Script evaluation was abandoned"))?;

        if result.success {
            value_to_node(&result.result)
        } else {
            Err(BridgeError::exception(result.exception.unwrap_or_default()))
        }
    }

    /// [`evaluate`](Self::evaluate) followed by conversion of the result.
    pub async fn evaluate_as<T: DeserializeOwned>(
        &self,
        script: &str,
        url: &str,
        line: i32,
        timeout: Option<Duration>,
    ) -> Result<T, BridgeError> {
        let node = self.evaluate(script, url, line, timeout).await?;
        from_node(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsbridge_core::{ErrorCode, ProcessMessage, Value};
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

    fn setup() -> (Arc<JavascriptExecutionEngine>, Arc<MessageDispatcher>, Arc<RecordingSender>) {
        let engine = Arc::new(JavascriptExecutionEngine::new());
        let dispatcher = Arc::new(MessageDispatcher::new());
        engine.install(&dispatcher);
        let sender = Arc::new(RecordingSender::default());
        engine.set_browser(sender.clone());
        (engine, dispatcher, sender)
    }

    fn deliver(dispatcher: &MessageDispatcher, sender: &Arc<RecordingSender>, message: ProcessMessage) {
        dispatcher.dispatch_message(sender.clone(), ProcessId::Renderer, message);
    }

    #[tokio::test]
    async fn test_evaluation_resolves() {
        let (engine, dispatcher, sender) = setup();
        let evaluation = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.evaluate("1+1", "about:blank", 1, None).await })
        };

        let request = loop {
            if let Some(message) = sender.sent.lock().unwrap().first().cloned() {
                break JsEvaluationRequest::from_process_message(&message).unwrap();
            }
            tokio::task::yield_now().await;
        };
        assert_eq!(request.script, "1+1");

        let result = JsEvaluationResult {
            task_id: request.task_id,
            success: true,
            result: Value::Int(2),
            exception: None,
        };
        deliver(&dispatcher, &sender, result.to_process_message().unwrap());

        assert_eq!(evaluation.await.unwrap().unwrap(), Node::Int(2));
        assert_eq!(engine.pending_evaluations(), 0);
    }

    #[tokio::test]
    async fn test_timeout_cancels_and_discards_late_result() {
        let (engine, dispatcher, sender) = setup();
        let err = engine
            .evaluate("while(true){}", "", 0, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Canceled);
        assert_eq!(engine.pending_evaluations(), 0);

        let message = sender.sent.lock().unwrap()[0].clone();
        let request = JsEvaluationRequest::from_process_message(&message).unwrap();
        let late = JsEvaluationResult {
            task_id: request.task_id,
            success: true,
            result: Value::Null,
            exception: None,
        };
        deliver(&dispatcher, &sender, late.to_process_message().unwrap());
        assert_eq!(engine.pending_evaluations(), 0);
    }

    #[tokio::test]
    async fn test_context_events() {
        let (engine, dispatcher, sender) = setup();
        let mut events = engine.subscribe();
        assert!(!engine.is_main_frame_context_initialized());

        deliver(&dispatcher, &sender, JsContextCreated.to_process_message().unwrap());
        assert!(engine.is_main_frame_context_initialized());
        assert_eq!(events.recv().await.unwrap(), ScriptEvent::ContextCreated);

        deliver(&dispatcher, &sender, JsContextReleased.to_process_message().unwrap());
        assert!(!engine.is_main_frame_context_initialized());
        assert_eq!(events.recv().await.unwrap(), ScriptEvent::ContextReleased);
    }

    #[tokio::test]
    async fn test_dropped_evaluation_is_forgotten() {
        let (engine, _dispatcher, sender) = setup();
        let evaluation = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.evaluate("forever()", "", 0, None).await })
        };
        while sender.sent.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        assert_eq!(engine.pending_evaluations(), 1);

        evaluation.abort();
        assert!(evaluation.await.unwrap_err().is_cancelled());
        assert_eq!(engine.pending_evaluations(), 0);
    }

    #[tokio::test]
    async fn test_failed_send_leaves_nothing_pending() {
        #[derive(Debug)]
        struct ClosedLink;
        impl ProcessMessageSender for ClosedLink {
            fn send_process_message(&self, _target: ProcessId, _message: ProcessMessage) -> Result<(), BridgeError> {
                Err(BridgeError::invalid_operation("link closed"))
            }
        }
        let engine = JavascriptExecutionEngine::new();
        engine.set_browser(Arc::new(ClosedLink));
        let err = engine.evaluate("1", "", 0, None).await.unwrap_err();
        assert_eq!(err.message, "link closed");
        assert_eq!(engine.pending_evaluations(), 0);
    }

    #[tokio::test]
    async fn test_evaluate_without_browser() {
        let engine = JavascriptExecutionEngine::new();
        let err = engine.evaluate("1", "", 0, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
    }
}
