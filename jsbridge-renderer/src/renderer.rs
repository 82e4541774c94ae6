//! Renderer side of one browser.
//!
//! Objects announced by the host are remembered and bound into the script
//! context as soon as one exists; until then binding is deferred. Calls made
//! through their proxies are tied to the context that made them.

use crate::config::RendererConfig;
use crate::context::ScriptContext;
use crate::pending::ContextId;
use crate::proxy::{CallRoute, ObjectProxy};
use indexmap::IndexMap;
use jsbridge_core::{
    node_to_value, BridgeError, BridgeMessage, JsContextCreated, JsContextReleased,
    JsEvaluationRequest, JsEvaluationResult, JsUncaughtException, MessageDispatcher,
    MessageReceived, NativeObjectCallResult, NativeObjectRegistrationRequest,
    NativeObjectUnregistrationRequest, ProcessId, ProcessMessage, ProcessMessageSender, TaskId,
    UnhandledException, Value,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
struct ActiveContext {
    id: ContextId,
    script: Arc<dyn ScriptContext>,
}

#[derive(Debug)]
struct RendererState {
    route: Arc<CallRoute>,
    objects: RwLock<IndexMap<String, Vec<String>>>,
    context: RwLock<Option<ActiveContext>>,
    next_context: AtomicU64,
}

#[derive(Debug)]
pub struct BridgeRenderer {
    dispatcher: Arc<MessageDispatcher>,
    state: Arc<RendererState>,
}

impl Default for BridgeRenderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

impl BridgeRenderer {
    pub fn new(config: RendererConfig) -> Self {
        let state = Arc::new(RendererState {
            route: Arc::new(CallRoute::new(config)),
            objects: RwLock::new(IndexMap::new()),
            context: RwLock::new(None),
            next_context: AtomicU64::new(1),
        });
        let dispatcher = Arc::new(MessageDispatcher::new());

        let s = Arc::clone(&state);
        dispatcher.register_message_handler(NativeObjectRegistrationRequest::NAME, move |m: &MessageReceived| {
            s.on_registration(m)
        });
        let s = Arc::clone(&state);
        dispatcher.register_message_handler(NativeObjectUnregistrationRequest::NAME, move |m: &MessageReceived| {
            s.on_unregistration(m)
        });
        let s = Arc::clone(&state);
        dispatcher.register_message_handler(NativeObjectCallResult::NAME, move |m: &MessageReceived| {
            s.on_call_result(m)
        });
        let s = Arc::clone(&state);
        dispatcher.register_message_handler(JsEvaluationRequest::NAME, move |m: &MessageReceived| {
            s.on_evaluation_request(m)
        });

        BridgeRenderer { dispatcher, state }
    }

    pub fn dispatcher(&self) -> Arc<MessageDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn config(&self) -> &RendererConfig {
        &self.state.route.config
    }

    pub fn attach(&self, browser: Arc<dyn ProcessMessageSender>) {
        info!(browser = ?browser, "Attaching browser link");
        *self.state.route.browser.write().unwrap_or_else(PoisonError::into_inner) = Some(browser);
    }

    /// Makes `script` the live context, binds every known object into it
    /// and tells the host. A context still live is released first.
    pub fn context_created(&self, script: Arc<dyn ScriptContext>) -> ContextId {
        if self.state.active().is_some() {
            self.context_released();
        }
        let id = ContextId::new(self.state.next_context.fetch_add(1, Ordering::SeqCst));
        *self.state.context.write().unwrap_or_else(PoisonError::into_inner) = Some(ActiveContext {
            id,
            script,
        });

        let objects: Vec<(String, Vec<String>)> = self
            .state
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, methods)| (name.clone(), methods.clone()))
            .collect();
        for (name, methods) in &objects {
            self.state.bind(name, methods);
        }
        info!(context = %id, objects = objects.len(), "Script context created");

        self.state.notify(JsContextCreated.to_process_message());
        id
    }

    /// Forgets the live context. Native calls it issued fail as canceled.
    pub fn context_released(&self) {
        let released = self
            .state
            .context
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(context) = released else {
            return;
        };
        let abandoned = self.state.route.pending.release_context(context.id);
        info!(context = %context.id, abandoned, "Script context released");
        self.state.notify(JsContextReleased.to_process_message());
    }

    pub fn current_context(&self) -> Option<ContextId> {
        self.state.active().map(|c| c.id)
    }

    /// Proxy for `name` in the live context.
    pub fn proxy(&self, name: &str) -> Option<ObjectProxy> {
        let context = self.state.active()?;
        let objects = self.state.objects.read().unwrap_or_else(PoisonError::into_inner);
        objects
            .get(name)
            .map(|methods| ObjectProxy::new(name, methods, context.id, &self.state.route))
    }

    pub fn registered_objects(&self) -> Vec<String> {
        self.state
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn pending_calls(&self) -> usize {
        self.state.route.pending.len()
    }

    pub fn report_uncaught_exception(&self, exception: JsUncaughtException) {
        warn!(message = %exception.message, "Reporting uncaught script exception");
        self.state.notify(exception.to_process_message());
    }

    pub fn report_unhandled_exception(&self, exception_type: &str, error: &BridgeError) {
        self.state.report_unhandled(exception_type, error);
    }
}

impl RendererState {
    fn active(&self) -> Option<ActiveContext> {
        self.context.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn notify(&self, message: Result<ProcessMessage, BridgeError>) {
        let sent = self
            .route
            .browser()
            .and_then(|browser| message.and_then(|m| browser.send_process_message(ProcessId::Browser, m)));
        if let Err(e) = sent {
            warn!(error = %e, "Failed to notify the browser");
        }
    }

    fn report_unhandled(&self, exception_type: &str, error: &BridgeError) {
        error!(kind = %exception_type, error = %error, "Unhandled renderer exception");
        let exception = UnhandledException {
            exception_type: exception_type.to_string(),
            message: error.message.clone(),
            stack_trace: None,
        };
        self.notify(exception.to_process_message());
    }

    fn bind(&self, name: &str, methods: &[String]) {
        let Some(context) = self.active() else {
            debug!(object = %name, "No script context yet, binding deferred");
            return;
        };
        let proxy = ObjectProxy::new(name, methods, context.id, &self.route);
        match context.script.bind_object(proxy) {
            Ok(()) => debug!(object = %name, context = %context.id, "Bound native object"),
            Err(e) => self.report_unhandled("BindingError", &e),
        }
    }

    fn on_registration(&self, received: &MessageReceived) {
        let request = match NativeObjectRegistrationRequest::from_process_message(&received.message) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "Malformed registration request");
                return;
            }
        };
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request.object_name.clone(), request.method_names.clone());
        self.bind(&request.object_name, &request.method_names);
    }

    fn on_unregistration(&self, received: &MessageReceived) {
        let request = match NativeObjectUnregistrationRequest::from_process_message(&received.message) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "Malformed unregistration request");
                return;
            }
        };
        let removed = self
            .objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(&request.object_name)
            .is_some();
        if !removed {
            return;
        }
        if let Some(context) = self.active() {
            if let Err(e) = context.script.unbind_object(&request.object_name) {
                self.report_unhandled("BindingError", &e);
            }
        }
    }

    fn on_call_result(&self, received: &MessageReceived) {
        match NativeObjectCallResult::from_process_message(&received.message) {
            Ok(result) => {
                let call_id = result.call_id;
                if !self.route.pending.resolve(result) {
                    debug!(call_id = %call_id, "Discarding result of an abandoned call");
                }
            }
            Err(e) => error!(error = %e, "Malformed call result"),
        }
    }

    fn on_evaluation_request(&self, received: &MessageReceived) {
        let request = match JsEvaluationRequest::from_process_message(&received.message) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "Malformed evaluation request");
                return;
            }
        };
        let browser = Arc::clone(&received.browser);
        let target = received.source;
        let task_id = request.task_id;

        let Some(context) = self.active() else {
            reply(browser.as_ref(), target, failed(task_id, "No script context is available"));
            return;
        };
        let Ok(runtime) = Handle::try_current() else {
            reply(browser.as_ref(), target, failed(task_id, "No async runtime available to run the script"));
            return;
        };
        runtime.spawn(async move {
            let outcome = context
                .script
                .evaluate(&request.script, &request.url, request.line)
                .await
                .and_then(|node| node_to_value(&node));
            let result = match outcome {
                Ok(value) => JsEvaluationResult {
                    task_id,
                    success: true,
                    result: value,
                    exception: None,
                },
                Err(e) => failed(task_id, &e.message),
            };
            reply(browser.as_ref(), target, result);
        });
    }
}

fn failed(task_id: TaskId, exception: &str) -> JsEvaluationResult {
    JsEvaluationResult {
        task_id,
        success: false,
        result: Value::Null,
        exception: Some(exception.to_string()),
    }
}

fn reply(browser: &dyn ProcessMessageSender, target: ProcessId, result: JsEvaluationResult) {
    let task_id = result.task_id;
    let sent = result
        .to_process_message()
        .and_then(|message| browser.send_process_message(target, message));
    if let Err(e) = sent {
        warn!(task_id = %task_id, error = %e, "Failed to deliver evaluation result");
    }
}
