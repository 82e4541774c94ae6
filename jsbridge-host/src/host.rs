use crate::binding::{CallInterceptor, NativeObject};
use crate::call_dispatcher::NativeCallHandler;
use crate::config::HostConfig;
use crate::evaluation::{JavascriptExecutionEngine, ScriptEvent};
use crate::registry::NativeObjectRegistry;
use jsbridge_core::{BridgeError, MessageDispatcher, Node, ProcessMessageSender};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Host side of one browser: its message dispatcher, native objects and
/// script evaluation.
///
/// Inbound messages are fed to [`BridgeHost::dispatcher`] by whatever pumps
/// the link to the renderer; outbound messages go through the sender given
/// to [`BridgeHost::attach`].
#[derive(Debug)]
pub struct BridgeHost {
    config: HostConfig,
    dispatcher: Arc<MessageDispatcher>,
    registry: Arc<NativeObjectRegistry>,
    engine: Arc<JavascriptExecutionEngine>,
}

impl Default for BridgeHost {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}

impl BridgeHost {
    pub fn new(config: HostConfig) -> Self {
        let dispatcher = Arc::new(MessageDispatcher::new());
        let registry = Arc::new(NativeObjectRegistry::new());
        let engine = Arc::new(JavascriptExecutionEngine::new());

        NativeCallHandler::new(Arc::clone(&registry)).install(&dispatcher);
        engine.install(&dispatcher);

        BridgeHost {
            config,
            dispatcher,
            registry,
            engine,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> Arc<MessageDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn registry(&self) -> &NativeObjectRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &JavascriptExecutionEngine {
        &self.engine
    }

    /// Connects the renderer link. Objects registered so far are announced.
    pub fn attach(&self, browser: Arc<dyn ProcessMessageSender>) {
        info!(browser = ?browser, "Attaching renderer link");
        self.engine.set_browser(Arc::clone(&browser));
        self.registry.set_browser(browser);
    }

    pub fn register_object(&self, name: impl Into<String>, object: NativeObject) -> bool {
        self.registry.register(name, object)
    }

    pub fn register_object_with_interceptor(
        &self,
        name: impl Into<String>,
        object: NativeObject,
        interceptor: CallInterceptor,
    ) -> bool {
        self.registry.register_with_interceptor(name, object, interceptor)
    }

    pub fn unregister_object(&self, name: &str) -> bool {
        self.registry.unregister(name)
    }

    /// Evaluates a script with the configured default timeout.
    pub async fn evaluate_script(&self, script: &str, url: &str, line: i32) -> Result<Node, BridgeError> {
        self.engine
            .evaluate(script, url, line, self.config.evaluation_timeout)
            .await
    }

    pub async fn evaluate_script_as<T: DeserializeOwned>(
        &self,
        script: &str,
        url: &str,
        line: i32,
    ) -> Result<T, BridgeError> {
        self.engine
            .evaluate_as(script, url, line, self.config.evaluation_timeout)
            .await
    }

    pub fn is_main_frame_context_initialized(&self) -> bool {
        self.engine.is_main_frame_context_initialized()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScriptEvent> {
        self.engine.subscribe()
    }
}
