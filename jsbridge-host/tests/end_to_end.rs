// End to end tests
// Host and renderer sessions wired through an in-memory channel pair, with a
// toy script context that can call bound native objects

use async_trait::async_trait;
use jsbridge_core::{BridgeError, ErrorCode, Node, ProcessId};
use jsbridge_host::{init_test_logging, BridgeHost, HostConfig, ObjectBuilder, ScriptEvent};
use jsbridge_renderer::{ArgumentEncoding, BridgeRenderer, ObjectProxy, RendererConfig, ScriptContext};
use jsbridge_transport::{ChannelTransport, MessagePump};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Understands `object.method(1,2,...)` with integer arguments, and `hang`.
#[derive(Debug, Default)]
struct ToyContext {
    bound: Mutex<HashMap<String, ObjectProxy>>,
}

#[async_trait]
impl ScriptContext for ToyContext {
    fn bind_object(&self, proxy: ObjectProxy) -> Result<(), BridgeError> {
        self.bound.lock().unwrap().insert(proxy.name().to_string(), proxy);
        Ok(())
    }

    fn unbind_object(&self, name: &str) -> Result<(), BridgeError> {
        self.bound.lock().unwrap().remove(name);
        Ok(())
    }

    async fn evaluate(&self, script: &str, _url: &str, _line: i32) -> Result<Node, BridgeError> {
        if script == "hang" {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        let (target, rest) = script
            .split_once('.')
            .ok_or_else(|| BridgeError::exception("SyntaxError"))?;
        let (method, args) = rest
            .trim_end_matches(')')
            .split_once('(')
            .ok_or_else(|| BridgeError::exception("SyntaxError"))?;
        let args = args
            .split(',')
            .filter(|a| !a.trim().is_empty())
            .map(|a| a.trim().parse::<i64>().map(Node::Int))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BridgeError::exception(e.to_string()))?;
        let proxy = self
            .bound
            .lock()
            .unwrap()
            .get(target)
            .cloned()
            .ok_or_else(|| BridgeError::exception(format!("ReferenceError: {} is not defined", target)))?;
        proxy.call(method, args).await
    }
}

struct Session {
    host: BridgeHost,
    renderer: BridgeRenderer,
    context: Arc<ToyContext>,
}

fn connect(host_config: HostConfig, renderer_config: RendererConfig) -> Session {
    init_test_logging();
    let (browser_end, renderer_end) = ChannelTransport::pair();
    let host = BridgeHost::new(host_config);
    let renderer = BridgeRenderer::new(renderer_config);

    let calc = ObjectBuilder::new()
        .method("add", |a: i32, b: i32| a + b)
        .async_method("square", |a: i64| async move { a * a })
        .build()
        .unwrap();
    assert!(host.register_object("calc", calc));

    host.attach(browser_end.sender.clone());
    renderer.attach(renderer_end.sender.clone());

    MessagePump::new(host.dispatcher(), browser_end.sender.clone(), ProcessId::Renderer)
        .spawn(browser_end.receiver);
    MessagePump::new(renderer.dispatcher(), renderer_end.sender.clone(), ProcessId::Browser)
        .spawn(renderer_end.receiver);

    let context = Arc::new(ToyContext::default());
    renderer.context_created(context.clone());
    Session {
        host,
        renderer,
        context,
    }
}

async fn eventually(check: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap()
}

// ============================================================================
// NATIVE CALLS FROM SCRIPT
// ============================================================================

#[cfg(test)]
mod native_call_tests {
    use super::*;

    #[tokio::test]
    async fn test_add_from_renderer() {
        let session = connect(HostConfig::default(), RendererConfig::default());
        eventually(|| session.renderer.proxy("calc").is_some()).await;

        let proxy = session.renderer.proxy("calc").unwrap();
        let sum = proxy.call("add", vec![Node::Int(2), Node::Int(3)]).await.unwrap();
        assert_eq!(sum, Node::Int(5));
        assert_eq!(session.renderer.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_async_method_with_json_arguments() {
        let config = RendererConfig {
            argument_encoding: ArgumentEncoding::Json,
        };
        let session = connect(HostConfig::default(), config);
        eventually(|| session.renderer.proxy("calc").is_some()).await;

        let proxy = session.renderer.proxy("calc").unwrap();
        let squared = proxy.call("square", vec![Node::Int(12)]).await.unwrap();
        assert_eq!(squared, Node::Int(144));
    }

    #[tokio::test]
    async fn test_unregistration_reaches_renderer() {
        let session = connect(HostConfig::default(), RendererConfig::default());
        eventually(|| session.renderer.proxy("calc").is_some()).await;

        assert!(session.host.unregister_object("calc"));
        eventually(|| session.renderer.proxy("calc").is_none()).await;
        assert!(session.context.bound.lock().unwrap().is_empty());
    }
}

// ============================================================================
// SCRIPT EVALUATION FROM HOST
// ============================================================================

#[cfg(test)]
mod evaluation_tests {
    use super::*;

    #[tokio::test]
    async fn test_script_calls_back_into_host() {
        let session = connect(HostConfig::default(), RendererConfig::default());
        eventually(|| session.host.is_main_frame_context_initialized()).await;
        eventually(|| session.context.bound.lock().unwrap().contains_key("calc")).await;

        let result: i32 = session
            .host
            .evaluate_script_as("calc.add(40,2)", "about:blank", 1)
            .await
            .unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_script_exception() {
        let session = connect(HostConfig::default(), RendererConfig::default());
        let err = session
            .host
            .evaluate_script("nothing.here()", "about:blank", 1)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Exception);
        assert_eq!(err.message, "ReferenceError: nothing is not defined");
    }

    #[tokio::test]
    async fn test_evaluation_timeout() {
        let config = HostConfig {
            evaluation_timeout: Some(Duration::from_millis(50)),
            ..HostConfig::default()
        };
        let session = connect(config, RendererConfig::default());
        let err = session
            .host
            .evaluate_script("hang", "about:blank", 1)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Canceled);
        assert_eq!(session.host.engine().pending_evaluations(), 0);
    }

    #[tokio::test]
    async fn test_context_release_is_observed() {
        let session = connect(HostConfig::default(), RendererConfig::default());
        let mut events = session.host.subscribe();
        eventually(|| session.host.is_main_frame_context_initialized()).await;

        session.renderer.context_released();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .unwrap()
                .unwrap();
            if event == ScriptEvent::ContextReleased {
                break;
            }
        }
        assert!(!session.host.is_main_frame_context_initialized());
    }
}
