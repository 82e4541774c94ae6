use crate::proxy::ObjectProxy;
use async_trait::async_trait;
use jsbridge_core::{BridgeError, Node};
use std::fmt;

/// The script engine's view of one live script context, usually the main
/// frame. Implemented by the embedder.
#[async_trait]
pub trait ScriptContext: Send + Sync + fmt::Debug {
    /// Exposes `proxy` to scripts under `proxy.name()`, replacing any
    /// previous binding with that name.
    fn bind_object(&self, proxy: ObjectProxy) -> Result<(), BridgeError>;

    fn unbind_object(&self, name: &str) -> Result<(), BridgeError>;

    /// Runs `script` and returns its completion value. Script exceptions are
    /// reported as [`jsbridge_core::ErrorCode::Exception`].
    async fn evaluate(&self, script: &str, url: &str, line: i32) -> Result<Node, BridgeError>;
}
