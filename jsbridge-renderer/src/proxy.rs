//! Script-facing stand-ins for native objects.
//!
//! Every method of a registered object gets a [`MethodStub`] that ships its
//! arguments to the host as a `NativeObjectCallRequest` and resolves when the
//! matching `NativeObjectCallResult` comes back.

use crate::config::{ArgumentEncoding, RendererConfig};
use crate::pending::{ContextId, PendingCalls};
use indexmap::IndexMap;
use jsbridge_core::{
    node_to_value, serialize_with, value_to_node, BridgeError, BridgeMessage, CallArguments,
    CallIdAllocator, ListValue, NativeObjectCallRequest, Node, ProcessId, ProcessMessageSender,
    SerializerOptions,
};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;

/// Outbound half shared by every stub of a renderer.
#[derive(Debug)]
pub(crate) struct CallRoute {
    pub(crate) config: RendererConfig,
    pub(crate) browser: RwLock<Option<Arc<dyn ProcessMessageSender>>>,
    pub(crate) call_ids: CallIdAllocator,
    pub(crate) pending: PendingCalls,
}

impl CallRoute {
    pub(crate) fn new(config: RendererConfig) -> Self {
        CallRoute {
            config,
            browser: RwLock::new(None),
            call_ids: CallIdAllocator::new(),
            pending: PendingCalls::new(),
        }
    }

    pub(crate) fn browser(&self) -> Result<Arc<dyn ProcessMessageSender>, BridgeError> {
        self.browser
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| BridgeError::invalid_operation("No browser link is attached"))
    }
}

pub(crate) fn encode_arguments(encoding: ArgumentEncoding, args: Vec<Node>) -> Result<CallArguments, BridgeError> {
    match encoding {
        ArgumentEncoding::Values => {
            let values = args.iter().map(node_to_value).collect::<Result<Vec<_>, _>>()?;
            Ok(CallArguments::Values(ListValue::from_values(values)))
        }
        ArgumentEncoding::Json => {
            let wire = serialize_with(&Node::list(args), &SerializerOptions::arguments())?;
            Ok(CallArguments::Json(wire))
        }
    }
}

#[derive(Clone)]
pub struct MethodStub {
    object_name: String,
    member_name: String,
    context: ContextId,
    route: Arc<CallRoute>,
}

impl fmt::Debug for MethodStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodStub")
            .field("object", &self.object_name)
            .field("method", &self.member_name)
            .field("context", &self.context)
            .finish()
    }
}

impl MethodStub {
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn member_name(&self) -> &str {
        &self.member_name
    }

    /// Calls the native method. Fails as canceled when the issuing context
    /// is released before the result arrives.
    pub async fn call(&self, args: Vec<Node>) -> Result<Node, BridgeError> {
        let browser = self.route.browser()?;
        let arguments = encode_arguments(self.route.config.argument_encoding, args)?;
        let call_id = self.route.call_ids.allocate();
        let request = NativeObjectCallRequest {
            call_id,
            object_name: self.object_name.clone(),
            member_name: self.member_name.clone(),
            arguments,
        };
        let message = request.to_process_message()?;

        let rx = self.route.pending.register(self.context, call_id);
        if let Err(e) = browser.send_process_message(ProcessId::Browser, message) {
            self.route.pending.remove(call_id);
            return Err(e);
        }
        trace!(call_id = %call_id, object = %self.object_name, method = %self.member_name, "Native call sent");

        let result = rx.await.map_err(|_| {
            BridgeError::canceled("The script context was released before the native call completed")
        })?;
        if result.success {
            value_to_node(&result.result)
        } else {
            Err(BridgeError::exception(result.exception.unwrap_or_default()))
        }
    }
}

/// A native object as bound into one script context.
#[derive(Debug, Clone)]
pub struct ObjectProxy {
    name: String,
    context: ContextId,
    stubs: IndexMap<String, MethodStub>,
}

impl ObjectProxy {
    pub(crate) fn new(name: &str, method_names: &[String], context: ContextId, route: &Arc<CallRoute>) -> Self {
        let stubs = method_names
            .iter()
            .map(|member| {
                let stub = MethodStub {
                    object_name: name.to_string(),
                    member_name: member.clone(),
                    context,
                    route: Arc::clone(route),
                };
                (member.clone(), stub)
            })
            .collect();
        ObjectProxy {
            name: name.to_string(),
            context,
            stubs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.stubs.keys().map(String::as_str)
    }

    pub fn method(&self, name: &str) -> Option<&MethodStub> {
        self.stubs.get(name)
    }

    pub async fn call(&self, method: &str, args: Vec<Node>) -> Result<Node, BridgeError> {
        match self.stubs.get(method) {
            Some(stub) => stub.call(args).await,
            None => Err(BridgeError::not_found(format!(
                "Object does not have a {} method.",
                method
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsbridge_core::{deserialize, ErrorCode, Value};

    #[test]
    fn test_values_encoding() {
        let args = encode_arguments(ArgumentEncoding::Values, vec![Node::Int(2), Node::Double(0.5)]).unwrap();
        assert_eq!(
            args,
            CallArguments::Values(ListValue::from_values(vec![Value::Int(2), Value::Double(0.5)]))
        );
    }

    #[test]
    fn test_json_encoding_keeps_shared_lists() {
        let shared = Node::list(vec![Node::Int(1)]);
        let args = encode_arguments(ArgumentEncoding::Json, vec![shared.clone(), shared]).unwrap();
        let CallArguments::Json(wire) = args else {
            panic!("expected json arguments");
        };
        assert!(wire.starts_with('['));
        assert!(wire.contains("\"$ref\""));

        let decoded = deserialize(&wire).unwrap();
        let list = decoded.as_list().unwrap();
        let first = list.get(0).unwrap();
        let second = list.get(1).unwrap();
        assert!(first.as_list().unwrap().ptr_eq(second.as_list().unwrap()));
    }

    #[tokio::test]
    async fn test_unknown_method_on_proxy() {
        let route = Arc::new(CallRoute::new(RendererConfig::default()));
        let proxy = ObjectProxy::new("calc", &["add".to_string()], ContextId::new(1), &route);
        assert_eq!(proxy.method_names().collect::<Vec<_>>(), vec!["add"]);
        let err = proxy.call("sub", vec![]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_call_without_browser_fails() {
        let route = Arc::new(CallRoute::new(RendererConfig::default()));
        let proxy = ObjectProxy::new("calc", &["add".to_string()], ContextId::new(1), &route);
        let err = proxy.call("add", vec![]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
        assert!(route.pending.is_empty());
    }
}
