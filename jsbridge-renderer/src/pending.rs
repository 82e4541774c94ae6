use dashmap::DashMap;
use jsbridge_core::{CallId, NativeObjectCallResult};
use std::fmt;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Identifies one script context for the lifetime of the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub fn new(value: u64) -> Self {
        ContextId(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct PendingCall {
    context: ContextId,
    waiter: oneshot::Sender<NativeObjectCallResult>,
}

/// Native calls awaiting their result, keyed by call id. Each is tied to
/// the context that issued it so that releasing the context abandons them.
#[derive(Default)]
pub struct PendingCalls {
    calls: DashMap<CallId, PendingCall>,
}

impl fmt::Debug for PendingCalls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCalls")
            .field("len", &self.calls.len())
            .finish()
    }
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, context: ContextId, call_id: CallId) -> oneshot::Receiver<NativeObjectCallResult> {
        let (waiter, rx) = oneshot::channel();
        if self.calls.insert(call_id, PendingCall { context, waiter }).is_some() {
            warn!(call_id = %call_id, "Replaced a pending call with the same id");
        }
        rx
    }

    /// Completes the matching call. Returns false when nothing waits for it.
    pub fn resolve(&self, result: NativeObjectCallResult) -> bool {
        match self.calls.remove(&result.call_id) {
            Some((call_id, pending)) => {
                if pending.waiter.send(result).is_err() {
                    debug!(call_id = %call_id, "Caller went away before the call completed");
                }
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, call_id: CallId) -> bool {
        self.calls.remove(&call_id).is_some()
    }

    /// Drops every call issued from `context`; their callers observe
    /// cancellation. Returns how many were dropped.
    pub fn release_context(&self, context: ContextId) -> usize {
        let before = self.calls.len();
        self.calls.retain(|_, pending| pending.context != context);
        before.saturating_sub(self.calls.len())
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsbridge_core::Value;

    fn ok(call_id: i32) -> NativeObjectCallResult {
        NativeObjectCallResult {
            call_id: CallId::new(call_id),
            success: true,
            result: Value::Int(call_id),
            exception: None,
        }
    }

    #[tokio::test]
    async fn test_resolve_delivers() {
        let pending = PendingCalls::new();
        let rx = pending.register(ContextId::new(1), CallId::new(5));
        assert!(pending.resolve(ok(5)));
        assert_eq!(rx.await.unwrap().result, Value::Int(5));
        assert!(!pending.resolve(ok(5)));
    }

    #[tokio::test]
    async fn test_release_context_cancels_only_its_calls() {
        let pending = PendingCalls::new();
        let first = pending.register(ContextId::new(1), CallId::new(1));
        let second = pending.register(ContextId::new(2), CallId::new(2));

        assert_eq!(pending.release_context(ContextId::new(1)), 1);
        assert!(first.await.is_err());
        assert_eq!(pending.len(), 1);

        assert!(pending.resolve(ok(2)));
        assert!(second.await.is_ok());
    }
}
