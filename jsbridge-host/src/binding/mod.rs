//! Method binding: how a native closure becomes something the renderer can
//! call by name with loosely typed arguments.

mod descriptor;
mod handler;
mod object;

pub use descriptor::{to_camel_case, MethodArguments, MethodDescriptor, ParameterInfo};
pub use handler::{AsyncHandler, ParameterList, SyncHandler};
pub use object::{NativeObject, ObjectBuilder};

use futures::future::{BoxFuture, FutureExt};
use handler::panic_message;
use jsbridge_core::{BridgeError, Node};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Result of running a bound method: available now, or once the returned
/// future completes.
pub enum Invocation {
    Ready(Result<Node, BridgeError>),
    Pending(BoxFuture<'static, Result<Node, BridgeError>>),
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Invocation::Pending(_) => f.write_str("Pending"),
        }
    }
}

impl From<Result<Node, BridgeError>> for Invocation {
    fn from(result: Result<Node, BridgeError>) -> Self {
        Invocation::Ready(result)
    }
}

/// Type-erased method body. Receives exactly one node per declared
/// parameter.
pub trait Invocable: Send + Sync {
    fn invoke(&self, args: Vec<Node>) -> Invocation;
}

/// Deferred invocation handed to an interceptor.
pub type DeferredInvocation = Box<dyn FnOnce() -> Invocation + Send>;

/// Wraps every method invocation of one object. The interceptor must run the
/// deferred invocation at most once and return what it produced, or its own
/// replacement.
pub type CallInterceptor = Arc<dyn Fn(DeferredInvocation) -> Invocation + Send + Sync>;

/// A bound method: its signature plus the erased body.
#[derive(Clone)]
pub struct NativeMethod {
    descriptor: MethodDescriptor,
    body: Arc<dyn Invocable>,
}

impl fmt::Debug for NativeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeMethod")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl NativeMethod {
    pub fn new(descriptor: MethodDescriptor, body: Arc<dyn Invocable>) -> Self {
        NativeMethod { descriptor, body }
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Binds the arguments and runs the method, through the interceptor when
    /// one is set. Binding failures never reach the interceptor. A panic in
    /// the interceptor, or in a future it returns, becomes an `Exception`.
    pub fn invoke(&self, arguments: MethodArguments, interceptor: Option<&CallInterceptor>) -> Invocation {
        let bound = match self.descriptor.bind(arguments) {
            Ok(bound) => bound,
            Err(e) => return Invocation::Ready(Err(e)),
        };
        let body = Arc::clone(&self.body);
        let deferred: DeferredInvocation = Box::new(move || body.invoke(bound));
        let Some(interceptor) = interceptor else {
            return deferred();
        };
        match catch_unwind(AssertUnwindSafe(|| interceptor(deferred))) {
            Ok(Invocation::Ready(result)) => Invocation::Ready(result),
            Ok(Invocation::Pending(future)) => Invocation::Pending(Box::pin(async move {
                match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(result) => result,
                    Err(p) => Err(BridgeError::exception(panic_message(p))),
                }
            })),
            Err(p) => {
                warn!(method = %self.name(), "Call interceptor panicked");
                Invocation::Ready(Err(BridgeError::exception(panic_message(p))))
            }
        }
    }

    /// Runs the method and hands its outcome to `callback` exactly once.
    /// Synchronous results are delivered before this returns; pending ones
    /// are awaited on the current tokio runtime.
    pub fn execute<C>(&self, arguments: MethodArguments, interceptor: Option<&CallInterceptor>, callback: C)
    where
        C: FnOnce(Result<Node, BridgeError>) + Send + 'static,
    {
        match self.invoke(arguments, interceptor) {
            Invocation::Ready(result) => callback(result),
            Invocation::Pending(future) => match Handle::try_current() {
                Ok(handle) => {
                    debug!(method = %self.name(), "Awaiting asynchronous method result");
                    handle.spawn(async move { callback(future.await) });
                }
                Err(_) => {
                    warn!(method = %self.name(), "No async runtime to await the method result");
                    callback(Err(BridgeError::internal(
                        "No async runtime available to await the method result",
                    )));
                }
            },
        }
    }

    /// Runs the method and awaits its outcome.
    pub async fn call(
        &self,
        arguments: MethodArguments,
        interceptor: Option<&CallInterceptor>,
    ) -> Result<Node, BridgeError> {
        match self.invoke(arguments, interceptor) {
            Invocation::Ready(result) => result,
            Invocation::Pending(future) => future.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    fn add_method() -> NativeMethod {
        let object = ObjectBuilder::new()
            .method("add", |a: i32, b: i32| a + b)
            .async_method("addLater", |a: i32, b: i32| async move { a + b })
            .build()
            .unwrap();
        object.method("add").unwrap().clone()
    }

    #[test]
    fn test_execute_sync_delivers_inline() {
        let method = add_method();
        let (tx, mut rx) = oneshot::channel();
        method.execute(
            MethodArguments::Nodes(vec![Node::Int(2), Node::Int(3)]),
            None,
            move |r| {
                let _ = tx.send(r);
            },
        );
        assert_eq!(rx.try_recv().unwrap().unwrap(), Node::Int(5));
    }

    #[test]
    fn test_interceptor_sees_each_call() {
        let method = add_method();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let interceptor: CallInterceptor = Arc::new(move |deferred: DeferredInvocation| {
            counter.fetch_add(1, Ordering::SeqCst);
            deferred()
        });

        let result = futures::executor::block_on(method.call(
            MethodArguments::Nodes(vec![Node::Int(1), Node::Int(1)]),
            Some(&interceptor),
        ));
        assert_eq!(result.unwrap(), Node::Int(2));
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        // binding failures are reported without invoking the interceptor
        let result = futures::executor::block_on(
            method.call(MethodArguments::Nodes(vec![]), Some(&interceptor)),
        );
        assert!(result.is_err());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_interceptor_reports_exception() {
        let method = add_method();
        let interceptor: CallInterceptor =
            Arc::new(|_deferred: DeferredInvocation| -> Invocation { panic!("boom") });
        let (tx, mut rx) = oneshot::channel();
        method.execute(
            MethodArguments::Nodes(vec![Node::Int(2), Node::Int(3)]),
            Some(&interceptor),
            move |r| {
                let _ = tx.send(r);
            },
        );
        let err = rx.try_recv().unwrap().unwrap_err();
        assert_eq!(err.code, jsbridge_core::ErrorCode::Exception);
        assert_eq!(err.message, "boom");
    }

    #[tokio::test]
    async fn test_interceptor_future_panic_reports_exception() {
        let method = add_method();
        let interceptor: CallInterceptor = Arc::new(|_deferred: DeferredInvocation| {
            Invocation::Pending(Box::pin(futures::future::lazy(|_| -> Result<Node, BridgeError> {
                panic!("late boom")
            })))
        });
        let err = method
            .call(MethodArguments::Nodes(vec![Node::Int(1), Node::Int(1)]), Some(&interceptor))
            .await
            .unwrap_err();
        assert_eq!(err.message, "late boom");
    }

    #[tokio::test]
    async fn test_execute_async_spawns() {
        let object = ObjectBuilder::new()
            .async_method("addLater", |a: i32, b: i32| async move { a + b })
            .build()
            .unwrap();
        let method = object.method("addLater").unwrap();
        let (tx, rx) = oneshot::channel();
        method.execute(
            MethodArguments::Json("[4,5]".into()),
            None,
            move |r| {
                let _ = tx.send(r);
            },
        );
        assert_eq!(rx.await.unwrap().unwrap(), Node::Int(9));
    }

    #[test]
    fn test_execute_async_without_runtime() {
        let object = ObjectBuilder::new()
            .async_method("later", || async { 1 })
            .build()
            .unwrap();
        let (tx, mut rx) = oneshot::channel();
        object
            .method("later")
            .unwrap()
            .execute(MethodArguments::Nodes(vec![]), None, move |r| {
                let _ = tx.send(r);
            });
        let err = rx.try_recv().unwrap().unwrap_err();
        assert_eq!(err.code, jsbridge_core::ErrorCode::Internal);
    }
}
