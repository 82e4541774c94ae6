//! Adapters from plain Rust closures to [`Invocable`] methods.
//!
//! Each arity gets one impl of [`SyncHandler`] and one of [`AsyncHandler`];
//! the tuple type parameter keeps them apart the same way router handler
//! traits do.

use super::{Invocable, Invocation};
use futures::FutureExt;
use jsbridge_core::{BridgeError, FromArg, MethodReturn, Node, TypeHint};
use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Declared parameters of a handler: hint and variadic flag per position.
pub type ParameterList = Vec<(TypeHint, bool)>;

pub trait SyncHandler<Args>: Send + Sync + Sized + 'static {
    fn parameters() -> ParameterList;

    fn into_invocable(self) -> Arc<dyn Invocable>;
}

pub trait AsyncHandler<Args>: Send + Sync + Sized + 'static {
    fn parameters() -> ParameterList;

    fn into_invocable(self) -> Arc<dyn Invocable>;
}

struct SyncMethod<F, Args> {
    f: F,
    _args: PhantomData<fn(Args)>,
}

struct AsyncMethod<F, Args> {
    f: F,
    _args: PhantomData<fn(Args)>,
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "native method panicked".to_string()
    }
}

fn next_arg<T: FromArg>(args: &mut std::vec::IntoIter<Node>) -> Result<T, BridgeError> {
    T::from_arg(args.next().unwrap_or(Node::Null))
}

macro_rules! impl_handlers {
    ($($arg:ident),*) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, R, $($arg),*> Invocable for SyncMethod<F, ($($arg,)*)>
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: MethodReturn,
            $($arg: FromArg + 'static,)*
        {
            fn invoke(&self, args: Vec<Node>) -> Invocation {
                let mut args = args.into_iter();
                $(
                    let $arg = match next_arg::<$arg>(&mut args) {
                        Ok(value) => value,
                        Err(e) => return Invocation::Ready(Err(e)),
                    };
                )*
                let outcome = catch_unwind(AssertUnwindSafe(|| (self.f)($($arg),*).into_result()));
                Invocation::Ready(outcome.unwrap_or_else(|p| Err(BridgeError::exception(panic_message(p)))))
            }
        }

        impl<F, R, $($arg),*> SyncHandler<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: MethodReturn + 'static,
            $($arg: FromArg + 'static,)*
        {
            fn parameters() -> ParameterList {
                vec![$(($arg::hint(), $arg::VARIADIC)),*]
            }

            fn into_invocable(self) -> Arc<dyn Invocable> {
                Arc::new(SyncMethod::<F, ($($arg,)*)> { f: self, _args: PhantomData })
            }
        }

        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, Fut, $($arg),*> Invocable for AsyncMethod<F, ($($arg,)*)>
        where
            F: Fn($($arg),*) -> Fut + Send + Sync + 'static,
            Fut: Future + Send + 'static,
            Fut::Output: MethodReturn,
            $($arg: FromArg + 'static,)*
        {
            fn invoke(&self, args: Vec<Node>) -> Invocation {
                let mut args = args.into_iter();
                $(
                    let $arg = match next_arg::<$arg>(&mut args) {
                        Ok(value) => value,
                        Err(e) => return Invocation::Ready(Err(e)),
                    };
                )*
                let future = match catch_unwind(AssertUnwindSafe(|| (self.f)($($arg),*))) {
                    Ok(future) => future,
                    Err(p) => return Invocation::Ready(Err(BridgeError::exception(panic_message(p)))),
                };
                Invocation::Pending(Box::pin(async move {
                    match AssertUnwindSafe(future).catch_unwind().await {
                        Ok(output) => output.into_result(),
                        Err(p) => Err(BridgeError::exception(panic_message(p))),
                    }
                }))
            }
        }

        impl<F, Fut, $($arg),*> AsyncHandler<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> Fut + Send + Sync + 'static,
            Fut: Future + Send + 'static,
            Fut::Output: MethodReturn,
            $($arg: FromArg + 'static,)*
        {
            fn parameters() -> ParameterList {
                vec![$(($arg::hint(), $arg::VARIADIC)),*]
            }

            fn into_invocable(self) -> Arc<dyn Invocable> {
                Arc::new(AsyncMethod::<F, ($($arg,)*)> { f: self, _args: PhantomData })
            }
        }
    };
}

impl_handlers!();
impl_handlers!(A1);
impl_handlers!(A1, A2);
impl_handlers!(A1, A2, A3);
impl_handlers!(A1, A2, A3, A4);
impl_handlers!(A1, A2, A3, A4, A5);
impl_handlers!(A1, A2, A3, A4, A5, A6);

#[cfg(test)]
mod tests {
    use super::*;
    use jsbridge_core::{ErrorCode, Params};

    fn ready(invocation: Invocation) -> Result<Node, BridgeError> {
        match invocation {
            Invocation::Ready(result) => result,
            Invocation::Pending(_) => panic!("expected a ready result"),
        }
    }

    fn sync<Args, H: SyncHandler<Args>>(h: H) -> (ParameterList, Arc<dyn Invocable>) {
        (H::parameters(), h.into_invocable())
    }

    fn asynchronous<Args, H: AsyncHandler<Args>>(h: H) -> (ParameterList, Arc<dyn Invocable>) {
        (H::parameters(), h.into_invocable())
    }

    #[test]
    fn test_sync_parameters_and_call() {
        let (params, method) = sync(|a: i32, b: i32| a + b);
        assert_eq!(params, vec![(TypeHint::Integer, false), (TypeHint::Integer, false)]);
        let result = ready(method.invoke(vec![Node::Int(2), Node::Int(3)]));
        assert_eq!(result.unwrap(), Node::Int(5));
    }

    #[test]
    fn test_variadic_parameter_flagged() {
        let (params, method) = sync(|sep: String, parts: Params<String>| parts.0.join(&sep));
        assert_eq!(params[1], (TypeHint::String, true));
        let rest = Node::list(vec![Node::String("a".into()), Node::String("b".into())]);
        let result = ready(method.invoke(vec![Node::String("-".into()), rest]));
        assert_eq!(result.unwrap(), Node::String("a-b".into()));
    }

    #[test]
    fn test_conversion_failure_is_reported() {
        let (_, method) = sync(|a: i32| a);
        let err = ready(method.invoke(vec![Node::String("x".into())])).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_error_result_becomes_exception() {
        let (_, method) = sync(|| -> Result<i32, String> { Err("boom".into()) });
        let err = ready(method.invoke(vec![])).unwrap_err();
        assert_eq!(err.code, ErrorCode::Exception);
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn test_panic_is_caught() {
        #[allow(clippy::panic)]
        let (_, method) = sync(|| -> i32 { panic!("kaboom") });
        let err = ready(method.invoke(vec![])).unwrap_err();
        assert_eq!(err.code, ErrorCode::Exception);
        assert_eq!(err.message, "kaboom");
    }

    #[tokio::test]
    async fn test_async_method_is_pending() {
        let (params, method) = asynchronous(|a: i64| async move { a * 2 });
        assert_eq!(params, vec![(TypeHint::Integer, false)]);
        match method.invoke(vec![Node::Int(21)]) {
            Invocation::Pending(fut) => assert_eq!(fut.await.unwrap(), Node::Int(42)),
            Invocation::Ready(_) => panic!("expected a pending result"),
        }
    }
}
