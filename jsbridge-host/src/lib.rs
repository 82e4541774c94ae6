//! Host side of the JavaScript bridge.

pub mod binding;
pub mod call_dispatcher;
pub mod config;
pub mod evaluation;
pub mod host;
pub mod logging;
pub mod registry;

pub use binding::{
    AsyncHandler, CallInterceptor, DeferredInvocation, Invocable, Invocation, MethodArguments,
    MethodDescriptor, NativeMethod, NativeObject, ObjectBuilder, SyncHandler,
};
pub use call_dispatcher::NativeCallHandler;
pub use config::{ConfigError, HostConfig};
pub use evaluation::{JavascriptExecutionEngine, ScriptEvent};
pub use host::BridgeHost;
pub use logging::{init_logging, init_test_logging, log_filter};
pub use registry::{NativeObjectRegistry, RegisteredObject};
