//! Renderer side of the JavaScript bridge.

pub mod config;
pub mod context;
pub mod pending;
pub mod proxy;
pub mod renderer;

pub use config::{ArgumentEncoding, ConfigError, RendererConfig};
pub use context::ScriptContext;
pub use pending::{ContextId, PendingCalls};
pub use proxy::{MethodStub, ObjectProxy};
pub use renderer::BridgeRenderer;
