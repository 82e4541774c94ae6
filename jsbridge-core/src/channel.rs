use crate::error::BridgeError;
use crate::messages::ProcessMessage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two ends of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessId {
    /// Host process owning the native objects.
    Browser,
    /// Script process running the JavaScript contexts.
    Renderer,
}

impl ProcessId {
    pub fn peer(self) -> ProcessId {
        match self {
            ProcessId::Browser => ProcessId::Renderer,
            ProcessId::Renderer => ProcessId::Browser,
        }
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Browser => write!(f, "browser"),
            ProcessId::Renderer => write!(f, "renderer"),
        }
    }
}

/// Outbound half of a cross-process link. Sending never blocks; delivery is
/// asynchronous and unordered relative to other calls.
pub trait ProcessMessageSender: Send + Sync + fmt::Debug {
    fn send_process_message(&self, target: ProcessId, message: ProcessMessage) -> Result<(), BridgeError>;
}
