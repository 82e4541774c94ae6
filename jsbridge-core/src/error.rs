use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed wire data, read-only violations, unencodable values.
    InvalidOperation,
    /// Unknown object, method, `$ref` or pending call.
    NotFound,
    /// Argument shape does not match the method signature.
    InvalidArgument,
    /// A cycle was found while reference preservation was disabled.
    Cycle,
    /// The awaiting side gave up (timeout, released context).
    Canceled,
    /// The native method or the script raised an error.
    Exception,
    Transport,
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidOperation => "invalid_operation",
            ErrorCode::NotFound => "not_found",
            ErrorCode::InvalidArgument => "invalid_argument",
            ErrorCode::Cycle => "cycle",
            ErrorCode::Canceled => "canceled",
            ErrorCode::Exception => "exception",
            ErrorCode::Transport => "transport",
            ErrorCode::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeError {
    pub code: ErrorCode,
    pub message: String,
}

impl BridgeError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        BridgeError {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidOperation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn cycle(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cycle, message)
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Canceled, message)
    }

    pub fn exception(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Exception, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Transport, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Error raised by setters on a carrier whose container is read only.
    pub fn read_only() -> Self {
        Self::invalid_operation("read only")
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for BridgeError {}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::invalid_operation(format!("Invalid json format - {}", err))
    }
}

impl From<base64::DecodeError> for BridgeError {
    fn from(err: base64::DecodeError) -> Self {
        BridgeError::invalid_operation(format!("Invalid binary payload - {}", err))
    }
}

impl From<chrono::ParseError> for BridgeError {
    fn from(err: chrono::ParseError) -> Self {
        BridgeError::invalid_operation(format!("Invalid date payload - {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BridgeError::new(ErrorCode::InvalidOperation, "Invalid input");
        assert_eq!(err.code, ErrorCode::InvalidOperation);
        assert_eq!(err.message, "Invalid input");
    }

    #[test]
    fn test_convenience_constructors() {
        assert_eq!(BridgeError::not_found("x").code, ErrorCode::NotFound);
        assert_eq!(BridgeError::invalid_argument("x").code, ErrorCode::InvalidArgument);
        assert_eq!(BridgeError::cycle("x").code, ErrorCode::Cycle);
        assert_eq!(BridgeError::canceled("x").code, ErrorCode::Canceled);
        assert_eq!(BridgeError::exception("x").code, ErrorCode::Exception);
        assert_eq!(BridgeError::transport("x").code, ErrorCode::Transport);
        assert_eq!(BridgeError::internal("x").code, ErrorCode::Internal);
    }

    #[test]
    fn test_read_only_message() {
        let err = BridgeError::read_only();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
        assert_eq!(err.message, "read only");
    }

    #[test]
    fn test_json_errors_are_wrapped() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: BridgeError = json_err.into();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
        assert!(err.message.starts_with("Invalid json format"));
    }

    #[test]
    fn test_error_serialization() {
        let err = BridgeError::not_found("Object does not have a foo method.");
        let json = serde_json::to_string(&err).unwrap();
        let deserialized: BridgeError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, deserialized);
    }

    #[test]
    fn test_error_display() {
        let err = BridgeError::internal("Something went wrong");
        let display = format!("{}", err);
        assert!(display.contains("Internal"));
        assert!(display.contains("Something went wrong"));
    }
}
