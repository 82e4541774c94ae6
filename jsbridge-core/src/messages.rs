//! Catalog of the messages exchanged between host and renderer.
//!
//! Every message maps its fields to fixed indices of the argument list. The
//! index of a field never changes for a given message name.

use crate::error::BridgeError;
use crate::ids::{CallId, TaskId};
use crate::value::{ListValue, Value, ValueType};
use serde::{Deserialize, Serialize};

/// Named, positionally indexed message as carried by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessMessage {
    pub name: String,
    pub arguments: ListValue,
}

impl ProcessMessage {
    pub fn new(name: impl Into<String>) -> Self {
        ProcessMessage {
            name: name.into(),
            arguments: ListValue::new(),
        }
    }
}

pub trait BridgeMessage: Sized {
    const NAME: &'static str;

    fn to_process_message(&self) -> Result<ProcessMessage, BridgeError>;

    fn from_process_message(message: &ProcessMessage) -> Result<Self, BridgeError>;
}

fn check_name(message: &ProcessMessage, expected: &str) -> Result<(), BridgeError> {
    if message.name == expected {
        Ok(())
    } else {
        Err(BridgeError::invalid_operation(format!(
            "Expected a {} message but got {}",
            expected, message.name
        )))
    }
}

fn value_at(arguments: &ListValue, index: usize) -> Value {
    arguments.get(index).cloned().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsEvaluationRequest {
    pub task_id: TaskId,
    pub script: String,
    pub url: String,
    pub line: i32,
}

impl BridgeMessage for JsEvaluationRequest {
    const NAME: &'static str = "JsEvaluationRequest";

    fn to_process_message(&self) -> Result<ProcessMessage, BridgeError> {
        let mut message = ProcessMessage::new(Self::NAME);
        let arguments = &mut message.arguments;
        arguments.set(0, Value::Int(self.task_id.as_i32()))?;
        arguments.set(1, Value::String(self.script.clone()))?;
        arguments.set(2, Value::String(self.url.clone()))?;
        arguments.set(3, Value::Int(self.line))?;
        Ok(message)
    }

    fn from_process_message(message: &ProcessMessage) -> Result<Self, BridgeError> {
        check_name(message, Self::NAME)?;
        let arguments = &message.arguments;
        Ok(JsEvaluationRequest {
            task_id: TaskId::new(arguments.get_int(0)),
            script: arguments.get_string(1),
            url: arguments.get_string(2),
            line: arguments.get_int(3),
        })
    }
}

/// Outcome of a script evaluation. `result` holds a serialized carrier value.
#[derive(Debug, Clone, PartialEq)]
pub struct JsEvaluationResult {
    pub task_id: TaskId,
    pub success: bool,
    pub result: Value,
    pub exception: Option<String>,
}

impl BridgeMessage for JsEvaluationResult {
    const NAME: &'static str = "JsEvaluationResult";

    fn to_process_message(&self) -> Result<ProcessMessage, BridgeError> {
        let mut message = ProcessMessage::new(Self::NAME);
        let arguments = &mut message.arguments;
        arguments.set(0, Value::Int(self.task_id.as_i32()))?;
        arguments.set(1, Value::Bool(self.success))?;
        arguments.set(2, self.result.clone())?;
        arguments.set_nullable_string(3, self.exception.as_deref())?;
        Ok(message)
    }

    fn from_process_message(message: &ProcessMessage) -> Result<Self, BridgeError> {
        check_name(message, Self::NAME)?;
        let arguments = &message.arguments;
        Ok(JsEvaluationResult {
            task_id: TaskId::new(arguments.get_int(0)),
            success: arguments.get_bool(1),
            result: value_at(arguments, 2),
            exception: arguments.get_nullable_string(3),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeObjectRegistrationRequest {
    pub object_name: String,
    pub method_names: Vec<String>,
}

impl BridgeMessage for NativeObjectRegistrationRequest {
    const NAME: &'static str = "NativeObjectRegistrationRequest";

    fn to_process_message(&self) -> Result<ProcessMessage, BridgeError> {
        let mut message = ProcessMessage::new(Self::NAME);
        let methods = ListValue::from_values(
            self.method_names
                .iter()
                .map(|name| Value::String(name.clone()))
                .collect(),
        );
        message.arguments.set(0, Value::String(self.object_name.clone()))?;
        message.arguments.set(1, Value::List(methods))?;
        Ok(message)
    }

    fn from_process_message(message: &ProcessMessage) -> Result<Self, BridgeError> {
        check_name(message, Self::NAME)?;
        let arguments = &message.arguments;
        let methods = arguments.get_list(1);
        Ok(NativeObjectRegistrationRequest {
            object_name: arguments.get_string(0),
            method_names: methods.iter().map(|v| v.as_str().to_owned()).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeObjectUnregistrationRequest {
    pub object_name: String,
}

impl BridgeMessage for NativeObjectUnregistrationRequest {
    const NAME: &'static str = "NativeObjectUnregistrationRequest";

    fn to_process_message(&self) -> Result<ProcessMessage, BridgeError> {
        let mut message = ProcessMessage::new(Self::NAME);
        message.arguments.set(0, Value::String(self.object_name.clone()))?;
        Ok(message)
    }

    fn from_process_message(message: &ProcessMessage) -> Result<Self, BridgeError> {
        check_name(message, Self::NAME)?;
        Ok(NativeObjectUnregistrationRequest {
            object_name: message.arguments.get_string(0),
        })
    }
}

/// Arguments of a native call, either one carrier per argument or a
/// single wire JSON array read against the method signature.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArguments {
    Values(ListValue),
    Json(String),
}

impl Default for CallArguments {
    fn default() -> Self {
        CallArguments::Values(ListValue::new())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeObjectCallRequest {
    pub call_id: CallId,
    pub object_name: String,
    pub member_name: String,
    pub arguments: CallArguments,
}

impl BridgeMessage for NativeObjectCallRequest {
    const NAME: &'static str = "NativeObjectCallRequest";

    fn to_process_message(&self) -> Result<ProcessMessage, BridgeError> {
        let mut message = ProcessMessage::new(Self::NAME);
        let arguments = &mut message.arguments;
        arguments.set(0, Value::Int(self.call_id.as_i32()))?;
        arguments.set(1, Value::String(self.object_name.clone()))?;
        arguments.set(2, Value::String(self.member_name.clone()))?;
        let payload = match &self.arguments {
            CallArguments::Values(list) => Value::List(list.clone()),
            CallArguments::Json(json) => Value::String(json.clone()),
        };
        arguments.set(3, payload)?;
        Ok(message)
    }

    fn from_process_message(message: &ProcessMessage) -> Result<Self, BridgeError> {
        check_name(message, Self::NAME)?;
        let arguments = &message.arguments;
        let payload = match arguments.value_type(3) {
            ValueType::String => CallArguments::Json(arguments.get_string(3)),
            _ => CallArguments::Values(arguments.get_list(3)),
        };
        Ok(NativeObjectCallRequest {
            call_id: CallId::new(arguments.get_int(0)),
            object_name: arguments.get_string(1),
            member_name: arguments.get_string(2),
            arguments: payload,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeObjectCallResult {
    pub call_id: CallId,
    pub success: bool,
    pub result: Value,
    pub exception: Option<String>,
}

impl NativeObjectCallResult {
    pub fn failure(call_id: CallId, exception: impl Into<String>) -> Self {
        NativeObjectCallResult {
            call_id,
            success: false,
            result: Value::Null,
            exception: Some(exception.into()),
        }
    }
}

impl BridgeMessage for NativeObjectCallResult {
    const NAME: &'static str = "NativeObjectCallResult";

    fn to_process_message(&self) -> Result<ProcessMessage, BridgeError> {
        let mut message = ProcessMessage::new(Self::NAME);
        let arguments = &mut message.arguments;
        arguments.set(0, Value::Int(self.call_id.as_i32()))?;
        arguments.set(1, Value::Bool(self.success))?;
        arguments.set(2, self.result.clone())?;
        arguments.set_nullable_string(3, self.exception.as_deref())?;
        Ok(message)
    }

    fn from_process_message(message: &ProcessMessage) -> Result<Self, BridgeError> {
        check_name(message, Self::NAME)?;
        let arguments = &message.arguments;
        Ok(NativeObjectCallResult {
            call_id: CallId::new(arguments.get_int(0)),
            success: arguments.get_bool(1),
            result: value_at(arguments, 2),
            exception: arguments.get_nullable_string(3),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsStackFrame {
    pub function_name: String,
    pub script_name_or_source_url: String,
    pub line_number: i32,
    pub column: i32,
}

impl JsStackFrame {
    fn to_list(&self) -> Result<ListValue, BridgeError> {
        let mut list = ListValue::new();
        list.set(0, Value::String(self.function_name.clone()))?;
        list.set(1, Value::String(self.script_name_or_source_url.clone()))?;
        list.set(2, Value::Int(self.line_number))?;
        list.set(3, Value::Int(self.column))?;
        Ok(list)
    }

    fn from_list(list: &ListValue) -> Self {
        JsStackFrame {
            function_name: list.get_string(0),
            script_name_or_source_url: list.get_string(1),
            line_number: list.get_int(2),
            column: list.get_int(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsUncaughtException {
    pub message: String,
    pub stack_frames: Vec<JsStackFrame>,
}

impl BridgeMessage for JsUncaughtException {
    const NAME: &'static str = "JsUncaughtException";

    fn to_process_message(&self) -> Result<ProcessMessage, BridgeError> {
        let mut message = ProcessMessage::new(Self::NAME);
        let mut frames = ListValue::new();
        for (i, frame) in self.stack_frames.iter().enumerate() {
            frames.set(i, Value::List(frame.to_list()?))?;
        }
        message.arguments.set(0, Value::String(self.message.clone()))?;
        message.arguments.set(1, Value::List(frames))?;
        Ok(message)
    }

    fn from_process_message(message: &ProcessMessage) -> Result<Self, BridgeError> {
        check_name(message, Self::NAME)?;
        let arguments = &message.arguments;
        let frames = arguments.get_list(1);
        Ok(JsUncaughtException {
            message: arguments.get_string(0),
            stack_frames: frames
                .iter()
                .filter_map(Value::as_list)
                .map(JsStackFrame::from_list)
                .collect(),
        })
    }
}

/// Native failure inside the renderer that could not be reported to a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct UnhandledException {
    pub exception_type: String,
    pub message: String,
    pub stack_trace: Option<String>,
}

impl BridgeMessage for UnhandledException {
    const NAME: &'static str = "UnhandledException";

    fn to_process_message(&self) -> Result<ProcessMessage, BridgeError> {
        let mut message = ProcessMessage::new(Self::NAME);
        let arguments = &mut message.arguments;
        arguments.set(0, Value::String(self.exception_type.clone()))?;
        arguments.set(1, Value::String(self.message.clone()))?;
        arguments.set_nullable_string(2, self.stack_trace.as_deref())?;
        Ok(message)
    }

    fn from_process_message(message: &ProcessMessage) -> Result<Self, BridgeError> {
        check_name(message, Self::NAME)?;
        let arguments = &message.arguments;
        Ok(UnhandledException {
            exception_type: arguments.get_string(0),
            message: arguments.get_string(1),
            stack_trace: arguments.get_nullable_string(2),
        })
    }
}

macro_rules! empty_message {
    ($ty:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $ty;

        impl BridgeMessage for $ty {
            const NAME: &'static str = stringify!($ty);

            fn to_process_message(&self) -> Result<ProcessMessage, BridgeError> {
                Ok(ProcessMessage::new(Self::NAME))
            }

            fn from_process_message(message: &ProcessMessage) -> Result<Self, BridgeError> {
                check_name(message, Self::NAME)?;
                Ok($ty)
            }
        }
    };
}

empty_message!(JsContextCreated, "A main frame script context was created.");
empty_message!(JsContextReleased, "The main frame script context was released.");
