//! Wire model shared by the host and renderer sides of the JavaScript bridge.

pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod messages;
pub mod node;
pub mod serialization;
pub mod value;

pub use channel::{ProcessId, ProcessMessageSender};
pub use dispatcher::{MessageDispatcher, MessageHandler, MessageReceived};
pub use error::{BridgeError, ErrorCode};
pub use ids::{CallId, CallIdAllocator, TaskId, TaskIdAllocator};
pub use messages::{
    BridgeMessage, CallArguments, JsContextCreated, JsContextReleased, JsEvaluationRequest,
    JsEvaluationResult, JsStackFrame, JsUncaughtException, NativeObjectCallRequest,
    NativeObjectCallResult, NativeObjectRegistrationRequest, NativeObjectUnregistrationRequest,
    ProcessMessage, UnhandledException,
};
pub use node::{from_node, to_node, FromArg, IntoNode, Json, ListRef, MapRef, MethodReturn, Node, Params};
pub use serialization::{
    deserialize, deserialize_as, deserialize_carrier, deserialize_carrier_list,
    deserialize_parameters, deserialize_typed, node_to_value, serialize, serialize_to_carrier,
    serialize_typed, serialize_with, value_to_node, ParametersTypes, ReferenceHandling,
    SerializerOptions, TypeHint, MAX_DEPTH,
};
pub use value::{DictionaryValue, ListValue, Value, ValueCarrier, ValueHolder, ValueType};
