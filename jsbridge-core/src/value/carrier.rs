use super::{DictionaryValue, ListValue, Value, ValueType};
use crate::error::BridgeError;
use bytes::Bytes;

/// One writable value position.
///
/// Every setter replaces both the tag and the payload. Setters fail with
/// `InvalidOperation("read only")` when the backing container is read only.
/// Getters on a mismatched tag return a zero value.
pub trait ValueCarrier {
    fn value(&self) -> Option<&Value>;

    fn store(&mut self, value: Value) -> Result<(), BridgeError>;

    fn value_type(&self) -> ValueType {
        self.value().map_or(ValueType::Null, Value::value_type)
    }

    fn set_null(&mut self) -> Result<(), BridgeError> {
        self.store(Value::Null)
    }

    fn set_bool(&mut self, value: bool) -> Result<(), BridgeError> {
        self.store(Value::Bool(value))
    }

    fn set_int(&mut self, value: i32) -> Result<(), BridgeError> {
        self.store(Value::Int(value))
    }

    fn set_double(&mut self, value: f64) -> Result<(), BridgeError> {
        self.store(Value::Double(value))
    }

    fn set_string(&mut self, value: &str) -> Result<(), BridgeError> {
        self.store(Value::String(value.to_owned()))
    }

    fn set_binary(&mut self, value: Bytes) -> Result<(), BridgeError> {
        self.store(Value::Binary(value))
    }

    fn set_list(&mut self, value: ListValue) -> Result<(), BridgeError> {
        self.store(Value::List(value))
    }

    fn set_dictionary(&mut self, value: DictionaryValue) -> Result<(), BridgeError> {
        self.store(Value::Dictionary(value))
    }

    fn get_bool(&self) -> bool {
        self.value().is_some_and(Value::as_bool)
    }

    fn get_int(&self) -> i32 {
        self.value().map_or(0, Value::as_int)
    }

    fn get_double(&self) -> f64 {
        self.value().map_or(0.0, Value::as_double)
    }

    fn get_string(&self) -> String {
        self.value().map(Value::as_str).unwrap_or_default().to_owned()
    }

    fn get_binary(&self) -> Bytes {
        self.value().map(Value::as_binary).unwrap_or_default()
    }

    fn get_list(&self) -> ListValue {
        self.value().and_then(Value::as_list).cloned().unwrap_or_default()
    }

    fn get_dictionary(&self) -> DictionaryValue {
        self.value()
            .and_then(Value::as_dictionary)
            .cloned()
            .unwrap_or_default()
    }
}

/// Carrier writing into one index of a list.
#[derive(Debug)]
pub struct ListSlot<'a> {
    list: &'a mut ListValue,
    index: usize,
}

impl<'a> ListSlot<'a> {
    pub fn new(list: &'a mut ListValue, index: usize) -> Self {
        ListSlot { list, index }
    }
}

impl ValueCarrier for ListSlot<'_> {
    fn value(&self) -> Option<&Value> {
        self.list.get(self.index)
    }

    fn store(&mut self, value: Value) -> Result<(), BridgeError> {
        self.list.set(self.index, value)
    }
}

/// Carrier writing into one key of a dictionary.
#[derive(Debug)]
pub struct DictionarySlot<'a> {
    dictionary: &'a mut DictionaryValue,
    key: String,
}

impl<'a> DictionarySlot<'a> {
    pub fn new(dictionary: &'a mut DictionaryValue, key: String) -> Self {
        DictionarySlot { dictionary, key }
    }
}

impl ValueCarrier for DictionarySlot<'_> {
    fn value(&self) -> Option<&Value> {
        self.dictionary.get(&self.key)
    }

    fn store(&mut self, value: Value) -> Result<(), BridgeError> {
        self.dictionary.set(self.key.clone(), value)
    }
}

/// Free-standing carrier for a value built before its destination is known.
///
/// The transfer methods consume the holder: after the payload has moved into
/// a container there is no handle left that could reach it.
#[derive(Debug, Default)]
pub struct ValueHolder {
    value: Value,
}

impl ValueHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Moves the payload into `list[index]`. On error the payload is dropped.
    pub fn assign_to_list_and_clear_reference(
        self,
        list: &mut ListValue,
        index: usize,
    ) -> Result<(), BridgeError> {
        list.set(index, self.value)
    }

    pub fn assign_to_dictionary_and_clear_reference(
        self,
        dictionary: &mut DictionaryValue,
        key: impl Into<String>,
    ) -> Result<(), BridgeError> {
        dictionary.set(key, self.value)
    }
}

impl From<Value> for ValueHolder {
    fn from(value: Value) -> Self {
        ValueHolder { value }
    }
}

impl ValueCarrier for ValueHolder {
    fn value(&self) -> Option<&Value> {
        Some(&self.value)
    }

    fn store(&mut self, value: Value) -> Result<(), BridgeError> {
        self.value = value;
        Ok(())
    }
}
