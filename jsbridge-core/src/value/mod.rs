//! Transport-native value containers.
//!
//! [`Value`] is the tagged union carried by every process message. Lists and
//! dictionaries can be flagged read only; inbound message arguments are
//! always read only so handlers cannot mutate what the transport delivered.

mod carrier;

pub use carrier::{DictionarySlot, ListSlot, ValueCarrier, ValueHolder};

use crate::error::BridgeError;
use bytes::Bytes;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Null,
    Bool,
    Int,
    Double,
    String,
    Binary,
    List,
    Dictionary,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Double(f64),
    String(String),
    Binary(#[serde(with = "base64_bytes")] Bytes),
    List(ListValue),
    Dictionary(DictionaryValue),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Binary(_) => ValueType::Binary,
            Value::List(_) => ValueType::List,
            Value::Dictionary(_) => ValueType::Dictionary,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    // The accessors below return a zero value on a tag mismatch. The result
    // is defined but meaningless; check `value_type()` first.

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            _ => false,
        }
    }

    pub fn as_int(&self) -> i32 {
        match self {
            Value::Int(i) => *i,
            _ => 0,
        }
    }

    pub fn as_double(&self) -> f64 {
        match self {
            Value::Double(d) => *d,
            _ => 0.0,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Value::String(s) => s,
            _ => "",
        }
    }

    pub fn as_binary(&self) -> Bytes {
        match self {
            Value::Binary(b) => b.clone(),
            _ => Bytes::new(),
        }
    }

    pub fn as_list(&self) -> Option<&ListValue> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&DictionaryValue> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    fn make_read_only(&mut self) {
        match self {
            Value::List(l) => l.make_read_only(),
            Value::Dictionary(d) => d.make_read_only(),
            _ => {}
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Binary(b)
    }
}

impl From<ListValue> for Value {
    fn from(l: ListValue) -> Self {
        Value::List(l)
    }
}

impl From<DictionaryValue> for Value {
    fn from(d: DictionaryValue) -> Self {
        Value::Dictionary(d)
    }
}

/// Ordered list container. Setting past the end grows the list with nulls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListValue {
    items: Vec<Value>,
    #[serde(skip)]
    read_only: bool,
}

impl PartialEq for ListValue {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl ListValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(items: Vec<Value>) -> Self {
        ListValue {
            items,
            read_only: false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Flags this list and every nested container as read only.
    pub fn make_read_only(&mut self) {
        self.read_only = true;
        for item in &mut self.items {
            item.make_read_only();
        }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn value_type(&self, index: usize) -> ValueType {
        self.get(index).map_or(ValueType::Null, Value::value_type)
    }

    pub fn set(&mut self, index: usize, value: Value) -> Result<(), BridgeError> {
        if self.read_only {
            return Err(BridgeError::read_only());
        }
        if index >= self.items.len() {
            self.items.resize(index + 1, Value::Null);
        }
        self.items[index] = value;
        Ok(())
    }

    pub fn push(&mut self, value: Value) -> Result<(), BridgeError> {
        if self.read_only {
            return Err(BridgeError::read_only());
        }
        self.items.push(value);
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.items
    }

    /// Carrier writing straight into `index` of this list.
    pub fn slot(&mut self, index: usize) -> ListSlot<'_> {
        ListSlot::new(self, index)
    }

    pub fn get_bool(&self, index: usize) -> bool {
        self.get(index).is_some_and(Value::as_bool)
    }

    pub fn get_int(&self, index: usize) -> i32 {
        self.get(index).map_or(0, Value::as_int)
    }

    pub fn get_double(&self, index: usize) -> f64 {
        self.get(index).map_or(0.0, Value::as_double)
    }

    pub fn get_string(&self, index: usize) -> String {
        self.get(index).map(Value::as_str).unwrap_or_default().to_owned()
    }

    pub fn get_list(&self, index: usize) -> ListValue {
        self.get(index)
            .and_then(Value::as_list)
            .cloned()
            .unwrap_or_default()
    }

    /// Writes `None` as Null and `Some("")` as an empty string.
    pub fn set_nullable_string(&mut self, index: usize, value: Option<&str>) -> Result<(), BridgeError> {
        match value {
            Some(s) => self.set(index, Value::String(s.to_owned())),
            None => self.set(index, Value::Null),
        }
    }

    /// Null reads back as `None`; an empty string stays `Some("")`.
    pub fn get_nullable_string(&self, index: usize) -> Option<String> {
        match self.get(index) {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// Empty or absent payloads are written as Null.
    pub fn set_nullable_binary(&mut self, index: usize, value: Option<&[u8]>) -> Result<(), BridgeError> {
        match value {
            Some(b) if !b.is_empty() => self.set(index, Value::Binary(Bytes::copy_from_slice(b))),
            _ => self.set(index, Value::Null),
        }
    }

    /// Null reads back as an empty payload.
    pub fn get_nullable_binary(&self, index: usize) -> Bytes {
        match self.get(index) {
            Some(Value::Binary(b)) => b.clone(),
            _ => Bytes::new(),
        }
    }
}

impl From<Vec<Value>> for ListValue {
    fn from(items: Vec<Value>) -> Self {
        ListValue::from_values(items)
    }
}

impl<'a> IntoIterator for &'a ListValue {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// String-keyed container preserving insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DictionaryValue {
    entries: IndexMap<String, Value>,
    #[serde(skip)]
    read_only: bool,
}

impl PartialEq for DictionaryValue {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl DictionaryValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn make_read_only(&mut self) {
        self.read_only = true;
        for value in self.entries.values_mut() {
            value.make_read_only();
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Result<(), BridgeError> {
        if self.read_only {
            return Err(BridgeError::read_only());
        }
        self.entries.insert(key.into(), value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, BridgeError> {
        if self.read_only {
            return Err(BridgeError::read_only());
        }
        Ok(self.entries.shift_remove(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    pub fn slot(&mut self, key: impl Into<String>) -> DictionarySlot<'_> {
        DictionarySlot::new(self, key.into())
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
