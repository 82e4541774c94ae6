//! Dynamic object graph produced by the deserializer and consumed by the
//! serializer.
//!
//! Lists and maps are shared handles: cloning a [`ListRef`] clones the
//! handle, not the contents, so two fields can point at the same instance
//! and a list can contain itself. Graphs with cycles keep themselves alive
//! until the owner breaks the cycle.

use crate::error::BridgeError;
use crate::serialization::TypeHint;
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Clone, Default)]
pub enum Node {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Date(DateTime<Utc>),
    Binary(Bytes),
    List(ListRef),
    Map(MapRef),
}

#[derive(Clone, Default)]
pub struct ListRef(Arc<RwLock<Vec<Node>>>);

#[derive(Clone, Default)]
pub struct MapRef(Arc<RwLock<IndexMap<String, Node>>>);

impl ListRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Node>) -> Self {
        ListRef(Arc::new(RwLock::new(items)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<Node>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<Node>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Node> {
        self.read().get(index).cloned()
    }

    pub fn push(&self, node: Node) {
        self.write().push(node);
    }

    /// Copy of the element handles. Nested lists and maps stay shared.
    pub fn snapshot(&self) -> Vec<Node> {
        self.read().clone()
    }

    pub fn ptr_eq(&self, other: &ListRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl MapRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(entries: IndexMap<String, Node>) -> Self {
        MapRef(Arc::new(RwLock::new(entries)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, Node>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, Node>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Node> {
        self.read().get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, node: Node) {
        self.write().insert(key.into(), node);
    }

    pub fn snapshot(&self) -> Vec<(String, Node)> {
        self.read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn ptr_eq(&self, other: &MapRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl Node {
    pub fn list(items: Vec<Node>) -> Node {
        Node::List(ListRef::from_vec(items))
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Node)>) -> Node {
        Node::Map(MapRef::from_map(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Bool(_) => "bool",
            Node::Int(_) => "integer",
            Node::Double(_) => "double",
            Node::String(_) => "string",
            Node::Date(_) => "date",
            Node::Binary(_) => "binary",
            Node::List(_) => "list",
            Node::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Node::Int(i) => Some(*i),
            Node::Double(d) if d.fract() == 0.0 && d.abs() < 9.2e18 => Some(*d as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Int(i) => Some(*i as f64),
            Node::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Node::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Node::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Converts to a plain JSON tree for typed decoding. Dates become
    /// RFC 3339 strings and binary becomes an array of bytes. Fails on cycles.
    pub fn to_json(&self) -> Result<serde_json::Value, BridgeError> {
        let mut ancestors = Vec::new();
        to_json_inner(self, &mut ancestors)
    }

    pub fn from_json(value: serde_json::Value) -> Node {
        match value {
            serde_json::Value::Null => Node::Null,
            serde_json::Value::Bool(b) => Node::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Node::Int(i),
                None => Node::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Node::String(s),
            serde_json::Value::Array(items) => {
                Node::list(items.into_iter().map(Node::from_json).collect())
            }
            serde_json::Value::Object(entries) => {
                Node::map(entries.into_iter().map(|(k, v)| (k, Node::from_json(v))))
            }
        }
    }
}

fn to_json_inner(node: &Node, ancestors: &mut Vec<usize>) -> Result<serde_json::Value, BridgeError> {
    Ok(match node {
        Node::Null => serde_json::Value::Null,
        Node::Bool(b) => serde_json::Value::Bool(*b),
        Node::Int(i) => serde_json::Value::from(*i),
        Node::Double(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .ok_or_else(|| BridgeError::invalid_operation(format!("{} is not a finite number", d)))?,
        Node::String(s) => serde_json::Value::String(s.clone()),
        Node::Date(d) => serde_json::Value::String(d.to_rfc3339()),
        Node::Binary(b) => serde_json::Value::Array(b.iter().map(|x| serde_json::Value::from(*x)).collect()),
        Node::List(list) => {
            let id = list.identity();
            if ancestors.contains(&id) {
                return Err(BridgeError::cycle("A possible object cycle was detected"));
            }
            ancestors.push(id);
            let items = list
                .snapshot()
                .iter()
                .map(|item| to_json_inner(item, ancestors))
                .collect::<Result<Vec<_>, _>>()?;
            ancestors.pop();
            serde_json::Value::Array(items)
        }
        Node::Map(map) => {
            let id = map.identity();
            if ancestors.contains(&id) {
                return Err(BridgeError::cycle("A possible object cycle was detected"));
            }
            ancestors.push(id);
            let mut entries = serde_json::Map::new();
            for (key, value) in map.snapshot() {
                entries.insert(key, to_json_inner(&value, ancestors)?);
            }
            ancestors.pop();
            serde_json::Value::Object(entries)
        }
    })
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        let mut in_progress = HashSet::new();
        nodes_equal(self, other, &mut in_progress)
    }
}

// Pairs of containers already being compared are assumed equal, which lets
// two isomorphic cycles compare equal instead of recursing forever.
fn nodes_equal(a: &Node, b: &Node, in_progress: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Node::Null, Node::Null) => true,
        (Node::Bool(x), Node::Bool(y)) => x == y,
        (Node::Int(x), Node::Int(y)) => x == y,
        (Node::Double(x), Node::Double(y)) => x == y,
        (Node::String(x), Node::String(y)) => x == y,
        (Node::Date(x), Node::Date(y)) => x == y,
        (Node::Binary(x), Node::Binary(y)) => x == y,
        (Node::List(x), Node::List(y)) => {
            if x.ptr_eq(y) || !in_progress.insert((x.identity(), y.identity())) {
                return true;
            }
            let (left, right) = (x.snapshot(), y.snapshot());
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right.iter())
                    .all(|(l, r)| nodes_equal(l, r, in_progress))
        }
        (Node::Map(x), Node::Map(y)) => {
            if x.ptr_eq(y) || !in_progress.insert((x.identity(), y.identity())) {
                return true;
            }
            let (left, right) = (x.snapshot(), y.snapshot());
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right.iter())
                    .all(|((lk, lv), (rk, rv))| lk == rk && nodes_equal(lv, rv, in_progress))
        }
        _ => false,
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        let mut ancestors = Vec::new();
        render(self, &mut ancestors, &mut out);
        f.write_str(&out)
    }
}

impl fmt::Debug for ListRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Node::List(self.clone()), f)
    }
}

impl fmt::Debug for MapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Node::Map(self.clone()), f)
    }
}

fn render(node: &Node, ancestors: &mut Vec<usize>, out: &mut String) {
    match node {
        Node::Null => out.push_str("null"),
        Node::Bool(b) => out.push_str(&b.to_string()),
        Node::Int(i) => out.push_str(&i.to_string()),
        Node::Double(d) => out.push_str(&format!("{:?}", d)),
        Node::String(s) => out.push_str(&format!("{:?}", s)),
        Node::Date(d) => out.push_str(&format!("Date({})", d.to_rfc3339())),
        Node::Binary(b) => out.push_str(&format!("Binary({} bytes)", b.len())),
        Node::List(list) => {
            let id = list.identity();
            if ancestors.contains(&id) {
                out.push_str("<cycle>");
                return;
            }
            ancestors.push(id);
            out.push('[');
            for (i, item) in list.snapshot().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render(item, ancestors, out);
            }
            out.push(']');
            ancestors.pop();
        }
        Node::Map(map) => {
            let id = map.identity();
            if ancestors.contains(&id) {
                out.push_str("<cycle>");
                return;
            }
            ancestors.push(id);
            out.push('{');
            for (i, (key, value)) in map.snapshot().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&format!("{:?}: ", key));
                render(value, ancestors, out);
            }
            out.push('}');
            ancestors.pop();
        }
    }
}

/// Native value to graph node.
pub trait IntoNode {
    fn into_node(self) -> Node;
}

impl IntoNode for Node {
    fn into_node(self) -> Node {
        self
    }
}

impl IntoNode for () {
    fn into_node(self) -> Node {
        Node::Null
    }
}

impl IntoNode for bool {
    fn into_node(self) -> Node {
        Node::Bool(self)
    }
}

macro_rules! int_into_node {
    ($($t:ty),*) => {
        $(impl IntoNode for $t {
            fn into_node(self) -> Node {
                Node::Int(i64::from(self))
            }
        })*
    };
}

int_into_node!(i8, i16, i32, i64, u8, u16, u32);

impl IntoNode for u64 {
    fn into_node(self) -> Node {
        match i64::try_from(self) {
            Ok(i) => Node::Int(i),
            Err(_) => Node::Double(self as f64),
        }
    }
}

impl IntoNode for f32 {
    fn into_node(self) -> Node {
        Node::Double(f64::from(self))
    }
}

impl IntoNode for f64 {
    fn into_node(self) -> Node {
        Node::Double(self)
    }
}

impl IntoNode for char {
    fn into_node(self) -> Node {
        Node::String(self.to_string())
    }
}

impl IntoNode for String {
    fn into_node(self) -> Node {
        Node::String(self)
    }
}

impl IntoNode for &str {
    fn into_node(self) -> Node {
        Node::String(self.to_owned())
    }
}

impl IntoNode for DateTime<Utc> {
    fn into_node(self) -> Node {
        Node::Date(self)
    }
}

impl IntoNode for Bytes {
    fn into_node(self) -> Node {
        Node::Binary(self)
    }
}

impl IntoNode for ListRef {
    fn into_node(self) -> Node {
        Node::List(self)
    }
}

impl IntoNode for MapRef {
    fn into_node(self) -> Node {
        Node::Map(self)
    }
}

impl<T: IntoNode> IntoNode for Option<T> {
    fn into_node(self) -> Node {
        self.map_or(Node::Null, IntoNode::into_node)
    }
}

impl<T: IntoNode> IntoNode for Vec<T> {
    fn into_node(self) -> Node {
        Node::list(self.into_iter().map(IntoNode::into_node).collect())
    }
}

impl<T: IntoNode> IntoNode for IndexMap<String, T> {
    fn into_node(self) -> Node {
        Node::map(self.into_iter().map(|(k, v)| (k, v.into_node())))
    }
}

impl<T: IntoNode> IntoNode for HashMap<String, T> {
    fn into_node(self) -> Node {
        Node::map(self.into_iter().map(|(k, v)| (k, v.into_node())))
    }
}

/// Graph node to native argument.
///
/// `hint()` tells the deserializer how to read JSON scalars for this
/// parameter, so numbers and strings are coerced while parsing.
pub trait FromArg: Sized {
    /// True only for [`Params`], which absorbs every remaining argument.
    const VARIADIC: bool = false;

    fn hint() -> TypeHint;

    fn from_arg(node: Node) -> Result<Self, BridgeError>;
}

fn mismatch(expected: &str, node: &Node) -> BridgeError {
    BridgeError::invalid_argument(format!(
        "Cannot convert {} to {}",
        node.type_name(),
        expected
    ))
}

impl FromArg for Node {
    fn hint() -> TypeHint {
        TypeHint::Any
    }

    fn from_arg(node: Node) -> Result<Self, BridgeError> {
        Ok(node)
    }
}

impl FromArg for bool {
    fn hint() -> TypeHint {
        TypeHint::Bool
    }

    fn from_arg(node: Node) -> Result<Self, BridgeError> {
        node.as_bool().ok_or_else(|| mismatch("bool", &node))
    }
}

macro_rules! int_from_arg {
    ($($t:ty),*) => {
        $(impl FromArg for $t {
            fn hint() -> TypeHint {
                TypeHint::Integer
            }

            fn from_arg(node: Node) -> Result<Self, BridgeError> {
                node.as_i64()
                    .and_then(|i| <$t>::try_from(i).ok())
                    .ok_or_else(|| mismatch(stringify!($t), &node))
            }
        })*
    };
}

int_from_arg!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromArg for f64 {
    fn hint() -> TypeHint {
        TypeHint::Float
    }

    fn from_arg(node: Node) -> Result<Self, BridgeError> {
        node.as_f64().ok_or_else(|| mismatch("f64", &node))
    }
}

impl FromArg for f32 {
    fn hint() -> TypeHint {
        TypeHint::Float
    }

    fn from_arg(node: Node) -> Result<Self, BridgeError> {
        node.as_f64()
            .map(|d| d as f32)
            .ok_or_else(|| mismatch("f32", &node))
    }
}

impl FromArg for String {
    fn hint() -> TypeHint {
        TypeHint::String
    }

    fn from_arg(node: Node) -> Result<Self, BridgeError> {
        match node {
            Node::String(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl FromArg for DateTime<Utc> {
    fn hint() -> TypeHint {
        TypeHint::Date
    }

    fn from_arg(node: Node) -> Result<Self, BridgeError> {
        match node {
            Node::Date(d) => Ok(d),
            other => Err(mismatch("date", &other)),
        }
    }
}

impl FromArg for Bytes {
    fn hint() -> TypeHint {
        TypeHint::Binary
    }

    fn from_arg(node: Node) -> Result<Self, BridgeError> {
        match node {
            Node::Binary(b) => Ok(b),
            Node::String(s) => Ok(Bytes::from(general_purpose::STANDARD.decode(s)?)),
            other => Err(mismatch("binary", &other)),
        }
    }
}

impl FromArg for ListRef {
    fn hint() -> TypeHint {
        TypeHint::List(Box::new(TypeHint::Any))
    }

    fn from_arg(node: Node) -> Result<Self, BridgeError> {
        match node {
            Node::List(l) => Ok(l),
            other => Err(mismatch("list", &other)),
        }
    }
}

impl FromArg for MapRef {
    fn hint() -> TypeHint {
        TypeHint::Map(Box::new(TypeHint::Any))
    }

    fn from_arg(node: Node) -> Result<Self, BridgeError> {
        match node {
            Node::Map(m) => Ok(m),
            other => Err(mismatch("map", &other)),
        }
    }
}

impl<T: FromArg> FromArg for Option<T> {
    fn hint() -> TypeHint {
        T::hint()
    }

    fn from_arg(node: Node) -> Result<Self, BridgeError> {
        match node {
            Node::Null => Ok(None),
            other => T::from_arg(other).map(Some),
        }
    }
}

impl<T: FromArg> FromArg for Vec<T> {
    fn hint() -> TypeHint {
        TypeHint::List(Box::new(T::hint()))
    }

    fn from_arg(node: Node) -> Result<Self, BridgeError> {
        match node {
            Node::List(list) => list.snapshot().into_iter().map(T::from_arg).collect(),
            other => Err(mismatch("list", &other)),
        }
    }
}

impl<T: FromArg> FromArg for IndexMap<String, T> {
    fn hint() -> TypeHint {
        TypeHint::Map(Box::new(T::hint()))
    }

    fn from_arg(node: Node) -> Result<Self, BridgeError> {
        match node {
            Node::Map(map) => map
                .snapshot()
                .into_iter()
                .map(|(k, v)| T::from_arg(v).map(|v| (k, v)))
                .collect(),
            other => Err(mismatch("map", &other)),
        }
    }
}

/// Trailing variadic parameter. Collects every argument past the mandatory
/// ones; empty when there are none.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params<T>(pub Vec<T>);

impl<T> Params<T> {
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: FromArg> FromArg for Params<T> {
    const VARIADIC: bool = true;

    fn hint() -> TypeHint {
        T::hint()
    }

    fn from_arg(node: Node) -> Result<Self, BridgeError> {
        match node {
            Node::List(list) => list
                .snapshot()
                .into_iter()
                .map(T::from_arg)
                .collect::<Result<Vec<_>, _>>()
                .map(Params),
            Node::Null => Ok(Params(Vec::new())),
            other => Err(mismatch("argument list", &other)),
        }
    }
}

/// Adapter for any serde type, decoded from or encoded to a plain JSON tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: DeserializeOwned> FromArg for Json<T> {
    fn hint() -> TypeHint {
        TypeHint::Any
    }

    fn from_arg(node: Node) -> Result<Self, BridgeError> {
        let json = node.to_json()?;
        serde_json::from_value(json)
            .map(Json)
            .map_err(|e| BridgeError::invalid_argument(e.to_string()))
    }
}

pub fn to_node<T: Serialize + ?Sized>(value: &T) -> Result<Node, BridgeError> {
    Ok(Node::from_json(serde_json::to_value(value)?))
}

pub fn from_node<T: DeserializeOwned>(node: &Node) -> Result<T, BridgeError> {
    Ok(serde_json::from_value(node.to_json()?)?)
}

/// Normalizes whatever a bound method returns into a node or a carried
/// exception.
pub trait MethodReturn {
    fn into_result(self) -> Result<Node, BridgeError>;
}

macro_rules! method_return_via_into_node {
    ($($t:ty),*) => {
        $(impl MethodReturn for $t {
            fn into_result(self) -> Result<Node, BridgeError> {
                Ok(self.into_node())
            }
        })*
    };
}

method_return_via_into_node!(
    (), bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, char, String, &'static str,
    DateTime<Utc>, Bytes, Node, ListRef, MapRef
);

impl<T: IntoNode> MethodReturn for Vec<T> {
    fn into_result(self) -> Result<Node, BridgeError> {
        Ok(self.into_node())
    }
}

impl<T: IntoNode> MethodReturn for Option<T> {
    fn into_result(self) -> Result<Node, BridgeError> {
        Ok(self.into_node())
    }
}

impl<T: IntoNode> MethodReturn for IndexMap<String, T> {
    fn into_result(self) -> Result<Node, BridgeError> {
        Ok(self.into_node())
    }
}

impl<T: Serialize> MethodReturn for Json<T> {
    fn into_result(self) -> Result<Node, BridgeError> {
        to_node(&self.0)
    }
}

impl<T: MethodReturn, E: fmt::Display> MethodReturn for Result<T, E> {
    fn into_result(self) -> Result<Node, BridgeError> {
        match self {
            Ok(value) => value.into_result(),
            Err(e) => Err(BridgeError::exception(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_list_handles_share_identity() {
        let list = ListRef::new();
        let alias = list.clone();
        alias.push(Node::Int(1));
        assert!(list.ptr_eq(&alias));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_self_referencing_list_debug_and_eq() {
        let list = ListRef::new();
        list.push(Node::Int(1));
        list.push(Node::List(list.clone()));

        let rendered = format!("{:?}", Node::List(list.clone()));
        assert_eq!(rendered, "[1, <cycle>]");

        let other = ListRef::new();
        other.push(Node::Int(1));
        other.push(Node::List(other.clone()));
        assert_eq!(Node::List(list.clone()), Node::List(other.clone()));

        // break the cycles so the test does not leak
        list.write().clear();
        other.write().clear();
    }

    #[test]
    fn test_structural_inequality() {
        assert_ne!(Node::list(vec![Node::Int(1)]), Node::list(vec![Node::Int(2)]));
        assert_ne!(Node::Int(1), Node::Double(1.0));
        assert_ne!(
            Node::map([("a", Node::Null)]),
            Node::map([("b", Node::Null)])
        );
    }

    #[test]
    fn test_to_json_rejects_cycles() {
        let map = MapRef::new();
        map.insert("self", Node::Map(map.clone()));
        let err = Node::Map(map.clone()).to_json().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Cycle);
        map.write().clear();
    }

    #[test]
    fn test_from_arg_integer_coercion() {
        assert_eq!(i32::from_arg(Node::Int(5)).unwrap(), 5);
        assert_eq!(i32::from_arg(Node::Double(5.0)).unwrap(), 5);
        assert!(i32::from_arg(Node::Double(5.5)).is_err());
        assert!(i32::from_arg(Node::Int(i64::MAX)).is_err());
        assert!(u8::from_arg(Node::Int(-1)).is_err());
        assert_eq!(f64::from_arg(Node::Int(2)).unwrap(), 2.0);
    }

    #[test]
    fn test_from_arg_option_and_vec() {
        assert_eq!(Option::<String>::from_arg(Node::Null).unwrap(), None);
        assert_eq!(
            Vec::<i32>::from_arg(Node::list(vec![Node::Int(1), Node::Int(2)])).unwrap(),
            vec![1, 2]
        );
        let err = String::from_arg(Node::Int(1)).unwrap_err();
        assert_eq!(err.message, "Cannot convert integer to string");
    }

    #[test]
    fn test_params_empty_list() {
        let params = Params::<i32>::from_arg(Node::list(vec![])).unwrap();
        assert!(params.is_empty());
        assert!(<Params<i32> as FromArg>::VARIADIC);
        assert!(!<i32 as FromArg>::VARIADIC);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_json_adapter_both_ways() {
        let node = Json(Point { x: 1, y: 2 }).into_result().unwrap();
        assert_eq!(node, Node::map([("x", Node::Int(1)), ("y", Node::Int(2))]));

        let Json(point) = Json::<Point>::from_arg(node).unwrap();
        assert_eq!(point, Point { x: 1, y: 2 });
    }

    #[test]
    fn test_result_error_becomes_exception() {
        let result: Result<i32, String> = Err("boom".into());
        let err = result.into_result().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Exception);
        assert_eq!(err.message, "boom");
    }
}
