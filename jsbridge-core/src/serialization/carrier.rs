use super::{deserialize, serialize};
use crate::error::BridgeError;
use crate::node::{ListRef, MapRef, Node};
use crate::value::{ListValue, Value, ValueCarrier, ValueHolder};

const MAX_SAFE_INTEGER: u64 = 1 << 53;

/// Stores `node` in `carrier`. Null, bool and numbers that a double holds
/// exactly are set directly; everything else is written as wire JSON into
/// the string slot. Binary is never stored with the binary tag here.
pub fn serialize_to_carrier(node: &Node, carrier: &mut dyn ValueCarrier) -> Result<(), BridgeError> {
    match node {
        Node::Null => carrier.set_null(),
        Node::Bool(b) => carrier.set_bool(*b),
        Node::Int(i) => match i32::try_from(*i) {
            Ok(small) => carrier.set_int(small),
            Err(_) if i.unsigned_abs() <= MAX_SAFE_INTEGER => carrier.set_double(*i as f64),
            Err(_) => carrier.set_string(&serialize(node)?),
        },
        Node::Double(d) => carrier.set_double(*d),
        _ => carrier.set_string(&serialize(node)?),
    }
}

pub fn node_to_value(node: &Node) -> Result<Value, BridgeError> {
    let mut holder = ValueHolder::new();
    serialize_to_carrier(node, &mut holder)?;
    Ok(holder.into_value())
}

/// Inverse of [`serialize_to_carrier`]. String slots hold wire JSON.
pub fn deserialize_carrier(carrier: &dyn ValueCarrier) -> Result<Node, BridgeError> {
    match carrier.value() {
        Some(value) => value_to_node(value),
        None => Ok(Node::Null),
    }
}

pub fn value_to_node(value: &Value) -> Result<Node, BridgeError> {
    Ok(match value {
        Value::Null => Node::Null,
        Value::Bool(b) => Node::Bool(*b),
        Value::Int(i) => Node::Int(i64::from(*i)),
        Value::Double(d) => Node::Double(*d),
        Value::String(s) => deserialize(s)?,
        Value::Binary(b) => Node::Binary(b.clone()),
        Value::List(list) => Node::List(ListRef::from_vec(deserialize_carrier_list(list)?)),
        Value::Dictionary(dict) => {
            let map = MapRef::new();
            for (key, item) in dict.iter() {
                map.insert(key.clone(), value_to_node(item)?);
            }
            Node::Map(map)
        }
    })
}

pub fn deserialize_carrier_list(list: &ListValue) -> Result<Vec<Node>, BridgeError> {
    list.iter().map(value_to_node).collect()
}
