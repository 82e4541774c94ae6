use super::reader::{Token, Tokenizer};
use super::{
    is_reserved_property, BINARY_MARKER, DATE_MARKER, ID_PROPERTY, MAX_DEPTH, REF_PROPERTY,
    STRING_MARKER, VALUES_PROPERTY,
};
use crate::error::BridgeError;
use crate::node::{from_node, ListRef, MapRef, Node};
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Static type expected at a position of the document. Drives how JSON
/// numbers and unmarked strings are read.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TypeHint {
    #[default]
    Any,
    Bool,
    Integer,
    Float,
    String,
    Date,
    Binary,
    List(Box<TypeHint>),
    Map(Box<TypeHint>),
}

impl TypeHint {
    fn element(&self) -> TypeHint {
        match self {
            TypeHint::List(inner) | TypeHint::Map(inner) => (**inner).clone(),
            _ => TypeHint::Any,
        }
    }
}

/// Signature used to read a top-level argument array.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParametersTypes {
    pub mandatory: Vec<TypeHint>,
    /// Element type of the trailing variadic parameter, if any.
    pub optional: Option<TypeHint>,
}

impl ParametersTypes {
    fn hint_at(&self, index: usize) -> TypeHint {
        match self.mandatory.get(index) {
            Some(hint) => hint.clone(),
            None => self.optional.clone().unwrap_or_default(),
        }
    }
}

pub fn deserialize(wire: &str) -> Result<Node, BridgeError> {
    deserialize_as(wire, &TypeHint::Any)
}

pub fn deserialize_as(wire: &str, hint: &TypeHint) -> Result<Node, BridgeError> {
    let mut state = DeserializerState::new(Frame::Root {
        hint: hint.clone(),
        value: None,
    });
    state.run(wire)?;
    match state.finish()? {
        Frame::Root { value: Some(v), .. } => Ok(v),
        _ => Err(BridgeError::invalid_operation("Invalid json format - no value")),
    }
}

/// Reads an argument array. Each element is coerced to its positional type.
/// With a variadic parameter, the result always ends with a list holding
/// the remaining arguments (possibly empty). When fewer arguments than
/// mandatory parameters were supplied, only the supplied ones are returned
/// so the caller can report the mismatch. Surplus arguments of a method
/// without a variadic parameter are dropped.
pub fn deserialize_parameters(wire: &str, types: &ParametersTypes) -> Result<Vec<Node>, BridgeError> {
    let mut state = DeserializerState::new(Frame::Parameters {
        types: types.clone(),
        values: Vec::new(),
        started: false,
        closed: false,
    });
    state.run(wire)?;
    match state.finish()? {
        Frame::Parameters {
            mut values,
            closed: true,
            ..
        } => {
            let mandatory = types.mandatory.len();
            if values.len() < mandatory {
                return Ok(values);
            }
            let rest = values.split_off(mandatory);
            if types.optional.is_some() {
                values.push(Node::List(ListRef::from_vec(rest)));
            }
            Ok(values)
        }
        _ => Err(BridgeError::invalid_operation(
            "Invalid json format - arguments must be an array",
        )),
    }
}

pub fn deserialize_typed<T: DeserializeOwned>(wire: &str) -> Result<T, BridgeError> {
    from_node(&deserialize(wire)?)
}

enum Frame {
    Root {
        hint: TypeHint,
        value: Option<Node>,
    },
    Parameters {
        types: ParametersTypes,
        values: Vec<Node>,
        started: bool,
        closed: bool,
    },
    List {
        list: ListRef,
        hint: TypeHint,
        /// Opened through `{"$id":..,"$values":[`; owes one extra `}`.
        wrapped: bool,
    },
    Map {
        map: MapRef,
        hint: TypeHint,
        property: Option<String>,
    },
}

impl Frame {
    /// Type expected for the next child value.
    fn child_hint(&self) -> TypeHint {
        match self {
            Frame::Root { hint, .. } => hint.clone(),
            Frame::Parameters { types, values, .. } => types.hint_at(values.len()),
            Frame::List { hint, .. } | Frame::Map { hint, .. } => hint.clone(),
        }
    }

    fn accept(&mut self, node: Node) -> Result<(), BridgeError> {
        match self {
            Frame::Root { value, .. } => {
                if value.is_some() {
                    return Err(BridgeError::invalid_operation(
                        "Invalid json format - unexpected data after the root value",
                    ));
                }
                *value = Some(node);
            }
            Frame::Parameters { values, started, closed, .. } => {
                if !*started || *closed {
                    return Err(BridgeError::invalid_operation(
                        "Invalid json format - arguments must be an array",
                    ));
                }
                values.push(node);
            }
            Frame::List { list, .. } => list.push(node),
            Frame::Map { map, property, .. } => match property.take() {
                Some(key) => map.insert(key, node),
                None => {
                    return Err(BridgeError::invalid_operation(
                        "Invalid json format - object value without a property name",
                    ))
                }
            },
        }
        Ok(())
    }
}

struct DeserializerState {
    stack: Vec<Frame>,
    references: HashMap<String, Node>,
}

impl DeserializerState {
    fn new(root: Frame) -> Self {
        DeserializerState {
            stack: vec![root],
            references: HashMap::new(),
        }
    }

    fn top(&mut self) -> Result<&mut Frame, BridgeError> {
        self.stack
            .last_mut()
            .ok_or_else(|| BridgeError::invalid_operation("Invalid json format - unbalanced tokens"))
    }

    /// Opens a list or map frame. The bottom frame is never a container.
    fn push(&mut self, frame: Frame) -> Result<(), BridgeError> {
        if self.stack.len() > MAX_DEPTH {
            return Err(BridgeError::invalid_operation(format!(
                "Invalid json format - nesting exceeds the maximum depth of {}",
                MAX_DEPTH
            )));
        }
        self.stack.push(frame);
        Ok(())
    }

    fn run(&mut self, wire: &str) -> Result<(), BridgeError> {
        let tokens = Tokenizer::new(wire).collect::<Result<Vec<_>, _>>()?;
        let mut pos = 0;
        while pos < tokens.len() {
            pos += self.step(&tokens[pos..])?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Frame, BridgeError> {
        if self.stack.len() != 1 {
            return Err(BridgeError::invalid_operation(
                "Invalid json format - missing enclosing EndArray or EndObject token(s).",
            ));
        }
        self.stack
            .pop()
            .ok_or_else(|| BridgeError::invalid_operation("Invalid json format - no value"))
    }

    /// Handles the token at the head of `tokens`; returns how many were consumed.
    fn step(&mut self, tokens: &[Token]) -> Result<usize, BridgeError> {
        match &tokens[0] {
            Token::StartObject => self.start_object(tokens),
            Token::StartArray => {
                if let Frame::Parameters { started, .. } = self.top()? {
                    if !*started {
                        *started = true;
                        return Ok(1);
                    }
                }
                let hint = self.top()?.child_hint().element();
                self.push(Frame::List {
                    list: ListRef::new(),
                    hint,
                    wrapped: false,
                })?;
                Ok(1)
            }
            Token::EndArray => self.end_array(tokens),
            Token::EndObject => {
                match self.stack.pop() {
                    Some(Frame::Map { map, property: None, .. }) => {
                        self.top()?.accept(Node::Map(map))?;
                    }
                    Some(Frame::Map { property: Some(key), .. }) => {
                        return Err(BridgeError::invalid_operation(format!(
                            "Invalid json format - property {} has no value",
                            key
                        )));
                    }
                    _ => {
                        return Err(BridgeError::invalid_operation(
                            "Invalid json format - unexpected EndObject token",
                        ))
                    }
                }
                Ok(1)
            }
            Token::Property(name) => {
                if is_reserved_property(name) {
                    return Err(BridgeError::invalid_operation(format!(
                        "Invalid json format - unexpected metadata property {}",
                        name
                    )));
                }
                match self.top()? {
                    Frame::Map { property, .. } if property.is_none() => {
                        *property = Some(name.clone());
                        Ok(1)
                    }
                    _ => Err(BridgeError::invalid_operation(format!(
                        "Invalid json format - unexpected property {}",
                        name
                    ))),
                }
            }
            Token::String(s) => {
                let hint = self.top()?.child_hint();
                let node = read_string(s, &hint)?;
                self.top()?.accept(node)?;
                Ok(1)
            }
            Token::Number(raw) => {
                let hint = self.top()?.child_hint();
                let node = read_number(raw, &hint)?;
                self.top()?.accept(node)?;
                Ok(1)
            }
            Token::Bool(b) => {
                self.top()?.accept(Node::Bool(*b))?;
                Ok(1)
            }
            Token::Null => {
                self.top()?.accept(Node::Null)?;
                Ok(1)
            }
        }
    }

    fn start_object(&mut self, tokens: &[Token]) -> Result<usize, BridgeError> {
        let hint = self.top()?.child_hint();
        match tokens.get(1) {
            Some(Token::Property(p)) if p == REF_PROPERTY => {
                let id = match (tokens.get(2), tokens.get(3)) {
                    (Some(Token::String(id)), Some(Token::EndObject)) => id,
                    _ => {
                        return Err(BridgeError::invalid_operation(
                            "Invalid json format - $ref must be the only property",
                        ))
                    }
                };
                let node = self.references.get(id).cloned().ok_or_else(|| {
                    BridgeError::not_found(format!("Invalid json format - cannot resolve $ref {}", id))
                })?;
                self.top()?.accept(node)?;
                Ok(4)
            }
            Some(Token::Property(p)) if p == ID_PROPERTY => {
                let id = match tokens.get(2) {
                    Some(Token::String(id)) => id.clone(),
                    _ => {
                        return Err(BridgeError::invalid_operation(
                            "Invalid json format - $id must be a string",
                        ))
                    }
                };
                if self.references.contains_key(&id) {
                    return Err(BridgeError::invalid_operation(format!(
                        "Invalid json format - duplicate $id {}",
                        id
                    )));
                }
                if matches!(tokens.get(3), Some(Token::Property(p)) if p == VALUES_PROPERTY) {
                    if tokens.get(4) != Some(&Token::StartArray) {
                        return Err(BridgeError::invalid_operation(
                            "Invalid json format - $values must be an array",
                        ));
                    }
                    let list = ListRef::new();
                    self.references.insert(id, Node::List(list.clone()));
                    self.push(Frame::List {
                        list,
                        hint: hint.element(),
                        wrapped: true,
                    })?;
                    Ok(5)
                } else {
                    let map = MapRef::new();
                    self.references.insert(id, Node::Map(map.clone()));
                    self.push(Frame::Map {
                        map,
                        hint: hint.element(),
                        property: None,
                    })?;
                    Ok(3)
                }
            }
            _ => {
                self.push(Frame::Map {
                    map: MapRef::new(),
                    hint: hint.element(),
                    property: None,
                })?;
                Ok(1)
            }
        }
    }

    fn end_array(&mut self, tokens: &[Token]) -> Result<usize, BridgeError> {
        if let Frame::Parameters { started, closed, .. } = self.top()? {
            if *started && !*closed {
                *closed = true;
                return Ok(1);
            }
            return Err(BridgeError::invalid_operation(
                "Invalid json format - unexpected EndArray token",
            ));
        }
        match self.stack.pop() {
            Some(Frame::List { list, wrapped, .. }) => {
                let consumed = if wrapped {
                    if tokens.get(1) != Some(&Token::EndObject) {
                        return Err(BridgeError::invalid_operation(
                            "Invalid json format - missing enclosing EndObject after $values",
                        ));
                    }
                    2
                } else {
                    1
                };
                self.top()?.accept(Node::List(list))?;
                Ok(consumed)
            }
            _ => Err(BridgeError::invalid_operation(
                "Invalid json format - unexpected EndArray token",
            )),
        }
    }
}

fn read_string(s: &str, hint: &TypeHint) -> Result<Node, BridgeError> {
    if let Some(rest) = s.strip_prefix(STRING_MARKER) {
        return Ok(Node::String(rest.to_owned()));
    }
    if let Some(rest) = s.strip_prefix(DATE_MARKER) {
        return Ok(Node::Date(parse_date(rest)?));
    }
    if let Some(rest) = s.strip_prefix(BINARY_MARKER) {
        return Ok(Node::Binary(Bytes::from(general_purpose::STANDARD.decode(rest)?)));
    }
    match hint {
        TypeHint::Date => Ok(Node::Date(parse_date(s)?)),
        TypeHint::Binary => Ok(Node::Binary(Bytes::from(general_purpose::STANDARD.decode(s)?))),
        _ => Ok(Node::String(s.to_owned())),
    }
}

/// RFC 3339 with any offset, or an offset-less ISO timestamp taken as UTC.
pub(crate) fn parse_date(text: &str) -> Result<DateTime<Utc>, BridgeError> {
    match DateTime::parse_from_rfc3339(text) {
        Ok(d) => Ok(d.with_timezone(&Utc)),
        Err(_) => Ok(NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")?.and_utc()),
    }
}

fn read_number(raw: &str, hint: &TypeHint) -> Result<Node, BridgeError> {
    let invalid = || BridgeError::invalid_operation(format!("Invalid json format - bad number {}", raw));
    match hint {
        TypeHint::Float => raw.parse::<f64>().map(Node::Double).map_err(|_| invalid()),
        TypeHint::Integer => {
            if let Ok(i) = raw.parse::<i64>() {
                return Ok(Node::Int(i));
            }
            let d = raw.parse::<f64>().map_err(|_| invalid())?;
            if d.fract() == 0.0 && d.abs() < 9.2e18 {
                Ok(Node::Int(d as i64))
            } else {
                Err(BridgeError::invalid_operation(format!(
                    "Invalid json format - {} is not an integer",
                    raw
                )))
            }
        }
        _ => match raw.parse::<i64>() {
            Ok(i) => Ok(Node::Int(i)),
            Err(_) => raw.parse::<f64>().map(Node::Double).map_err(|_| invalid()),
        },
    }
}
