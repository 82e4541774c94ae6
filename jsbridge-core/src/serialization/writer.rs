use super::{
    has_marker, is_reserved_property, BINARY_MARKER, DATE_MARKER, MAX_DEPTH, STRING_MARKER,
};
use crate::error::BridgeError;
use crate::node::{to_node, Node};
use base64::{engine::general_purpose, Engine as _};
use chrono::SecondsFormat;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceHandling {
    /// Shared and cyclic containers are written once and referenced by id.
    #[default]
    Preserve,
    /// No ids are written; a container reachable from itself is an error.
    Reject,
}

#[derive(Debug, Clone, Default)]
pub struct SerializerOptions {
    pub references: ReferenceHandling,
    /// Write a top-level list as a bare `[...]` even when preserving
    /// references. Used for call argument arrays.
    pub skip_reference_for_root_list: bool,
}

impl SerializerOptions {
    pub fn arguments() -> Self {
        SerializerOptions {
            references: ReferenceHandling::Preserve,
            skip_reference_for_root_list: true,
        }
    }
}

pub fn serialize(node: &Node) -> Result<String, BridgeError> {
    serialize_with(node, &SerializerOptions::default())
}

pub fn serialize_with(node: &Node, options: &SerializerOptions) -> Result<String, BridgeError> {
    let mut writer = Writer::new(options);
    writer.write_node(node, true)?;
    Ok(writer.out)
}

pub fn serialize_typed<T: Serialize + ?Sized>(value: &T) -> Result<String, BridgeError> {
    serialize(&to_node(value)?)
}

struct Writer<'o> {
    options: &'o SerializerOptions,
    out: String,
    ids: HashMap<usize, usize>,
    next_id: usize,
    ancestors: Vec<usize>,
}

impl<'o> Writer<'o> {
    fn new(options: &'o SerializerOptions) -> Self {
        Writer {
            options,
            out: String::new(),
            ids: HashMap::new(),
            next_id: 1,
            ancestors: Vec::new(),
        }
    }

    fn write_node(&mut self, node: &Node, is_root: bool) -> Result<(), BridgeError> {
        match node {
            Node::Null => self.out.push_str("null"),
            Node::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Node::Int(i) => {
                let _ = write!(self.out, "{}", i);
            }
            Node::Double(d) => {
                if !d.is_finite() {
                    return Err(BridgeError::invalid_operation(format!(
                        "{} cannot be written as a json number",
                        d
                    )));
                }
                self.out.push_str(&serde_json::to_string(d)?);
            }
            Node::String(s) => {
                if has_marker(s) {
                    self.write_string(&format!("{}{}", STRING_MARKER, s))?;
                } else {
                    self.write_string(s)?;
                }
            }
            Node::Date(d) => {
                let text = d.to_rfc3339_opts(SecondsFormat::Millis, true);
                self.write_string(&format!("{}{}", DATE_MARKER, text))?;
            }
            Node::Binary(b) => {
                let text = general_purpose::STANDARD.encode(b);
                self.write_string(&format!("{}{}", BINARY_MARKER, text))?;
            }
            Node::List(list) => {
                let identity = list.identity();
                let track = self.options.references == ReferenceHandling::Preserve
                    && !(is_root && self.options.skip_reference_for_root_list);
                if track {
                    if let Some(id) = self.ids.get(&identity) {
                        let _ = write!(self.out, r#"{{"$ref":"{}"}}"#, id);
                        return Ok(());
                    }
                    let id = self.register(identity);
                    let _ = write!(self.out, r#"{{"$id":"{}","$values":"#, id);
                }
                self.enter(identity)?;
                self.out.push('[');
                for (i, item) in list.snapshot().iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.write_node(item, false)?;
                }
                self.out.push(']');
                self.ancestors.pop();
                if track {
                    self.out.push('}');
                }
            }
            Node::Map(map) => {
                let identity = map.identity();
                let track = self.options.references == ReferenceHandling::Preserve;
                self.out.push('{');
                let mut first = true;
                if track {
                    if let Some(id) = self.ids.get(&identity) {
                        let _ = write!(self.out, r#""$ref":"{}"}}"#, id);
                        return Ok(());
                    }
                    let id = self.register(identity);
                    let _ = write!(self.out, r#""$id":"{}""#, id);
                    first = false;
                }
                self.enter(identity)?;
                for (key, value) in map.snapshot() {
                    if is_reserved_property(&key) {
                        return Err(BridgeError::invalid_operation(format!(
                            "The property name {} is reserved for reference metadata",
                            key
                        )));
                    }
                    if !first {
                        self.out.push(',');
                    }
                    first = false;
                    self.write_string(&key)?;
                    self.out.push(':');
                    self.write_node(&value, false)?;
                }
                self.out.push('}');
                self.ancestors.pop();
            }
        }
        Ok(())
    }

    fn write_string(&mut self, s: &str) -> Result<(), BridgeError> {
        self.out.push_str(&serde_json::to_string(s)?);
        Ok(())
    }

    fn register(&mut self, identity: usize) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(identity, id);
        id
    }

    fn enter(&mut self, identity: usize) -> Result<(), BridgeError> {
        // With preservation on, a revisit is always caught by the id table
        // first, so this only fires in reject mode or for an untracked root.
        if self.ancestors.len() >= MAX_DEPTH {
            return Err(BridgeError::invalid_operation(format!(
                "Nesting exceeds the maximum depth of {}",
                MAX_DEPTH
            )));
        }
        if self.ancestors.contains(&identity) {
            return Err(BridgeError::cycle(format!(
                "A possible object cycle was detected at depth {}",
                self.ancestors.len()
            )));
        }
        self.ancestors.push(identity);
        Ok(())
    }
}
