//! Wire JSON with reference preservation and marker-prefixed strings.
//!
//! Shared and cyclic lists and maps are written once with a `$id` and
//! referenced afterwards with `{"$ref":"<n>"}`. Lists under id tracking use
//! the `{"$id":"<n>","$values":[...]}` shape. Dates and binary payloads are
//! strings carrying a two character marker.

mod carrier;
mod deserializer;
mod reader;
mod writer;

pub use carrier::{
    deserialize_carrier, deserialize_carrier_list, node_to_value, serialize_to_carrier,
    value_to_node,
};
pub use deserializer::{
    deserialize, deserialize_as, deserialize_parameters, deserialize_typed, ParametersTypes,
    TypeHint,
};
pub use reader::{SyntaxError, Token, Tokenizer};
pub use writer::{serialize, serialize_typed, serialize_with, ReferenceHandling, SerializerOptions};

/// Prefix of a plain string whose text would otherwise look like a marker.
pub const STRING_MARKER: &str = "S#";
/// Prefix of an RFC 3339 date.
pub const DATE_MARKER: &str = "D#";
/// Prefix of a base64 binary payload.
pub const BINARY_MARKER: &str = "B#";

/// Deepest list or map nesting accepted by the reader and the writer.
pub const MAX_DEPTH: usize = 128;

pub const ID_PROPERTY: &str = "$id";
pub const REF_PROPERTY: &str = "$ref";
pub const VALUES_PROPERTY: &str = "$values";

pub(crate) fn is_reserved_property(name: &str) -> bool {
    name == ID_PROPERTY || name == REF_PROPERTY || name == VALUES_PROPERTY
}

pub(crate) fn has_marker(s: &str) -> bool {
    s.starts_with(STRING_MARKER) || s.starts_with(DATE_MARKER) || s.starts_with(BINARY_MARKER)
}
