//! Message schema: the static description of an input message's fields.
//!
//! JSON bodies carry their own types, but a query string is just a list of
//! `name=value` pairs. The server walks a message's [`FieldSpec`] table to
//! coerce each pair into the right JSON shape before the shared serde path
//! deserialises it, so both encodings land on the same struct.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Failure;

/// Scalar or nested type of a field, as seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Int,
    Float,
    Bool,
    /// A nested message, described by its own field table.
    Message(&'static [FieldSpec]),
}

/// One field of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Wire name (the JSON key and the query parameter name).
    pub name: &'static str,
    pub kind: FieldKind,
    /// `true` when the field is a list and may be given more than once.
    pub repeated: bool,
}

impl FieldSpec {
    pub const fn scalar(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            repeated: false,
        }
    }

    pub const fn repeated(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            repeated: true,
        }
    }

    /// Find a field by wire name in a field table.
    pub fn lookup<'a>(fields: &'a [FieldSpec], name: &str) -> Option<&'a FieldSpec> {
        fields.iter().find(|f| f.name == name)
    }
}

/// An operation's input message.
///
/// Optional fields are `Option<T>` so "not provided" survives decoding;
/// repeated fields are `Vec<T>` with `#[serde(default)]`.
pub trait Message: Serialize + DeserializeOwned + Send + 'static {
    /// Message name, used in logs.
    const NAME: &'static str;

    /// Field table used to decode query strings.
    const FIELDS: &'static [FieldSpec];

    /// Required-field checks run after decoding.
    fn validate(&self) -> Result<(), Failure> {
        Ok(())
    }
}

/// Fail with [`Failure::missing_parameter`] when a required string is absent
/// or empty.
pub fn require_str(name: &str, value: &Option<String>) -> Result<(), Failure> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(Failure::missing_parameter(name)),
    }
}
