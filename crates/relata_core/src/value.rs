//! Property values.

use crate::object::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a mapped property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Integer,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Bytes,
    /// Reference to another object (foreign key).
    ObjectRef,
}

impl ValueType {
    /// Returns the value used for non-nullable properties without an
    /// explicit default.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Integer => Value::Integer(0),
            Self::Text => Value::Text(String::new()),
            Self::Bytes => Value::Bytes(Vec::new()),
            Self::ObjectRef => Value::Null,
        }
    }
}

/// A property value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Reference to another object.
    Object(ObjectId),
}

impl Value {
    /// Returns the type of this value, or `None` for null.
    #[must_use]
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(ValueType::Bool),
            Self::Integer(_) => Some(ValueType::Integer),
            Self::Text(_) => Some(ValueType::Text),
            Self::Bytes(_) => Some(ValueType::Bytes),
            Self::Object(_) => Some(ValueType::ObjectRef),
        }
    }

    /// Returns true if the value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the text, if this is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the bytes, if this is a byte value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the referenced object ID, if this is a reference.
    #[must_use]
    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            Self::Object(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the length used for max-length checks.
    pub(crate) fn length(&self) -> Option<usize> {
        match self {
            Self::Text(s) => Some(s.chars().count()),
            Self::Bytes(b) => Some(b.len()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Object(id) => write!(f, "{id}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Self::Object(v)
    }
}

impl From<Option<ObjectId>> for Value {
    fn from(v: Option<ObjectId>) -> Self {
        v.map_or(Self::Null, Self::Object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_types() {
        assert_eq!(Value::Null.value_type(), None);
        assert_eq!(Value::from(3).value_type(), Some(ValueType::Integer));
        assert_eq!(Value::from("x").value_type(), Some(ValueType::Text));
        let id = ObjectId::new("Order");
        assert_eq!(Value::from(id).value_type(), Some(ValueType::ObjectRef));
    }

    #[test]
    fn text_length_counts_chars() {
        assert_eq!(Value::from("héllo").length(), Some(5));
        assert_eq!(Value::from(vec![1u8, 2]).length(), Some(2));
        assert_eq!(Value::from(1).length(), None);
    }

    #[test]
    fn optional_reference_conversion() {
        assert_eq!(Value::from(None::<ObjectId>), Value::Null);
        let id = ObjectId::new("Order");
        assert_eq!(Value::from(Some(id.clone())).as_object_id(), Some(&id));
    }
}
