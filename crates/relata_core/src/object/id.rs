//! Class and object identifiers.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Name of a mapped domain class.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ClassId(Arc<str>);

impl ClassId {
    /// Creates a class ID.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the class name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClassId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ClassId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<ClassId> for String {
    fn from(id: ClassId) -> Self {
        id.0.to_string()
    }
}

impl AsRef<str> for ClassId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a domain object: its class plus a unique value.
///
/// Object IDs are assigned when an object is created and never change.
/// The textual form is `Class|uuid`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    class_id: ClassId,
    value: Uuid,
}

impl ObjectId {
    /// Creates a fresh object ID for the given class.
    pub fn new(class_id: impl Into<ClassId>) -> Self {
        Self {
            class_id: class_id.into(),
            value: Uuid::new_v4(),
        }
    }

    /// Creates an object ID from its parts.
    #[must_use]
    pub fn from_parts(class_id: ClassId, value: Uuid) -> Self {
        Self { class_id, value }
    }

    /// Returns the class of the identified object.
    #[must_use]
    pub fn class_id(&self) -> &ClassId {
        &self.class_id
    }

    /// Returns the unique value.
    #[must_use]
    pub fn value(&self) -> Uuid {
        self.value
    }
}

impl FromStr for ObjectId {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let (class, value) = s
            .split_once('|')
            .ok_or_else(|| CoreError::invalid_argument(format!("malformed object id: {s}")))?;
        if class.is_empty() {
            return Err(CoreError::invalid_argument(format!(
                "object id without class: {s}"
            )));
        }
        let value = Uuid::parse_str(value)
            .map_err(|e| CoreError::invalid_argument(format!("malformed object id {s}: {e}")))?;
        Ok(Self::from_parts(ClassId::new(class), value))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({}|{})", self.class_id, self.value)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.class_id, self.value)
    }
}
