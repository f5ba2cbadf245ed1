//! Property definitions.

use crate::error::{CoreError, CoreResult};
use crate::object::ClassId;
use crate::value::{Value, ValueType};

/// Metadata of a stored property: a value property or a foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDefinition {
    name: String,
    value_type: ValueType,
    nullable: bool,
    default: Option<Value>,
    max_length: Option<usize>,
    referenced_class: Option<ClassId>,
}

impl PropertyDefinition {
    /// Creates a nullable value property.
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            nullable: true,
            default: None,
            max_length: None,
            referenced_class: None,
        }
    }

    /// Creates the foreign-key property backing a non-virtual relation end point.
    pub(crate) fn foreign_key(name: impl Into<String>, referenced_class: ClassId) -> Self {
        Self {
            name: name.into(),
            value_type: ValueType::ObjectRef,
            nullable: true,
            default: None,
            max_length: None,
            referenced_class: Some(referenced_class),
        }
    }

    /// Disallows null values.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the value a new object starts with.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Limits text length (in characters) or byte length.
    #[must_use]
    pub const fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Returns the property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared value type.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Returns true if null is accepted.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns the maximum length, if any.
    #[must_use]
    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    /// Returns the class a foreign key points to.
    #[must_use]
    pub fn referenced_class(&self) -> Option<&ClassId> {
        self.referenced_class.as_ref()
    }

    /// Returns true for foreign-key properties.
    #[must_use]
    pub fn is_foreign_key(&self) -> bool {
        self.referenced_class.is_some()
    }

    /// Returns the value a freshly created object holds.
    #[must_use]
    pub fn default_value(&self) -> Value {
        match &self.default {
            Some(value) => value.clone(),
            None if self.nullable => Value::Null,
            None => self.value_type.default_value(),
        }
    }

    /// Checks nullability, type and length of a candidate value.
    pub fn validate(&self, value: &Value) -> CoreResult<()> {
        let Some(actual) = value.value_type() else {
            return if self.nullable {
                Ok(())
            } else {
                Err(CoreError::ValueRequired {
                    property: self.name.clone(),
                })
            };
        };
        if actual != self.value_type {
            return Err(CoreError::PropertyTypeMismatch {
                property: self.name.clone(),
                expected: self.value_type,
                actual: format!("{actual:?}"),
            });
        }
        if let (Some(max), Some(len)) = (self.max_length, value.length()) {
            if len > max {
                return Err(CoreError::invalid_argument(format!(
                    "value of {} exceeds maximum length {max} (got {len})",
                    self.name
                )));
            }
        }
        Ok(())
    }
}
