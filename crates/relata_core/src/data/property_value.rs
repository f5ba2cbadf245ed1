//! Per-property value tracking.

use crate::error::CoreResult;
use crate::mapping::PropertyDefinition;
use crate::value::Value;
use std::sync::Arc;

/// Current and original value of one stored property.
#[derive(Debug, Clone)]
pub struct PropertyValue {
    definition: Arc<PropertyDefinition>,
    current: Value,
    original: Value,
    touched: bool,
}

impl PropertyValue {
    /// Creates a property value whose current and original value are `value`.
    pub(crate) fn new(definition: Arc<PropertyDefinition>, value: Value) -> Self {
        Self {
            definition,
            original: value.clone(),
            current: value,
            touched: false,
        }
    }

    /// Returns the property definition.
    #[must_use]
    pub fn definition(&self) -> &Arc<PropertyDefinition> {
        &self.definition
    }

    /// Returns the property name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Returns the current value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.current
    }

    /// Returns the value as of the last commit or load.
    #[must_use]
    pub fn original_value(&self) -> &Value {
        &self.original
    }

    /// Returns true if the current value differs from the original.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.current != self.original
    }

    /// Returns true if the value was assigned since the last commit, even if
    /// the assignment did not change it.
    #[must_use]
    pub fn has_been_touched(&self) -> bool {
        self.touched
    }

    /// Validates and assigns a new current value.
    pub(crate) fn set_value(&mut self, value: Value) -> CoreResult<()> {
        self.definition.validate(&value)?;
        self.current = value;
        self.touched = true;
        Ok(())
    }

    /// Assigns a value already validated against this definition.
    pub(crate) fn assign_validated(&mut self, value: &Value) {
        if self.current != *value {
            self.current = value.clone();
            self.touched = true;
        }
    }

    pub(crate) fn commit(&mut self) {
        if self.has_changed() {
            self.original = self.current.clone();
        }
        self.touched = false;
    }

    pub(crate) fn rollback(&mut self) {
        if self.has_changed() {
            self.current = self.original.clone();
        }
        self.touched = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    fn number() -> PropertyValue {
        let def = Arc::new(PropertyDefinition::new("Number", ValueType::Integer).not_null());
        PropertyValue::new(def, Value::Integer(1))
    }

    #[test]
    fn setting_same_value_touches_without_change() {
        let mut pv = number();
        pv.set_value(Value::Integer(1)).unwrap();
        assert!(pv.has_been_touched());
        assert!(!pv.has_changed());
    }

    #[test]
    fn commit_and_rollback() {
        let mut pv = number();
        pv.set_value(Value::Integer(2)).unwrap();
        assert!(pv.has_changed());
        pv.rollback();
        assert_eq!(pv.value(), &Value::Integer(1));
        assert!(!pv.has_been_touched());

        pv.set_value(Value::Integer(3)).unwrap();
        pv.commit();
        assert_eq!(pv.original_value(), &Value::Integer(3));
        assert!(!pv.has_changed());
    }

    #[test]
    fn invalid_value_leaves_state_untouched() {
        let mut pv = number();
        assert!(pv.set_value(Value::Null).is_err());
        assert!(!pv.has_been_touched());
        assert_eq!(pv.value(), &Value::Integer(1));
    }
}
