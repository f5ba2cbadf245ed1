//! Data containers: the stored state of one object in one transaction.

use super::property_value::PropertyValue;
use crate::error::{CoreError, CoreResult};
use crate::mapping::ClassDefinition;
use crate::object::ObjectId;
use crate::types::Timestamp;
use crate::value::Value;
use std::sync::Arc;

/// Observable lifecycle state of a domain object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectState {
    /// Created in this transaction and not yet committed.
    New,
    /// Loaded and not modified.
    Unchanged,
    /// Loaded and modified.
    Changed,
    /// Marked for deletion; removed from storage on commit.
    Deleted,
    /// No longer usable in this transaction.
    Discarded,
}

impl ObjectState {
    /// Returns true if commit has work to do for this object.
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::New | Self::Changed | Self::Deleted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    New,
    Existing,
    Deleted,
    Discarded,
}

/// Stored property values, timestamp and lifecycle of one object.
#[derive(Debug, Clone)]
pub struct DataContainer {
    id: ObjectId,
    class: Arc<ClassDefinition>,
    values: Vec<PropertyValue>,
    lifecycle: Lifecycle,
    timestamp: Option<Timestamp>,
    marked_changed: bool,
}

impl DataContainer {
    /// Creates the container of a newly created object, holding default values.
    pub fn new_object(id: ObjectId, class: Arc<ClassDefinition>) -> Self {
        let values = class
            .properties()
            .iter()
            .map(|p| PropertyValue::new(Arc::clone(p), p.default_value()))
            .collect();
        Self {
            id,
            class,
            values,
            lifecycle: Lifecycle::New,
            timestamp: None,
            marked_changed: false,
        }
    }

    /// Creates the container of a loaded object. Properties missing from
    /// `values` take their default.
    pub fn existing(
        id: ObjectId,
        class: Arc<ClassDefinition>,
        timestamp: Option<Timestamp>,
        values: &[(String, Value)],
    ) -> CoreResult<Self> {
        let mut slots: Vec<Option<Value>> = vec![None; class.properties().len()];
        for (name, value) in values {
            let index = class
                .property_index(name)
                .ok_or_else(|| CoreError::unknown_property(class.id(), name))?;
            class.properties()[index].validate(value)?;
            slots[index] = Some(value.clone());
        }
        let values = class
            .properties()
            .iter()
            .zip(slots)
            .map(|(p, v)| PropertyValue::new(Arc::clone(p), v.unwrap_or_else(|| p.default_value())))
            .collect();
        Ok(Self {
            id,
            class,
            values,
            lifecycle: Lifecycle::Existing,
            timestamp,
            marked_changed: false,
        })
    }

    /// Returns the object ID.
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Returns the class definition.
    #[must_use]
    pub fn class(&self) -> &Arc<ClassDefinition> {
        &self.class
    }

    /// Returns the storage timestamp, `None` for objects never persisted.
    #[must_use]
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    pub(crate) fn set_timestamp(&mut self, timestamp: Option<Timestamp>) {
        self.timestamp = timestamp;
    }

    /// Returns the state derived from the lifecycle and property values.
    #[must_use]
    pub fn state(&self) -> ObjectState {
        match self.lifecycle {
            Lifecycle::New => ObjectState::New,
            Lifecycle::Deleted => ObjectState::Deleted,
            Lifecycle::Discarded => ObjectState::Discarded,
            Lifecycle::Existing if self.marked_changed || self.values.iter().any(|v| v.has_changed()) => {
                ObjectState::Changed
            }
            Lifecycle::Existing => ObjectState::Unchanged,
        }
    }

    /// Returns true once the container was discarded.
    #[must_use]
    pub fn is_discarded(&self) -> bool {
        self.lifecycle == Lifecycle::Discarded
    }

    /// Returns true if the object is new in this transaction.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.lifecycle == Lifecycle::New
    }

    /// Returns true if the object is marked for deletion.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.lifecycle == Lifecycle::Deleted
    }

    /// Returns true if `mark_as_changed` forced the `Changed` state.
    #[must_use]
    pub fn is_marked_changed(&self) -> bool {
        self.marked_changed
    }

    /// Returns true if any value was assigned since the last commit.
    #[must_use]
    pub fn has_been_touched(&self) -> bool {
        self.values.iter().any(PropertyValue::has_been_touched)
    }

    fn ensure_not_discarded(&self) -> CoreResult<()> {
        if self.is_discarded() {
            return Err(CoreError::ObjectDiscarded {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    fn slot(&self, name: &str) -> CoreResult<usize> {
        self.class
            .property_index(name)
            .ok_or_else(|| CoreError::unknown_property(self.class.id(), name))
    }

    /// Returns the property value record for `name`.
    pub fn property_value(&self, name: &str) -> CoreResult<&PropertyValue> {
        self.ensure_not_discarded()?;
        let index = self.slot(name)?;
        Ok(&self.values[index])
    }

    /// Returns all property value records in definition order.
    pub fn property_values(&self) -> CoreResult<&[PropertyValue]> {
        self.ensure_not_discarded()?;
        Ok(&self.values)
    }

    /// Returns the current value of a property.
    pub fn value(&self, name: &str) -> CoreResult<&Value> {
        self.property_value(name).map(PropertyValue::value)
    }

    /// Returns the original value of a property.
    pub fn original_value(&self, name: &str) -> CoreResult<&Value> {
        self.property_value(name).map(PropertyValue::original_value)
    }

    /// Assigns a property value. Fails on deleted or discarded objects and on
    /// values the definition rejects.
    pub fn set_value(&mut self, name: &str, value: Value) -> CoreResult<()> {
        self.ensure_not_discarded()?;
        if self.is_deleted() {
            return Err(CoreError::ObjectDeleted {
                id: self.id.clone(),
            });
        }
        let index = self.slot(name)?;
        self.values[index].set_value(value)
    }

    /// Current values of all properties, for persisting.
    #[must_use]
    pub fn current_values(&self) -> Vec<(String, Value)> {
        self.values
            .iter()
            .map(|v| (v.name().to_string(), v.value().clone()))
            .collect()
    }

    /// Forces the state of an unchanged object to `Changed`.
    pub fn mark_as_changed(&mut self) -> CoreResult<()> {
        self.ensure_not_discarded()?;
        match self.lifecycle {
            Lifecycle::Existing => {
                self.marked_changed = true;
                Ok(())
            }
            Lifecycle::New => Ok(()),
            _ => Err(CoreError::ObjectDeleted {
                id: self.id.clone(),
            }),
        }
    }

    /// Marks an existing object for deletion.
    pub fn delete(&mut self) -> CoreResult<()> {
        self.ensure_not_discarded()?;
        match self.lifecycle {
            Lifecycle::Existing => {
                self.mark_deleted();
                Ok(())
            }
            Lifecycle::Deleted => Err(CoreError::ObjectDeleted {
                id: self.id.clone(),
            }),
            _ => Err(CoreError::invalid_operation(format!(
                "new object {} must be discarded, not deleted",
                self.id
            ))),
        }
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.lifecycle = Lifecycle::Deleted;
    }

    /// Makes the container permanently unusable.
    pub(crate) fn discard(&mut self) {
        self.lifecycle = Lifecycle::Discarded;
    }

    /// Accepts current values as original. Deleted containers become
    /// discarded.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_not_discarded()?;
        match self.lifecycle {
            Lifecycle::Deleted => self.discard(),
            _ => {
                self.values.iter_mut().for_each(PropertyValue::commit);
                self.lifecycle = Lifecycle::Existing;
                self.marked_changed = false;
            }
        }
        Ok(())
    }

    /// Restores original values. New containers become discarded and
    /// deleted ones existing again.
    pub fn rollback(&mut self) -> CoreResult<()> {
        self.ensure_not_discarded()?;
        match self.lifecycle {
            Lifecycle::New => self.discard(),
            _ => {
                self.values.iter_mut().for_each(PropertyValue::rollback);
                self.lifecycle = Lifecycle::Existing;
                self.marked_changed = false;
            }
        }
        Ok(())
    }

    /// Copies values committed by a sub-transaction. Every value must have
    /// been validated against this container's class.
    pub(crate) fn assign_from_sub_transaction(&mut self, values: &[(String, Value)], marked_changed: bool) {
        for (name, value) in values {
            if let Some(index) = self.class.property_index(name) {
                self.values[index].assign_validated(value);
            }
        }
        if marked_changed && self.lifecycle == Lifecycle::Existing {
            self.marked_changed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{ClassBuilder, MappingBuilder, PropertyDefinition};
    use crate::object::ClassId;
    use crate::value::ValueType;

    fn order_class() -> Arc<ClassDefinition> {
        let mapping = MappingBuilder::new()
            .class(
                ClassBuilder::new("Order")
                    .property(PropertyDefinition::new("Number", ValueType::Integer).not_null())
                    .property(PropertyDefinition::new("Note", ValueType::Text)),
            )
            .build()
            .unwrap();
        Arc::clone(mapping.class(&ClassId::new("Order")).unwrap())
    }

    fn loaded() -> DataContainer {
        DataContainer::existing(
            ObjectId::new("Order"),
            order_class(),
            Some(Timestamp::new(1)),
            &[("Number".into(), Value::Integer(7))],
        )
        .unwrap()
    }

    #[test]
    fn new_container_has_defaults() {
        let c = DataContainer::new_object(ObjectId::new("Order"), order_class());
        assert_eq!(c.state(), ObjectState::New);
        assert_eq!(c.value("Number").unwrap(), &Value::Integer(0));
        assert_eq!(c.value("Note").unwrap(), &Value::Null);
    }

    #[test]
    fn change_then_restore_is_unchanged() {
        let mut c = loaded();
        c.set_value("Number", Value::Integer(8)).unwrap();
        assert_eq!(c.state(), ObjectState::Changed);
        c.set_value("Number", Value::Integer(7)).unwrap();
        assert_eq!(c.state(), ObjectState::Unchanged);
        assert!(c.has_been_touched());
    }

    #[test]
    fn unknown_property_is_mapping_error() {
        let c = loaded();
        assert!(matches!(c.value("Missing"), Err(CoreError::Mapping { .. })));
    }

    #[test]
    fn deleted_rejects_set_and_rollback_restores() {
        let mut c = loaded();
        c.set_value("Number", Value::Integer(9)).unwrap();
        c.delete().unwrap();
        assert_eq!(c.state(), ObjectState::Deleted);
        assert!(matches!(
            c.set_value("Number", Value::Integer(1)),
            Err(CoreError::ObjectDeleted { .. })
        ));
        c.rollback().unwrap();
        assert_eq!(c.state(), ObjectState::Unchanged);
        assert_eq!(c.value("Number").unwrap(), &Value::Integer(7));
    }

    #[test]
    fn commit_deleted_discards() {
        let mut c = loaded();
        c.delete().unwrap();
        c.commit().unwrap();
        assert_eq!(c.state(), ObjectState::Discarded);
        assert!(matches!(
            c.value("Number"),
            Err(CoreError::ObjectDiscarded { .. })
        ));
    }

    #[test]
    fn rollback_new_discards() {
        let mut c = DataContainer::new_object(ObjectId::new("Order"), order_class());
        c.rollback().unwrap();
        assert!(c.is_discarded());
        assert!(c.rollback().is_err());
    }

    #[test]
    fn new_objects_cannot_be_deleted_directly() {
        let mut c = DataContainer::new_object(ObjectId::new("Order"), order_class());
        assert!(matches!(c.delete(), Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn mark_as_changed_until_commit() {
        let mut c = loaded();
        c.mark_as_changed().unwrap();
        assert_eq!(c.state(), ObjectState::Changed);
        c.commit().unwrap();
        assert_eq!(c.state(), ObjectState::Unchanged);
    }

    #[test]
    fn commit_accepts_values() {
        let mut c = DataContainer::new_object(ObjectId::new("Order"), order_class());
        c.set_value("Number", Value::Integer(3)).unwrap();
        c.commit().unwrap();
        assert_eq!(c.state(), ObjectState::Unchanged);
        assert_eq!(c.original_value("Number").unwrap(), &Value::Integer(3));
    }

    #[test]
    fn existing_rejects_invalid_loaded_value() {
        let result = DataContainer::existing(
            ObjectId::new("Order"),
            order_class(),
            None,
            &[("Number".into(), Value::from("x"))],
        );
        assert!(matches!(
            result,
            Err(CoreError::PropertyTypeMismatch { .. })
        ));
    }
}
