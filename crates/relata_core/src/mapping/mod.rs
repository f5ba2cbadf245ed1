//! Mapping metadata: classes, stored properties and relation end points.
//!
//! A [`MappingConfiguration`] is built once with [`MappingBuilder`] and
//! shared immutably (`Arc`) by every transaction that uses it.
//!
//! ```
//! use relata_core::mapping::{ClassBuilder, MappingBuilder, PropertyDefinition, RelationBuilder};
//! use relata_core::ValueType;
//!
//! let mapping = MappingBuilder::new()
//!     .class(ClassBuilder::new("Order")
//!         .property(PropertyDefinition::new("Number", ValueType::Integer).not_null()))
//!     .class(ClassBuilder::new("OrderItem"))
//!     .relation(RelationBuilder::one_to_many("Order", "OrderItems", "OrderItem", "Order"))
//!     .build()
//!     .unwrap();
//! assert_eq!(mapping.classes().count(), 2);
//! ```

mod builder;
mod class;
mod property;
mod relation;

pub use builder::{ClassBuilder, MappingBuilder, RelationBuilder};
pub use class::ClassDefinition;
pub use property::PropertyDefinition;
pub use relation::{Cardinality, RelationEndPointDefinition};

use crate::error::{CoreError, CoreResult};
use crate::object::ClassId;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Validated, immutable mapping metadata.
#[derive(Debug)]
pub struct MappingConfiguration {
    classes: BTreeMap<ClassId, Arc<ClassDefinition>>,
}

impl MappingConfiguration {
    /// Starts building a mapping.
    #[must_use]
    pub fn builder() -> MappingBuilder {
        MappingBuilder::new()
    }

    pub(crate) fn from_classes(classes: BTreeMap<ClassId, Arc<ClassDefinition>>) -> Self {
        Self { classes }
    }

    /// Returns a class or a mapping error.
    pub fn class(&self, id: &ClassId) -> CoreResult<&Arc<ClassDefinition>> {
        self.classes
            .get(id)
            .ok_or_else(|| CoreError::unknown_class(id))
    }

    /// Returns a class if it is mapped.
    #[must_use]
    pub fn get_class(&self, id: &ClassId) -> Option<&Arc<ClassDefinition>> {
        self.classes.get(id)
    }

    /// Iterates all classes in name order.
    pub fn classes(&self) -> impl Iterator<Item = &Arc<ClassDefinition>> {
        self.classes.values()
    }

    /// Returns a stored property definition.
    pub fn property(&self, class: &ClassId, name: &str) -> CoreResult<&Arc<PropertyDefinition>> {
        self.class(class)?
            .property(name)
            .ok_or_else(|| CoreError::unknown_property(class, name))
    }

    /// Returns a relation end point definition.
    pub fn end_point(
        &self,
        class: &ClassId,
        property: &str,
    ) -> CoreResult<&Arc<RelationEndPointDefinition>> {
        self.class(class)?
            .end_point(property)
            .ok_or_else(|| CoreError::mapping(format!("class {class} has no relation {property}")))
    }

    /// Returns the definition on the other side of a bidirectional relation.
    pub fn opposite(
        &self,
        definition: &RelationEndPointDefinition,
    ) -> CoreResult<Option<&Arc<RelationEndPointDefinition>>> {
        match definition.opposite_property() {
            Some(property) => self
                .end_point(definition.opposite_class(), property)
                .map(Some),
            None => Ok(None),
        }
    }

    /// Returns true if instances of `class` may be used where `target` is expected.
    #[must_use]
    pub fn is_assignable(&self, class: &ClassId, target: &ClassId) -> bool {
        let mut current = Some(class);
        while let Some(id) = current {
            if id == target {
                return true;
            }
            current = self.classes.get(id).and_then(|c| c.base());
        }
        false
    }

    /// Returns `class` and every class derived from it.
    #[must_use]
    pub fn derived_classes(&self, class: &ClassId) -> Vec<ClassId> {
        self.classes
            .keys()
            .filter(|id| self.is_assignable(id, class))
            .cloned()
            .collect()
    }
}
