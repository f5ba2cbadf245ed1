//! Relation end point definitions.

use crate::object::ClassId;

/// How many objects an end point refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// At most one related object.
    One,
    /// An ordered collection of related objects.
    Many,
}

/// Metadata of one side of a relation.
///
/// A non-virtual end point stores the foreign key in its object's data
/// container. A virtual end point has no storage of its own; its contents
/// are derived from the foreign keys on the opposite side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationEndPointDefinition {
    relation_id: String,
    class_id: ClassId,
    property_name: String,
    cardinality: Cardinality,
    is_virtual: bool,
    mandatory: bool,
    opposite_class: ClassId,
    opposite_property: Option<String>,
}

impl RelationEndPointDefinition {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        relation_id: String,
        class_id: ClassId,
        property_name: String,
        cardinality: Cardinality,
        is_virtual: bool,
        mandatory: bool,
        opposite_class: ClassId,
        opposite_property: Option<String>,
    ) -> Self {
        Self {
            relation_id,
            class_id,
            property_name,
            cardinality,
            is_virtual,
            mandatory,
            opposite_class,
            opposite_property,
        }
    }

    /// Returns the ID of the relation both end points belong to.
    #[must_use]
    pub fn relation_id(&self) -> &str {
        &self.relation_id
    }

    /// Returns the class declaring this end point.
    #[must_use]
    pub fn class_id(&self) -> &ClassId {
        &self.class_id
    }

    /// Returns the relation property name.
    #[must_use]
    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    /// Returns the cardinality.
    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Returns true for collection end points.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.cardinality == Cardinality::Many
    }

    /// Returns true if the end point has no foreign key of its own.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// Returns true if the end point must be non-empty at commit.
    #[must_use]
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// Returns the class on the other side.
    #[must_use]
    pub fn opposite_class(&self) -> &ClassId {
        &self.opposite_class
    }

    /// Returns the property on the other side, or `None` for unidirectional
    /// relations.
    #[must_use]
    pub fn opposite_property(&self) -> Option<&str> {
        self.opposite_property.as_deref()
    }

    /// Returns true if both sides are navigable.
    #[must_use]
    pub fn is_bidirectional(&self) -> bool {
        self.opposite_property.is_some()
    }
}
