//! Class definitions.

use super::property::PropertyDefinition;
use super::relation::RelationEndPointDefinition;
use crate::object::ClassId;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolved metadata of a mapped class, including everything it inherits.
#[derive(Debug)]
pub struct ClassDefinition {
    id: ClassId,
    base: Option<ClassId>,
    is_abstract: bool,
    properties: Vec<Arc<PropertyDefinition>>,
    property_index: HashMap<String, usize>,
    end_points: Vec<Arc<RelationEndPointDefinition>>,
    end_point_index: HashMap<String, usize>,
}

impl ClassDefinition {
    pub(crate) fn new(
        id: ClassId,
        base: Option<ClassId>,
        is_abstract: bool,
        properties: Vec<Arc<PropertyDefinition>>,
        end_points: Vec<Arc<RelationEndPointDefinition>>,
    ) -> Self {
        let property_index = properties
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name().to_string(), i))
            .collect();
        let end_point_index = end_points
            .iter()
            .enumerate()
            .map(|(i, e)| (e.property_name().to_string(), i))
            .collect();
        Self {
            id,
            base,
            is_abstract,
            properties,
            property_index,
            end_points,
            end_point_index,
        }
    }

    /// Returns the class ID.
    #[must_use]
    pub fn id(&self) -> &ClassId {
        &self.id
    }

    /// Returns the direct base class.
    #[must_use]
    pub fn base(&self) -> Option<&ClassId> {
        self.base.as_ref()
    }

    /// Returns true if no instances may be created.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Stored properties (value properties and foreign keys), base class first.
    #[must_use]
    pub fn properties(&self) -> &[Arc<PropertyDefinition>] {
        &self.properties
    }

    /// Looks up a stored property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Arc<PropertyDefinition>> {
        self.property_index.get(name).map(|&i| &self.properties[i])
    }

    /// Position of a stored property within [`properties`](Self::properties).
    #[must_use]
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.property_index.get(name).copied()
    }

    /// Relation end points, base class first.
    #[must_use]
    pub fn end_points(&self) -> &[Arc<RelationEndPointDefinition>] {
        &self.end_points
    }

    /// Looks up a relation end point by property name.
    #[must_use]
    pub fn end_point(&self, name: &str) -> Option<&Arc<RelationEndPointDefinition>> {
        self.end_point_index.get(name).map(|&i| &self.end_points[i])
    }
}
