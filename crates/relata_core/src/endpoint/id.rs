use crate::object::ObjectId;
use std::fmt;
use std::sync::Arc;

/// Identifies one side of a relation on one object.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationEndPointId {
    object_id: ObjectId,
    property: Arc<str>,
}

impl RelationEndPointId {
    /// Creates an end point ID.
    pub fn new(object_id: ObjectId, property: impl AsRef<str>) -> Self {
        Self {
            object_id,
            property: Arc::from(property.as_ref()),
        }
    }

    /// Returns the owning object.
    #[must_use]
    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    /// Returns the relation property name.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }
}

impl fmt::Debug for RelationEndPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelationEndPointId({}/{})", self.object_id, self.property)
    }
}

impl fmt::Display for RelationEndPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.object_id, self.property)
    }
}
