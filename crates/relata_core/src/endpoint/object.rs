use super::RelationEndPointId;
use crate::data::DataContainer;
use crate::error::{CoreError, CoreResult};
use crate::mapping::RelationEndPointDefinition;
use crate::object::ObjectId;
use crate::value::Value;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct VirtualOpposite {
    current: Option<ObjectId>,
    original: Option<ObjectId>,
    touched: bool,
}

#[derive(Debug, Clone)]
enum Storage {
    /// The opposite ID is the owner's foreign-key property.
    ForeignKey,
    /// The opposite ID is held here; `None` until loaded.
    Virtual(Option<VirtualOpposite>),
}

/// An end point referring to at most one object.
#[derive(Debug, Clone)]
pub struct ObjectEndPoint {
    id: RelationEndPointId,
    definition: Arc<RelationEndPointDefinition>,
    storage: Storage,
}

impl ObjectEndPoint {
    /// Creates an end point backed by the owner's foreign key.
    pub(crate) fn foreign_key(id: RelationEndPointId, definition: Arc<RelationEndPointDefinition>) -> Self {
        Self {
            id,
            definition,
            storage: Storage::ForeignKey,
        }
    }

    /// Creates a virtual end point whose opposite is fetched lazily.
    pub(crate) fn virtual_unloaded(
        id: RelationEndPointId,
        definition: Arc<RelationEndPointDefinition>,
    ) -> Self {
        Self {
            id,
            definition,
            storage: Storage::Virtual(None),
        }
    }

    /// Creates a virtual end point known to be empty, for new objects.
    pub(crate) fn virtual_empty(id: RelationEndPointId, definition: Arc<RelationEndPointDefinition>) -> Self {
        let mut end_point = Self::virtual_unloaded(id, definition);
        end_point.mark_loaded(None);
        end_point
    }

    /// Returns the end point ID.
    #[must_use]
    pub fn id(&self) -> &RelationEndPointId {
        &self.id
    }

    /// Returns the definition.
    #[must_use]
    pub fn definition(&self) -> &Arc<RelationEndPointDefinition> {
        &self.definition
    }

    /// Returns true if the end point has no foreign key of its own.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        matches!(self.storage, Storage::Virtual(_))
    }

    /// Returns true if the opposite ID is known.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        !matches!(self.storage, Storage::Virtual(None))
    }

    pub(crate) fn mark_loaded(&mut self, opposite: Option<ObjectId>) {
        if let Storage::Virtual(state @ None) = &mut self.storage {
            *state = Some(VirtualOpposite {
                current: opposite.clone(),
                original: opposite,
                touched: false,
            });
        }
    }

    fn loaded(&self) -> CoreResult<&VirtualOpposite> {
        match &self.storage {
            Storage::Virtual(Some(state)) => Ok(state),
            _ => Err(CoreError::invalid_operation(format!(
                "end point {} is not loaded",
                self.id
            ))),
        }
    }

    fn foreign_key_value(&self, value: &Value) -> Option<ObjectId> {
        value.as_object_id().cloned()
    }

    /// Returns the current opposite ID. `container` is the owner's container.
    pub fn opposite_id(&self, container: &DataContainer) -> CoreResult<Option<ObjectId>> {
        match &self.storage {
            Storage::ForeignKey => Ok(self.foreign_key_value(container.value(self.id.property())?)),
            Storage::Virtual(_) => Ok(self.loaded()?.current.clone()),
        }
    }

    /// Returns the opposite ID as of the last load or commit.
    pub fn original_opposite_id(&self, container: &DataContainer) -> CoreResult<Option<ObjectId>> {
        match &self.storage {
            Storage::ForeignKey => Ok(self.foreign_key_value(
                container.original_value(self.id.property())?,
            )),
            Storage::Virtual(_) => Ok(self.loaded()?.original.clone()),
        }
    }

    /// Returns true if the opposite changed since the last load or commit.
    #[must_use]
    pub fn has_changed(&self, container: &DataContainer) -> bool {
        match &self.storage {
            Storage::ForeignKey => container
                .property_value(self.id.property())
                .map_or(false, |v| v.has_changed()),
            Storage::Virtual(Some(state)) => state.current != state.original,
            Storage::Virtual(None) => false,
        }
    }

    /// Returns true if the opposite was assigned since the last commit.
    #[must_use]
    pub fn has_been_touched(&self, container: &DataContainer) -> bool {
        match &self.storage {
            Storage::ForeignKey => container
                .property_value(self.id.property())
                .map_or(false, |v| v.has_been_touched()),
            Storage::Virtual(Some(state)) => state.touched,
            Storage::Virtual(None) => false,
        }
    }

    /// Assigns the opposite ID, writing the foreign key for non-virtual end points.
    pub(crate) fn set_opposite(
        &mut self,
        container: &mut DataContainer,
        opposite: Option<ObjectId>,
    ) -> CoreResult<()> {
        match &mut self.storage {
            Storage::ForeignKey => container.set_value(self.id.property(), Value::from(opposite)),
            Storage::Virtual(Some(state)) => {
                state.current = opposite;
                state.touched = true;
                Ok(())
            }
            Storage::Virtual(None) => Err(CoreError::invalid_operation(format!(
                "end point {} is not loaded",
                self.id
            ))),
        }
    }

    /// Copies a virtual opposite committed by a sub-transaction.
    pub(crate) fn assign_from_sub_transaction(&mut self, opposite: Option<ObjectId>) {
        match &mut self.storage {
            Storage::Virtual(Some(state)) => {
                if state.current != opposite {
                    state.current = opposite;
                    state.touched = true;
                }
            }
            Storage::Virtual(state @ None) => {
                *state = Some(VirtualOpposite {
                    current: opposite,
                    original: None,
                    touched: true,
                });
            }
            Storage::ForeignKey => {}
        }
    }

    pub(crate) fn commit(&mut self) {
        if let Storage::Virtual(Some(state)) = &mut self.storage {
            state.original = state.current.clone();
            state.touched = false;
        }
    }

    pub(crate) fn rollback(&mut self) {
        if let Storage::Virtual(Some(state)) = &mut self.storage {
            state.current = state.original.clone();
            state.touched = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{ClassBuilder, MappingBuilder, RelationBuilder};
    use crate::object::ClassId;

    fn fixture() -> (DataContainer, Arc<RelationEndPointDefinition>, Arc<RelationEndPointDefinition>) {
        let mapping = MappingBuilder::new()
            .class(ClassBuilder::new("Order"))
            .class(ClassBuilder::new("OrderTicket"))
            .relation(RelationBuilder::one_to_one(
                "Order",
                "OrderTicket",
                "OrderTicket",
                "Order",
            ))
            .build()
            .unwrap();
        let ticket_class = Arc::clone(mapping.class(&ClassId::new("OrderTicket")).unwrap());
        let real = Arc::clone(ticket_class.end_point("Order").unwrap());
        let virtual_side = Arc::clone(
            mapping
                .class(&ClassId::new("Order"))
                .unwrap()
                .end_point("OrderTicket")
                .unwrap(),
        );
        let ticket = DataContainer::existing(ObjectId::new("OrderTicket"), ticket_class, None, &[])
            .unwrap();
        (ticket, real, virtual_side)
    }

    #[test]
    fn foreign_key_end_point_writes_container() {
        let (mut ticket, real, _) = fixture();
        let mut end_point =
            ObjectEndPoint::foreign_key(RelationEndPointId::new(ticket.id().clone(), "Order"), real);
        let order = ObjectId::new("Order");
        end_point
            .set_opposite(&mut ticket, Some(order.clone()))
            .unwrap();
        assert_eq!(end_point.opposite_id(&ticket).unwrap(), Some(order.clone()));
        assert_eq!(ticket.value("Order").unwrap(), &Value::Object(order));
        assert!(end_point.has_changed(&ticket));
        assert_eq!(end_point.original_opposite_id(&ticket).unwrap(), None);
    }

    #[test]
    fn virtual_end_point_requires_loading() {
        let (ticket, _, virtual_side) = fixture();
        let order = ObjectId::new("Order");
        let mut end_point =
            ObjectEndPoint::virtual_unloaded(RelationEndPointId::new(order, "OrderTicket"), virtual_side);
        assert!(!end_point.is_loaded());
        assert!(end_point.opposite_id(&ticket).is_err());
        end_point.mark_loaded(Some(ticket.id().clone()));
        assert_eq!(end_point.opposite_id(&ticket).unwrap(), Some(ticket.id().clone()));
    }

    #[test]
    fn virtual_rollback_and_commit() {
        let (mut ticket, _, virtual_side) = fixture();
        let mut end_point = ObjectEndPoint::virtual_empty(
            RelationEndPointId::new(ObjectId::new("Order"), "OrderTicket"),
            virtual_side,
        );
        end_point
            .set_opposite(&mut ticket, Some(ObjectId::new("OrderTicket")))
            .unwrap();
        assert!(end_point.has_changed(&ticket));
        end_point.rollback();
        assert!(!end_point.has_changed(&ticket));
        assert_eq!(end_point.opposite_id(&ticket).unwrap(), None);

        let other = ObjectId::new("OrderTicket");
        end_point.set_opposite(&mut ticket, Some(other.clone())).unwrap();
        end_point.commit();
        assert!(!end_point.has_changed(&ticket));
        assert_eq!(end_point.original_opposite_id(&ticket).unwrap(), Some(other));
    }
}
