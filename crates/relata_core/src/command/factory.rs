use super::{Command, CommandBuilder, Mutation, Notification, PropertyChange};
use crate::data_manager::DataManager;
use crate::endpoint::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::mapping::{Cardinality, RelationEndPointDefinition};
use crate::object::{DomainObject, ObjectId};
use crate::transaction::EventDispatcher;
use crate::value::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Plans commands against the current state of a data manager.
///
/// Planning may load objects and end points but never modifies tracked
/// state; the returned command does that when executed.
pub(crate) struct CommandFactory<'a> {
    data: &'a mut DataManager,
    events: &'a mut EventDispatcher,
}

impl<'a> CommandFactory<'a> {
    pub(crate) fn new(data: &'a mut DataManager, events: &'a mut EventDispatcher) -> Self {
        Self { data, events }
    }

    /// Checks hierarchy and lifecycle of an object taking part in a command.
    fn check_live(&mut self, object: &DomainObject) -> CoreResult<()> {
        self.data.check_hierarchy(object)?;
        self.data.get_or_load_live(object.id(), self.events)?;
        Ok(())
    }

    fn definition(&mut self, end_point: &RelationEndPointId) -> CoreResult<Arc<RelationEndPointDefinition>> {
        self.data.end_point_definition(end_point, self.events)
    }

    fn check_assignable(&self, definition: &RelationEndPointDefinition, object: &DomainObject) -> CoreResult<()> {
        if self
            .data
            .mapping()
            .is_assignable(object.class_id(), definition.opposite_class())
        {
            return Ok(());
        }
        Err(CoreError::invalid_argument(format!(
            "{} cannot be used for {}.{}, which requires {}",
            object.id(),
            definition.class_id(),
            definition.property_name(),
            definition.opposite_class()
        )))
    }

    fn opposite_definition(
        &self,
        definition: &RelationEndPointDefinition,
    ) -> CoreResult<Option<Arc<RelationEndPointDefinition>>> {
        Ok(self.data.mapping().opposite(definition)?.cloned())
    }

    fn related(&mut self, end_point: &RelationEndPointId) -> CoreResult<Option<DomainObject>> {
        Ok(self
            .data
            .related_id(end_point, self.events)?
            .map(|id| self.data.domain_object(id)))
    }

    fn collection_index_of(&mut self, end_point: &RelationEndPointId, id: &ObjectId) -> CoreResult<Option<usize>> {
        self.data
            .read_collection(end_point, self.events, |d| d.index_of(id))
    }

    fn collection_count(&mut self, end_point: &RelationEndPointId) -> CoreResult<usize> {
        self.data.read_collection(end_point, self.events, |d| d.count())
    }

    fn set_part(
        builder: &mut CommandBuilder,
        end_point: RelationEndPointId,
        owner: DomainObject,
        old: Option<DomainObject>,
        new: Option<DomainObject>,
    ) {
        let value = new.as_ref().map(|o| o.id().clone());
        builder.relation(
            end_point.clone(),
            owner,
            old,
            new,
            Mutation::SetRelated { end_point, value },
        );
    }

    fn insert_part(builder: &mut CommandBuilder, end_point: RelationEndPointId, owner: DomainObject, index: usize, item: DomainObject) {
        builder.relation(
            end_point.clone(),
            owner,
            None,
            Some(item.clone()),
            Mutation::InsertItem {
                end_point,
                index,
                item,
            },
        );
    }

    fn remove_part(builder: &mut CommandBuilder, end_point: RelationEndPointId, owner: DomainObject, item: DomainObject) {
        let id = item.id().clone();
        builder.relation(
            end_point.clone(),
            owner,
            Some(item),
            None,
            Mutation::RemoveItem { end_point, item: id },
        );
    }

    /// Plans a property assignment.
    ///
    /// Assigning the current value yields a command that only marks the
    /// property as touched, without notifications.
    pub(crate) fn set_value(&mut self, object: &DomainObject, property: &str, value: Value) -> CoreResult<Command> {
        self.check_live(object)?;
        let container = self.data.get_or_load(object.id(), self.events)?;
        let current = container.property_value(property)?;
        let definition = current.definition();
        if definition.is_foreign_key() {
            return Err(CoreError::invalid_operation(format!(
                "{property} of {} is a relation; use set_related",
                object.class_id()
            )));
        }
        definition.validate(&value)?;

        let old_value = current.value().clone();
        let mutation = Mutation::SetValue {
            object: object.id().clone(),
            property: property.to_string(),
            value: value.clone(),
        };
        let mut builder = CommandBuilder::new();
        if old_value == value {
            builder.trailing(mutation);
        } else {
            builder.part(
                Notification::PropertyValue(PropertyChange {
                    object: object.clone(),
                    property: property.to_string(),
                    old_value,
                    new_value: value,
                }),
                mutation,
            );
        }
        Ok(builder.build())
    }

    /// Plans `owner.property = new`, keeping every opposite end point
    /// consistent.
    pub(crate) fn set_related(
        &mut self,
        owner: &DomainObject,
        property: &str,
        new: Option<&DomainObject>,
    ) -> CoreResult<Command> {
        self.check_live(owner)?;
        let end_point = RelationEndPointId::new(owner.id().clone(), property);
        let definition = self.definition(&end_point)?;
        if definition.cardinality() == Cardinality::Many {
            return Err(CoreError::invalid_operation(format!(
                "{end_point} is a collection; modify it through its collection"
            )));
        }
        if let Some(new) = new {
            self.check_live(new)?;
            self.check_assignable(&definition, new)?;
        }

        let old = self.related(&end_point)?;
        if old.as_ref().map(DomainObject::id) == new.map(DomainObject::id) {
            return Ok(Command::default());
        }

        let mut builder = CommandBuilder::new();
        Self::set_part(&mut builder, end_point, owner.clone(), old.clone(), new.cloned());

        let Some(opposite) = self.opposite_definition(&definition)? else {
            return Ok(builder.build());
        };
        match opposite.cardinality() {
            Cardinality::One => {
                // old.opposite: owner -> none
                if let Some(old) = &old {
                    let old_end = RelationEndPointId::new(old.id().clone(), opposite.property_name());
                    self.data.ensure_end_point_loaded(&old_end, self.events)?;
                    Self::set_part(&mut builder, old_end, old.clone(), Some(owner.clone()), None);
                }
                if let Some(new) = new {
                    // new.opposite: previous partner -> owner
                    let new_end = RelationEndPointId::new(new.id().clone(), opposite.property_name());
                    let previous = self.related(&new_end)?;
                    Self::set_part(&mut builder, new_end, new.clone(), previous.clone(), Some(owner.clone()));
                    // previous partner: new -> none
                    if let Some(previous) = previous {
                        let previous_end = RelationEndPointId::new(previous.id().clone(), property);
                        self.data.ensure_end_point_loaded(&previous_end, self.events)?;
                        Self::set_part(&mut builder, previous_end, previous, Some(new.clone()), None);
                    }
                }
            }
            Cardinality::Many => {
                if let Some(old) = &old {
                    let old_end = RelationEndPointId::new(old.id().clone(), opposite.property_name());
                    self.data.ensure_end_point_loaded(&old_end, self.events)?;
                    Self::remove_part(&mut builder, old_end, old.clone(), owner.clone());
                }
                if let Some(new) = new {
                    let new_end = RelationEndPointId::new(new.id().clone(), opposite.property_name());
                    let index = self.collection_count(&new_end)?;
                    Self::insert_part(&mut builder, new_end, new.clone(), index, owner.clone());
                }
            }
        }
        Ok(builder.build())
    }

    fn collection_definition(&mut self, end_point: &RelationEndPointId) -> CoreResult<Arc<RelationEndPointDefinition>> {
        let definition = self.definition(end_point)?;
        if definition.cardinality() != Cardinality::Many {
            return Err(CoreError::invalid_operation(format!(
                "{end_point} is not a collection"
            )));
        }
        Ok(definition)
    }

    fn many_side(&self, definition: &RelationEndPointDefinition) -> CoreResult<Arc<RelationEndPointDefinition>> {
        self.opposite_definition(definition)?.ok_or_else(|| {
            CoreError::mapping(format!(
                "collection {}.{} has no opposite",
                definition.class_id(),
                definition.property_name()
            ))
        })
    }

    /// Plans inserting `item` into a collection end point at `index`.
    ///
    /// The item leaves its previous owner's collection and its foreign key
    /// is pointed at the new owner.
    pub(crate) fn insert(
        &mut self,
        end_point: &RelationEndPointId,
        index: usize,
        item: &DomainObject,
    ) -> CoreResult<Command> {
        let owner = self.data.domain_object(end_point.object_id().clone());
        self.check_live(&owner)?;
        let definition = self.collection_definition(end_point)?;
        self.check_live(item)?;
        self.check_assignable(&definition, item)?;
        let count = self.collection_count(end_point)?;
        if index > count {
            return Err(CoreError::invalid_argument(format!(
                "index {index} is out of range for {end_point} with {count} element(s)"
            )));
        }
        if self.collection_index_of(end_point, item.id())?.is_some() {
            return Err(CoreError::invalid_argument(format!(
                "{} is already a member of {end_point}",
                item.id()
            )));
        }

        let opposite = self.many_side(&definition)?;
        let item_end = RelationEndPointId::new(item.id().clone(), opposite.property_name());
        let previous = self.related(&item_end)?;

        let mut builder = CommandBuilder::new();
        Self::insert_part(&mut builder, end_point.clone(), owner.clone(), index, item.clone());
        Self::set_part(&mut builder, item_end, item.clone(), previous.clone(), Some(owner));
        if let Some(previous) = previous {
            let previous_end = RelationEndPointId::new(previous.id().clone(), end_point.property());
            self.data.ensure_end_point_loaded(&previous_end, self.events)?;
            Self::remove_part(&mut builder, previous_end, previous, item.clone());
        }
        Ok(builder.build())
    }

    /// Plans removing `item` from a collection end point. Returns an empty
    /// command if it is not a member.
    pub(crate) fn remove(&mut self, end_point: &RelationEndPointId, item: &DomainObject) -> CoreResult<Command> {
        let owner = self.data.domain_object(end_point.object_id().clone());
        self.check_live(&owner)?;
        let definition = self.collection_definition(end_point)?;
        self.data.check_hierarchy(item)?;
        if self.collection_index_of(end_point, item.id())?.is_none() {
            return Ok(Command::default());
        }
        self.check_live(item)?;

        let opposite = self.many_side(&definition)?;
        let item_end = RelationEndPointId::new(item.id().clone(), opposite.property_name());
        self.data.ensure_end_point_loaded(&item_end, self.events)?;

        let mut builder = CommandBuilder::new();
        Self::remove_part(&mut builder, end_point.clone(), owner.clone(), item.clone());
        Self::set_part(&mut builder, item_end, item.clone(), Some(owner), None);
        Ok(builder.build())
    }

    /// Plans replacing the member at `index` by `item`.
    pub(crate) fn replace(
        &mut self,
        end_point: &RelationEndPointId,
        index: usize,
        item: &DomainObject,
    ) -> CoreResult<Command> {
        let owner = self.data.domain_object(end_point.object_id().clone());
        self.check_live(&owner)?;
        let definition = self.collection_definition(end_point)?;
        self.check_live(item)?;
        self.check_assignable(&definition, item)?;

        let replaced = self
            .data
            .read_collection(end_point, self.events, |d| d.get(index))?
            .ok_or_else(|| {
                CoreError::invalid_argument(format!("index {index} is out of range for {end_point}"))
            })?;
        if replaced.id() == item.id() {
            return Ok(Command::default());
        }
        if self.collection_index_of(end_point, item.id())?.is_some() {
            return Err(CoreError::invalid_argument(format!(
                "{} is already a member of {end_point}",
                item.id()
            )));
        }

        let opposite = self.many_side(&definition)?;
        let replaced_end = RelationEndPointId::new(replaced.id().clone(), opposite.property_name());
        self.data.ensure_end_point_loaded(&replaced_end, self.events)?;
        let item_end = RelationEndPointId::new(item.id().clone(), opposite.property_name());
        let previous = self.related(&item_end)?;

        let mut builder = CommandBuilder::new();
        builder.relation(
            end_point.clone(),
            owner.clone(),
            Some(replaced.clone()),
            Some(item.clone()),
            Mutation::ReplaceItem {
                end_point: end_point.clone(),
                index,
                item: item.clone(),
            },
        );
        Self::set_part(&mut builder, replaced_end, replaced, Some(owner.clone()), None);
        Self::set_part(&mut builder, item_end, item.clone(), previous.clone(), Some(owner));
        if let Some(previous) = previous {
            let previous_end = RelationEndPointId::new(previous.id().clone(), end_point.property());
            self.data.ensure_end_point_loaded(&previous_end, self.events)?;
            Self::remove_part(&mut builder, previous_end, previous, item.clone());
        }
        Ok(builder.build())
    }

    /// Plans replacing all members of a collection end point by `items`.
    ///
    /// Members that leave get a null foreign key; members that join leave
    /// their previous owner's collection.
    pub(crate) fn set_items(&mut self, end_point: &RelationEndPointId, items: &[DomainObject]) -> CoreResult<Command> {
        let owner = self.data.domain_object(end_point.object_id().clone());
        self.check_live(&owner)?;
        let definition = self.collection_definition(end_point)?;
        for (position, item) in items.iter().enumerate() {
            self.check_live(item)?;
            self.check_assignable(&definition, item)?;
            if items[..position].iter().any(|o| o.id() == item.id()) {
                return Err(CoreError::invalid_argument(format!(
                    "{} occurs more than once",
                    item.id()
                )));
            }
        }
        let current = self.data.collection_items(end_point, self.events)?;
        let opposite = self.many_side(&definition)?;

        let mut builder = CommandBuilder::new();
        builder.relation(
            end_point.clone(),
            owner.clone(),
            None,
            None,
            Mutation::SetItems {
                end_point: end_point.clone(),
                items: items.to_vec(),
            },
        );
        for leaving in current.iter().filter(|c| !items.iter().any(|i| i.id() == c.id())) {
            let leaving_end = RelationEndPointId::new(leaving.id().clone(), opposite.property_name());
            self.data.ensure_end_point_loaded(&leaving_end, self.events)?;
            Self::set_part(&mut builder, leaving_end, leaving.clone(), Some(owner.clone()), None);
        }
        for joining in items.iter().filter(|i| !current.iter().any(|c| c.id() == i.id())) {
            let joining_end = RelationEndPointId::new(joining.id().clone(), opposite.property_name());
            let previous = self.related(&joining_end)?;
            Self::set_part(&mut builder, joining_end, joining.clone(), previous.clone(), Some(owner.clone()));
            if let Some(previous) = previous {
                let previous_end = RelationEndPointId::new(previous.id().clone(), end_point.property());
                self.data.ensure_end_point_loaded(&previous_end, self.events)?;
                Self::remove_part(&mut builder, previous_end, previous, joining.clone());
            }
        }
        Ok(builder.build())
    }

    /// Plans deleting `object`: every relation it takes part in is cleared
    /// on both sides, then the object is marked deleted.
    ///
    /// Collection end points are planned first. Each end point appears at
    /// most once, so relations from an object to itself are cleared once.
    pub(crate) fn delete(&mut self, object: &DomainObject) -> CoreResult<Command> {
        self.check_live(object)?;
        let class = Arc::clone(
            self.data
                .get_or_load(object.id(), self.events)?
                .class(),
        );
        let (collections, single): (Vec<_>, Vec<_>) =
            class.end_points().iter().partition(|d| d.is_collection());

        let mut builder = CommandBuilder::new();
        builder.outer(Notification::Deletion(object.clone()));
        let mut planned: HashSet<RelationEndPointId> = HashSet::new();

        for definition in collections {
            let Some(opposite) = self.opposite_definition(definition)? else {
                continue;
            };
            let end_point = RelationEndPointId::new(object.id().clone(), definition.property_name());
            let members = self.data.collection_items(&end_point, self.events)?;
            if members.is_empty() {
                continue;
            }
            for member in &members {
                let member_end = RelationEndPointId::new(member.id().clone(), opposite.property_name());
                if !planned.insert(member_end.clone()) {
                    continue;
                }
                self.data.ensure_end_point_loaded(&member_end, self.events)?;
                Self::set_part(&mut builder, member_end, member.clone(), Some(object.clone()), None);
            }
            planned.insert(end_point.clone());
            builder.relation(
                end_point.clone(),
                object.clone(),
                None,
                None,
                Mutation::SetItems {
                    end_point,
                    items: Vec::new(),
                },
            );
        }

        for definition in single {
            let end_point = RelationEndPointId::new(object.id().clone(), definition.property_name());
            if planned.contains(&end_point) {
                continue;
            }
            let Some(related) = self.related(&end_point)? else {
                continue;
            };
            planned.insert(end_point.clone());
            Self::set_part(&mut builder, end_point, object.clone(), Some(related.clone()), None);
            let Some(opposite) = self.opposite_definition(definition)? else {
                continue;
            };
            let related_end = RelationEndPointId::new(related.id().clone(), opposite.property_name());
            if !planned.insert(related_end.clone()) {
                continue;
            }
            self.data.ensure_end_point_loaded(&related_end, self.events)?;
            match opposite.cardinality() {
                Cardinality::One => {
                    Self::set_part(&mut builder, related_end, related, Some(object.clone()), None);
                }
                Cardinality::Many => {
                    Self::remove_part(&mut builder, related_end, related, object.clone());
                }
            }
        }
        builder.trailing(Mutation::MarkDeleted {
            object: object.id().clone(),
        });
        Ok(builder.build())
    }
}
