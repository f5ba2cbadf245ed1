//! Relation and property modification commands.
//!
//! Every modification is planned as a [`Command`] before anything changes.
//! A command is a flat list of steps: all "changing" notifications first,
//! then all mutations, then all "changed" notifications. A listener that
//! vetoes a changing notification therefore aborts the command before any
//! state was touched.
//!
//! Bidirectional modifications expand to one part per affected end point.
//! Setting `order.OrderTicket = new_ticket` touches up to four end points:
//! the order, the new ticket, the ticket's previous order and the order's
//! previous ticket.

mod execute;
mod factory;

pub(crate) use execute::execute;
pub(crate) use factory::CommandFactory;

use crate::endpoint::RelationEndPointId;
use crate::object::{DomainObject, ObjectId};
use crate::value::Value;

/// A pending or completed property value change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChange {
    /// The modified object.
    pub object: DomainObject,
    /// The property name.
    pub property: String,
    /// Value before the change.
    pub old_value: Value,
    /// Value after the change.
    pub new_value: Value,
}

/// A pending or completed change of one relation end point.
///
/// For single-valued end points `old` and `new` are the previous and next
/// opposite objects. For collection end points `old` is the removed member
/// and `new` the added one; replacing all members reports neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationChange {
    /// The changing end point.
    pub end_point: RelationEndPointId,
    /// The end point's owner.
    pub object: DomainObject,
    /// Opposite object or member leaving the end point.
    pub old: Option<DomainObject>,
    /// Opposite object or member entering the end point.
    pub new: Option<DomainObject>,
}

/// An observable event announced before and after a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A property value changes.
    PropertyValue(PropertyChange),
    /// A relation end point changes.
    Relation(RelationChange),
    /// An object is deleted.
    Deletion(DomainObject),
}

/// A single state change applied to the data manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Assigns a property value.
    SetValue {
        /// Target object.
        object: ObjectId,
        /// Property name.
        property: String,
        /// New value.
        value: Value,
    },
    /// Assigns the opposite of a single-valued end point.
    SetRelated {
        /// Target end point.
        end_point: RelationEndPointId,
        /// New opposite.
        value: Option<ObjectId>,
    },
    /// Inserts a collection member.
    InsertItem {
        /// Target end point.
        end_point: RelationEndPointId,
        /// Insert position.
        index: usize,
        /// New member.
        item: DomainObject,
    },
    /// Removes a collection member.
    RemoveItem {
        /// Target end point.
        end_point: RelationEndPointId,
        /// Member to remove.
        item: ObjectId,
    },
    /// Replaces the member at a position.
    ReplaceItem {
        /// Target end point.
        end_point: RelationEndPointId,
        /// Position to replace.
        index: usize,
        /// Incoming member.
        item: DomainObject,
    },
    /// Replaces all members.
    SetItems {
        /// Target end point.
        end_point: RelationEndPointId,
        /// New members in order.
        items: Vec<DomainObject>,
    },
    /// Marks an object deleted, or discards it if it is new.
    MarkDeleted {
        /// Target object.
        object: ObjectId,
    },
}

/// One step of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStep {
    /// Announce an upcoming change; observers may veto.
    Changing(Notification),
    /// Apply a change.
    Mutate(Mutation),
    /// Announce a completed change.
    Changed(Notification),
}

/// A planned modification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    steps: Vec<CommandStep>,
}

impl Command {
    /// Returns the steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[CommandStep] {
        &self.steps
    }

    /// Returns true if executing the command does nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the mutations in execution order.
    pub fn mutations(&self) -> impl Iterator<Item = &Mutation> {
        self.steps.iter().filter_map(|step| match step {
            CommandStep::Mutate(m) => Some(m),
            _ => None,
        })
    }
}

/// Accumulates command parts and lays them out as
/// changing, mutate, changed.
#[derive(Debug, Default)]
pub(crate) struct CommandBuilder {
    outer: Option<Notification>,
    parts: Vec<(Notification, Mutation)>,
    trailing: Vec<Mutation>,
}

impl CommandBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Brackets the whole command with `notification`.
    pub(crate) fn outer(&mut self, notification: Notification) {
        self.outer = Some(notification);
    }

    pub(crate) fn part(&mut self, notification: Notification, mutation: Mutation) {
        self.parts.push((notification, mutation));
    }

    /// Adds a mutation applied after all part mutations, without its own
    /// notification.
    pub(crate) fn trailing(&mut self, mutation: Mutation) {
        self.trailing.push(mutation);
    }

    pub(crate) fn relation(
        &mut self,
        end_point: RelationEndPointId,
        object: DomainObject,
        old: Option<DomainObject>,
        new: Option<DomainObject>,
        mutation: Mutation,
    ) {
        self.part(
            Notification::Relation(RelationChange {
                end_point,
                object,
                old,
                new,
            }),
            mutation,
        );
    }

    pub(crate) fn build(self) -> Command {
        let mut steps = Vec::with_capacity(3 * self.parts.len() + self.trailing.len() + 2);
        if let Some(outer) = &self.outer {
            steps.push(CommandStep::Changing(outer.clone()));
        }
        steps.extend(
            self.parts
                .iter()
                .map(|(n, _)| CommandStep::Changing(n.clone())),
        );
        let mut changed = Vec::with_capacity(self.parts.len());
        for (notification, mutation) in self.parts {
            steps.push(CommandStep::Mutate(mutation));
            changed.push(CommandStep::Changed(notification));
        }
        steps.extend(self.trailing.into_iter().map(CommandStep::Mutate));
        steps.extend(changed);
        if let Some(outer) = self.outer {
            steps.push(CommandStep::Changed(outer));
        }
        Command { steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionId;

    fn object(class: &str) -> DomainObject {
        DomainObject::new(ObjectId::new(class), TransactionId::new(1))
    }

    #[test]
    fn builder_orders_phases() {
        let order = object("Order");
        let ticket = object("OrderTicket");
        let mut builder = CommandBuilder::new();
        builder.outer(Notification::Deletion(order.clone()));
        for owner in [&order, &ticket] {
            let end_point = RelationEndPointId::new(owner.id().clone(), "Other");
            builder.relation(
                end_point.clone(),
                owner.clone(),
                None,
                None,
                Mutation::SetRelated {
                    end_point,
                    value: None,
                },
            );
        }
        builder.trailing(Mutation::MarkDeleted {
            object: order.id().clone(),
        });
        let command = builder.build();

        let kinds: Vec<&str> = command
            .steps()
            .iter()
            .map(|s| match s {
                CommandStep::Changing(Notification::Deletion(_)) => "deleting",
                CommandStep::Changing(_) => "changing",
                CommandStep::Mutate(Mutation::MarkDeleted { .. }) => "mark",
                CommandStep::Mutate(_) => "mutate",
                CommandStep::Changed(Notification::Deletion(_)) => "deleted",
                CommandStep::Changed(_) => "changed",
            })
            .collect();
        assert_eq!(
            kinds,
            [
                "deleting", "changing", "changing", "mutate", "mutate", "mark", "changed",
                "changed", "deleted"
            ]
        );
        assert_eq!(command.mutations().count(), 3);
    }

    #[test]
    fn empty_builder_builds_empty_command() {
        assert!(CommandBuilder::new().build().is_empty());
    }
}
