use super::{Command, CommandStep, Notification};
use crate::data_manager::DataManager;
use crate::error::CoreResult;
use crate::transaction::{EventDispatcher, TransactionView};
use tracing::trace;

/// Runs a command: changing notifications, mutations, changed notifications.
///
/// A veto during the changing phase returns the error before any mutation
/// ran.
pub(crate) fn execute(command: &Command, data: &mut DataManager, events: &mut EventDispatcher) -> CoreResult<()> {
    if command.is_empty() {
        return Ok(());
    }
    trace!(tx = %data.transaction_id(), steps = command.steps().len(), "executing command");
    for step in command.steps() {
        match step {
            CommandStep::Changing(notification) => changing(notification, data, events)?,
            CommandStep::Mutate(mutation) => data.apply(mutation)?,
            CommandStep::Changed(notification) => changed(notification, data, events),
        }
    }
    Ok(())
}

fn changing(notification: &Notification, data: &DataManager, events: &mut EventDispatcher) -> CoreResult<()> {
    let view = TransactionView::new(data);
    match notification {
        Notification::PropertyValue(change) => events.notify(|l| l.property_value_changing(&view, change)),
        Notification::Deletion(object) => events.notify(|l| l.object_deleting(&view, object)),
        Notification::Relation(change) => {
            events.notify(|l| l.relation_changing(&view, change))?;
            if let Some(handle) = data.existing_collection_handle(&change.end_point) {
                if let Some(old) = &change.old {
                    handle.events().begin_remove(old)?;
                }
                if let Some(new) = &change.new {
                    handle.events().begin_add(new)?;
                }
            }
            Ok(())
        }
    }
}

fn changed(notification: &Notification, data: &DataManager, events: &mut EventDispatcher) {
    let view = TransactionView::new(data);
    match notification {
        Notification::PropertyValue(change) => events.broadcast(|l| l.property_value_changed(&view, change)),
        Notification::Deletion(object) => events.broadcast(|l| l.object_deleted(&view, object)),
        Notification::Relation(change) => {
            if let Some(handle) = data.existing_collection_handle(&change.end_point) {
                if let Some(old) = &change.old {
                    handle.events().end_remove(old);
                }
                if let Some(new) = &change.new {
                    handle.events().end_add(new);
                }
            }
            events.broadcast(|l| l.relation_changed(&view, change));
        }
    }
}
