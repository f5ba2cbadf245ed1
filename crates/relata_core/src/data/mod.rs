//! Object data tracking.

mod container;
mod property_value;

pub use container::{DataContainer, ObjectState};
pub use property_value::PropertyValue;
