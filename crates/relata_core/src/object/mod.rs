//! Object identity.

mod domain_object;
mod id;

pub use domain_object::DomainObject;
pub use id::{ClassId, ObjectId};
