//! REST resources: a method-dispatching [`Repository`] actor and the
//! [`Reply`] envelope it answers with.

mod reply;
mod repository;

pub use reply::{ErrorBody, Reply};
pub use repository::Repository;
