//! User accounts.
//!
//! Records live in the `users` collection of the store document. The
//! [`UserManager`] owns CRUD and role policy; credentials and sessions are
//! delegated to [`SecurityService`](crate::security::SecurityService).

pub mod errors;
pub mod manager;
pub(crate) mod records;
pub mod types;

pub use errors::UserError;
pub use manager::UserManager;
pub use types::*;
