//! Storage collaborator boundary
//!
//! [`AccessStore`] is the request/response surface the core consumes.
//! [`SqliteStore`] implements it on a local SQLite file for self-hosted
//! deployments and tests.

mod database;
mod sqlite;
mod store;

pub use database::{Database, SharedDatabase};
pub use sqlite::SqliteStore;
pub use store::AccessStore;
