//! PostgreSQL backend for the career store.
//!
//! Shares the [`CareerStore`](careers_core::store::CareerStore) contract with
//! the SQLite backend; the binary picks one at startup from its configuration.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::PostgresStore;
