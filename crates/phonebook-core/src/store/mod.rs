//! Local persistence for pending, cached, and preference data.
//!
//! [`KeyValueStore`] is the raw string key-value collaborator; [`LocalStore`]
//! layers the typed, JSON-encoded collections on top of it.

mod libsql_store;
mod local;
mod memory;
mod migrations;

pub use libsql_store::LibSqlStore;
pub use local::{keys, LocalStore};
pub use memory::MemoryStore;

use crate::error::Result;

/// Trait for string key-value storage (async)
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key` if present
    async fn remove(&self, key: &str) -> Result<()>;
}
