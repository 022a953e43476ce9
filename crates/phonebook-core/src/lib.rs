//! phonebook-core - Core library for the phonebook client
//!
//! This crate contains the contact models, the merge rules, the local store,
//! the backend transports, and the offline-first sync engine shared by every
//! phonebook front end.

pub mod backend;
pub mod config;
pub mod error;
pub mod merge;
pub mod models;
pub mod store;
pub mod sync;
pub mod util;
pub mod view_model;

#[cfg(test)]
mod testing;

pub use backend::{BackendError, ContactsBackend, GraphQlBackend, HttpBackend, RestBackend};
pub use config::{ClientConfig, Transport};
pub use error::{Error, Result};
pub use models::{Contact, ContactEntry, ContactRef, PendingContact, Preferences};
pub use store::{KeyValueStore, LibSqlStore, LocalStore, MemoryStore};
pub use sync::SyncEngine;
pub use view_model::{ContactListState, ContactsViewModel};
