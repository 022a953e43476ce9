//! Typed collections persisted as JSON through a [`KeyValueStore`].

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::KeyValueStore;
use crate::error::Result;
use crate::models::{
    Contact, ContactEntry, ContactRef, PendingContact, Preferences, ServerId, SortField,
    SortOrder,
};

/// Persisted key names
pub mod keys {
    pub const PENDING_CONTACTS: &str = "pendingContacts";
    pub const CACHED_CONTACTS: &str = "cachedContacts";
    pub const REMAINING_OFFLINE_CONTACTS: &str = "remainingOfflineContacts";
    pub const SEARCH: &str = "contactSearch";
    pub const SORT_BY: &str = "contactSortBy";
    pub const SORT_ORDER: &str = "contactSortOrder";
    pub const SEARCH_ACTIVE: &str = "searchActive";
    pub const OFFLINE: &str = "isOffline";
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Pending, cached, and preference collections over a raw key-value store.
///
/// Each read-modify-write helper reads the current value right before
/// writing it back, with no other suspension point in between.
pub struct LocalStore<S> {
    inner: S,
}

impl<S: KeyValueStore> LocalStore<S> {
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Underlying key-value store
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    async fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let Some(raw) = self.inner.get(key).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(items) => Ok(items),
            Err(error) => {
                tracing::warn!("Discarding unreadable local data under '{}': {}", key, error);
                Ok(Vec::new())
            }
        }
    }

    async fn write_list<T: Serialize>(&self, key: &str, items: &[T]) -> Result<()> {
        if items.is_empty() {
            return self.inner.remove(key).await;
        }
        let raw = serde_json::to_string(items)?;
        self.inner.set(key, &raw).await
    }

    /// Unsynced local mutations, in queue order
    pub async fn pending(&self) -> Result<Vec<PendingContact>> {
        self.read_list(keys::PENDING_CONTACTS).await
    }

    pub async fn save_pending(&self, pending: &[PendingContact]) -> Result<()> {
        self.write_list(keys::PENDING_CONTACTS, pending).await
    }

    /// Store `entry`, replacing any queued entry with the same id in place.
    pub async fn upsert_pending(&self, entry: PendingContact) -> Result<()> {
        let mut pending = self.pending().await?;
        if let Some(existing) = pending.iter_mut().find(|item| item.id == entry.id) {
            *existing = entry;
        } else {
            pending.push(entry);
        }
        self.save_pending(&pending).await
    }

    pub async fn find_pending(&self, id: &ContactRef) -> Result<Option<PendingContact>> {
        Ok(self.pending().await?.into_iter().find(|item| &item.id == id))
    }

    pub async fn remove_pending(&self, id: &ContactRef) -> Result<Option<PendingContact>> {
        let mut pending = self.pending().await?;
        let Some(index) = pending.iter().position(|item| &item.id == id) else {
            return Ok(None);
        };
        let removed = pending.remove(index);
        self.save_pending(&pending).await?;
        Ok(Some(removed))
    }

    /// Last-known server contacts
    pub async fn cached(&self) -> Result<Vec<Contact>> {
        self.read_list(keys::CACHED_CONTACTS).await
    }

    pub async fn save_cached(&self, contacts: &[Contact]) -> Result<()> {
        self.write_list(keys::CACHED_CONTACTS, contacts).await
    }

    /// Replace cached contacts by id, appending unknown ones.
    pub async fn upsert_cached(&self, contacts: &[Contact]) -> Result<()> {
        if contacts.is_empty() {
            return Ok(());
        }
        let mut cached = self.cached().await?;
        for contact in contacts {
            if let Some(existing) = cached.iter_mut().find(|item| item.id == contact.id) {
                existing.clone_from(contact);
            } else {
                cached.push(contact.clone());
            }
        }
        self.save_cached(&cached).await
    }

    pub async fn find_cached(&self, id: &ServerId) -> Result<Option<Contact>> {
        Ok(self.cached().await?.into_iter().find(|item| &item.id == id))
    }

    pub async fn remove_cached(&self, id: &ServerId) -> Result<Option<Contact>> {
        let mut cached = self.cached().await?;
        let Some(index) = cached.iter().position(|item| &item.id == id) else {
            return Ok(None);
        };
        let removed = cached.remove(index);
        self.save_cached(&cached).await?;
        Ok(Some(removed))
    }

    /// Offline pagination continuation
    pub async fn remaining_offline(&self) -> Result<Vec<ContactEntry>> {
        self.read_list(keys::REMAINING_OFFLINE_CONTACTS).await
    }

    pub async fn save_remaining_offline(&self, remaining: &[ContactEntry]) -> Result<()> {
        self.write_list(keys::REMAINING_OFFLINE_CONTACTS, remaining)
            .await
    }

    pub async fn clear_remaining_offline(&self) -> Result<()> {
        self.inner.remove(keys::REMAINING_OFFLINE_CONTACTS).await
    }

    /// Whether the last backend call of any session failed transiently
    pub async fn load_offline(&self) -> Result<bool> {
        Ok(self
            .inner
            .get(keys::OFFLINE)
            .await?
            .is_some_and(|value| parse_flag(&value)))
    }

    pub async fn save_offline(&self, offline: bool) -> Result<()> {
        self.inner
            .set(keys::OFFLINE, if offline { "true" } else { "false" })
            .await
    }

    /// Load list preferences, falling back to defaults for missing values
    pub async fn load_preferences(&self) -> Result<Preferences> {
        let mut prefs = Preferences::default();

        let search_active = self
            .inner
            .get(keys::SEARCH_ACTIVE)
            .await?
            .is_some_and(|value| parse_flag(&value));
        if search_active {
            if let Some(search) = self.inner.get(keys::SEARCH).await? {
                prefs.search = search;
            }
        }

        if let Some(sort_by) = self.inner.get(keys::SORT_BY).await? {
            prefs.sort_by = SortField::from(sort_by);
        }

        if let Some(sort_order) = self.inner.get(keys::SORT_ORDER).await? {
            prefs.sort_order = sort_order.parse::<SortOrder>().unwrap_or_else(|error| {
                tracing::warn!("Ignoring stored sort order: {}", error);
                SortOrder::default()
            });
        }

        Ok(prefs)
    }

    /// Save list preferences
    pub async fn save_preferences(&self, prefs: &Preferences) -> Result<()> {
        if prefs.search_active() {
            self.inner.set(keys::SEARCH, prefs.search.trim()).await?;
            self.inner.set(keys::SEARCH_ACTIVE, "true").await?;
        } else {
            self.inner.remove(keys::SEARCH).await?;
            self.inner.set(keys::SEARCH_ACTIVE, "false").await?;
        }
        self.inner.set(keys::SORT_BY, prefs.sort_by.as_str()).await?;
        self.inner
            .set(keys::SORT_ORDER, prefs.sort_order.as_str())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactDraft, PendingStatus};
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn contact(id: &str, name: &str) -> Contact {
        Contact {
            id: ServerId::new(id),
            name: name.to_string(),
            phone: "100".to_string(),
            photo: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn upsert_pending_supersedes_same_id() {
        let store = LocalStore::new(MemoryStore::new());
        let mut entry = PendingContact::created(&ContactDraft::new("Amy", "222"));
        store.upsert_pending(entry.clone()).await.unwrap();

        entry.name = "Amy B".to_string();
        store.upsert_pending(entry.clone()).await.unwrap();

        assert_eq!(store.pending().await.unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn remove_pending_clears_key_when_empty() {
        let memory = MemoryStore::new();
        let store = LocalStore::new(memory.clone());
        let entry = PendingContact::for_contact(&contact("2", "Bob"), PendingStatus::Deleted);
        store.upsert_pending(entry.clone()).await.unwrap();

        let removed = store.remove_pending(&entry.id).await.unwrap();
        assert_eq!(removed, Some(entry));
        assert_eq!(memory.get(keys::PENDING_CONTACTS).await.unwrap(), None);
    }

    #[tokio::test]
    async fn upsert_cached_replaces_and_appends() {
        let store = LocalStore::new(MemoryStore::new());
        store
            .save_cached(&[contact("1", "Amy"), contact("2", "Bob")])
            .await
            .unwrap();
        store
            .upsert_cached(&[contact("2", "Bobby"), contact("3", "Carl")])
            .await
            .unwrap();

        let names = store
            .cached()
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Amy", "Bobby", "Carl"]);
    }

    #[tokio::test]
    async fn corrupt_json_reads_as_empty() {
        let memory = MemoryStore::new();
        memory.set(keys::CACHED_CONTACTS, "{not json").await.unwrap();
        let store = LocalStore::new(memory);
        assert!(store.cached().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn preferences_roundtrip() {
        let store = LocalStore::new(MemoryStore::new());
        assert_eq!(store.load_preferences().await.unwrap(), Preferences::default());

        let prefs = Preferences {
            search: "john".to_string(),
            sort_by: SortField::Phone,
            sort_order: SortOrder::Desc,
        };
        store.save_preferences(&prefs).await.unwrap();
        assert_eq!(store.load_preferences().await.unwrap(), prefs);
    }

    #[tokio::test]
    async fn offline_flag_defaults_to_online() {
        let memory = MemoryStore::new();
        let store = LocalStore::new(memory.clone());
        assert!(!store.load_offline().await.unwrap());

        store.save_offline(true).await.unwrap();
        assert!(LocalStore::new(memory).load_offline().await.unwrap());
        store.save_offline(false).await.unwrap();
        assert!(!store.load_offline().await.unwrap());
    }

    #[tokio::test]
    async fn inactive_search_is_not_restored() {
        let memory = MemoryStore::new();
        memory.set(keys::SEARCH, "stale").await.unwrap();
        memory.set(keys::SEARCH_ACTIVE, "false").await.unwrap();
        let store = LocalStore::new(memory);
        assert_eq!(store.load_preferences().await.unwrap().search, "");
    }
}
