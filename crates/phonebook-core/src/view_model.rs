//! Reactive contact list state over a shared sync engine.
//!
//! Front ends hold a [`ContactsViewModel`] handle, call its async operations,
//! and render whatever the watch channel publishes.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::backend::ContactsBackend;
use crate::error::Result;
use crate::merge::{deduplicate_by_id, matches_search, sort_contacts};
use crate::models::{
    AvatarUpload, ContactDraft, ContactEntry, ContactPatch, ContactRef, PendingContact,
    Preferences, SortField, SortOrder,
};
use crate::store::KeyValueStore;
use crate::sync::{DeleteOutcome, FlushReport, LoadOutcome, Resent, SyncEngine};

/// Everything a contact list renders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactListState {
    pub contacts: Vec<ContactEntry>,
    pub loading: bool,
    pub error: Option<String>,
    pub has_more: bool,
    pub page: u32,
    pub total_pages: u32,
    pub preferences: Preferences,
    pub is_offline: bool,
    /// Edited rows that stopped matching the active search
    pub hidden_by_filter: Vec<ContactRef>,
}

impl ContactListState {
    fn apply_load(&mut self, outcome: LoadOutcome) {
        self.contacts = outcome.items;
        self.page = outcome.page;
        self.total_pages = outcome.total_pages;
        self.has_more = outcome.has_more;
        self.is_offline = outcome.offline;
        self.error = None;
        self.hidden_by_filter.clear();
    }

    fn append_page(&mut self, outcome: LoadOutcome) {
        let mut combined = std::mem::take(&mut self.contacts);
        combined.extend(outcome.items);
        let prefs = &self.preferences;
        self.contacts = deduplicate_by_id(combined, &prefs.sort_by, prefs.sort_order);
        self.page = outcome.page;
        self.total_pages = outcome.total_pages;
        self.has_more = outcome.has_more;
        self.is_offline = outcome.offline;
        self.error = None;
    }

    /// Put `entry` in place of any row with the same id, or hide it when it
    /// no longer matches the search.
    fn show(&mut self, entry: ContactEntry) {
        let id = entry.id();
        self.remove(&id);
        if matches_search(&entry, &self.preferences) {
            let mut contacts = std::mem::take(&mut self.contacts);
            contacts.push(entry);
            let prefs = &self.preferences;
            self.contacts = sort_contacts(contacts, &prefs.sort_by, prefs.sort_order);
        } else {
            tracing::debug!("Contact {} no longer matches '{}'", id, self.preferences.search);
            self.hidden_by_filter.push(id);
        }
    }

    fn remove(&mut self, id: &ContactRef) {
        self.contacts.retain(|item| &item.id() != id);
        self.hidden_by_filter.retain(|hidden| hidden != id);
    }
}

/// Clonable handle shared by every view of one contact list.
pub struct ContactsViewModel<B, S> {
    engine: Arc<Mutex<SyncEngine<B, S>>>,
    state: Arc<watch::Sender<ContactListState>>,
}

impl<B, S> Clone for ContactsViewModel<B, S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            state: Arc::clone(&self.state),
        }
    }
}

impl<B: ContactsBackend, S: KeyValueStore> ContactsViewModel<B, S> {
    /// Wrap `engine`, restoring the saved preferences and connectivity.
    /// Nothing is loaded yet.
    pub async fn new(mut engine: SyncEngine<B, S>) -> Result<Self> {
        engine.restore_connectivity().await?;
        let preferences = engine.preferences().await?;
        let (state, _) = watch::channel(ContactListState {
            preferences,
            is_offline: engine.is_offline(),
            ..ContactListState::default()
        });
        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            state: Arc::new(state),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<ContactListState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ContactListState {
        self.state.borrow().clone()
    }

    pub fn preferences(&self) -> Preferences {
        self.state.borrow().preferences.clone()
    }

    /// Look up one contact without touching the list.
    pub async fn find(&self, id: &ContactRef) -> Result<ContactEntry> {
        let mut engine = self.engine.lock().await;
        let found = engine.find(id).await;
        let offline = engine.is_offline();
        self.state.send_modify(|state| state.is_offline = offline);
        found
    }

    /// Changes still waiting for the backend
    pub async fn pending(&self) -> Result<Vec<PendingContact>> {
        self.engine.lock().await.pending().await
    }

    fn fail<T>(&self, error: crate::Error) -> Result<T> {
        let message = error.to_string();
        self.state.send_modify(|state| {
            state.loading = false;
            state.error = Some(message);
        });
        Err(error)
    }

    /// Reload the first page.
    pub async fn refresh(&self) -> Result<()> {
        let mut engine = self.engine.lock().await;
        let prefs = self.preferences();
        self.state.send_modify(|state| state.loading = true);
        match engine.load(&prefs).await {
            Ok(outcome) => {
                self.state.send_modify(|state| {
                    state.apply_load(outcome);
                    state.loading = false;
                });
                Ok(())
            }
            Err(error) => self.fail(error),
        }
    }

    /// Append the next page.
    ///
    /// Returns `false` without doing anything while another load is in
    /// flight or when there is nothing left to load.
    pub async fn load_more(&self) -> Result<bool> {
        let mut next_page = None;
        self.state.send_if_modified(|state| {
            if state.loading || !state.has_more {
                return false;
            }
            state.loading = true;
            next_page = Some(state.page + 1);
            true
        });
        let Some(page) = next_page else {
            return Ok(false);
        };

        let prefs = self.preferences();
        let mut engine = self.engine.lock().await;
        match engine.load_more(&prefs, page).await {
            Ok(outcome) => {
                self.state.send_modify(|state| {
                    if outcome.restarted {
                        state.apply_load(outcome);
                    } else {
                        state.append_page(outcome);
                    }
                    state.loading = false;
                });
                Ok(true)
            }
            Err(error) => self.fail(error),
        }
    }

    /// Change the search term and reload from the first page.
    pub async fn set_search(&self, term: &str) -> Result<()> {
        let mut prefs = self.preferences();
        prefs.search = term.trim().to_string();
        self.reset_with(prefs).await
    }

    /// Change the sort and reload from the first page.
    pub async fn set_sort(&self, field: SortField, order: SortOrder) -> Result<()> {
        let mut prefs = self.preferences();
        prefs.sort_by = field;
        prefs.sort_order = order;
        self.reset_with(prefs).await
    }

    async fn reset_with(&self, prefs: Preferences) -> Result<()> {
        {
            let engine = self.engine.lock().await;
            if let Err(error) = engine.save_preferences(&prefs).await {
                return self.fail(error);
            }
        }
        self.state.send_modify(|state| {
            state.preferences = prefs;
            state.contacts.clear();
            state.page = 0;
            state.total_pages = 0;
            state.has_more = false;
            state.hidden_by_filter.clear();
        });
        self.refresh().await
    }

    pub async fn add(&self, draft: ContactDraft) -> Result<ContactEntry> {
        let mut engine = self.engine.lock().await;
        match engine.add(draft).await {
            Ok(entry) => {
                self.publish(&engine, entry.clone());
                Ok(entry)
            }
            Err(error) => self.fail(error),
        }
    }

    /// Update details, then the avatar when one is given.
    ///
    /// An avatar failure is reported through `error` but the detail update
    /// stands.
    pub async fn edit(
        &self,
        id: &ContactRef,
        patch: ContactPatch,
        avatar: Option<AvatarUpload>,
    ) -> Result<ContactEntry> {
        let mut engine = self.engine.lock().await;
        let mut entry = match engine.update(id, patch).await {
            Ok(entry) => entry,
            Err(error) => return self.fail(error),
        };
        self.publish(&engine, entry.clone());

        if let Some(avatar) = avatar {
            match engine.update_avatar(&entry.id(), avatar).await {
                Ok(updated) => {
                    entry = updated;
                    self.publish(&engine, entry.clone());
                }
                Err(error) => {
                    tracing::warn!("Avatar update for {} failed: {}", entry.id(), error);
                    let message = format!("Contact saved, but the avatar was not: {error}");
                    self.state.send_modify(|state| state.error = Some(message));
                }
            }
        }
        Ok(entry)
    }

    pub async fn update_avatar(&self, id: &ContactRef, avatar: AvatarUpload) -> Result<ContactEntry> {
        let mut engine = self.engine.lock().await;
        match engine.update_avatar(id, avatar).await {
            Ok(entry) => {
                self.publish(&engine, entry.clone());
                Ok(entry)
            }
            Err(error) => self.fail(error),
        }
    }

    pub async fn delete(&self, id: &ContactRef) -> Result<DeleteOutcome> {
        let mut engine = self.engine.lock().await;
        match engine.delete(id).await {
            Ok(outcome) => {
                let offline = engine.is_offline();
                self.state.send_modify(|state| {
                    state.remove(id);
                    state.is_offline = offline;
                    state.error = None;
                });
                Ok(outcome)
            }
            Err(error) => {
                let offline = engine.is_offline();
                self.state.send_modify(|state| state.is_offline = offline);
                self.fail(error)
            }
        }
    }

    /// Retry a queued entry; the confirmed row is marked sent until the next load.
    pub async fn resend(&self, id: &ContactRef) -> Result<Resent> {
        let mut engine = self.engine.lock().await;
        match engine.resend(id).await {
            Ok(resent) => {
                self.state.send_modify(|state| {
                    state.remove(&resent.previous);
                    state.is_offline = false;
                    state.error = None;
                    if let Some(contact) = &resent.contact {
                        state.show(ContactEntry::Pending(PendingContact::confirmed(contact)));
                    }
                });
                Ok(resent)
            }
            Err(error) => {
                let offline = engine.is_offline();
                self.state.send_modify(|state| state.is_offline = offline);
                self.fail(error)
            }
        }
    }

    /// Replay the whole pending queue, then reload.
    pub async fn sync(&self) -> Result<FlushReport> {
        let report = {
            let mut engine = self.engine.lock().await;
            match engine.flush_pending().await {
                Ok(report) => report,
                Err(error) => return self.fail(error),
            }
        };
        self.refresh().await?;
        Ok(report)
    }

    fn publish(&self, engine: &SyncEngine<B, S>, entry: ContactEntry) {
        let offline = engine.is_offline();
        self.state.send_modify(|state| {
            state.show(entry);
            state.is_offline = offline;
            state.error = None;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PendingStatus, ServerId};
    use crate::store::MemoryStore;
    use crate::testing::{contact, FakeBackend};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    async fn view_model(
        backend: &FakeBackend,
        page_size: u32,
    ) -> ContactsViewModel<FakeBackend, MemoryStore> {
        let engine = SyncEngine::new(backend.clone(), MemoryStore::new(), page_size);
        ContactsViewModel::new(engine).await.unwrap()
    }

    fn ids(state: &ContactListState) -> Vec<String> {
        state.contacts.iter().map(|item| item.id().to_string()).collect()
    }

    fn bob_id() -> ContactRef {
        ContactRef::Server(ServerId::new("2"))
    }

    fn rename(name: &str) -> ContactPatch {
        ContactPatch {
            name: Some(name.to_string()),
            ..ContactPatch::default()
        }
    }

    #[tokio::test]
    async fn search_shows_matching_page() {
        let backend = FakeBackend::with_contacts(vec![
            contact("1", "John Doe", "111"),
            contact("2", "Bob", "333"),
        ]);
        let vm = view_model(&backend, 10).await;
        vm.set_search("John").await.unwrap();

        let state = vm.state();
        assert_eq!(ids(&state), vec!["1"]);
        assert!(!state.has_more);
        assert!(!state.loading);
        assert_eq!(state.preferences.search, "John");
    }

    #[tokio::test]
    async fn load_more_appends_without_duplicates() {
        let backend = FakeBackend::with_contacts(
            (1..=5)
                .map(|n| contact(&n.to_string(), &format!("Person {n}"), &n.to_string()))
                .collect(),
        );
        let vm = view_model(&backend, 2).await;
        vm.refresh().await.unwrap();
        while vm.load_more().await.unwrap() {}

        let state = vm.state();
        let unique = ids(&state).into_iter().collect::<HashSet<_>>();
        assert_eq!(state.contacts.len(), 5);
        assert_eq!(unique.len(), 5);
        assert_eq!(state.page, 3);
        assert!(!state.has_more);
    }

    #[tokio::test]
    async fn concurrent_load_more_is_ignored() {
        let backend = FakeBackend::with_contacts(
            (1..=6)
                .map(|n| contact(&n.to_string(), &format!("Person {n}"), &n.to_string()))
                .collect(),
        );
        let vm = view_model(&backend, 2).await;
        vm.refresh().await.unwrap();

        let (first, second) = tokio::join!(vm.load_more(), vm.load_more());
        assert_eq!((first.unwrap(), second.unwrap()), (true, false));
        assert_eq!(vm.state().page, 2);
        assert_eq!(vm.state().contacts.len(), 4);
    }

    #[tokio::test]
    async fn refresh_waiting_for_engine_does_not_claim_loading() {
        let backend = FakeBackend::with_contacts(vec![contact("2", "Bob", "333")]);
        let vm = view_model(&backend, 10).await;

        let guard = vm.engine.lock().await;
        let refresh = vm.refresh();
        tokio::pin!(refresh);
        tokio::select! {
            biased;
            _ = &mut refresh => panic!("refresh finished while the engine was busy"),
            () = tokio::task::yield_now() => {}
        }
        assert!(!vm.state().loading);

        drop(guard);
        refresh.await.unwrap();
        let state = vm.state();
        assert!(!state.loading);
        assert_eq!(ids(&state), vec!["2"]);
    }

    #[tokio::test]
    async fn reconnecting_mid_scroll_restarts_the_list() {
        let backend = FakeBackend::with_contacts(vec![
            contact("2", "Bob", "2"),
            contact("3", "Carl", "3"),
            contact("4", "Dan", "4"),
        ]);
        let vm = view_model(&backend, 2).await;
        vm.refresh().await.unwrap();
        while vm.load_more().await.unwrap() {}

        backend.set_online(false);
        vm.add(ContactDraft::new("Amy", "1")).await.unwrap();
        vm.refresh().await.unwrap();
        assert_eq!(vm.state().contacts.len(), 2);

        backend.set_online(true);
        while vm.load_more().await.unwrap() {}
        let state = vm.state();
        let names = state.contacts.iter().map(ContactEntry::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["Amy", "Bob", "Carl", "Dan"]);
        assert!(!state.has_more);
        assert!(!state.is_offline);
    }

    #[tokio::test]
    async fn new_view_model_starts_with_saved_connectivity() {
        let backend = FakeBackend::with_contacts(vec![contact("2", "Bob", "333")]);
        let store = MemoryStore::new();
        let engine = SyncEngine::new(backend.clone(), store.clone(), 10);
        let vm = ContactsViewModel::new(engine).await.unwrap();
        vm.refresh().await.unwrap();
        backend.set_online(false);
        vm.refresh().await.unwrap();

        let engine = SyncEngine::new(backend, store, 10);
        let restored = ContactsViewModel::new(engine).await.unwrap();
        assert!(restored.state().is_offline);
        assert_eq!(restored.delete(&bob_id()).await.unwrap(), DeleteOutcome::Queued);
    }

    #[tokio::test]
    async fn matching_edit_stays_visible() {
        let backend = FakeBackend::with_contacts(vec![contact("2", "Bob", "333")]);
        let vm = view_model(&backend, 10).await;
        vm.set_search("bob").await.unwrap();

        vm.edit(&bob_id(), rename("Bobby"), None).await.unwrap();
        let state = vm.state();
        assert_eq!(ids(&state), vec!["2"]);
        assert_eq!(state.contacts[0].name(), "Bobby");
        assert!(state.hidden_by_filter.is_empty());
    }

    #[tokio::test]
    async fn edit_that_stops_matching_is_hidden() {
        let backend = FakeBackend::with_contacts(vec![contact("2", "Bob", "333")]);
        let vm = view_model(&backend, 10).await;
        vm.set_search("bob").await.unwrap();
        let calls_before = backend.calls().len();

        vm.edit(&bob_id(), rename("Zed"), None).await.unwrap();
        let state = vm.state();
        assert!(state.contacts.is_empty());
        assert_eq!(state.hidden_by_filter, vec![bob_id()]);
        assert_eq!(backend.contacts()[0].name, "Zed");
        // no list refresh after the edit
        assert_eq!(backend.calls().len(), calls_before + 1);
    }

    #[tokio::test]
    async fn avatar_failure_keeps_detail_update() {
        let backend = FakeBackend::with_contacts(vec![contact("2", "Bob", "333")]);
        backend.set_avatar_rejected(true);
        let vm = view_model(&backend, 10).await;
        vm.refresh().await.unwrap();

        let avatar = AvatarUpload::new("bob.png", vec![1, 2]).unwrap();
        let entry = vm.edit(&bob_id(), rename("Bobby"), Some(avatar)).await.unwrap();

        assert_eq!(entry.name(), "Bobby");
        assert_eq!(backend.contacts()[0].name, "Bobby");
        let state = vm.state();
        assert!(state.error.is_some());
        assert_eq!(state.contacts[0].name(), "Bobby");
    }

    #[tokio::test]
    async fn unreachable_avatar_upload_is_queued() {
        let backend = FakeBackend::with_contacts(vec![contact("2", "Bob", "333")]);
        backend.set_avatar_online(false);
        let vm = view_model(&backend, 10).await;
        vm.refresh().await.unwrap();

        let avatar = AvatarUpload::new("bob.png", vec![1, 2]).unwrap();
        let entry = vm.edit(&bob_id(), rename("Bobby"), Some(avatar)).await.unwrap();

        assert_eq!(entry.pending_status(), Some(PendingStatus::AvatarUpdated));
        let state = vm.state();
        assert_eq!(state.error, None);
        assert!(state.is_offline);
        assert_eq!(state.contacts[0].name(), "Bobby");
    }

    #[tokio::test]
    async fn offline_add_then_resend_marks_row_sent() {
        let backend = FakeBackend::with_contacts(vec![contact("2", "Bob", "333")]);
        let vm = view_model(&backend, 10).await;
        vm.refresh().await.unwrap();

        backend.set_online(false);
        let entry = vm.add(ContactDraft::new("Amy", "222")).await.unwrap();
        let state = vm.state();
        assert!(state.is_offline);
        assert_eq!(state.contacts[0].pending_status(), Some(PendingStatus::Pending));
        assert!(state.contacts[0].is_unsynced());

        backend.set_online(true);
        vm.resend(&entry.id()).await.unwrap();
        let state = vm.state();
        assert_eq!(ids(&state), vec!["3", "2"]);
        assert!(!state.contacts[0].is_unsynced());
        assert!(!state.is_offline);

        vm.refresh().await.unwrap();
        assert_eq!(
            vm.state().contacts[0],
            ContactEntry::Synced(contact("3", "Amy", "222"))
        );
    }

    #[tokio::test]
    async fn surfaced_errors_set_error_field() {
        let backend = FakeBackend::default();
        let vm = view_model(&backend, 10).await;

        let missing = ContactRef::Server(ServerId::new("404"));
        assert!(vm.edit(&missing, rename("Ghost"), None).await.is_err());
        assert!(vm.state().error.is_some());

        vm.refresh().await.unwrap();
        assert_eq!(vm.state().error, None);
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let backend = FakeBackend::with_contacts(vec![
            contact("2", "Bob", "333"),
            contact("3", "Carl", "444"),
        ]);
        let vm = view_model(&backend, 10).await;
        vm.refresh().await.unwrap();

        let outcome = vm.delete(&bob_id()).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert_eq!(ids(&vm.state()), vec!["3"]);
    }

    #[tokio::test]
    async fn preferences_survive_a_new_view_model() {
        let backend = FakeBackend::default();
        let store = MemoryStore::new();
        let engine = SyncEngine::new(backend.clone(), store.clone(), 10);
        let vm = ContactsViewModel::new(engine).await.unwrap();
        vm.set_sort(SortField::Phone, SortOrder::Desc).await.unwrap();

        let engine = SyncEngine::new(backend, store, 10);
        let restored = ContactsViewModel::new(engine).await.unwrap();
        assert_eq!(restored.preferences().sort_by, SortField::Phone);
        assert_eq!(restored.preferences().sort_order, SortOrder::Desc);
    }

    #[tokio::test]
    async fn sync_flushes_and_reloads() {
        let backend = FakeBackend::default();
        backend.set_online(false);
        let vm = view_model(&backend, 10).await;
        vm.add(ContactDraft::new("Amy", "222")).await.unwrap();

        backend.set_online(true);
        let report = vm.sync().await.unwrap();
        assert_eq!(report.synced.len(), 1);
        assert_eq!(
            vm.state().contacts,
            vec![ContactEntry::Synced(contact("1", "Amy", "222"))]
        );
    }
}
