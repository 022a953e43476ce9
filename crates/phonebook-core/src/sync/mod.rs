//! Sync engine: backend first, local store as the offline fallback.
//!
//! Every operation tries the contacts backend. Transient failures downgrade
//! to a local-only equivalent and flip the engine into offline mode; logic
//! errors (not found, rejected input) are returned to the caller. The engine
//! is the only writer of the local store.

use std::collections::HashSet;
use std::slice;

use crate::backend::{BackendError, ContactsBackend, ListQuery};
use crate::error::{Error, Result};
use crate::merge::{deduplicate_by_id, merge_view, synced};
use crate::models::{
    AvatarUpload, Contact, ContactDraft, ContactEntry, ContactPatch, ContactRef, PendingContact,
    PendingStatus, Preferences, QueuedAvatar, ResolvedUpdate, ServerId,
};
use crate::store::{KeyValueStore, LocalStore};

/// One page of the visible list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub items: Vec<ContactEntry>,
    pub page: u32,
    pub total_pages: u32,
    pub has_more: bool,
    pub offline: bool,
    /// `items` replace every page loaded so far
    pub restarted: bool,
}

/// What a delete actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The backend deleted the contact
    Deleted,
    /// A never-synced local contact was discarded
    Discarded,
    /// The backend was unreachable; the delete is queued
    Queued,
}

/// A pending entry the backend has now confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resent {
    /// Id the entry was queued under
    pub previous: ContactRef,
    /// Server copy, absent for replayed deletes
    pub contact: Option<Contact>,
}

/// Result of replaying the pending queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub synced: Vec<ContactRef>,
    pub failed: Vec<(ContactRef, String)>,
    pub still_pending: usize,
}

pub struct SyncEngine<B, S> {
    backend: B,
    store: LocalStore<S>,
    page_size: u32,
    offline: bool,
}

impl<B: ContactsBackend, S: KeyValueStore> SyncEngine<B, S> {
    pub fn new(backend: B, store: S, page_size: u32) -> Self {
        Self {
            backend,
            store: LocalStore::new(store),
            page_size: page_size.max(1),
            offline: false,
        }
    }

    /// Last-known connectivity outcome
    pub const fn is_offline(&self) -> bool {
        self.offline
    }

    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    pub const fn store(&self) -> &LocalStore<S> {
        &self.store
    }

    pub async fn preferences(&self) -> Result<Preferences> {
        self.store.load_preferences().await
    }

    pub async fn save_preferences(&self, prefs: &Preferences) -> Result<()> {
        self.store.save_preferences(prefs).await
    }

    /// Queued entries, oldest first
    pub async fn pending(&self) -> Result<Vec<PendingContact>> {
        self.store.pending().await
    }

    /// Pick up the connectivity outcome a previous session saved.
    pub async fn restore_connectivity(&mut self) -> Result<()> {
        self.offline = self.store.load_offline().await?;
        Ok(())
    }

    async fn went_online(&mut self) -> Result<()> {
        if self.offline {
            tracing::info!("Contacts backend reachable again");
            self.offline = false;
            self.store.save_offline(false).await?;
        }
        Ok(())
    }

    async fn went_offline(&mut self, operation: &str, error: &BackendError) -> Result<()> {
        tracing::warn!("{} fell back to local data: {}", operation, error);
        if !self.offline {
            self.offline = true;
            self.store.save_offline(true).await?;
        }
        Ok(())
    }

    /// First page for `prefs`.
    pub async fn load(&mut self, prefs: &Preferences) -> Result<LoadOutcome> {
        match self.fetch_page(prefs, 1).await {
            Ok(outcome) => {
                self.store.clear_remaining_offline().await?;
                Ok(outcome)
            }
            Err(Error::Backend(error)) if error.is_transient() => {
                self.went_offline("load", &error).await?;
                let view = self.local_view(prefs).await?;
                self.paginate_locally(view).await
            }
            Err(error) => Err(error),
        }
    }

    /// Page `page` for `prefs`.
    ///
    /// Offline, the remainder recorded by the previous offline load is
    /// consumed instead; losing the connection mid-scroll slices the local
    /// view at the same offset the server page would have started at. Once
    /// the backend answers again after offline pages were served, pages 1
    /// through `page` are reloaded and returned as a restarted list, since
    /// offline page boundaries do not line up with the server's.
    pub async fn load_more(&mut self, prefs: &Preferences, page: u32) -> Result<LoadOutcome> {
        let page = page.max(1);
        let was_offline = self.offline;
        let fetched = if was_offline && page > 1 {
            self.fetch_through(prefs, page).await
        } else {
            self.fetch_page(prefs, page).await
        };
        match fetched {
            Ok(outcome) => {
                self.store.clear_remaining_offline().await?;
                Ok(outcome)
            }
            Err(Error::Backend(error)) if error.is_transient() => {
                self.went_offline("load more", &error).await?;
                let rest = if was_offline {
                    self.current_remainder(prefs).await?
                } else {
                    let offset = (page as usize - 1) * self.page_size as usize;
                    self.local_view(prefs)
                        .await?
                        .into_iter()
                        .skip(offset)
                        .collect()
                };
                let mut outcome = self.paginate_locally(rest).await?;
                outcome.page = page;
                outcome.total_pages = outcome.total_pages.saturating_add(page - 1);
                Ok(outcome)
            }
            Err(error) => Err(error),
        }
    }

    /// Server pages 1 through `page` as one list.
    async fn fetch_through(&mut self, prefs: &Preferences, page: u32) -> Result<LoadOutcome> {
        tracing::info!("Reloading pages 1 to {} from the contacts backend", page);
        let mut items = Vec::new();
        let mut current = 1;
        loop {
            let outcome = self.fetch_page(prefs, current).await?;
            items.extend(outcome.items);
            if current >= page || !outcome.has_more {
                return Ok(LoadOutcome {
                    items: deduplicate_by_id(items, &prefs.sort_by, prefs.sort_order),
                    page: outcome.page,
                    total_pages: outcome.total_pages,
                    has_more: outcome.has_more,
                    offline: false,
                    restarted: true,
                });
            }
            current += 1;
        }
    }

    async fn fetch_page(&mut self, prefs: &Preferences, page: u32) -> Result<LoadOutcome> {
        let query = ListQuery::new(prefs, page, self.page_size);
        let response = self.backend.list(&query).await?;
        self.went_online().await?;

        let complete = response.page <= 1 && response.pages <= 1 && !prefs.search_active();
        if complete {
            self.store.save_cached(&response.contacts).await?;
        } else {
            self.store.upsert_cached(&response.contacts).await?;
        }
        let has_more = response.has_more();
        let pending = self.store.pending().await?;
        tracing::debug!(
            "Loaded page {}/{} with {} contacts and {} pending",
            response.page,
            response.pages,
            response.contacts.len(),
            pending.len()
        );
        Ok(LoadOutcome {
            items: merge_view(&pending, synced(response.contacts), prefs),
            page: response.page.max(1),
            total_pages: response.pages.max(1),
            has_more,
            offline: false,
            restarted: false,
        })
    }

    /// Full cached plus pending list, sorted and filtered.
    async fn local_view(&self, prefs: &Preferences) -> Result<Vec<ContactEntry>> {
        let pending = self.store.pending().await?;
        let cached = self.store.cached().await?;
        Ok(merge_view(&pending, synced(cached), prefs))
    }

    /// Saved offline remainder, brought up to date with the store.
    ///
    /// Rows deleted, synced, or discarded since the remainder was recorded
    /// drop out; edited rows show their queued state.
    async fn current_remainder(&self, prefs: &Preferences) -> Result<Vec<ContactEntry>> {
        let remaining = self.store.remaining_offline().await?;
        let ids = remaining.iter().map(ContactEntry::id).collect::<HashSet<_>>();
        let pending = self
            .store
            .pending()
            .await?
            .into_iter()
            .filter(|entry| ids.contains(&entry.id))
            .collect::<Vec<_>>();
        let cached = self.store.cached().await?;
        let still_cached = remaining
            .iter()
            .filter_map(|entry| match entry {
                ContactEntry::Synced(contact) => {
                    cached.iter().find(|item| item.id == contact.id).cloned()
                }
                ContactEntry::Pending(_) => None,
            })
            .collect::<Vec<_>>();
        Ok(merge_view(&pending, synced(still_cached), prefs))
    }

    /// Take one page off the front of `view`, recording the rest.
    async fn paginate_locally(&self, mut view: Vec<ContactEntry>) -> Result<LoadOutcome> {
        let page_size = self.page_size as usize;
        let total_pages = u32::try_from(view.len().div_ceil(page_size))
            .unwrap_or(u32::MAX)
            .max(1);
        let remaining = view.split_off(page_size.min(view.len()));
        self.store.save_remaining_offline(&remaining).await?;
        Ok(LoadOutcome {
            items: view,
            page: 1,
            total_pages,
            has_more: !remaining.is_empty(),
            offline: true,
            restarted: false,
        })
    }

    /// Resolve one contact: server copy when reachable, local copy otherwise.
    pub async fn find(&mut self, id: &ContactRef) -> Result<ContactEntry> {
        if let Some(pending) = self.store.find_pending(id).await? {
            if pending.status != PendingStatus::Deleted {
                return Ok(ContactEntry::Pending(pending));
            }
            return Err(Error::NotFound(id.to_string()));
        }
        let ContactRef::Server(server_id) = id else {
            return Err(Error::NotFound(id.to_string()));
        };

        match self.backend.get(server_id).await {
            Ok(contact) => {
                self.went_online().await?;
                self.store.upsert_cached(slice::from_ref(&contact)).await?;
                Ok(ContactEntry::Synced(contact))
            }
            Err(error) if error.is_transient() => {
                self.went_offline("find", &error).await?;
                self.store
                    .find_cached(server_id)
                    .await?
                    .map(ContactEntry::Synced)
                    .ok_or_else(|| Error::NotFound(id.to_string()))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Create a contact, queueing it under a local id when offline.
    pub async fn add(&mut self, draft: ContactDraft) -> Result<ContactEntry> {
        let draft = draft.validate()?;
        match self.backend.create(&draft).await {
            Ok(contact) => {
                self.went_online().await?;
                self.store.upsert_cached(slice::from_ref(&contact)).await?;
                tracing::debug!("Created contact {}", contact.id);
                Ok(ContactEntry::Synced(contact))
            }
            Err(error) if error.is_transient() => {
                self.went_offline("add", &error).await?;
                let pending = PendingContact::created(&draft);
                self.store.upsert_pending(pending.clone()).await?;
                Ok(ContactEntry::Pending(pending))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Apply a partial update.
    ///
    /// Fields the patch omits keep their current values, including the photo.
    pub async fn update(&mut self, id: &ContactRef, patch: ContactPatch) -> Result<ContactEntry> {
        let patch = patch.validate()?;
        if patch.is_empty() {
            return Err(Error::InvalidInput("nothing to update".to_string()));
        }

        let server_id = match id {
            ContactRef::Local(_) => {
                let mut pending = self.queued_edit_target(id).await?;
                let resolved = patch.resolve(&pending.name, &pending.phone, pending.photo.as_deref());
                apply_update(&mut pending, resolved);
                pending.touch();
                self.store.upsert_pending(pending.clone()).await?;
                return Ok(ContactEntry::Pending(pending));
            }
            ContactRef::Server(server_id) => server_id,
        };

        let queued = self.store.find_pending(id).await?;
        if queued
            .as_ref()
            .is_some_and(|entry| entry.status == PendingStatus::Deleted)
        {
            return Err(Error::NotFound(id.to_string()));
        }
        let current = match &queued {
            Some(entry) => entry.clone(),
            None => self.current_contact(server_id).await?,
        };
        let resolved = patch.resolve(&current.name, &current.phone, current.photo.as_deref());

        match self.backend.update(server_id, &resolved).await {
            Ok(contact) => {
                self.went_online().await?;
                self.store.upsert_cached(slice::from_ref(&contact)).await?;
                if let Some(mut entry) = queued {
                    if entry.avatar.is_some() {
                        // the queued avatar still has to reach the server
                        entry.status = PendingStatus::AvatarUpdated;
                        apply_update(&mut entry, resolved);
                        self.store.upsert_pending(entry).await?;
                    } else {
                        self.store.remove_pending(id).await?;
                    }
                }
                Ok(ContactEntry::Synced(contact))
            }
            Err(error) if error.is_transient() => {
                self.went_offline("update", &error).await?;
                let mut entry = current;
                entry.status = PendingStatus::Pending;
                entry.sent = false;
                apply_update(&mut entry, resolved);
                entry.touch();
                self.store.upsert_pending(entry.clone()).await?;
                Ok(ContactEntry::Pending(entry))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Queued entry an offline edit or avatar change can attach to.
    async fn queued_edit_target(&self, id: &ContactRef) -> Result<PendingContact> {
        self.store
            .find_pending(id)
            .await?
            .filter(|entry| entry.status != PendingStatus::Deleted)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Current state of a server contact, as a pending entry ready to be queued.
    async fn current_contact(&mut self, id: &ServerId) -> Result<PendingContact> {
        if let Some(contact) = self.store.find_cached(id).await? {
            return Ok(PendingContact::for_contact(&contact, PendingStatus::Pending));
        }
        match self.backend.get(id).await {
            Ok(contact) => {
                self.went_online().await?;
                Ok(PendingContact::for_contact(&contact, PendingStatus::Pending))
            }
            Err(error) if error.is_transient() => {
                self.went_offline("lookup", &error).await?;
                Err(Error::NotFound(format!("{id} (not available offline)")))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Delete a contact.
    ///
    /// Local ids never reach the backend. A failed delete is queued only when
    /// the engine already knew it was offline; otherwise the error surfaces.
    pub async fn delete(&mut self, id: &ContactRef) -> Result<DeleteOutcome> {
        let server_id = match id {
            ContactRef::Local(_) => {
                return match self.store.remove_pending(id).await? {
                    Some(_) => Ok(DeleteOutcome::Discarded),
                    None => Err(Error::NotFound(id.to_string())),
                };
            }
            ContactRef::Server(server_id) => server_id,
        };

        let known_offline = self.offline;
        match self.backend.delete(server_id).await {
            Ok(_) => {
                self.went_online().await?;
                self.forget(id, server_id).await?;
                Ok(DeleteOutcome::Deleted)
            }
            Err(BackendError::NotFound(subject)) => {
                self.forget(id, server_id).await?;
                Err(BackendError::NotFound(subject).into())
            }
            Err(error) if error.is_transient() && known_offline => {
                self.went_offline("delete", &error).await?;
                let cached = self.store.remove_cached(server_id).await?;
                let queued = self.store.find_pending(id).await?;
                let mut tombstone = match (queued, cached) {
                    (Some(entry), _) => entry,
                    (None, Some(contact)) => {
                        PendingContact::for_contact(&contact, PendingStatus::Deleted)
                    }
                    (None, None) => return Err(Error::NotFound(id.to_string())),
                };
                tombstone.status = PendingStatus::Deleted;
                tombstone.avatar = None;
                tombstone.touch();
                self.store.upsert_pending(tombstone).await?;
                Ok(DeleteOutcome::Queued)
            }
            Err(error) => {
                if error.is_transient() {
                    self.went_offline("delete", &error).await?;
                }
                Err(error.into())
            }
        }
    }

    async fn forget(&self, id: &ContactRef, server_id: &ServerId) -> Result<()> {
        self.store.remove_cached(server_id).await?;
        self.store.remove_pending(id).await?;
        Ok(())
    }

    /// Replace a contact's avatar, queueing the image when offline.
    pub async fn update_avatar(
        &mut self,
        id: &ContactRef,
        avatar: AvatarUpload,
    ) -> Result<ContactEntry> {
        let server_id = match id {
            ContactRef::Local(_) => {
                let mut pending = self.queued_edit_target(id).await?;
                pending.avatar = Some(QueuedAvatar::from_upload(&avatar));
                pending.touch();
                self.store.upsert_pending(pending.clone()).await?;
                return Ok(ContactEntry::Pending(pending));
            }
            ContactRef::Server(server_id) => server_id,
        };

        match self.backend.upload_avatar(server_id, &avatar).await {
            Ok(contact) => {
                self.went_online().await?;
                self.store.upsert_cached(slice::from_ref(&contact)).await?;
                if let Some(mut entry) = self.store.find_pending(id).await? {
                    match entry.status {
                        PendingStatus::AvatarUpdated => {
                            self.store.remove_pending(id).await?;
                        }
                        PendingStatus::Pending => {
                            entry.avatar = None;
                            entry.photo.clone_from(&contact.photo);
                            self.store.upsert_pending(entry).await?;
                        }
                        PendingStatus::Deleted => {}
                    }
                }
                Ok(ContactEntry::Synced(contact))
            }
            Err(error) if error.is_transient() => {
                self.went_offline("avatar update", &error).await?;
                let mut entry = match self.store.find_pending(id).await? {
                    Some(entry) if entry.status == PendingStatus::Deleted => {
                        return Err(Error::NotFound(id.to_string()));
                    }
                    Some(entry) => entry,
                    None => {
                        let contact = self
                            .store
                            .find_cached(server_id)
                            .await?
                            .ok_or_else(|| {
                                Error::NotFound(format!("{id} (not available offline)"))
                            })?;
                        PendingContact::for_contact(&contact, PendingStatus::AvatarUpdated)
                    }
                };
                entry.avatar = Some(QueuedAvatar::from_upload(&avatar));
                entry.sent = false;
                entry.touch();
                self.store.upsert_pending(entry.clone()).await?;
                Ok(ContactEntry::Pending(entry))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Retry one queued entry against the backend.
    pub async fn resend(&mut self, id: &ContactRef) -> Result<Resent> {
        let entry = self
            .store
            .find_pending(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no pending change for {id}")))?;
        if entry.status != PendingStatus::Pending {
            return Err(Error::InvalidInput(format!(
                "{id} is a queued {}; only pending creates and edits can be resent, run sync instead",
                entry.status.as_str()
            )));
        }
        let contact = match self.replay(&entry).await {
            Ok(contact) => contact,
            Err(error) => {
                if let Error::Backend(backend) = &error {
                    if backend.is_transient() {
                        self.went_offline("resend", backend).await?;
                    }
                }
                return Err(error);
            }
        };
        self.went_online().await?;
        Ok(Resent {
            previous: entry.id,
            contact,
        })
    }

    /// Replay every queued entry in order, stopping at the first transient failure.
    pub async fn flush_pending(&mut self) -> Result<FlushReport> {
        let mut report = FlushReport::default();
        for entry in self.store.pending().await? {
            match self.replay(&entry).await {
                Ok(_) => {
                    self.went_online().await?;
                    report.synced.push(entry.id);
                }
                Err(error) if error.is_transient() => {
                    if let Error::Backend(backend) = &error {
                        self.went_offline("sync", backend).await?;
                    }
                    break;
                }
                Err(error) => {
                    tracing::warn!("Pending change for {} was refused: {}", entry.id, error);
                    report.failed.push((entry.id, error.to_string()));
                }
            }
        }
        report.still_pending = self.store.pending().await?.len();
        tracing::info!(
            "Synced {} pending changes, {} failed, {} still pending",
            report.synced.len(),
            report.failed.len(),
            report.still_pending
        );
        Ok(report)
    }

    /// Send one queued entry and reconcile the store with the result.
    async fn replay(&self, entry: &PendingContact) -> Result<Option<Contact>> {
        let contact = match (&entry.id, entry.status) {
            (ContactRef::Server(server_id), PendingStatus::Deleted) => {
                match self.backend.delete(server_id).await {
                    Ok(_) | Err(BackendError::NotFound(_)) => {}
                    Err(error) => return Err(error.into()),
                }
                self.store.remove_pending(&entry.id).await?;
                self.store.remove_cached(server_id).await?;
                return Ok(None);
            }
            (ContactRef::Local(_), PendingStatus::Deleted) => {
                self.store.remove_pending(&entry.id).await?;
                return Ok(None);
            }
            (ContactRef::Local(_), _) => self.backend.create(&entry.to_draft()).await?,
            (ContactRef::Server(server_id), PendingStatus::Pending) => {
                let update = ResolvedUpdate {
                    name: entry.name.clone(),
                    phone: entry.phone.clone(),
                    photo: entry.photo.clone(),
                };
                self.backend.update(server_id, &update).await?
            }
            (ContactRef::Server(server_id), PendingStatus::AvatarUpdated) => {
                match &entry.avatar {
                    Some(queued) => {
                        let upload = queued.to_upload()?;
                        self.backend.upload_avatar(server_id, &upload).await?
                    }
                    None => self.backend.get(server_id).await?,
                }
            }
        };

        self.store.remove_pending(&entry.id).await?;
        self.store.upsert_cached(slice::from_ref(&contact)).await?;

        let contact = match (&entry.avatar, entry.status) {
            (Some(queued), PendingStatus::Pending) => self.replay_avatar(contact, queued).await?,
            _ => contact,
        };
        tracing::debug!("Replayed pending change {} as {}", entry.id, contact.id);
        Ok(Some(contact))
    }

    /// Upload an avatar queued with a create or edit.
    ///
    /// A failure keeps the confirmed contact and requeues only the avatar.
    async fn replay_avatar(&self, contact: Contact, queued: &QueuedAvatar) -> Result<Contact> {
        let upload = queued.to_upload()?;
        match self.backend.upload_avatar(&contact.id, &upload).await {
            Ok(updated) => {
                self.store.upsert_cached(slice::from_ref(&updated)).await?;
                Ok(updated)
            }
            Err(error) => {
                tracing::warn!("Avatar upload for {} failed after sync: {}", contact.id, error);
                if error.is_transient() {
                    let mut entry = PendingContact::for_contact(&contact, PendingStatus::AvatarUpdated);
                    entry.avatar = Some(queued.clone());
                    self.store.upsert_pending(entry).await?;
                }
                Ok(contact)
            }
        }
    }
}

fn apply_update(entry: &mut PendingContact, update: ResolvedUpdate) {
    entry.name = update.name;
    entry.phone = update.phone;
    entry.photo = update.photo;
}
