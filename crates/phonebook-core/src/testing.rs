//! In-memory contacts backend for engine and view-model tests.

use std::sync::{Arc, Mutex};

use crate::backend::{BackendError, BackendResult, ContactPage, ContactsBackend, ListQuery};
use crate::merge::{filter_contacts, sort_contacts, synced};
use crate::models::{
    AvatarUpload, Contact, ContactDraft, ContactEntry, ResolvedUpdate, ServerId,
};

#[derive(Debug, Default)]
struct FakeState {
    contacts: Vec<Contact>,
    offline: bool,
    avatar_offline: bool,
    avatar_rejected: bool,
    calls: Vec<String>,
    next_id: u64,
}

/// Backend double with an online toggle and a call log.
///
/// Every call yields once before touching state so concurrent callers
/// interleave the way real network calls would.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

pub fn contact(id: &str, name: &str, phone: &str) -> Contact {
    Contact {
        id: ServerId::new(id),
        name: name.to_string(),
        phone: phone.to_string(),
        photo: None,
        created_at: None,
        updated_at: None,
    }
}

impl FakeBackend {
    pub fn with_contacts(contacts: Vec<Contact>) -> Self {
        let next_id = contacts
            .iter()
            .filter_map(|item| item.id.as_str().parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Self {
            state: Arc::new(Mutex::new(FakeState {
                contacts,
                next_id,
                ..FakeState::default()
            })),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.state.lock().unwrap().offline = !online;
    }

    /// Fail only avatar uploads.
    pub fn set_avatar_online(&self, online: bool) {
        self.state.lock().unwrap().avatar_offline = !online;
    }

    /// Refuse avatar uploads as invalid.
    pub fn set_avatar_rejected(&self, rejected: bool) {
        self.state.lock().unwrap().avatar_rejected = rejected;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.state.lock().unwrap().contacts.clone()
    }

    async fn enter(&self, call: String) -> BackendResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.offline {
            return Err(BackendError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn with_contact<T>(
        &self,
        id: &ServerId,
        apply: impl FnOnce(&mut Contact) -> T,
    ) -> BackendResult<T> {
        let mut state = self.state.lock().unwrap();
        state
            .contacts
            .iter_mut()
            .find(|item| &item.id == id)
            .map(apply)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }
}

impl ContactsBackend for FakeBackend {
    async fn list(&self, query: &ListQuery) -> BackendResult<ContactPage> {
        self.enter(format!("list:{}", query.page)).await?;
        let contacts = self.contacts();
        let mut entries = synced(contacts);
        if let Some(search) = &query.search {
            entries = filter_contacts(entries, search);
        }
        let entries = sort_contacts(entries, &query.sort_by, query.sort_order);

        let total = entries.len();
        let limit = query.limit as usize;
        let pages = u32::try_from(total.div_ceil(limit)).unwrap();
        let contacts = entries
            .into_iter()
            .skip((query.page as usize - 1) * limit)
            .take(limit)
            .filter_map(|entry| match entry {
                ContactEntry::Synced(contact) => Some(contact),
                ContactEntry::Pending(_) => None,
            })
            .collect();

        Ok(ContactPage {
            contacts,
            page: query.page,
            pages,
            total: total as u64,
        })
    }

    async fn get(&self, id: &ServerId) -> BackendResult<Contact> {
        self.enter(format!("get:{id}")).await?;
        self.with_contact(id, |contact| contact.clone())
    }

    async fn create(&self, draft: &ContactDraft) -> BackendResult<Contact> {
        self.enter(format!("create:{}", draft.name)).await?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let created = contact(&state.next_id.to_string(), &draft.name, &draft.phone);
        state.contacts.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: &ServerId, update: &ResolvedUpdate) -> BackendResult<Contact> {
        self.enter(format!("update:{id}")).await?;
        self.with_contact(id, |contact| {
            contact.name.clone_from(&update.name);
            contact.phone.clone_from(&update.phone);
            contact.photo.clone_from(&update.photo);
            contact.clone()
        })
    }

    async fn delete(&self, id: &ServerId) -> BackendResult<Contact> {
        self.enter(format!("delete:{id}")).await?;
        let mut state = self.state.lock().unwrap();
        let index = state
            .contacts
            .iter()
            .position(|item| &item.id == id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        Ok(state.contacts.remove(index))
    }

    async fn upload_avatar(&self, id: &ServerId, avatar: &AvatarUpload) -> BackendResult<Contact> {
        self.enter(format!("avatar:{id}")).await?;
        let (offline, rejected) = {
            let state = self.state.lock().unwrap();
            (state.avatar_offline, state.avatar_rejected)
        };
        if offline {
            return Err(BackendError::Unavailable("upload timed out".to_string()));
        }
        if rejected {
            return Err(BackendError::Rejected {
                status: 413,
                message: "image too large".to_string(),
            });
        }
        self.with_contact(id, |contact| {
            contact.photo = Some(format!("/uploads/{id}-{}", avatar.file_name));
            contact.clone()
        })
    }
}
