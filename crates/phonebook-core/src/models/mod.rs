//! Data models for Phonebook

mod contact;
mod preferences;

pub use contact::{
    AvatarUpload, Contact, ContactDraft, ContactEntry, ContactPatch, ContactRef, LocalId,
    PendingContact, PendingStatus, QueuedAvatar, ResolvedUpdate, ServerId, LOCAL_ID_PREFIX,
    PLACEHOLDER_PHOTO,
};
pub use preferences::{Preferences, SortField, SortOrder};
