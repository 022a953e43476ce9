//! Contact model

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::preferences::SortField;
use crate::error::{Error, Result};
use crate::util::normalize_text_option;

/// Reserved prefix that keeps locally generated ids out of the server id-space.
pub const LOCAL_ID_PREFIX: &str = "pending_";

/// Photo path shown when a contact has no uploaded avatar.
pub const PLACEHOLDER_PHOTO: &str = "/images/default-avatar.png";

/// Server-assigned contact identifier.
///
/// The backend may send integers or strings; both are held as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawServerId", into = "String")]
pub struct ServerId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawServerId {
    Text(String),
    Number(i64),
}

impl From<RawServerId> for ServerId {
    fn from(raw: RawServerId) -> Self {
        match raw {
            RawServerId::Text(text) => Self(text),
            RawServerId::Number(number) => Self(number.to_string()),
        }
    }
}

impl From<ServerId> for String {
    fn from(id: ServerId) -> Self {
        id.0
    }
}

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Locally generated identifier for a contact the backend has not confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(String);

impl LocalId {
    /// Create a new unique local id using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{LOCAL_ID_PREFIX}{}", self.0)
    }
}

impl FromStr for LocalId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().strip_prefix(LOCAL_ID_PREFIX) {
            Some(token) if !token.is_empty() => Ok(Self(token.to_string())),
            _ => Err(Error::InvalidInput(format!(
                "'{s}' is not a local contact id"
            ))),
        }
    }
}

/// Reference to a contact in either id-space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawServerId", into = "String")]
pub enum ContactRef {
    Server(ServerId),
    Local(LocalId),
}

impl ContactRef {
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    pub const fn server_id(&self) -> Option<&ServerId> {
        match self {
            Self::Server(id) => Some(id),
            Self::Local(_) => None,
        }
    }
}

impl fmt::Display for ContactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => fmt::Display::fmt(id, f),
            Self::Local(id) => fmt::Display::fmt(id, f),
        }
    }
}

impl FromStr for ContactRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("contact id cannot be empty".to_string()));
        }
        if trimmed.starts_with(LOCAL_ID_PREFIX) {
            Ok(Self::Local(trimmed.parse()?))
        } else {
            Ok(Self::Server(ServerId::new(trimmed)))
        }
    }
}

impl TryFrom<RawServerId> for ContactRef {
    type Error = Error;

    fn try_from(raw: RawServerId) -> Result<Self> {
        match raw {
            RawServerId::Text(text) => text.parse(),
            RawServerId::Number(number) => Ok(Self::Server(ServerId::new(number.to_string()))),
        }
    }
}

impl From<ContactRef> for String {
    fn from(id: ContactRef) -> Self {
        id.to_string()
    }
}

impl From<ServerId> for ContactRef {
    fn from(id: ServerId) -> Self {
        Self::Server(id)
    }
}

impl From<LocalId> for ContactRef {
    fn from(id: LocalId) -> Self {
        Self::Local(id)
    }
}

/// A server-confirmed contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ServerId,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Contact {
    /// Photo path, falling back to the placeholder avatar.
    pub fn photo_or_placeholder(&self) -> &str {
        self.photo.as_deref().unwrap_or(PLACEHOLDER_PHOTO)
    }
}

/// Kind of unsynced operation a pending contact stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PendingStatus {
    /// Creation (local id) or edit (server id) waiting for the backend
    Pending,
    /// Delete waiting for the backend
    Deleted,
    /// Avatar change waiting for the backend
    AvatarUpdated,
}

impl PendingStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Deleted => "deleted",
            Self::AvatarUpdated => "avatar-updated",
        }
    }
}

/// Avatar bytes queued for upload while offline (base64 in the local store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAvatar {
    pub file_name: String,
    pub content_type: String,
    pub data: String,
}

impl QueuedAvatar {
    pub fn from_upload(upload: &AvatarUpload) -> Self {
        Self {
            file_name: upload.file_name.clone(),
            content_type: upload.content_type.clone(),
            data: BASE64.encode(&upload.bytes),
        }
    }

    pub fn to_upload(&self) -> Result<AvatarUpload> {
        let bytes = BASE64
            .decode(self.data.as_bytes())
            .map_err(|error| Error::Storage(format!("queued avatar is corrupt: {error}")))?;
        Ok(AvatarUpload {
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            bytes,
        })
    }
}

/// A local mutation the backend has not acknowledged yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingContact {
    pub id: ContactRef,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    pub status: PendingStatus,
    #[serde(default)]
    pub sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<QueuedAvatar>,
    /// Unix ms when the entry was (last) queued
    #[serde(default)]
    pub queued_at: i64,
}

impl PendingContact {
    /// Queue a creation under a fresh local id.
    pub fn created(draft: &ContactDraft) -> Self {
        Self {
            id: ContactRef::Local(LocalId::new()),
            name: draft.name.clone(),
            phone: draft.phone.clone(),
            photo: None,
            created_at: None,
            updated_at: None,
            status: PendingStatus::Pending,
            sent: false,
            avatar: None,
            queued_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Queue an operation against an existing server contact.
    pub fn for_contact(contact: &Contact, status: PendingStatus) -> Self {
        Self {
            id: ContactRef::Server(contact.id.clone()),
            name: contact.name.clone(),
            phone: contact.phone.clone(),
            photo: contact.photo.clone(),
            created_at: contact.created_at.clone(),
            updated_at: contact.updated_at.clone(),
            status,
            sent: false,
            avatar: None,
            queued_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// The server-confirmed contact shown for one render cycle after a resend.
    pub fn confirmed(contact: &Contact) -> Self {
        Self {
            sent: true,
            ..Self::for_contact(contact, PendingStatus::Pending)
        }
    }

    /// Payload for replaying a creation; local-only fields are dropped.
    pub fn to_draft(&self) -> ContactDraft {
        ContactDraft {
            name: self.name.clone(),
            phone: self.phone.clone(),
        }
    }

    pub fn touch(&mut self) {
        self.queued_at = chrono::Utc::now().timestamp_millis();
    }
}

/// Either a synced contact or a pending local mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContactEntry {
    Synced(Contact),
    Pending(PendingContact),
}

impl ContactEntry {
    pub fn id(&self) -> ContactRef {
        match self {
            Self::Synced(contact) => ContactRef::Server(contact.id.clone()),
            Self::Pending(pending) => pending.id.clone(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Synced(contact) => &contact.name,
            Self::Pending(pending) => &pending.name,
        }
    }

    pub fn phone(&self) -> &str {
        match self {
            Self::Synced(contact) => &contact.phone,
            Self::Pending(pending) => &pending.phone,
        }
    }

    pub fn photo(&self) -> Option<&str> {
        match self {
            Self::Synced(contact) => contact.photo.as_deref(),
            Self::Pending(pending) => pending.photo.as_deref(),
        }
    }

    /// Pending entries that have not been acknowledged by the backend.
    pub const fn is_unsynced(&self) -> bool {
        match self {
            Self::Synced(_) => false,
            Self::Pending(pending) => !pending.sent,
        }
    }

    pub const fn pending_status(&self) -> Option<PendingStatus> {
        match self {
            Self::Synced(_) => None,
            Self::Pending(pending) => Some(pending.status),
        }
    }

    /// Stringified value of `field`; unknown fields yield an empty string.
    pub fn field_value(&self, field: &SortField) -> String {
        let (created_at, updated_at) = match self {
            Self::Synced(contact) => (&contact.created_at, &contact.updated_at),
            Self::Pending(pending) => (&pending.created_at, &pending.updated_at),
        };
        match field {
            SortField::Name => self.name().to_string(),
            SortField::Phone => self.phone().to_string(),
            SortField::CreatedAt => created_at.clone().unwrap_or_default(),
            SortField::UpdatedAt => updated_at.clone().unwrap_or_default(),
            SortField::Other(_) => String::new(),
        }
    }
}

impl From<Contact> for ContactEntry {
    fn from(contact: Contact) -> Self {
        Self::Synced(contact)
    }
}

impl From<PendingContact> for ContactEntry {
    fn from(pending: PendingContact) -> Self {
        Self::Pending(pending)
    }
}

/// Fields required to create a contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDraft {
    pub name: String,
    pub phone: String,
}

impl ContactDraft {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
        }
    }

    /// Trim both fields and reject empties.
    pub fn validate(self) -> Result<Self> {
        let name = normalize_text_option(Some(self.name))
            .ok_or_else(|| Error::InvalidInput("name cannot be empty".to_string()))?;
        let phone = normalize_text_option(Some(self.phone))
            .ok_or_else(|| Error::InvalidInput("phone cannot be empty".to_string()))?;
        Ok(Self { name, phone })
    }
}

/// Partial update; omitted fields keep their current values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub photo: Option<String>,
    /// Explicitly remove the current photo
    pub clear_photo: bool,
}

impl ContactPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.photo.is_none() && !self.clear_photo
    }

    /// Provided name/phone values must not be blank.
    pub fn validate(mut self) -> Result<Self> {
        if let Some(name) = self.name.take() {
            self.name = Some(
                normalize_text_option(Some(name))
                    .ok_or_else(|| Error::InvalidInput("name cannot be empty".to_string()))?,
            );
        }
        if let Some(phone) = self.phone.take() {
            self.phone = Some(
                normalize_text_option(Some(phone))
                    .ok_or_else(|| Error::InvalidInput("phone cannot be empty".to_string()))?,
            );
        }
        self.photo = normalize_text_option(self.photo.take());
        Ok(self)
    }

    /// Full update payload against the current state of a contact.
    pub fn resolve(&self, name: &str, phone: &str, photo: Option<&str>) -> ResolvedUpdate {
        let photo = if self.clear_photo {
            None
        } else {
            self.photo.clone().or_else(|| photo.map(ToString::to_string))
        };
        ResolvedUpdate {
            name: self.name.clone().unwrap_or_else(|| name.to_string()),
            phone: self.phone.clone().unwrap_or_else(|| phone.to_string()),
            photo,
        }
    }
}

/// Update payload sent to the backend once omitted fields are filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedUpdate {
    pub name: String,
    pub phone: String,
    pub photo: Option<String>,
}

/// Avatar image to upload
#[derive(Clone, PartialEq, Eq)]
pub struct AvatarUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for AvatarUpload {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AvatarUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl AvatarUpload {
    /// Build an upload, guessing the content type from the file name.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(Error::InvalidInput(format!(
                "'{file_name}' is not an image ({content_type})"
            )));
        }
        if bytes.is_empty() {
            return Err(Error::InvalidInput("avatar image is empty".to_string()));
        }
        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn contact(id: &str, name: &str) -> Contact {
        Contact {
            id: ServerId::new(id),
            name: name.to_string(),
            phone: "555".to_string(),
            photo: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn server_id_accepts_numbers_and_strings() {
        let from_number: Contact =
            serde_json::from_str(r#"{"id": 7, "name": "Amy", "phone": "1"}"#).unwrap();
        let from_text: Contact =
            serde_json::from_str(r#"{"id": "7", "name": "Amy", "phone": "1"}"#).unwrap();
        assert_eq!(from_number.id, ServerId::new("7"));
        assert_eq!(from_number, from_text);
    }

    #[test]
    fn contact_ref_parses_by_prefix() {
        assert_eq!(
            "42".parse::<ContactRef>().unwrap(),
            ContactRef::Server(ServerId::new("42"))
        );
        let local = "pending_1".parse::<ContactRef>().unwrap();
        assert!(local.is_local());
        assert_eq!(local.to_string(), "pending_1");
        assert!("pending_".parse::<ContactRef>().is_err());
        assert!("  ".parse::<ContactRef>().is_err());
    }

    #[test]
    fn local_ids_never_look_like_server_ids() {
        let id = ContactRef::Local(LocalId::new());
        assert!(id.to_string().starts_with(LOCAL_ID_PREFIX));
        assert!(id.server_id().is_none());
    }

    #[test]
    fn pending_contact_json_uses_wire_status_names() {
        let pending = PendingContact::for_contact(&contact("2", "Bob"), PendingStatus::AvatarUpdated);
        let json = serde_json::to_value(&pending).unwrap();
        assert_eq!(json["status"], "avatar-updated");
        assert_eq!(json["id"], "2");

        let parsed: PendingContact = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, pending);
    }

    #[test]
    fn draft_validation_trims_and_rejects_empty() {
        let draft = ContactDraft::new("  Amy ", " 222 ").validate().unwrap();
        assert_eq!(draft, ContactDraft::new("Amy", "222"));
        assert!(ContactDraft::new(" ", "1").validate().is_err());
        assert!(ContactDraft::new("Amy", "").validate().is_err());
    }

    #[test]
    fn patch_resolve_preserves_omitted_photo() {
        let patch = ContactPatch {
            name: Some("Bobby".to_string()),
            ..ContactPatch::default()
        };
        let resolved = patch.resolve("Bob", "333", Some("/uploads/bob.png"));
        assert_eq!(resolved.name, "Bobby");
        assert_eq!(resolved.phone, "333");
        assert_eq!(resolved.photo.as_deref(), Some("/uploads/bob.png"));

        let clearing = ContactPatch {
            clear_photo: true,
            ..ContactPatch::default()
        };
        assert_eq!(clearing.resolve("Bob", "333", Some("/x.png")).photo, None);
    }

    #[test]
    fn queued_avatar_restores_bytes() {
        let upload = AvatarUpload::new("me.png", vec![1, 2, 3]).unwrap();
        assert_eq!(upload.content_type, "image/png");
        let restored = QueuedAvatar::from_upload(&upload).to_upload().unwrap();
        assert_eq!(restored, upload);
    }

    #[test]
    fn avatar_upload_rejects_non_images() {
        assert!(AvatarUpload::new("notes.txt", vec![1]).is_err());
        assert!(AvatarUpload::new("me.jpg", Vec::new()).is_err());
    }
}
