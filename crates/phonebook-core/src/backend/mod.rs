//! Contacts backend collaborator and its HTTP transports.
//!
//! The sync engine only talks to [`ContactsBackend`]; [`RestBackend`] and
//! [`GraphQlBackend`] are interchangeable implementations of it.

mod graphql;
mod rest;

pub use graphql::GraphQlBackend;
pub use rest::RestBackend;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{ClientConfig, Transport};
use crate::models::{
    AvatarUpload, Contact, ContactDraft, Preferences, ResolvedUpdate, ServerId, SortField,
    SortOrder,
};
use crate::util::compact_text;

/// Backend failures, classified by whether the offline path may absorb them
#[derive(Debug, Error)]
pub enum BackendError {
    /// Timeout, refused connection, or server-side failure
    #[error("Contacts backend unavailable: {0}")]
    Unavailable(String),
    /// The backend does not know the requested contact
    #[error("Contact not found on server: {0}")]
    NotFound(String),
    /// The backend refused the request as invalid
    #[error("Contacts backend rejected the request: {message} ({status})")]
    Rejected { status: u16, message: String },
    /// The response could not be decoded
    #[error("Invalid contacts backend payload: {0}")]
    InvalidPayload(String),
    /// The client could not be built from its configuration
    #[error("Invalid contacts backend configuration: {0}")]
    InvalidConfiguration(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

impl BackendError {
    /// Transient failures fall back to the local store.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Classify a non-success HTTP response.
    pub fn from_status(status: StatusCode, body: &str, subject: &str) -> Self {
        let message = parse_api_error(status, body);
        match status.as_u16() {
            404 => Self::NotFound(subject.to_string()),
            408 | 429 => Self::Unavailable(message),
            code @ 400..=499 => Self::Rejected {
                status: code,
                message,
            },
            _ => Self::Unavailable(message),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidPayload(error.to_string())
        } else {
            Self::Unavailable(error.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} (HTTP {})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{trimmed} (HTTP {})", status.as_u16())
    }
}

/// One page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl ListQuery {
    pub fn new(prefs: &Preferences, page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
            search: prefs.search_term().map(ToString::to_string),
            sort_by: prefs.sort_by.clone(),
            sort_order: prefs.sort_order,
        }
    }
}

/// One page of server contacts
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContactPage {
    #[serde(alias = "phonebooks")]
    pub contacts: Vec<Contact>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default, alias = "totalPages")]
    pub pages: u32,
    #[serde(default)]
    pub total: u64,
}

const fn first_page() -> u32 {
    1
}

impl ContactPage {
    /// Whether the backend has pages after this one
    pub const fn has_more(&self) -> bool {
        self.page < self.pages
    }
}

/// Operations the sync engine needs from the server (async)
#[allow(async_fn_in_trait)]
pub trait ContactsBackend {
    /// Fetch one page of contacts
    async fn list(&self, query: &ListQuery) -> BackendResult<ContactPage>;

    /// Fetch one contact
    async fn get(&self, id: &ServerId) -> BackendResult<Contact>;

    /// Create a contact; the backend assigns its id
    async fn create(&self, draft: &ContactDraft) -> BackendResult<Contact>;

    /// Replace a contact's editable fields
    async fn update(&self, id: &ServerId, update: &ResolvedUpdate) -> BackendResult<Contact>;

    /// Delete a contact, returning the removed record
    async fn delete(&self, id: &ServerId) -> BackendResult<Contact>;

    /// Upload a new avatar image
    async fn upload_avatar(&self, id: &ServerId, avatar: &AvatarUpload) -> BackendResult<Contact>;
}

/// Backend selected by [`ClientConfig::transport`]
#[derive(Debug, Clone)]
pub enum HttpBackend {
    Rest(RestBackend),
    Graphql(GraphQlBackend),
}

impl HttpBackend {
    pub fn from_config(config: &ClientConfig) -> BackendResult<Self> {
        match config.transport {
            Transport::Rest => Ok(Self::Rest(RestBackend::new(
                &config.api_base_url,
                config.request_timeout(),
            )?)),
            Transport::Graphql => Ok(Self::Graphql(GraphQlBackend::new(
                config.graphql_endpoint(),
                config.request_timeout(),
            )?)),
        }
    }
}

impl ContactsBackend for HttpBackend {
    async fn list(&self, query: &ListQuery) -> BackendResult<ContactPage> {
        match self {
            Self::Rest(backend) => backend.list(query).await,
            Self::Graphql(backend) => backend.list(query).await,
        }
    }

    async fn get(&self, id: &ServerId) -> BackendResult<Contact> {
        match self {
            Self::Rest(backend) => backend.get(id).await,
            Self::Graphql(backend) => backend.get(id).await,
        }
    }

    async fn create(&self, draft: &ContactDraft) -> BackendResult<Contact> {
        match self {
            Self::Rest(backend) => backend.create(draft).await,
            Self::Graphql(backend) => backend.create(draft).await,
        }
    }

    async fn update(&self, id: &ServerId, update: &ResolvedUpdate) -> BackendResult<Contact> {
        match self {
            Self::Rest(backend) => backend.update(id, update).await,
            Self::Graphql(backend) => backend.update(id, update).await,
        }
    }

    async fn delete(&self, id: &ServerId) -> BackendResult<Contact> {
        match self {
            Self::Rest(backend) => backend.delete(id).await,
            Self::Graphql(backend) => backend.delete(id).await,
        }
    }

    async fn upload_avatar(&self, id: &ServerId, avatar: &AvatarUpload) -> BackendResult<Contact> {
        match self {
            Self::Rest(backend) => backend.upload_avatar(id, avatar).await,
            Self::Graphql(backend) => backend.upload_avatar(id, avatar).await,
        }
    }
}
