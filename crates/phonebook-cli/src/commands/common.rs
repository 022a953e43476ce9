use std::env;
use std::path::{Path, PathBuf};

use phonebook_core::models::{AvatarUpload, ContactEntry, ContactRef, PendingStatus};
use phonebook_core::{
    ClientConfig, ContactListState, ContactsViewModel, HttpBackend, LibSqlStore, SyncEngine,
};
use serde::Serialize;

use crate::config_profiles::{normalize_text_option, CliProfilesConfig};
use crate::error::CliError;

pub type ViewModel = ContactsViewModel<HttpBackend, LibSqlStore>;

/// Resolved profile, backend settings, and store location.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub profile: String,
    pub config: ClientConfig,
    pub store_path: PathBuf,
}

impl AppContext {
    pub fn resolve(profile: Option<&str>, store_path: Option<PathBuf>) -> Result<Self, CliError> {
        let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
        Self::from_profiles(&profiles, profile, store_path, |key| env::var(key).ok())
    }

    pub fn from_profiles(
        profiles: &CliProfilesConfig,
        explicit_profile: Option<&str>,
        store_path: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CliError> {
        let profile_name =
            profiles.resolve_profile_name_with(explicit_profile, lookup("PHONEBOOK_PROFILE"));
        let profile = profiles.profile(&profile_name).cloned().unwrap_or_default();
        let config = profile.client_config().with_overrides(&lookup)?;

        let store_path = match store_path
            .or_else(|| normalize_text_option(lookup("PHONEBOOK_STORE_PATH")).map(PathBuf::from))
            .or_else(|| profile.store_path())
        {
            Some(path) => path,
            None => default_store_path(&profile_name)?,
        };

        Ok(Self {
            profile: profile_name,
            config,
            store_path,
        })
    }

    /// Open the local store and wire up a view-model for this context.
    pub async fn open(&self) -> Result<ViewModel, CliError> {
        let backend = HttpBackend::from_config(&self.config)?;
        let store = LibSqlStore::open(&self.store_path).await?;
        let engine = SyncEngine::new(backend, store, self.config.page_size);
        tracing::debug!(
            "Profile '{}' using {} ({}) with store {}",
            self.profile,
            self.config.api_base_url,
            self.config.transport,
            self.store_path.display()
        );
        Ok(ContactsViewModel::new(engine).await?)
    }
}

pub fn default_store_path(profile: &str) -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("phonebook").join(format!("{profile}.db")))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

#[derive(Debug, Serialize)]
pub struct ContactListItem {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub photo: Option<String>,
    pub status: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContactListOutput {
    pub contacts: Vec<ContactListItem>,
    pub page: u32,
    pub total_pages: u32,
    pub has_more: bool,
    pub offline: bool,
    pub search: String,
    pub sort_by: String,
    pub sort_order: String,
}

pub fn entry_status(entry: &ContactEntry) -> &'static str {
    match entry {
        ContactEntry::Synced(_) => "synced",
        ContactEntry::Pending(pending) if pending.sent => "sent",
        ContactEntry::Pending(pending) => pending.status.as_str(),
    }
}

pub fn contact_to_list_item(entry: &ContactEntry) -> ContactListItem {
    let (created_at, updated_at) = match entry {
        ContactEntry::Synced(contact) => (contact.created_at.clone(), contact.updated_at.clone()),
        ContactEntry::Pending(pending) => (pending.created_at.clone(), pending.updated_at.clone()),
    };
    ContactListItem {
        id: entry.id().to_string(),
        name: entry.name().to_string(),
        phone: entry.phone().to_string(),
        photo: entry.photo().map(ToString::to_string),
        status: entry_status(entry).to_string(),
        created_at,
        updated_at,
    }
}

pub fn list_output(state: &ContactListState) -> ContactListOutput {
    ContactListOutput {
        contacts: state.contacts.iter().map(contact_to_list_item).collect(),
        page: state.page,
        total_pages: state.total_pages,
        has_more: state.has_more,
        offline: state.is_offline,
        search: state.preferences.search.clone(),
        sort_by: state.preferences.sort_by.to_string(),
        sort_order: state.preferences.sort_order.to_string(),
    }
}

fn status_marker(entry: &ContactEntry) -> &'static str {
    match entry {
        ContactEntry::Synced(_) => "",
        ContactEntry::Pending(pending) if pending.sent => "[sent]",
        ContactEntry::Pending(pending) => match pending.status {
            PendingStatus::Pending if pending.id.is_local() => "[not synced]",
            PendingStatus::Pending => "[edit pending]",
            PendingStatus::AvatarUpdated => "[avatar pending]",
            PendingStatus::Deleted => "[delete pending]",
        },
    }
}

pub fn format_contact_line(entry: &ContactEntry) -> String {
    let id = entry.id().to_string();
    let name = truncate(entry.name(), 28);
    let marker = status_marker(entry);
    let line = format!("{id:<12}  {name:<28}  {:<16}  {marker}", entry.phone());
    line.trim_end().to_string()
}

pub fn format_contact_lines(entries: &[ContactEntry]) -> Vec<String> {
    entries.iter().map(format_contact_line).collect()
}

pub fn format_list_footer(state: &ContactListState) -> String {
    let mut footer = if state.contacts.is_empty() {
        "No contacts".to_string()
    } else {
        format!(
            "{} contacts, page {} of {}",
            state.contacts.len(),
            state.page,
            state.total_pages.max(state.page)
        )
    };
    if state.has_more {
        footer.push_str(", more available");
    }
    if state.preferences.search_active() {
        footer.push_str(&format!(", search '{}'", state.preferences.search));
    }
    if state.is_offline {
        footer.push_str(" (offline, showing local data)");
    }
    footer
}

pub fn print_list(state: &ContactListState, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&list_output(state))?);
        return Ok(());
    }
    for line in format_contact_lines(&state.contacts) {
        println!("{line}");
    }
    for hidden in &state.hidden_by_filter {
        println!("{hidden} no longer matches the search");
    }
    println!("{}", format_list_footer(state));
    Ok(())
}

pub fn print_entry(entry: &ContactEntry, offline: bool) {
    println!("{}", format_contact_line(entry));
    if offline {
        println!("Backend unreachable; the change is saved locally. Run `phonebook sync` later.");
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let mut truncated = value
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn parse_contact_id(id: &str) -> Result<ContactRef, CliError> {
    if id.trim().is_empty() {
        return Err(CliError::EmptyContactId);
    }
    Ok(id.parse()?)
}

pub fn read_avatar(path: &Path) -> Result<AvatarUpload, CliError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CliError::InvalidAvatarPath(path.display().to_string()))?;
    let bytes = std::fs::read(path)?;
    Ok(AvatarUpload::new(file_name, bytes)?)
}
