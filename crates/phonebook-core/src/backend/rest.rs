//! REST transport: `/phonebooks` resource endpoints.

use std::time::Duration;

use reqwest::{multipart, RequestBuilder};
use serde::de::DeserializeOwned;

use super::{BackendError, BackendResult, ContactPage, ContactsBackend, ListQuery};
use crate::models::{AvatarUpload, Contact, ContactDraft, ResolvedUpdate, ServerId};
use crate::util::normalize_base_url;

/// HTTP client for the REST contacts API.
#[derive(Debug, Clone)]
pub struct RestBackend {
    base_url: String,
    client: reqwest::Client,
}

impl RestBackend {
    /// Builds a client for an explicit API base URL; every request uses `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> BackendResult<Self> {
        let base_url = normalize_base_url(base_url, "api_base_url")
            .map_err(BackendError::InvalidConfiguration)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    /// Returns the base URL this client was configured with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/phonebooks", self.base_url)
    }

    fn contact_url(&self, id: &ServerId) -> String {
        format!(
            "{}/phonebooks/{}",
            self.base_url,
            urlencoding::encode(id.as_str())
        )
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder, subject: &str) -> BackendResult<T> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, &body, subject));
        }

        Ok(response.json::<T>().await?)
    }
}

impl ContactsBackend for RestBackend {
    async fn list(&self, query: &ListQuery) -> BackendResult<ContactPage> {
        let mut params = vec![
            ("page", query.page.to_string()),
            ("limit", query.limit.to_string()),
            ("sortBy", query.sort_by.as_str().to_string()),
            ("sortOrder", query.sort_order.as_str().to_string()),
        ];
        if let Some(search) = &query.search {
            params.push(("name", search.clone()));
        }

        let request = self.client.get(self.collection_url()).query(&params);
        Self::send(request, "contact list").await
    }

    async fn get(&self, id: &ServerId) -> BackendResult<Contact> {
        Self::send(self.client.get(self.contact_url(id)), id.as_str()).await
    }

    async fn create(&self, draft: &ContactDraft) -> BackendResult<Contact> {
        let request = self.client.post(self.collection_url()).json(draft);
        Self::send(request, "new contact").await
    }

    async fn update(&self, id: &ServerId, update: &ResolvedUpdate) -> BackendResult<Contact> {
        let request = self.client.put(self.contact_url(id)).json(update);
        Self::send(request, id.as_str()).await
    }

    async fn delete(&self, id: &ServerId) -> BackendResult<Contact> {
        Self::send(self.client.delete(self.contact_url(id)), id.as_str()).await
    }

    async fn upload_avatar(&self, id: &ServerId, avatar: &AvatarUpload) -> BackendResult<Contact> {
        let part = multipart::Part::bytes(avatar.bytes.clone())
            .file_name(avatar.file_name.clone())
            .mime_str(&avatar.content_type)?;
        let form = multipart::Form::new().part("photo", part);

        let url = format!("{}/avatar", self.contact_url(id));
        Self::send(self.client.put(url).multipart(form), id.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_url_encodes_ids() {
        let backend = RestBackend::new("http://localhost:3000/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:3000/api");
        assert_eq!(
            backend.contact_url(&ServerId::new("a b")),
            "http://localhost:3000/api/phonebooks/a%20b"
        );
    }

    #[test]
    fn new_rejects_missing_scheme() {
        assert!(RestBackend::new("localhost:3000", Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn unreachable_server_is_transient() {
        let backend = RestBackend::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let error = backend
            .get(&ServerId::new("1"))
            .await
            .expect_err("nothing listens on the discard port");
        assert!(error.is_transient());
    }
}
