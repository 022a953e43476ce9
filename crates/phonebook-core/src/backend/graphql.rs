//! GraphQL transport: the same operations posted to a single endpoint.

use std::time::Duration;

use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{BackendError, BackendResult, ContactPage, ContactsBackend, ListQuery};
use crate::models::{AvatarUpload, Contact, ContactDraft, ResolvedUpdate, ServerId};
use crate::util::normalize_base_url;

const CONTACT_FIELDS: &str = "id name phone photo createdAt updatedAt";

/// HTTP client for the GraphQL contacts API.
#[derive(Debug, Clone)]
pub struct GraphQlBackend {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl GraphQlBackend {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> BackendResult<Self> {
        let endpoint = normalize_base_url(&endpoint.into(), "graphql endpoint")
            .map_err(BackendError::InvalidConfiguration)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        field: &str,
        subject: &str,
    ) -> BackendResult<T> {
        let request = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }));
        self.send(request, field, subject).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        field: &str,
        subject: &str,
    ) -> BackendResult<T> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, &body, subject));
        }

        let payload = response.json::<GraphQlResponse>().await?;
        extract_field(payload, field, subject)
    }
}

fn extract_field<T: DeserializeOwned>(
    payload: GraphQlResponse,
    field: &str,
    subject: &str,
) -> BackendResult<T> {
    if let Some(error) = payload.errors.into_iter().next() {
        let message = error.message.trim().to_string();
        if message.to_ascii_lowercase().contains("not found") {
            return Err(BackendError::NotFound(subject.to_string()));
        }
        return Err(BackendError::Rejected {
            status: 200,
            message,
        });
    }

    let value = payload
        .data
        .and_then(|mut data| data.get_mut(field).map(Value::take))
        .filter(|value| !value.is_null())
        .ok_or_else(|| {
            if field == "contact" {
                BackendError::NotFound(subject.to_string())
            } else {
                BackendError::InvalidPayload(format!("response did not include '{field}'"))
            }
        })?;

    serde_json::from_value(value).map_err(|error| BackendError::InvalidPayload(error.to_string()))
}

impl ContactsBackend for GraphQlBackend {
    async fn list(&self, query: &ListQuery) -> BackendResult<ContactPage> {
        let document = format!(
            "query Contacts($page: Int, $limit: Int, $search: String, $sortBy: String, $sortOrder: String) {{
                contacts(page: $page, limit: $limit, search: $search, sortBy: $sortBy, sortOrder: $sortOrder) {{
                    contacts {{ {CONTACT_FIELDS} }}
                    page
                    pages
                    total
                }}
            }}"
        );
        let variables = json!({
            "page": query.page,
            "limit": query.limit,
            "search": query.search,
            "sortBy": query.sort_by.as_str(),
            "sortOrder": query.sort_order.as_str(),
        });
        self.execute(&document, variables, "contacts", "contact list")
            .await
    }

    async fn get(&self, id: &ServerId) -> BackendResult<Contact> {
        let document = format!("query Contact($id: ID!) {{ contact(id: $id) {{ {CONTACT_FIELDS} }} }}");
        self.execute(&document, json!({ "id": id }), "contact", id.as_str())
            .await
    }

    async fn create(&self, draft: &ContactDraft) -> BackendResult<Contact> {
        let document = format!(
            "mutation AddContact($name: String!, $phone: String!) {{
                addContact(name: $name, phone: $phone) {{ {CONTACT_FIELDS} }}
            }}"
        );
        let variables = json!({ "name": draft.name, "phone": draft.phone });
        self.execute(&document, variables, "addContact", "new contact")
            .await
    }

    async fn update(&self, id: &ServerId, update: &ResolvedUpdate) -> BackendResult<Contact> {
        let document = format!(
            "mutation UpdateContact($id: ID!, $name: String, $phone: String, $photo: String) {{
                updateContact(id: $id, name: $name, phone: $phone, photo: $photo) {{ {CONTACT_FIELDS} }}
            }}"
        );
        let variables = json!({
            "id": id,
            "name": update.name,
            "phone": update.phone,
            "photo": update.photo,
        });
        self.execute(&document, variables, "updateContact", id.as_str())
            .await
    }

    async fn delete(&self, id: &ServerId) -> BackendResult<Contact> {
        let document = format!(
            "mutation DeleteContact($id: ID!) {{ deleteContact(id: $id) {{ {CONTACT_FIELDS} }} }}"
        );
        self.execute(&document, json!({ "id": id }), "deleteContact", id.as_str())
            .await
    }

    /// Uses the GraphQL multipart request convention (`operations`, `map`, file part `0`).
    async fn upload_avatar(&self, id: &ServerId, avatar: &AvatarUpload) -> BackendResult<Contact> {
        let document = format!(
            "mutation UploadPhoto($id: ID!, $file: Upload!) {{
                uploadPhoto(id: $id, file: $file) {{ {CONTACT_FIELDS} }}
            }}"
        );
        let operations = json!({
            "query": document,
            "variables": { "id": id, "file": null },
        });
        let map = json!({ "0": ["variables.file"] });

        let part = multipart::Part::bytes(avatar.bytes.clone())
            .file_name(avatar.file_name.clone())
            .mime_str(&avatar.content_type)?;
        let form = multipart::Form::new()
            .text("operations", operations.to_string())
            .text("map", map.to_string())
            .part("0", part);

        let request = self
            .client
            .post(&self.endpoint)
            .header("apollo-require-preflight", "true")
            .multipart(form);
        self.send(request, "uploadPhoto", id.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(raw: &str) -> GraphQlResponse {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn extract_field_decodes_data() {
        let payload = response(r#"{"data": {"addContact": {"id": "9", "name": "Amy", "phone": "222"}}}"#);
        let contact: Contact = extract_field(payload, "addContact", "new contact").unwrap();
        assert_eq!(contact.id, ServerId::new("9"));
    }

    #[test]
    fn not_found_errors_are_classified() {
        let payload = response(r#"{"data": null, "errors": [{"message": "Contact not found"}]}"#);
        let error = extract_field::<Contact>(payload, "updateContact", "4").unwrap_err();
        assert!(matches!(error, BackendError::NotFound(id) if id == "4"));
    }

    #[test]
    fn null_contact_means_not_found() {
        let payload = response(r#"{"data": {"contact": null}}"#);
        let error = extract_field::<Contact>(payload, "contact", "4").unwrap_err();
        assert!(matches!(error, BackendError::NotFound(_)));
    }

    #[test]
    fn other_errors_are_rejections() {
        let payload = response(r#"{"errors": [{"message": "name is required"}]}"#);
        let error = extract_field::<Contact>(payload, "addContact", "new contact").unwrap_err();
        assert!(!error.is_transient());
        assert!(matches!(error, BackendError::Rejected { .. }));
    }
}
