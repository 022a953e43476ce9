//! Client configuration for reaching the contacts backend.
//!
//! `ClientConfig` is shared by every front end; the CLI persists it per
//! profile and layers environment overrides on top.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{normalize_base_url, normalize_text_option};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_GRAPHQL_PATH: &str = "/graphql";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// Wire protocol used to talk to the contacts backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Rest,
    #[serde(alias = "graph_ql")]
    Graphql,
}

impl Transport {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Graphql => "graphql",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(Self::Rest),
            "graphql" | "graph_ql" | "gql" => Ok(Self::Graphql),
            other => Err(Error::Config(format!(
                "transport must be rest or graphql, got '{other}'"
            ))),
        }
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default = "default_graphql_path")]
    pub graphql_path: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_graphql_path() -> String {
    DEFAULT_GRAPHQL_PATH.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            transport: Transport::default(),
            graphql_path: default_graphql_path(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Validate and normalize every field.
    pub fn normalized(mut self) -> Result<Self> {
        self.api_base_url =
            normalize_base_url(&self.api_base_url, "api_base_url").map_err(Error::Config)?;

        let path = normalize_text_option(Some(self.graphql_path))
            .unwrap_or_else(default_graphql_path);
        self.graphql_path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };

        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(self)
    }

    /// Apply `PHONEBOOK_*` overrides read through `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = normalize_text_option(lookup("PHONEBOOK_API_URL")) {
            self.api_base_url = url;
        }
        if let Some(transport) = normalize_text_option(lookup("PHONEBOOK_TRANSPORT")) {
            self.transport = transport.parse()?;
        }
        if let Some(timeout) = normalize_text_option(lookup("PHONEBOOK_TIMEOUT_SECS")) {
            self.request_timeout_secs = timeout.parse().map_err(|_| {
                Error::Config(format!("PHONEBOOK_TIMEOUT_SECS is not a number: {timeout}"))
            })?;
        }
        if let Some(page_size) = normalize_text_option(lookup("PHONEBOOK_PAGE_SIZE")) {
            self.page_size = page_size.parse().map_err(|_| {
                Error::Config(format!("PHONEBOOK_PAGE_SIZE is not a number: {page_size}"))
            })?;
        }
        self.normalized()
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Full GraphQL endpoint URL.
    pub fn graphql_endpoint(&self) -> String {
        format!("{}{}", self.api_base_url, self.graphql_path)
    }
}
