//! Transport trait for fetching packument documents

use std::collections::HashMap;

#[cfg(test)]
use mockall::automock;
use reqwest::header::ACCEPT;

use crate::version::error::RegistryError;

/// Raw registry response; header names are lowercase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RegistryResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Trait for issuing registry requests
///
/// Implementations only move bytes: status mapping and decoding happen in
/// [`PackumentStore`](crate::registry::store::PackumentStore). Cancellation and
/// timeouts belong here too; a cancelled request is reported as an error.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET for `url` with the given `Accept` header
    async fn fetch(&self, url: &str, accept: &str) -> Result<RegistryResponse, RegistryError>;
}

/// Transport backed by reqwest
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Use a preconfigured client (proxies, timeouts, ...)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, accept: &str) -> Result<RegistryResponse, RegistryError> {
        let response = self.client.get(url).header(ACCEPT, accept).send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(RegistryResponse {
            status,
            headers,
            body,
        })
    }
}
