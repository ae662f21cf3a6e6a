//! Resolver facade: registry URL building, packument fetch and manifest pick

use std::sync::Arc;

use tracing::info;

use crate::config::{PickOptions, RegistryConfig};
use crate::registry::retry::{BackoffRetry, RetryPolicy};
use crate::registry::store::PackumentStore;
use crate::registry::transport::{HttpTransport, Transport};
use crate::version::error::{RegistryError, ResolveError};
use crate::version::packument::{Manifest, Packument};
use crate::version::policy::pick_manifest;

/// Resolves `name@spec` against one registry
#[derive(Clone)]
pub struct Resolver {
    store: PackumentStore,
    registry: String,
    full_metadata: bool,
}

impl Resolver {
    /// Build a resolver over `transport`, with backoff retry when configured
    pub fn new(config: &RegistryConfig, transport: Arc<dyn Transport>) -> Self {
        let retry = BackoffRetry::from_config(&config.retry)
            .map(|policy| Arc::new(policy) as Arc<dyn RetryPolicy>);
        Self::with_store(config, PackumentStore::new(transport, retry))
    }

    /// Build a resolver sharing an existing store
    pub fn with_store(config: &RegistryConfig, store: PackumentStore) -> Self {
        Self {
            store,
            registry: normalize_registry(&config.url),
            full_metadata: config.full_metadata,
        }
    }

    /// Build a resolver that talks HTTP through reqwest
    pub fn from_config(config: &RegistryConfig) -> Result<Self, RegistryError> {
        Ok(Self::new(config, Arc::new(HttpTransport::new()?)))
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn store(&self) -> &PackumentStore {
        &self.store
    }

    /// URL of the packument for `name`
    pub fn packument_url(&self, name: &str) -> String {
        format!("{}{}", self.registry, encode_package_name(name))
    }

    pub async fn packument(&self, name: &str) -> Result<Arc<Packument>, RegistryError> {
        let url = self.packument_url(name);
        self.store.fetch(&url, name, self.full_metadata).await
    }

    /// Fetch the packument for `name` and pick the manifest `wanted` refers to
    pub async fn resolve(
        &self,
        name: &str,
        wanted: &str,
        opts: &PickOptions,
    ) -> Result<Manifest, ResolveError> {
        let packument = self.packument(name).await?;
        let manifest = pick_manifest(&packument, wanted, opts)?;
        info!("Resolved {}@{} to {}", name, wanted, manifest.version);
        Ok(manifest)
    }
}

/// Ensure the registry URL ends with exactly one `/`
pub fn normalize_registry(url: &str) -> String {
    format!("{}/", url.trim_end_matches('/'))
}

/// Encode package name for URL (handles scoped packages)
fn encode_package_name(package_name: &str) -> String {
    if package_name.starts_with('@') {
        // Scoped package: @scope/name -> @scope%2Fname
        package_name.replace('/', "%2F")
    } else {
        package_name.to_string()
    }
}
