use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::version::cutoff::deserialize_before;

// =============================================================================
// Registry constants
// =============================================================================

/// Default registry base URL
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// Dist-tag used when no specifier is given
pub const DEFAULT_TAG: &str = "latest";

/// Accept header for full packuments
pub const FULL_DOC: &str = "application/json";

/// Accept header preferring abbreviated ("corgi") packuments
pub const CORGI_DOC: &str =
    "application/vnd.npm.install-v1+json; q=1.0, application/json; q=0.8, */*";

/// Response header set when the packument came from a local cache
pub const LOCAL_CACHE_HEADER: &str = "x-local-cache";

/// Default delay before the first retry in milliseconds (1 second)
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Upper bound for a single retry delay in milliseconds (30 seconds)
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Top-level resolver configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ResolveConfig {
    pub registry: RegistryConfig,
    pub pick: PickOptions,
}

/// Where and how packuments are fetched
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct RegistryConfig {
    /// Registry base URL
    pub url: String,
    /// Always request full packuments instead of abbreviated ones
    pub full_metadata: bool,
    pub retry: RetryConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY.to_string(),
            full_metadata: false,
            retry: RetryConfig::default(),
        }
    }
}

/// Backoff settings for the built-in retry policy
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct RetryConfig {
    /// Number of retries after the first failure; 0 disables retrying
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

/// Options recognised by manifest selection
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct PickOptions {
    /// Tag used when the specifier is empty, and for the range fast path
    pub default_tag: String,
    /// Only releases published at or before this instant are eligible
    #[serde(deserialize_with = "deserialize_before")]
    pub before: Option<DateTime<Utc>>,
    pub node_version: Option<String>,
    pub npm_version: Option<String>,
    /// Let staged releases take part in selection
    pub include_staged: bool,
    /// Versions to deprioritize without excluding them
    pub avoid: Option<String>,
}

impl Default for PickOptions {
    fn default() -> Self {
        Self {
            default_tag: DEFAULT_TAG.to_string(),
            before: None,
            node_version: None,
            npm_version: None,
            include_staged: false,
            avoid: None,
        }
    }
}
