use std::sync::Arc;

use thiserror::Error;

/// Failures while acquiring a packument.
///
/// Cloneable: one shared fetch hands the same failure to every caller that joined it.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("Network error: {0}")]
    Network(Arc<reqwest::Error>),

    #[error("Rate limited: retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Package not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        RegistryError::Network(Arc::new(err))
    }
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}

/// Failures while turning a specifier into a manifest
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Unsupported version specifier \"{0}\": git, npm, http and https specifiers cannot be resolved against a registry")]
    UnsupportedProtocol(String),

    #[error(
        "Invalid tag name \"{0}\": Tags may not have any characters that encodeURIComponent encodes."
    )]
    InvalidTagName(String),

    /// Unreachable with the closed [`SpecType`](crate::version::specifier::SpecType) enum
    #[error("Only tag, version, and range are supported")]
    UnsupportedSpecType,

    #[error("No versions available for {0}")]
    NoVersionsAvailable(String),

    #[error("No matching version found for \"{0}\".")]
    NoMatchingVersion(String),

    #[error("Could not download \"{package}\" due to policy violations:\n\"{message}\"")]
    PolicyViolation { package: String, message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
