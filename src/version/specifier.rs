//! Classification of raw version specifiers

use crate::config::DEFAULT_TAG;
use crate::version::error::ResolveError;
use crate::version::range::valid_range;
use crate::version::semver::valid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecType {
    /// An exact version (`1.2.3`)
    Version,
    /// A semver range (`^1.2.3`, `*`, `1.x`)
    Range,
    /// A dist-tag (`latest`, `next`)
    Tag,
}

/// A classified specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpec {
    pub raw_spec: String,
    /// Trimmed `raw_spec`, `latest` when empty
    pub fetch_spec: String,
    pub spec_type: SpecType,
}

impl VersionSpec {
    /// Classify a raw specifier
    ///
    /// Tries exact version, then range, then tag. Specifiers containing `:`
    /// (`git://`, `npm:`, `https://`, ...) are rejected, as are tags that
    /// URL encoding would alter.
    pub fn parse(raw_spec: &str) -> Result<Self, ResolveError> {
        if is_unsupported_protocol(raw_spec) {
            return Err(ResolveError::UnsupportedProtocol(raw_spec.to_string()));
        }

        let fetch_spec = match raw_spec.trim() {
            "" => DEFAULT_TAG,
            trimmed => trimmed,
        };

        let spec_type = if valid(fetch_spec).is_some() {
            SpecType::Version
        } else if valid_range(fetch_spec) {
            SpecType::Range
        } else if is_valid_tag(fetch_spec) {
            SpecType::Tag
        } else {
            return Err(ResolveError::InvalidTagName(fetch_spec.to_string()));
        };

        Ok(Self {
            raw_spec: raw_spec.to_string(),
            fetch_spec: fetch_spec.to_string(),
            spec_type,
        })
    }
}

fn is_unsupported_protocol(spec: &str) -> bool {
    spec.contains(':')
}

/// Tags must survive `encodeURIComponent` unchanged
fn is_valid_tag(tag: &str) -> bool {
    tag.chars().all(|c| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '!' | '~' | '*' | '\'' | '(' | ')')
    })
}
