//! Registry metadata documents

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A package's metadata document as served by the registry
///
/// Maps keep the document order, so duplicate version keys across
/// `versions`, `stagedVersions` and `policyRestrictions` tie-break in that order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Packument {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: IndexMap<String, String>,
    #[serde(default)]
    pub versions: IndexMap<String, Manifest>,
    /// Publish times keyed by version, plus `created`/`modified`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<IndexMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(
        rename = "stagedVersions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub staged_versions: Option<StagedVersions>,
    #[serde(
        rename = "policyRestrictions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub policy_restrictions: Option<PolicyRestrictions>,
    /// Set when the response was served from a local cache
    #[serde(rename = "_cached", default)]
    pub cached: bool,
    /// Value of the `content-length` response header, 0 when absent
    #[serde(rename = "_contentLength", default)]
    pub content_length: u64,
    /// Fields this crate does not interpret (`_id`, `description`, `maintainers`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StagedVersions {
    #[serde(default)]
    pub versions: IndexMap<String, Manifest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolicyRestrictions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub versions: IndexMap<String, Manifest>,
}

impl Packument {
    /// Staged releases; empty unless the caller opts in
    pub fn staged(&self, include_staged: bool) -> Option<&IndexMap<String, Manifest>> {
        self.staged_versions
            .as_ref()
            .filter(|_| include_staged)
            .map(|s| &s.versions)
    }

    pub fn restricted(&self) -> Option<&IndexMap<String, Manifest>> {
        self.policy_restrictions.as_ref().map(|p| &p.versions)
    }

    pub fn is_restricted(&self, version: &str) -> bool {
        self.restricted().is_some_and(|r| r.contains_key(version))
    }

    pub fn restriction_message(&self) -> &str {
        self.policy_restrictions
            .as_ref()
            .and_then(|p| p.message.as_deref())
            .unwrap_or_default()
    }

    /// Look a version up in `versions`, then staged, then restricted releases
    pub fn find_manifest(&self, version: &str, include_staged: bool) -> Option<&Manifest> {
        self.versions
            .get(version)
            .or_else(|| self.staged(include_staged)?.get(version))
            .or_else(|| self.restricted()?.get(version))
    }
}

/// One release's metadata
///
/// Fields this crate does not interpret (dist, dependency maps, bin, ...) are
/// kept in `extra` and serialized back unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(
        default,
        deserialize_with = "deserialize_engines",
        skip_serializing_if = "Option::is_none"
    )]
    pub engines: Option<Engines>,
    /// `true` or a deprecation message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Value>,
    /// Set when the manifest matched the caller's avoid range
    #[serde(
        rename = "_shouldAvoid",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub should_avoid: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    pub fn is_deprecated(&self) -> bool {
        match &self.deprecated {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !s.is_empty(),
            _ => false,
        }
    }

    /// Whether the given runtime versions satisfy this release's `engines`
    ///
    /// Missing engines, missing engine ranges and missing runtime versions all pass.
    pub fn engine_ok(&self, node_version: Option<&str>, npm_version: Option<&str>) -> bool {
        let Some(engines) = &self.engines else {
            return true;
        };
        let dimension_ok = |wanted: Option<&String>, actual: Option<&str>| match (wanted, actual) {
            (Some(range), Some(version)) => crate::version::range::satisfies(version, range, true),
            _ => true,
        };

        dimension_ok(engines.node.as_ref(), node_version)
            && dimension_ok(engines.npm.as_ref(), npm_version)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Engines {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npm: Option<String>,
}

/// Old packages publish `engines` as arrays or with non-string ranges; treat those as absent
fn deserialize_engines<'de, D>(deserializer: D) -> Result<Option<Engines>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Object(map) = value else {
        return Ok(None);
    };
    let range = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

    Ok(Some(Engines {
        node: range("node"),
        npm: range("npm"),
    }))
}
