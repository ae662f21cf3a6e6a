//! Loose semantic-version parsing shared by the range grammar and the selector

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};

/// Pre-release identifiers as npm accepts them in loose mode
pub(crate) const PRERELEASE: &str =
    r"(?:\d+|\d*[a-zA-Z-][a-zA-Z0-9-]*)(?:\.(?:\d+|\d*[a-zA-Z-][a-zA-Z0-9-]*))*";

/// Build metadata identifiers
pub(crate) const BUILD: &str = r"[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*";

/// Largest version component npm accepts (`Number.MAX_SAFE_INTEGER`)
pub(crate) const MAX_COMPONENT: u64 = 9_007_199_254_740_991;

static LOOSE_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^[v=\s]*(\d+)\.(\d+)\.(\d+)(?:-?({PRERELEASE}))?(?:\+({BUILD}))?$"
    ))
    .expect("loose version pattern is valid")
});

/// Parse a full version the way npm's loose mode does.
///
/// Accepts leading `v`/`=` and whitespace, and a pre-release without the `-`
/// separator. Partial versions like "1.2" are ranges, not versions.
///
/// Examples:
/// - "1.2.3" -> Version(1, 2, 3)
/// - "v1.2.3" -> Version(1, 2, 3)
/// - "=1.2.3beta" -> Version(1, 2, 3, pre: beta)
pub fn parse_loose(input: &str) -> Option<Version> {
    let caps = LOOSE_VERSION.captures(input.trim())?;
    build_version(
        parse_component(&caps[1])?,
        parse_component(&caps[2])?,
        parse_component(&caps[3])?,
        caps.get(4).map(|m| m.as_str()),
        caps.get(5).map(|m| m.as_str()),
    )
}

/// Parse one numeric component, rejecting values above [`MAX_COMPONENT`]
pub(crate) fn parse_component(input: &str) -> Option<u64> {
    input.parse().ok().filter(|n| *n <= MAX_COMPONENT)
}

/// Assemble a version, normalizing numeric pre-release identifiers ("01" -> "1")
pub(crate) fn build_version(
    major: u64,
    minor: u64,
    patch: u64,
    pre: Option<&str>,
    build: Option<&str>,
) -> Option<Version> {
    let pre = match pre {
        Some(pre) => {
            let normalized: Vec<&str> = pre
                .split('.')
                .map(|id| {
                    if id.bytes().all(|b| b.is_ascii_digit()) {
                        match id.trim_start_matches('0') {
                            "" => "0",
                            trimmed => trimmed,
                        }
                    } else {
                        id
                    }
                })
                .collect();
            Prerelease::new(&normalized.join(".")).ok()?
        }
        None => Prerelease::EMPTY,
    };
    let build = build
        .and_then(|b| BuildMetadata::new(b).ok())
        .unwrap_or(BuildMetadata::EMPTY);

    Some(Version {
        major,
        minor,
        patch,
        pre,
        build,
    })
}

/// Canonical string form: `major.minor.patch[-pre]`, build metadata dropped
pub fn format_version(version: &Version) -> String {
    if version.pre.is_empty() {
        format!("{}.{}.{}", version.major, version.minor, version.patch)
    } else {
        format!(
            "{}.{}.{}-{}",
            version.major, version.minor, version.patch, version.pre
        )
    }
}

/// Returns the canonical form of `input` if it is a valid version
pub fn valid(input: &str) -> Option<String> {
    parse_loose(input).map(|v| format_version(&v))
}

/// Strips surrounding whitespace and leading `=`/`v` before validating
pub fn clean(input: &str) -> Option<String> {
    valid(input.trim().trim_start_matches(['=', 'v']))
}

/// Precedence order; build metadata does not take part
pub fn compare(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

/// Reverse precedence order (highest first)
pub fn rcompare(a: &Version, b: &Version) -> Ordering {
    compare(b, a)
}
