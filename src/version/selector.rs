//! Manifest selection
//!
//! Picks one release out of a packument for a classified specifier:
//! - Tag: the pinned version, or the best release at or below it when the
//!   tag was published after the cutoff
//! - Version: that exact version, if old enough
//! - Range: the default tag when it fits, otherwise the best-ranked candidate

use std::cmp::Ordering;

use semver::Version;
use tracing::debug;

use crate::config::PickOptions;
use crate::version::cutoff::Cutoff;
use crate::version::error::ResolveError;
use crate::version::packument::{Manifest, Packument};
use crate::version::range::Range;
use crate::version::semver::{clean, parse_loose, rcompare};
use crate::version::specifier::{SpecType, VersionSpec};

/// Select the best manifest for `wanted`
///
/// # Returns
/// * `Ok(Some(manifest))` - The chosen release, `should_avoid` set if it matches `opts.avoid`
/// * `Ok(None)` - Nothing matched; [`finalize`](crate::version::policy::finalize) turns this into an error
/// * `Err(ResolveError)` - The specifier is unusable, or no release passes the cutoff
pub fn select(
    packument: &Packument,
    wanted: &str,
    opts: &PickOptions,
) -> Result<Option<Manifest>, ResolveError> {
    let selector = Selector::new(packument, opts);
    let spec = VersionSpec::parse(if wanted.is_empty() {
        &opts.default_tag
    } else {
        wanted
    })?;

    match spec.spec_type {
        // An empty specifier only borrows the default tag's name; it selects like `*`
        _ if wanted.is_empty() => selector.select_range("*"),
        SpecType::Tag => selector.select_tag(&spec.fetch_spec),
        SpecType::Version => Ok(selector.select_version(&spec.fetch_spec)),
        SpecType::Range => selector.select_range(&spec.fetch_spec),
    }
}

/// A release that survived cutoff and range filtering, with its ranking inputs
struct Candidate<'a> {
    version: Version,
    manifest: &'a Manifest,
    avoided: bool,
    restricted: bool,
    staged: bool,
    deprecated: bool,
    engine_ok: bool,
}

impl Candidate<'_> {
    /// false sorts first, so every flag marks something to push down the list
    fn rank(&self) -> (bool, bool, bool, bool, bool, bool) {
        (
            self.avoided,
            self.restricted,
            self.staged,
            self.deprecated || !self.engine_ok,
            !self.engine_ok,
            self.deprecated,
        )
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| rcompare(&self.version, &other.version))
    }
}

struct Selector<'a> {
    packument: &'a Packument,
    opts: &'a PickOptions,
    cutoff: Cutoff<'a>,
    avoid: Option<Range>,
}

impl<'a> Selector<'a> {
    fn new(packument: &'a Packument, opts: &'a PickOptions) -> Self {
        Self {
            packument,
            opts,
            cutoff: Cutoff::new(packument.time.as_ref(), opts.before),
            avoid: opts
                .avoid
                .as_deref()
                .and_then(|avoid| Range::parse(avoid, true)),
        }
    }

    fn should_avoid(&self, version: &str) -> bool {
        match (&self.avoid, parse_loose(version)) {
            (Some(avoid), Some(version)) => avoid.satisfies(&version),
            _ => false,
        }
    }

    fn decorate(&self, manifest: &Manifest) -> Manifest {
        let mut manifest = manifest.clone();
        if self.should_avoid(&manifest.version) {
            manifest.should_avoid = true;
        }
        manifest
    }

    fn find(&self, version: &str) -> Option<&'a Manifest> {
        self.packument
            .find_manifest(version, self.opts.include_staged)
    }

    fn select_tag(&self, tag: &str) -> Result<Option<Manifest>, ResolveError> {
        let Some(pinned) = self.packument.dist_tags.get(tag) else {
            debug!("dist-tag {} not found for {}", tag, self.packument.name);
            return Ok(None);
        };

        if self.cutoff.allows(pinned) {
            return Ok(self.find(pinned).map(|m| self.decorate(m)));
        }

        // The tag moved past the cutoff: take the best release at or below it
        debug!(
            "dist-tag {}@{} is newer than the cutoff, falling back to <={}",
            tag, pinned, pinned
        );
        self.select_range(&format!("<={pinned}"))
    }

    fn select_version(&self, spec: &str) -> Option<Manifest> {
        let version = clean(spec)?;
        let manifest = self.find(&version)?;
        self.cutoff
            .allows(&version)
            .then(|| self.decorate(manifest))
    }

    fn select_range(&self, range_spec: &str) -> Result<Option<Manifest>, ResolveError> {
        let is_wildcard = range_spec == "*";
        let range = Range::parse(range_spec, false);
        let in_range = |version: &str| {
            is_wildcard
                || range
                    .as_ref()
                    .zip(parse_loose(version))
                    .is_some_and(|(range, version)| range.satisfies(&version))
        };

        // Fast path: the default tag already fits
        if let Some(default_version) = self.packument.dist_tags.get(&self.opts.default_tag)
            && in_range(default_version)
            && !self.should_avoid(default_version)
            && let Some(manifest) = self.packument.versions.get(default_version)
            && self.cutoff.allows(default_version)
        {
            return Ok(Some(manifest.clone()));
        }

        let staged = self.packument.staged(self.opts.include_staged);
        let restricted = self.packument.restricted();
        let entries: Vec<(&String, &Manifest)> = self
            .packument
            .versions
            .iter()
            .chain(staged.into_iter().flatten())
            .chain(restricted.into_iter().flatten())
            .filter(|(version, _)| self.cutoff.allows(version))
            .collect();

        if entries.is_empty() {
            return Err(ResolveError::NoVersionsAvailable(self.packument.name.clone()));
        }

        let Some(range) = range else {
            return Ok(None);
        };

        let node_version = self.opts.node_version.as_deref();
        let npm_version = self.opts.npm_version.as_deref();
        let mut candidates: Vec<Candidate<'_>> = entries
            .into_iter()
            .filter_map(|(version_str, manifest)| {
                let version = parse_loose(version_str)?;
                if !range.satisfies(&version) {
                    return None;
                }
                Some(Candidate {
                    avoided: self
                        .avoid
                        .as_ref()
                        .is_some_and(|avoid| avoid.satisfies(&version)),
                    restricted: restricted.is_some_and(|r| r.contains_key(version_str)),
                    staged: staged.is_some_and(|s| s.contains_key(version_str)),
                    deprecated: manifest.is_deprecated(),
                    engine_ok: manifest.engine_ok(node_version, npm_version),
                    version,
                    manifest,
                })
            })
            .collect();

        // Stable: duplicate version keys keep versions -> staged -> restricted order
        candidates.sort_by(|a, b| a.compare(b));

        Ok(candidates.first().map(|c| self.decorate(c.manifest)))
    }
}
