//! npm range grammar
//!
//! Supports the range forms npm accepts in loose mode:
//! - `1.2.3`, `=1.2.3`, `v1.2.3` - exact match
//! - `^1.2.3` - compatible with version (>=1.2.3 <2.0.0-0)
//! - `~1.2.3`, `~>1.2.3` - approximately equivalent (>=1.2.3 <1.3.0-0)
//! - `>=1.2.3`, `>1.2.3`, `<=1.2.3`, `<1.2.3` - comparison operators
//! - `1.2.x`, `1.x`, `1`, `*`, `""` - wildcards and partial versions
//! - `1.0.0 - 2.0.0` - hyphen ranges
//! - `>=1.0.0 <2.0.0` - intersection, `^1.0.0 || ^2.0.0` - union
//!
//! Every form is desugared into plain comparators, so matching is a flat
//! check over comparator sets.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use semver::{Prerelease, Version};

use crate::version::semver::{
    BUILD, PRERELEASE, build_version, compare, parse_component, parse_loose,
};

static XRANGE_PLAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^[v=\s]*(\d+|[xX*])(?:\.(\d+|[xX*])(?:\.(\d+|[xX*])(?:-?({PRERELEASE}))?(?:\+{BUILD})?)?)?$"
    ))
    .expect("x-range pattern is valid")
});

static HYPHEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\S+)\s+-\s+(\S+)\s*$").expect("hyphen pattern is valid")
});

static OR_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\|\|\s*").expect("or pattern is valid"));

/// Operators that may be separated from their version by whitespace
const DETACHABLE_OPERATORS: &[&str] = &["<", "<=", ">", ">=", "=", "~", "~>", "^"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

#[derive(Debug, Clone, PartialEq)]
struct Comparator {
    op: Op,
    version: Version,
}

impl Comparator {
    fn new(op: Op, version: Version) -> Self {
        Self { op, version }
    }

    /// Matches nothing: no version sorts below 0.0.0-0
    fn none() -> Self {
        Self::new(Op::Lt, sentinel(0, 0, 0))
    }

    fn test(&self, version: &Version) -> bool {
        let ord = compare(version, &self.version);
        match self.op {
            Op::Lt => ord == Ordering::Less,
            Op::Lte => ord != Ordering::Greater,
            Op::Gt => ord == Ordering::Greater,
            Op::Gte => ord != Ordering::Less,
            Op::Eq => ord == Ordering::Equal,
        }
    }
}

/// A partially specified version; `None` marks a wildcard or missing component
#[derive(Debug)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Option<String>,
}

impl Partial {
    fn parse(input: &str) -> Option<Self> {
        let caps = XRANGE_PLAIN.captures(input)?;
        let component = |i: usize| -> Option<Option<u64>> {
            match caps.get(i).map(|m| m.as_str()) {
                None | Some("x" | "X" | "*") => Some(None),
                Some(n) => parse_component(n).map(Some),
            }
        };

        let major = component(1)?;
        // Anything after a wildcard is a wildcard too
        let minor = major.and(component(2)?);
        let patch = minor.and(component(3)?);
        let pre = patch.and(caps.get(4)).map(|m| m.as_str().to_string());

        Some(Self {
            major,
            minor,
            patch,
            pre,
        })
    }

    fn full(&self) -> Option<Version> {
        build_version(
            self.major?,
            self.minor?,
            self.patch?,
            self.pre.as_deref(),
            None,
        )
    }
}

/// `major.minor.patch-0`, the lowest version of that release line
fn sentinel(major: u64, minor: u64, patch: u64) -> Version {
    let mut version = Version::new(major, minor, patch);
    version.pre = Prerelease::new("0").unwrap_or(Prerelease::EMPTY);
    version
}

/// Lower bound that also admits pre-releases when `zero` is set
fn floor(major: u64, minor: u64, patch: u64, zero: bool) -> Version {
    if zero {
        sentinel(major, minor, patch)
    } else {
        Version::new(major, minor, patch)
    }
}

/// A parsed npm range: a union of comparator sets
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    sets: Vec<Vec<Comparator>>,
    include_prerelease: bool,
}

impl Range {
    /// Parse an npm range string
    ///
    /// With `include_prerelease`, pre-release versions may satisfy any
    /// comparator set, not only sets that name the same release line.
    pub fn parse(spec: &str, include_prerelease: bool) -> Option<Self> {
        let sets = OR_SEPARATOR
            .split(spec.trim())
            .map(|set| parse_set(set.trim(), include_prerelease))
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            sets,
            include_prerelease,
        })
    }

    /// Check if a version satisfies this range
    pub fn satisfies(&self, version: &Version) -> bool {
        self.sets
            .iter()
            .any(|set| test_set(set, version, self.include_prerelease))
    }
}

/// Returns true when `version` parses and satisfies `range`
pub fn satisfies(version: &str, range: &str, include_prerelease: bool) -> bool {
    let Some(version) = parse_loose(version) else {
        return false;
    };
    Range::parse(range, include_prerelease).is_some_and(|r| r.satisfies(&version))
}

pub fn valid_range(spec: &str) -> bool {
    Range::parse(spec, false).is_some()
}

fn test_set(set: &[Comparator], version: &Version, include_prerelease: bool) -> bool {
    if !set.iter().all(|c| c.test(version)) {
        return false;
    }

    if version.pre.is_empty() || include_prerelease {
        return true;
    }

    // A pre-release only matches when the set explicitly names its release line
    set.iter().any(|c| {
        !c.version.pre.is_empty()
            && c.version.major == version.major
            && c.version.minor == version.minor
            && c.version.patch == version.patch
    })
}

fn parse_set(set: &str, incl: bool) -> Option<Vec<Comparator>> {
    if let Some(caps) = HYPHEN.captures(set) {
        let from = Partial::parse(&caps[1])?;
        let to = Partial::parse(&caps[2])?;
        return desugar_hyphen(&from, &to, incl);
    }

    let mut comparators = Vec::new();
    for token in split_tokens(set) {
        comparators.extend(parse_comparator(&token, incl)?);
    }
    Some(comparators)
}

/// Split a comparator set on whitespace, re-attaching detached operators (`>= 1.2.3`)
fn split_tokens(set: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending: Option<&str> = None;

    for part in set.split_whitespace() {
        match pending.take() {
            Some(op) => tokens.push(format!("{op}{part}")),
            None if DETACHABLE_OPERATORS.contains(&part) => pending = Some(part),
            None => tokens.push(part.to_string()),
        }
    }
    if let Some(op) = pending {
        tokens.push(op.to_string());
    }

    tokens
}

fn parse_comparator(token: &str, incl: bool) -> Option<Vec<Comparator>> {
    if let Some(rest) = token.strip_prefix("~>").or_else(|| token.strip_prefix('~')) {
        return desugar_tilde(&Partial::parse(rest)?);
    }
    if let Some(rest) = token.strip_prefix('^') {
        return desugar_caret(&Partial::parse(rest)?, incl);
    }

    let (op, rest) = if let Some(rest) = token.strip_prefix(">=") {
        (Some(Op::Gte), rest)
    } else if let Some(rest) = token.strip_prefix("<=") {
        (Some(Op::Lte), rest)
    } else if let Some(rest) = token.strip_prefix('>') {
        (Some(Op::Gt), rest)
    } else if let Some(rest) = token.strip_prefix('<') {
        (Some(Op::Lt), rest)
    } else {
        // A bare or `=` prefixed partial; `=` is also swallowed by the x-range pattern
        (None, token)
    };

    desugar_xrange(op, &Partial::parse(rest)?, incl)
}

/// Next component value; None makes the whole range invalid
fn bump(n: u64) -> Option<u64> {
    n.checked_add(1)
}

fn desugar_tilde(p: &Partial) -> Option<Vec<Comparator>> {
    let comparators = match (p.major, p.minor, p.patch) {
        (None, _, _) => Vec::new(),
        (Some(major), None, _) => vec![
            Comparator::new(Op::Gte, Version::new(major, 0, 0)),
            Comparator::new(Op::Lt, sentinel(bump(major)?, 0, 0)),
        ],
        (Some(major), Some(minor), None) => vec![
            Comparator::new(Op::Gte, Version::new(major, minor, 0)),
            Comparator::new(Op::Lt, sentinel(major, bump(minor)?, 0)),
        ],
        (Some(major), Some(minor), Some(_)) => match p.full() {
            Some(from) => vec![
                Comparator::new(Op::Gte, from),
                Comparator::new(Op::Lt, sentinel(major, bump(minor)?, 0)),
            ],
            None => vec![Comparator::none()],
        },
    };
    Some(comparators)
}

fn desugar_caret(p: &Partial, incl: bool) -> Option<Vec<Comparator>> {
    let comparators = match (p.major, p.minor, p.patch) {
        (None, _, _) => Vec::new(),
        (Some(major), None, _) => vec![
            Comparator::new(Op::Gte, floor(major, 0, 0, incl)),
            Comparator::new(Op::Lt, sentinel(bump(major)?, 0, 0)),
        ],
        (Some(major), Some(minor), None) => {
            let upper = if major == 0 {
                sentinel(0, bump(minor)?, 0)
            } else {
                sentinel(bump(major)?, 0, 0)
            };
            vec![
                Comparator::new(Op::Gte, floor(major, minor, 0, incl)),
                Comparator::new(Op::Lt, upper),
            ]
        }
        (Some(major), Some(minor), Some(patch)) => {
            let upper = match (major, minor) {
                (0, 0) => sentinel(0, 0, bump(patch)?),
                (0, _) => sentinel(0, bump(minor)?, 0),
                _ => sentinel(bump(major)?, 0, 0),
            };
            let lower = if p.pre.is_some() {
                p.full()
            } else {
                // Only 0.x carets widen their floor to pre-releases
                Some(floor(major, minor, patch, incl && major == 0))
            };
            match lower {
                Some(lower) => vec![
                    Comparator::new(Op::Gte, lower),
                    Comparator::new(Op::Lt, upper),
                ],
                None => vec![Comparator::none()],
            }
        }
    };
    Some(comparators)
}

fn desugar_xrange(op: Option<Op>, p: &Partial, incl: bool) -> Option<Vec<Comparator>> {
    if let Some(version) = p.full() {
        return Some(vec![Comparator::new(op.unwrap_or(Op::Eq), version)]);
    }

    let Some(major) = p.major else {
        return Some(match op {
            Some(Op::Gt | Op::Lt) => vec![Comparator::none()],
            _ => Vec::new(),
        });
    };

    let comparators = match (op, p.minor) {
        (Some(op), minor) => {
            let (mut major, mut minor_n) = (major, minor.unwrap_or(0));
            let op = match op {
                Op::Gt => {
                    match minor {
                        None => {
                            major = bump(major)?;
                            minor_n = 0;
                        }
                        Some(_) => minor_n = bump(minor_n)?,
                    }
                    Op::Gte
                }
                Op::Lte => {
                    match minor {
                        None => major = bump(major)?,
                        Some(_) => minor_n = bump(minor_n)?,
                    }
                    Op::Lt
                }
                other => other,
            };
            let bound = floor(major, minor_n, 0, incl || op == Op::Lt);
            vec![Comparator::new(op, bound)]
        }
        (None, None) => vec![
            Comparator::new(Op::Gte, floor(major, 0, 0, incl)),
            Comparator::new(Op::Lt, sentinel(bump(major)?, 0, 0)),
        ],
        (None, Some(minor)) => vec![
            Comparator::new(Op::Gte, floor(major, minor, 0, incl)),
            Comparator::new(Op::Lt, sentinel(major, bump(minor)?, 0)),
        ],
    };
    Some(comparators)
}

fn desugar_hyphen(from: &Partial, to: &Partial, incl: bool) -> Option<Vec<Comparator>> {
    let mut comparators = Vec::new();

    match (from.major, from.minor, from.patch) {
        (None, _, _) => {}
        (Some(major), None, _) => {
            comparators.push(Comparator::new(Op::Gte, floor(major, 0, 0, incl)))
        }
        (Some(major), Some(minor), None) => {
            comparators.push(Comparator::new(Op::Gte, floor(major, minor, 0, incl)))
        }
        (Some(major), Some(minor), Some(patch)) => match from.full() {
            Some(v) if from.pre.is_some() => comparators.push(Comparator::new(Op::Gte, v)),
            Some(_) => {
                comparators.push(Comparator::new(Op::Gte, floor(major, minor, patch, incl)))
            }
            None => return Some(vec![Comparator::none()]),
        },
    }

    match (to.major, to.minor, to.patch) {
        (None, _, _) => {}
        (Some(major), None, _) => {
            comparators.push(Comparator::new(Op::Lt, sentinel(bump(major)?, 0, 0)))
        }
        (Some(major), Some(minor), None) => {
            comparators.push(Comparator::new(Op::Lt, sentinel(major, bump(minor)?, 0)))
        }
        (Some(major), Some(minor), Some(patch)) => match to.full() {
            Some(v) if to.pre.is_some() || !incl => {
                comparators.push(Comparator::new(Op::Lte, v))
            }
            Some(_) => {
                comparators.push(Comparator::new(Op::Lt, sentinel(major, minor, bump(patch)?)))
            }
            None => return Some(vec![Comparator::none()]),
        },
    }

    Some(comparators)
}
