//! Version range matching.
//!
//! Ranges follow the npm-style subset used by marketplace metadata:
//!
//! - `*` matches anything, even unparsable versions
//! - `^X.Y.Z` same major, at least `X.Y.Z`
//! - `~X.Y.Z` same major and minor, patch at least `Z`
//! - `>=`, `>`, `<=`, `<` compare the numeric triple
//! - anything without a leading operator is compared as an exact string
//!
//! Only the leading `MAJOR.MINOR.PATCH` of a version is significant for
//! operator ranges; build or pre-release suffixes are ignored. Unparsable
//! operands never match and never panic.
//!
//! # Examples
//!
//! ```
//! use market_core::version::is_version_compatible;
//!
//! assert!(is_version_compatible("1.2.3", "^1.2.0"));
//! assert!(!is_version_compatible("2.0.0", "^1.2.0"));
//! assert!(is_version_compatible("garbage", "*"));
//! ```

use std::sync::LazyLock;

use regex::Regex;
use semver::Version;

static LEADING_TRIPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.(\d+)\.(\d+)").expect("static version regex is valid")
});

/// A range operator preceding a version triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `^`
    Caret,
    /// `~`
    Tilde,
    /// `>=`
    Gte,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `<`
    Lt,
}

impl CompareOp {
    fn matches(self, candidate: &Version, bound: &Version) -> bool {
        match self {
            CompareOp::Caret => {
                candidate.major == bound.major
                    && (candidate.minor > bound.minor
                        || (candidate.minor == bound.minor && candidate.patch >= bound.patch))
            }
            CompareOp::Tilde => {
                candidate.major == bound.major
                    && candidate.minor == bound.minor
                    && candidate.patch >= bound.patch
            }
            CompareOp::Gte => candidate >= bound,
            CompareOp::Gt => candidate > bound,
            CompareOp::Lte => candidate <= bound,
            CompareOp::Lt => candidate < bound,
        }
    }
}

/// A parsed range expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRange {
    /// `*`
    Any,
    /// No operator: literal string equality.
    Exact(String),
    /// Operator plus a parsed bound.
    Bounded { op: CompareOp, bound: Version },
    /// Operator with an unparsable operand. Matches nothing.
    Invalid(String),
}

impl VersionRange {
    /// Parse a range expression. Never fails; bad operands become [`VersionRange::Invalid`].
    pub fn parse(range: &str) -> Self {
        let range = range.trim();
        if range == "*" {
            return Self::Any;
        }

        let (op, operand) = if let Some(rest) = range.strip_prefix(">=") {
            (CompareOp::Gte, rest)
        } else if let Some(rest) = range.strip_prefix("<=") {
            (CompareOp::Lte, rest)
        } else if let Some(rest) = range.strip_prefix('>') {
            (CompareOp::Gt, rest)
        } else if let Some(rest) = range.strip_prefix('<') {
            (CompareOp::Lt, rest)
        } else if let Some(rest) = range.strip_prefix('^') {
            (CompareOp::Caret, rest)
        } else if let Some(rest) = range.strip_prefix('~') {
            (CompareOp::Tilde, rest)
        } else {
            return Self::Exact(range.to_string());
        };

        match parse_version(operand.trim()) {
            Some(bound) => Self::Bounded { op, bound },
            None => Self::Invalid(range.to_string()),
        }
    }

    /// Check whether `version` satisfies this range.
    pub fn matches(&self, version: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => version.trim() == expected,
            Self::Bounded { op, bound } => {
                parse_version(version).is_some_and(|candidate| op.matches(&candidate, bound))
            }
            Self::Invalid(_) => false,
        }
    }
}

/// Extract the leading `MAJOR.MINOR.PATCH` triple of a version string.
///
/// Trailing text (`-beta.1`, `+build`, `.4`) is ignored. Returns `None`
/// when the string does not start with a numeric triple.
pub fn parse_version(s: &str) -> Option<Version> {
    let caps = LEADING_TRIPLE.captures(s.trim())?;
    let major = caps[1].parse().ok()?;
    let minor = caps[2].parse().ok()?;
    let patch = caps[3].parse().ok()?;
    Some(Version::new(major, minor, patch))
}

/// Check whether `version` satisfies the range expression `range`.
pub fn is_version_compatible(version: &str, range: &str) -> bool {
    VersionRange::parse(range).matches(version)
}
