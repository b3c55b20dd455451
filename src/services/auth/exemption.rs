//! Decides which request paths may skip authentication.
//!
//! Matching policy:
//! - `Contains`: a path is exempt if it contains any pattern as a plain substring.
//!   Compatible with the previous gateway, but note the footgun:
//!   `/api/orders/actuator-report` contains `/actuator` and is therefore exempt.
//! - `Segment`: the pattern is a path prefix anchored at the start of the path and
//!   compared segment by segment. `/api/auth/login` matches `/api/auth`;
//!   `/api/orders/actuator-report` and `/api/payments/7/actuator` do not match
//!   `/actuator`.
//!
//! Paths with `.`/`..` segments never reach this check; the gatekeeper refuses them
//! first.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Contains,
    Segment,
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contains" | "substring" => Ok(Self::Contains),
            "segment" | "prefix" => Ok(Self::Segment),
            other => Err(format!("unknown match mode: {other}")),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contains => f.write_str("contains"),
            Self::Segment => f.write_str("segment"),
        }
    }
}

#[derive(Debug, Clone)]
struct Pattern {
    raw: String,
    segments: Vec<String>,
}

/// Ordered, immutable set of exemption patterns. Built once at startup.
#[derive(Debug, Clone)]
pub struct ExemptionSet {
    mode: MatchMode,
    patterns: Vec<Pattern>,
}

impl ExemptionSet {
    /// Blank patterns are dropped: an empty substring would exempt every path.
    pub fn new<I, S>(patterns: I, mode: MatchMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns = patterns
            .into_iter()
            .map(Into::into)
            .filter(|p| !p.trim().is_empty())
            .map(|raw| Pattern {
                segments: segments(&raw).map(str::to_string).collect(),
                raw,
            })
            // "/" alone has no segments and would match everything in segment mode
            .filter(|p| mode == MatchMode::Contains || !p.segments.is_empty())
            .collect();

        Self { mode, patterns }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.raw.as_str())
    }

    /// `path` is the path component only; query strings are not matched.
    pub fn is_exempt(&self, path: &str) -> bool {
        match self.mode {
            MatchMode::Contains => self.patterns.iter().any(|p| path.contains(p.raw.as_str())),
            MatchMode::Segment => {
                let path_segments: Vec<&str> = segments(path).collect();
                self.patterns.iter().any(|p| {
                    p.segments.len() <= path_segments.len()
                        && p.segments.iter().zip(&path_segments).all(|(a, b)| a == b)
                })
            }
        }
    }
}

/// False for paths an upstream could resolve differently than the gateway
/// classified them: `.`/`..` segments (plain or `%2e`-encoded) and encoded
/// or backslash separators.
pub fn is_canonical(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    if lower.contains("%2f") || lower.contains("%5c") || path.contains('\\') {
        return false;
    }
    !lower.split('/').any(|seg| {
        let decoded = seg.replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
