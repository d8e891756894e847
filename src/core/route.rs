//! Route definitions and path pattern matching.
//!
//! A pattern is a `/`-separated template. Each segment is either a literal or
//! the wildcard `*`. Patterns match as segment-wise prefixes of a request path:
//! `/api` matches `/api` and `/api/users`, `/api/*` matches `/api/users` and
//! `/api/users/42` but not `/api` itself.
use std::{fmt, str::FromStr};

use http::Uri;
use thiserror::Error;

use crate::config::RouteConfig;

const WILDCARD: &str = "*";

// Per-segment ranks; compared lexicographically so literal beats wildcard.
const RANK_LITERAL: u8 = 2;
const RANK_WILDCARD: u8 = 1;

/// Errors raised while building a [`Route`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouteError {
    #[error("Route pattern must not be empty")]
    EmptyPattern,

    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid route target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("Invalid rewrite '{rewrite}' for pattern '{pattern}': rewrite must start with '/'")]
    InvalidRewrite { pattern: String, rewrite: String },
}

/// Result type for route construction
pub type RouteResult<T> = Result<T, RouteError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    Wildcard,
}

/// A parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    key: String,
    segments: Vec<Segment>,
    specificity: Vec<u8>,
}

impl RoutePattern {
    pub fn parse(raw: &str) -> RouteResult<Self> {
        if raw.is_empty() {
            return Err(RouteError::EmptyPattern);
        }
        if !raw.starts_with('/') {
            return Err(RouteError::InvalidPattern {
                pattern: raw.to_string(),
                reason: "patterns must start with '/'".to_string(),
            });
        }

        let mut segments = Vec::new();
        for part in split_segments(raw) {
            if part == WILDCARD {
                segments.push(Segment::Wildcard);
            } else if part.contains('*') {
                return Err(RouteError::InvalidPattern {
                    pattern: raw.to_string(),
                    reason: format!("segment '{part}' mixes literal text with '*'"),
                });
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }

        let key = format!(
            "/{}",
            segments
                .iter()
                .map(|s| match s {
                    Segment::Literal(l) => l.as_str(),
                    Segment::Wildcard => WILDCARD,
                })
                .collect::<Vec<_>>()
                .join("/")
        );
        let specificity = segments
            .iter()
            .map(|s| match s {
                Segment::Literal(_) => RANK_LITERAL,
                Segment::Wildcard => RANK_WILDCARD,
            })
            .collect();

        Ok(Self {
            raw: raw.to_string(),
            key,
            segments,
            specificity,
        })
    }

    /// The pattern as it was written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Normalised form used for uniqueness checks (`/api/` and `/api` share a key).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Rank vector used to order competing matches. Greater is more specific.
    pub fn specificity(&self) -> &[u8] {
        &self.specificity
    }

    /// Number of leading literal segments before the first wildcard.
    pub fn literal_prefix_len(&self) -> usize {
        self.segments
            .iter()
            .take_while(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Whether this pattern matches the given (already split) path segments.
    pub fn matches_segments(&self, path: &[&str]) -> bool {
        if path.len() < self.segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(path)
            .all(|(segment, part)| match segment {
                Segment::Literal(literal) => literal == part,
                Segment::Wildcard => true,
            })
    }

    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = split_segments(path).collect();
        self.matches_segments(&parts)
    }
}

impl FromStr for RoutePattern {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoutePattern::parse(s)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split a path into its non-empty segments.
pub fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// A mapping from a path pattern to an upstream target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pattern: RoutePattern,
    target: Uri,
    rewrite: Option<String>,
}

impl Route {
    /// Build a route, validating the pattern, target URI and rewrite.
    ///
    /// The target must be an absolute `http` or `https` URI with an authority.
    pub fn new(pattern: &str, target: &str, rewrite: Option<&str>) -> RouteResult<Self> {
        let pattern = RoutePattern::parse(pattern)?;
        let target = parse_target(target)?;

        if let Some(rw) = rewrite {
            if !rw.starts_with('/') {
                return Err(RouteError::InvalidRewrite {
                    pattern: pattern.as_str().to_string(),
                    rewrite: rw.to_string(),
                });
            }
        }

        Ok(Self {
            pattern,
            target,
            rewrite: rewrite.map(str::to_string),
        })
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn target(&self) -> &Uri {
        &self.target
    }

    pub fn rewrite(&self) -> Option<&str> {
        self.rewrite.as_deref()
    }

    /// Compute the upstream path for a request path this route matched.
    ///
    /// Without a rewrite the path is forwarded unchanged. With a rewrite the
    /// segments consumed by the pattern's literal prefix are replaced by the
    /// rewrite and the rest of the path is appended verbatim, so trailing and
    /// repeated slashes after the prefix survive.
    pub fn rewrite_path(&self, path: &str) -> String {
        let Some(rewrite) = self.rewrite.as_deref() else {
            return if path.is_empty() {
                "/".to_string()
            } else {
                path.to_string()
            };
        };

        let tail = skip_segments(path, self.pattern.literal_prefix_len());
        let base = rewrite.trim_end_matches('/');

        match (base.is_empty(), tail.is_empty()) {
            (true, true) => "/".to_string(),
            (false, true) => base.to_string(),
            (_, false) => format!("{base}{tail}"),
        }
    }
}

/// The part of `path` left after its first `n` non-empty segments.
fn skip_segments(path: &str, n: usize) -> &str {
    let mut rest = path;
    for _ in 0..n {
        rest = rest.trim_start_matches('/');
        let end = rest.find('/').unwrap_or(rest.len());
        rest = &rest[end..];
    }
    rest
}

impl TryFrom<&RouteConfig> for Route {
    type Error = RouteError;

    fn try_from(config: &RouteConfig) -> Result<Self, Self::Error> {
        Route::new(&config.pattern, &config.target, config.rewrite.as_deref())
    }
}

fn parse_target(target: &str) -> RouteResult<Uri> {
    let invalid = |reason: &str| RouteError::InvalidTarget {
        target: target.to_string(),
        reason: reason.to_string(),
    };

    let uri: Uri = target.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        Some(other) => return Err(invalid(&format!("unsupported scheme '{other}'"))),
        None => return Err(invalid("missing scheme")),
    }
    if uri.authority().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(uri)
}
