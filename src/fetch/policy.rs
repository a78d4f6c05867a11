//! Route Policy Module
//!
//! Ordered table mapping URL patterns to caching strategies. Rules are
//! evaluated top to bottom and the first match wins; unmatched URLs fall to
//! a network-only default.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

// == Strategy ==
/// How a matched request uses the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    /// Always the network; the cache is never read or written
    NetworkOnly,
    /// Fresh cache, else network
    CacheFirst,
    /// Network within a timeout, else any cached copy
    NetworkFirst,
    /// Any cached copy now, refreshed in the background
    StaleWhileRevalidate,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::NetworkOnly => "networkOnly",
            Strategy::CacheFirst => "cacheFirst",
            Strategy::NetworkFirst => "networkFirst",
            Strategy::StaleWhileRevalidate => "staleWhileRevalidate",
        };
        f.write_str(name)
    }
}

// == Route Pattern ==
/// Matcher applied to the path of a request URL.
#[derive(Debug, Clone)]
pub enum RoutePattern {
    /// Path starts with the given string
    Prefix(String),
    /// Regex found anywhere in the path
    Regex(Regex),
}

impl RoutePattern {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        RoutePattern::Prefix(prefix.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, PolicyError> {
        Regex::new(pattern)
            .map(RoutePattern::Regex)
            .map_err(|source| PolicyError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            RoutePattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
            RoutePattern::Regex(regex) => regex.is_match(path),
        }
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutePattern::Prefix(prefix) => write!(f, "prefix:{}", prefix),
            RoutePattern::Regex(regex) => write!(f, "regex:{}", regex.as_str()),
        }
    }
}

// == Route Rule ==
/// One row of the policy table.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub pattern: RoutePattern,
    pub strategy: Strategy,
    /// Freshness window for stored responses
    pub max_age: Duration,
    /// Network bound for `networkFirst`; the fetcher default applies when unset
    pub timeout: Option<Duration>,
}

impl RouteRule {
    pub fn new(pattern: RoutePattern, strategy: Strategy, max_age: Duration) -> Self {
        Self {
            pattern,
            strategy,
            max_age,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The rule used when nothing matches.
    pub fn network_only_default() -> Self {
        Self::new(RoutePattern::prefix(""), Strategy::NetworkOnly, Duration::ZERO)
    }
}

// == Route Policy ==
/// Immutable, ordered rule table.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    rules: Vec<RouteRule>,
    fallback: RouteRule,
}

impl RoutePolicy {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self {
            rules,
            fallback: RouteRule::network_only_default(),
        }
    }

    /// Builds a policy from its configuration rows, failing on the first
    /// invalid pattern.
    pub fn from_config(rows: Vec<RouteRuleConfig>) -> Result<Self, PolicyError> {
        let rules = rows
            .into_iter()
            .map(RouteRule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// First rule whose pattern matches the URL's path, if any.
    pub fn find(&self, url: &str) -> Option<&RouteRule> {
        let path = url_path(url);
        self.rules.iter().find(|rule| rule.pattern.matches(&path))
    }

    /// Rule to apply to the URL; network-only when nothing matches.
    pub fn resolve(&self, url: &str) -> &RouteRule {
        self.find(url).unwrap_or(&self.fallback)
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }
}

/// Path component of an absolute or relative URL, without query or fragment.
pub fn url_path(url: &str) -> Cow<'_, str> {
    match Url::parse(url) {
        Ok(parsed) => Cow::Owned(parsed.path().to_string()),
        Err(_) => {
            let end = url.find(['?', '#']).unwrap_or(url.len());
            Cow::Borrowed(&url[..end])
        }
    }
}

// == Configuration Rows ==
/// How a configured pattern string is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    #[default]
    Prefix,
    Regex,
}

/// Serialized form of a [`RouteRule`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRuleConfig {
    pub pattern: String,
    #[serde(rename = "match", default)]
    pub kind: PatternKind,
    pub strategy: Strategy,
    #[serde(default)]
    pub max_age_millis: u64,
    #[serde(default)]
    pub timeout_millis: Option<u64>,
}

impl TryFrom<RouteRuleConfig> for RouteRule {
    type Error = PolicyError;

    fn try_from(row: RouteRuleConfig) -> Result<Self, Self::Error> {
        let pattern = match row.kind {
            PatternKind::Prefix => RoutePattern::prefix(row.pattern),
            PatternKind::Regex => RoutePattern::regex(&row.pattern)?,
        };
        Ok(Self {
            pattern,
            strategy: row.strategy,
            max_age: Duration::from_millis(row.max_age_millis),
            timeout: row.timeout_millis.map(Duration::from_millis),
        })
    }
}

// == Policy Error ==
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid route pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
