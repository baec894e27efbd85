//! Request classification.
//!
//! An ordered rule list maps each interceptable request to a caching strategy
//! and a partition role; the first matching rule wins and unmatched requests
//! fall back to network-first against the dynamic partition.

use serde::Serialize;
use stash_core::{AppConfig, Destination, PartitionRole, Request};
use std::collections::HashSet;

/// How cache lookup and network fetch are combined for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

/// Result of classifying an interceptable request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub strategy: Strategy,
    pub role: PartitionRole,
}

const FALLBACK: Classification = Classification { strategy: Strategy::NetworkFirst, role: PartitionRole::Dynamic };

/// Predicate half of a rule.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// URL path is one of the listed paths.
    Paths(HashSet<String>),
    /// URL path starts with the prefix.
    PathPrefix(String),
    /// Destination is listed, or the last path segment has a listed extension.
    Asset { destinations: Vec<Destination>, extensions: HashSet<String> },
}

impl Matcher {
    fn matches(&self, request: &Request) -> bool {
        let path = request.url.path();
        match self {
            Matcher::Paths(paths) => paths.contains(path),
            Matcher::PathPrefix(prefix) => path.starts_with(prefix.as_str()),
            Matcher::Asset { destinations, extensions } => {
                destinations.contains(&request.destination)
                    || extension(request).is_some_and(|ext| extensions.contains(&ext))
            }
        }
    }
}

fn extension(request: &Request) -> Option<String> {
    let segment = request.url.path_segments()?.next_back()?;
    let (_, ext) = segment.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub matcher: Matcher,
    pub strategy: Strategy,
    pub role: PartitionRole,
}

/// Maps requests to `(strategy, role)` or bypass.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    rules: Vec<ClassificationRule>,
}

impl RequestClassifier {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// Manifest → cache-first static; API prefix → network-first dynamic;
    /// images and static assets → stale-while-revalidate dynamic.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(vec![
            ClassificationRule {
                matcher: Matcher::Paths(config.manifest.iter().cloned().collect()),
                strategy: Strategy::CacheFirst,
                role: PartitionRole::Static,
            },
            ClassificationRule {
                matcher: Matcher::PathPrefix(config.api_prefix.clone()),
                strategy: Strategy::NetworkFirst,
                role: PartitionRole::Dynamic,
            },
            ClassificationRule {
                matcher: Matcher::Asset {
                    destinations: vec![Destination::Image],
                    extensions: config.asset_extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
                },
                strategy: Strategy::StaleWhileRevalidate,
                role: PartitionRole::Dynamic,
            },
        ])
    }

    /// `None` means bypass: the request is not intercepted and passes through unmodified.
    pub fn classify(&self, request: &Request) -> Option<Classification> {
        if !request.is_get() || !matches!(request.url.scheme(), "http" | "https") {
            return None;
        }

        let classification = self
            .rules
            .iter()
            .find(|rule| rule.matcher.matches(request))
            .map(|rule| Classification { strategy: rule.strategy, role: rule.role })
            .unwrap_or(FALLBACK);

        Some(classification)
    }
}
