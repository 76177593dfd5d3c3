//! Hierarchical topic patterns.
//!
//! A topic such as `jurisdiction.AU` is a dot-separated list of segments.
//! A subscription pattern matches a topic when its segments are a prefix of
//! the topic's segments, so `jurisdiction` (or `jurisdiction.*`) receives
//! every `jurisdiction.<code>` notification while `jurisdiction.AU` only
//! receives its own. Comparison is case-insensitive.

use std::fmt;

use crate::utils::error::HubError;

/// Separates the normalized pattern from the callback url in a storage key.
/// It can never occur inside a validated segment.
const KEY_SEPARATOR: char = '|';

const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    raw: String,
    segments: Vec<String>,
}

/// Uniqueness key of a `(pattern, callback_url)` pair in the subscription index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Pattern {
    pub fn new(topic: &str) -> Result<Self, HubError> {
        let raw = topic.trim();
        let invalid = |reason| HubError::InvalidTopic {
            topic: topic.to_string(),
            reason,
        };

        let mut parts: Vec<&str> = raw.split('.').collect();
        if parts.last() == Some(&WILDCARD) {
            parts.pop();
        }
        if parts.is_empty() || parts == [""] {
            return Err(invalid("pattern must name at least one segment"));
        }

        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            if part.is_empty() {
                return Err(invalid("empty segment"));
            }
            if !part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(invalid("segments may only contain a-z, 0-9, '-' and '_'"));
            }
            segments.push(part.to_ascii_lowercase());
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The pattern as it was supplied (trimmed).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lowercase, wildcard-free form used for comparisons and keys.
    pub fn normalized(&self) -> String {
        self.segments.join(".")
    }

    /// Every prefix of this topic, shortest first: `a.b.c` yields
    /// `a`, `a.b`, `a.b.c`.
    pub fn layers(&self) -> Vec<String> {
        (1..=self.segments.len())
            .map(|depth| self.segments[..depth].join("."))
            .collect()
    }

    /// Whether a subscription to `self` should receive notifications on `topic`.
    pub fn matches(&self, topic: &Pattern) -> bool {
        topic.segments.starts_with(&self.segments)
    }

    pub fn to_key(&self, callback_url: &str) -> SubscriptionKey {
        SubscriptionKey(format!(
            "{}{callback_url}",
            Self::layer_prefix(&self.normalized())
        ))
    }

    /// Key prefix shared by every subscription stored under `layer`.
    pub fn layer_prefix(layer: &str) -> String {
        format!("{layer}{KEY_SEPARATOR}")
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
