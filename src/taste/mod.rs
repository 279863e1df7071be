//! Knowledge-graph (taste graph) abstraction.
//!
//! Defines the [`TasteGraph`] trait consumed by the signal gatherer, the
//! commonality scorer and the housing advisor, plus the typed result schemas
//! every response is narrowed into before it reaches scoring logic.
//!
//! [`http::HttpTasteGraph`] is the REST implementation.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::demographics::{AgeBucket, Gender};

pub mod http;

// ---------------------------------------------------------------------------
// Result schemas
// ---------------------------------------------------------------------------

/// A named item in the knowledge graph (artist, place, brand, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Graph identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Category without the `urn:entity:` prefix, e.g. `artist`.
    pub category: String,
    /// Popularity percentile, when the graph reports one.
    pub popularity: Option<f64>,
}

/// A categorical label attachable to entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Graph identifier, e.g. `urn:tag:genre:music:k_pop`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Tag type, e.g. `urn:tag:genre:music`.
    pub tag_type: String,
}

/// An entity returned by a group comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparedEntity {
    /// Graph identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// An explainable recommendation with its affinity to the request signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightEntity {
    /// Graph identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Affinity in `[0, 1]`; `0.0` when the graph omitted it.
    pub affinity: f64,
}

// ---------------------------------------------------------------------------
// Insight request
// ---------------------------------------------------------------------------

/// Interest and location signal for an insights request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsightSignal {
    /// Entity ids the recommendation should be similar to.
    pub entity_ids: Vec<String>,
    /// Tag ids the recommendation should be similar to.
    pub tag_ids: Vec<String>,
    /// Free-text location query.
    pub location: Option<String>,
}

impl InsightSignal {
    /// Whether the signal carries any interest (entities or tags).
    pub fn has_interests(&self) -> bool {
        !self.entity_ids.is_empty() || !self.tag_ids.is_empty()
    }
}

/// Output filter for an insights request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightFilter {
    /// Entity type URN to recommend, e.g. `urn:entity:place`.
    pub entity_type: String,
    /// Maximum number of results.
    pub take: usize,
    /// Whether to request per-result affinity explanations.
    pub explainable: bool,
}

/// Demographic bias for an insights request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsightBias {
    /// Age bucket.
    pub age: Option<AgeBucket>,
    /// Gender.
    pub gender: Option<Gender>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by knowledge-graph clients.
#[derive(Debug, thiserror::Error)]
pub enum TasteError {
    /// HTTP transport failure (includes timeouts).
    #[error("taste graph request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Response did not match the expected schema.
    #[error("taste graph response parse error: {0}")]
    Parse(String),
    /// Upstream responded with a non-success status.
    #[error("taste graph returned non-success status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },
    /// The request was rejected locally before being sent.
    #[error("invalid taste graph request: {0}")]
    InvalidRequest(String),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Knowledge-graph client.
///
/// Every call may fail. Callers decide whether a failure is recovered as an
/// empty result or propagated to their own error boundary.
#[async_trait]
pub trait TasteGraph: Send + Sync {
    /// Free-text entity search, bounded to `take` results.
    async fn search(&self, query: &str, take: usize) -> Result<Vec<Entity>, TasteError>;

    /// Tag search by keyword, bounded to `take` results.
    async fn search_tags(&self, query: &str, take: usize) -> Result<Vec<Tag>, TasteError>;

    /// Compare two groups of entity ids and return what both would enjoy,
    /// best first.
    async fn compare_groups(
        &self,
        group_a: &[String],
        group_b: &[String],
    ) -> Result<Vec<ComparedEntity>, TasteError>;

    /// Request recommendations for a signal, filtered and biased.
    async fn insights(
        &self,
        signal: &InsightSignal,
        filter: &InsightFilter,
        bias: &InsightBias,
    ) -> Result<Vec<InsightEntity>, TasteError>;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Strip the `urn:entity:` prefix from an entity type.
pub fn category_from_type(entity_type: &str) -> String {
    entity_type
        .strip_prefix("urn:entity:")
        .unwrap_or(entity_type)
        .to_owned()
}

/// Collapse whitespace, redact API-key-looking values and truncate an error
/// body so it is safe to log.
pub fn sanitize_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [
        r"(?i)(api[_-]?key[=:]\s*)[A-Za-z0-9_\-]{8,}",
        r"xoxb-[A-Za-z0-9\-]{20,}",
        r"sk-ant-[A-Za-z0-9_\-]{10,}",
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}
