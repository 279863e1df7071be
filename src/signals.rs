//! Signal gathering: turn a profile into a bag of taste-graph entities and tags.
//!
//! Gathering issues a bounded number of lookups and never aborts on a single
//! failed call. Results keep insertion order and are not deduplicated here;
//! the scorer deduplicates by category and tag name downstream.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::profile::Profile;
use crate::taste::{Entity, Tag, TasteGraph};

/// Maximum number of free-text entity searches per profile.
pub const MAX_SEARCH_QUERIES: usize = 3;

/// Maximum number of keyword tag searches per profile.
pub const MAX_TAG_KEYWORDS: usize = 3;

/// Result bound for every entity and tag search.
pub const SEARCH_TAKE: usize = 5;

/// Heritage term → related keywords. Terms not listed contribute themselves.
const HERITAGE_KEYWORDS: &[(&str, &[&str])] = &[
    ("brazilian", &["brazilian", "samba", "bossa nova"]),
    ("chinese", &["chinese", "dim sum", "mandopop"]),
    ("filipino", &["filipino", "karaoke", "adobo"]),
    ("french", &["french", "french cinema", "wine"]),
    ("german", &["german", "techno", "beer garden"]),
    ("indian", &["indian", "bollywood", "curry"]),
    ("irish", &["irish", "folk music", "pub"]),
    ("italian", &["italian", "pasta", "opera"]),
    ("japanese", &["japanese", "anime", "sushi"]),
    ("korean", &["korean", "k-pop", "korean bbq"]),
    ("mexican", &["mexican", "tacos", "mariachi"]),
    ("nigerian", &["nigerian", "afrobeats", "jollof"]),
    ("vietnamese", &["vietnamese", "pho", "banh mi"]),
];

/// Entities and tags matched for one profile during one scoring cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalBag {
    /// Matched entities in insertion order.
    pub entities: Vec<Entity>,
    /// Matched tags in insertion order.
    pub tags: Vec<Tag>,
}

impl SignalBag {
    /// Whether nothing was matched.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.tags.is_empty()
    }

    /// Up to `limit` entity ids, in order, skipping blanks.
    pub fn entity_ids(&self, limit: usize) -> Vec<String> {
        self.entities
            .iter()
            .map(|e| e.id.as_str())
            .filter(|id| !id.is_empty())
            .take(limit)
            .map(str::to_owned)
            .collect()
    }

    /// Up to `limit` tag ids, in order, skipping blanks.
    pub fn tag_ids(&self, limit: usize) -> Vec<String> {
        self.tags
            .iter()
            .map(|t| t.id.as_str())
            .filter(|id| !id.is_empty())
            .take(limit)
            .map(str::to_owned)
            .collect()
    }
}

/// Keywords related to a cultural-heritage term.
///
/// Known terms expand through a fixed table; anything else yields the
/// lowercased term alone.
pub fn heritage_keywords(term: &str) -> Vec<String> {
    let lower = term.trim().to_lowercase();
    if lower.is_empty() {
        return Vec::new();
    }
    HERITAGE_KEYWORDS
        .iter()
        .find(|(key, _)| *key == lower)
        .map_or_else(
            || vec![lower.clone()],
            |(_, words)| words.iter().map(|w| (*w).to_owned()).collect(),
        )
}

/// Free-text search queries for a profile, in preference order, at most
/// [`MAX_SEARCH_QUERIES`].
///
/// Order: name, role, department, location, then heritage terms.
pub fn search_queries(profile: &Profile) -> Vec<String> {
    [
        profile.name.as_str(),
        profile.role.as_str(),
        profile.department.as_str(),
        profile.location.as_str(),
    ]
    .into_iter()
    .chain(profile.cultural_heritage.iter().map(String::as_str))
    .map(str::trim)
    .filter(|q| !q.is_empty())
    .take(MAX_SEARCH_QUERIES)
    .map(str::to_owned)
    .collect()
}

/// Deduplicated keyword set for tag searches.
///
/// Built from role words (three characters or longer), the department,
/// expanded heritage keywords, and the first comma segment of the location.
/// All keywords are lowercased; first occurrence wins.
pub fn tag_keywords(profile: &Profile) -> Vec<String> {
    let mut candidates: Vec<String> = profile
        .role
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect();

    let department = profile.department.trim().to_lowercase();
    if !department.is_empty() {
        candidates.push(department);
    }
    for term in &profile.cultural_heritage {
        candidates.extend(heritage_keywords(term));
    }
    if let Some(city) = profile.primary_location() {
        candidates.push(city.to_lowercase());
    }

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

/// Gathers [`SignalBag`]s from the knowledge graph.
#[derive(Clone)]
pub struct SignalGatherer {
    graph: Arc<dyn TasteGraph>,
}

impl SignalGatherer {
    /// Create a gatherer backed by `graph`.
    pub fn new(graph: Arc<dyn TasteGraph>) -> Self {
        Self { graph }
    }

    /// Gather entities and tags for `profile`.
    ///
    /// Failed lookups are logged and skipped.
    pub async fn gather(&self, profile: &Profile) -> SignalBag {
        let mut bag = SignalBag::default();

        for query in search_queries(profile) {
            match self.graph.search(&query, SEARCH_TAKE).await {
                Ok(entities) => {
                    debug!(query = %query, count = entities.len(), "entity search");
                    bag.entities.extend(entities.into_iter().take(SEARCH_TAKE));
                }
                Err(e) => warn!(query = %query, error = %e, "entity search failed, skipping"),
            }
        }

        for keyword in tag_keywords(profile).into_iter().take(MAX_TAG_KEYWORDS) {
            match self.graph.search_tags(&keyword, SEARCH_TAKE).await {
                Ok(tags) => {
                    debug!(keyword = %keyword, count = tags.len(), "tag search");
                    bag.tags.extend(tags.into_iter().take(SEARCH_TAKE));
                }
                Err(e) => warn!(keyword = %keyword, error = %e, "tag search failed, skipping"),
            }
        }

        debug!(
            profile = profile.label(),
            entities = bag.entities.len(),
            tags = bag.tags.len(),
            "signals gathered"
        );
        bag
    }
}
