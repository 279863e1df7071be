//! REST implementation of [`TasteGraph`] against a Qloo-style insights API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    category_from_type, sanitize_error_body, ComparedEntity, Entity, InsightBias, InsightEntity,
    InsightFilter, InsightSignal, Tag, TasteError, TasteGraph,
};

/// HTTP connect timeout for the reqwest client.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Header carrying the API key.
const API_KEY_HEADER: &str = "X-Api-Key";

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Response of `GET /search`.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    /// Matched entities.
    #[serde(default)]
    pub results: Vec<WireEntity>,
}

/// Entity as returned by the API. Every field is optional on the wire.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct WireEntity {
    /// Entity identifier.
    pub entity_id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Type URNs, most specific first.
    #[serde(default)]
    pub types: Vec<String>,
    /// Single type URN (used by some endpoints instead of `types`).
    pub subtype: Option<String>,
    /// Popularity percentile.
    pub popularity: Option<f64>,
    /// Explainability block for insight results.
    pub query: Option<WireQueryInfo>,
}

/// Explainability block attached to insight results.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct WireQueryInfo {
    /// Affinity to the request signal.
    pub affinity: Option<f64>,
}

/// Tag as returned by the API.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct WireTag {
    /// Tag identifier.
    pub id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Tag type URN.
    #[serde(rename = "type")]
    pub tag_type: Option<String>,
}

/// `results` envelope used by the v2 endpoints.
#[doc(hidden)]
#[derive(Debug, Default, Deserialize)]
pub struct WireResults {
    /// Entity results.
    #[serde(default)]
    pub entities: Vec<WireEntity>,
    /// Tag results.
    #[serde(default)]
    pub tags: Vec<WireTag>,
}

/// Top-level response of the v2 endpoints.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct V2Response {
    /// Result envelope.
    #[serde(default)]
    pub results: WireResults,
}

// ---------------------------------------------------------------------------
// Parsers (pub for integration testing)
// ---------------------------------------------------------------------------

/// Parse a `/search` body into entities, dropping entries without id or name.
///
/// # Errors
///
/// Returns [`TasteError::Parse`] if the body is not valid JSON of the expected shape.
#[doc(hidden)]
pub fn parse_search(body: &str) -> Result<Vec<Entity>, TasteError> {
    let resp: SearchResponse =
        serde_json::from_str(body).map_err(|e| TasteError::Parse(e.to_string()))?;
    Ok(resp.results.into_iter().filter_map(narrow_entity).collect())
}

/// Parse a `/v2/tags` body into tags, dropping entries without id or name.
///
/// # Errors
///
/// Returns [`TasteError::Parse`] on malformed JSON.
#[doc(hidden)]
pub fn parse_tags(body: &str) -> Result<Vec<Tag>, TasteError> {
    let resp: V2Response =
        serde_json::from_str(body).map_err(|e| TasteError::Parse(e.to_string()))?;
    Ok(resp
        .results
        .tags
        .into_iter()
        .filter_map(|t| {
            let id = non_empty(t.id)?;
            let name = non_empty(t.name)?;
            Some(Tag {
                id,
                name,
                tag_type: t.tag_type.unwrap_or_default(),
            })
        })
        .collect())
}

/// Parse a `/v2/insights/compare` body into ranked entities.
///
/// # Errors
///
/// Returns [`TasteError::Parse`] on malformed JSON.
#[doc(hidden)]
pub fn parse_compare(body: &str) -> Result<Vec<ComparedEntity>, TasteError> {
    let resp: V2Response =
        serde_json::from_str(body).map_err(|e| TasteError::Parse(e.to_string()))?;
    Ok(resp
        .results
        .entities
        .into_iter()
        .filter_map(|e| {
            Some(ComparedEntity {
                id: non_empty(e.entity_id)?,
                name: non_empty(e.name)?,
            })
        })
        .collect())
}

/// Parse a `/v2/insights` body into explainable results.
///
/// Affinity is clamped to `[0, 1]`; a missing affinity becomes `0.0`.
///
/// # Errors
///
/// Returns [`TasteError::Parse`] on malformed JSON.
#[doc(hidden)]
pub fn parse_insights(body: &str) -> Result<Vec<InsightEntity>, TasteError> {
    let resp: V2Response =
        serde_json::from_str(body).map_err(|e| TasteError::Parse(e.to_string()))?;
    Ok(resp
        .results
        .entities
        .into_iter()
        .filter_map(|e| {
            let affinity = e
                .query
                .as_ref()
                .and_then(|q| q.affinity)
                .filter(|a| a.is_finite())
                .map_or(0.0, |a| a.clamp(0.0, 1.0));
            Some(InsightEntity {
                id: non_empty(e.entity_id)?,
                name: non_empty(e.name)?,
                affinity,
            })
        })
        .collect())
}

fn narrow_entity(e: WireEntity) -> Option<Entity> {
    let id = non_empty(e.entity_id)?;
    let name = non_empty(e.name)?;
    let category = e
        .types
        .first()
        .cloned()
        .or(e.subtype)
        .map_or_else(|| "unknown".to_owned(), |t| category_from_type(&t));
    Some(Entity {
        id,
        name,
        category,
        popularity: e.popularity,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Query builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build the query string pairs for an insights request.
#[doc(hidden)]
pub fn insights_query(
    signal: &InsightSignal,
    filter: &InsightFilter,
    bias: &InsightBias,
) -> Vec<(String, String)> {
    let mut params = vec![("filter.type".to_owned(), filter.entity_type.clone())];
    if !signal.entity_ids.is_empty() {
        params.push((
            "signal.interests.entities".to_owned(),
            signal.entity_ids.join(","),
        ));
    }
    if !signal.tag_ids.is_empty() {
        params.push(("signal.interests.tags".to_owned(), signal.tag_ids.join(",")));
    }
    if let Some(age) = bias.age {
        params.push(("signal.demographics.age".to_owned(), age.as_str().to_owned()));
    }
    if let Some(gender) = bias.gender {
        params.push((
            "signal.demographics.gender".to_owned(),
            gender.as_str().to_owned(),
        ));
    }
    if let Some(location) = signal.location.as_deref().filter(|l| !l.trim().is_empty()) {
        params.push(("signal.location.query".to_owned(), location.to_owned()));
    }
    params.push(("take".to_owned(), filter.take.to_string()));
    if filter.explainable {
        params.push(("feature.explainability".to_owned(), "true".to_owned()));
    }
    params
}

/// Build the query string pairs for a group comparison.
#[doc(hidden)]
pub fn compare_query(group_a: &[String], group_b: &[String]) -> Vec<(String, String)> {
    vec![
        ("a.signal.interests.entities".to_owned(), group_a.join(",")),
        ("b.signal.interests.entities".to_owned(), group_b.join(",")),
    ]
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the taste graph.
pub struct HttpTasteGraph {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for HttpTasteGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTasteGraph")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl HttpTasteGraph {
    /// Create a client for `base_url` with a single request timeout applied
    /// to every call.
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    /// Returns the base URL the client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<String, TasteError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TasteError::HttpStatus {
                status: status.as_u16(),
                body: sanitize_error_body(&body),
            });
        }
        debug!(path, bytes = body.len(), "taste graph response");
        Ok(body)
    }
}

#[async_trait]
impl TasteGraph for HttpTasteGraph {
    async fn search(&self, query: &str, take: usize) -> Result<Vec<Entity>, TasteError> {
        let params = vec![
            ("query".to_owned(), query.to_owned()),
            ("take".to_owned(), take.to_string()),
        ];
        let body = self.get("/search", &params).await?;
        parse_search(&body).map(|mut entities| {
            entities.truncate(take);
            entities
        })
    }

    async fn search_tags(&self, query: &str, take: usize) -> Result<Vec<Tag>, TasteError> {
        let params = vec![
            ("filter.query".to_owned(), query.to_owned()),
            ("take".to_owned(), take.to_string()),
        ];
        let body = self.get("/v2/tags", &params).await?;
        parse_tags(&body).map(|mut tags| {
            tags.truncate(take);
            tags
        })
    }

    async fn compare_groups(
        &self,
        group_a: &[String],
        group_b: &[String],
    ) -> Result<Vec<ComparedEntity>, TasteError> {
        if group_a.is_empty() || group_b.is_empty() {
            return Err(TasteError::InvalidRequest(
                "both comparison groups need at least one entity id".to_owned(),
            ));
        }
        let body = self
            .get("/v2/insights/compare", &compare_query(group_a, group_b))
            .await?;
        parse_compare(&body)
    }

    async fn insights(
        &self,
        signal: &InsightSignal,
        filter: &InsightFilter,
        bias: &InsightBias,
    ) -> Result<Vec<InsightEntity>, TasteError> {
        if filter.entity_type.trim().is_empty() {
            return Err(TasteError::InvalidRequest(
                "insights filter needs an entity type".to_owned(),
            ));
        }
        let body = self
            .get("/v2/insights", &insights_query(signal, filter, bias))
            .await?;
        parse_insights(&body).map(|mut results| {
            results.truncate(filter.take);
            results
        })
    }
}
