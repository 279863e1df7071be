//! Housing recommendation pipeline run when a relocation dialogue completes.
//!
//! [`TasteHousingAdvisor`] resolves the collected preferences to graph tags,
//! asks the taste graph for places in the target location biased by the
//! collected demographics, and has the text generator turn the top places
//! into a short reply.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::demographics::{map_age_range, map_gender};
use crate::prompts;
use crate::providers::{self, router::ModelRouter};
use crate::taste::{InsightBias, InsightFilter, InsightSignal, TasteError, TasteGraph};

/// Entity type requested for housing recommendations.
pub const PLACE_ENTITY_TYPE: &str = "urn:entity:place";

/// Places requested from the graph.
const PLACE_TAKE: usize = 10;
/// Places handed to the text generator.
const PLACES_IN_PROMPT: usize = 5;
/// Preferences resolved to tags.
const MAX_PREFERENCE_TAGS: usize = 3;
const REPLY_MAX_TOKENS: u32 = 400;

/// Everything the dialogue collected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HousingRequest {
    /// Target location.
    pub location: String,
    /// Age range as entered.
    pub age_range: Option<String>,
    /// Gender identity as entered.
    pub gender: Option<String>,
    /// Preference terms.
    pub preferences: Vec<String>,
}

/// Housing pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum HousingError {
    /// The place recommendation call failed.
    #[error("place recommendations failed: {0}")]
    Taste(#[from] TasteError),
    /// The request had no usable location.
    #[error("housing request has no location")]
    MissingLocation,
}

/// Produces a housing reply for a completed dialogue.
#[async_trait]
pub trait HousingAdvisor: Send + Sync {
    /// Build the reply text.
    async fn recommend(&self, request: &HousingRequest) -> Result<String, HousingError>;
}

/// [`HousingAdvisor`] backed by the taste graph and the text generator.
pub struct TasteHousingAdvisor {
    graph: Arc<dyn TasteGraph>,
    models: Arc<ModelRouter>,
}

impl TasteHousingAdvisor {
    /// Create an advisor.
    pub fn new(graph: Arc<dyn TasteGraph>, models: Arc<ModelRouter>) -> Self {
        Self { graph, models }
    }

    async fn preference_tags(&self, preferences: &[String]) -> Vec<String> {
        let mut ids = Vec::new();
        for preference in preferences.iter().take(MAX_PREFERENCE_TAGS) {
            match self.graph.search_tags(preference, 1).await {
                Ok(tags) => ids.extend(tags.into_iter().map(|t| t.id)),
                Err(e) => {
                    warn!(preference = %preference, error = %e, "preference tag lookup failed");
                }
            }
        }
        ids
    }
}

#[async_trait]
impl HousingAdvisor for TasteHousingAdvisor {
    async fn recommend(&self, request: &HousingRequest) -> Result<String, HousingError> {
        let location = request.location.trim();
        if location.is_empty() {
            return Err(HousingError::MissingLocation);
        }

        let signal = InsightSignal {
            entity_ids: Vec::new(),
            tag_ids: self.preference_tags(&request.preferences).await,
            location: Some(location.to_owned()),
        };
        let filter = InsightFilter {
            entity_type: PLACE_ENTITY_TYPE.to_owned(),
            take: PLACE_TAKE,
            explainable: true,
        };
        let bias = InsightBias {
            age: request.age_range.as_deref().and_then(map_age_range),
            gender: request.gender.as_deref().map(map_gender),
        };

        let places: Vec<String> = self
            .graph
            .insights(&signal, &filter, &bias)
            .await?
            .into_iter()
            .take(PLACES_IN_PROMPT)
            .map(|p| p.name)
            .collect();
        debug!(location, places = places.len(), "place recommendations received");

        if places.is_empty() {
            return Ok(prompts::fallback_housing(location, &places));
        }

        let provider = self.models.resolve("housing");
        let prompt = prompts::housing_prompt(location, &request.preferences, &places);
        let reply = match providers::generate(
            provider.as_ref(),
            Some(prompts::SYSTEM_PROMPT),
            &prompt,
            REPLY_MAX_TOKENS,
        )
        .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(location, error = %e, "housing reply generation failed, using template");
                prompts::fallback_housing(location, &places)
            }
        };

        info!(location, "housing recommendation ready");
        Ok(reply)
    }
}
