//! Introduction flow: enrich, score, rank, compose and deliver.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::directory::Directory;
use crate::dispatch::{DeliveryReport, Dispatcher};
use crate::profile::Profile;
use crate::prompts;
use crate::providers::{self, router::ModelRouter};
use crate::scoring::{rank_candidates, CommonalityScorer, RankedCandidate};

const MESSAGE_MAX_TOKENS: u32 = 300;

/// An employee asking to be introduced to candidate colleagues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroductionRequest {
    /// Who is asking.
    pub employee: Profile,
    /// Who they might meet.
    #[serde(default)]
    pub candidates: Vec<Profile>,
}

/// A composed introduction for one top-ranked candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Introduction {
    /// Candidate identity.
    pub candidate: String,
    /// Rank position.
    pub rank: usize,
    /// Message text.
    pub message: String,
}

/// Result of one introduction request.
#[derive(Debug, Clone, Serialize)]
pub struct IntroductionOutcome {
    /// Identifier for correlating logs.
    pub batch_id: String,
    /// Every candidate, best match first.
    pub ranked: Vec<RankedCandidate>,
    /// Messages for the top-ranked candidates.
    pub introductions: Vec<Introduction>,
    /// Delivery reports, empty when dispatch is off.
    pub deliveries: Vec<DeliveryReport>,
}

/// Introduction errors.
#[derive(Debug, thiserror::Error)]
pub enum IntroductionError {
    /// The request named no candidates.
    #[error("introduction request has no candidates")]
    NoCandidates,
}

/// Runs introduction requests.
pub struct IntroductionService {
    scorer: CommonalityScorer,
    models: Arc<ModelRouter>,
    directory: Option<Arc<dyn Directory>>,
    dispatcher: Option<Dispatcher>,
    top_n: usize,
}

impl IntroductionService {
    /// Create a service. Without a directory profiles are used as given;
    /// without a dispatcher nothing is delivered.
    pub fn new(
        scorer: CommonalityScorer,
        models: Arc<ModelRouter>,
        directory: Option<Arc<dyn Directory>>,
        dispatcher: Option<Dispatcher>,
        top_n: usize,
    ) -> Self {
        Self {
            scorer,
            models,
            directory,
            dispatcher,
            top_n,
        }
    }

    /// Handle one request.
    ///
    /// # Errors
    ///
    /// Returns [`IntroductionError::NoCandidates`] for an empty candidate
    /// list. Collaborator failures never fail the request.
    pub async fn introduce(
        &self,
        request: IntroductionRequest,
    ) -> Result<IntroductionOutcome, IntroductionError> {
        if request.candidates.is_empty() {
            return Err(IntroductionError::NoCandidates);
        }
        let batch_id = Uuid::new_v4().to_string();
        info!(
            batch_id = %batch_id,
            employee = request.employee.label(),
            candidates = request.candidates.len(),
            "introduction request received"
        );

        let mut employee = request.employee;
        self.enrich(&mut employee).await;
        let mut candidates = request.candidates;
        for candidate in &mut candidates {
            self.enrich(candidate).await;
        }

        let results = self.scorer.score(&employee, &candidates).await;
        let ranked = rank_candidates(candidates, results);

        let mut introductions = Vec::new();
        let mut deliveries = Vec::new();
        for entry in ranked.iter().take(self.top_n) {
            let message = self.compose(&employee, entry).await;
            if let Some(dispatcher) = &self.dispatcher {
                deliveries.push(dispatcher.deliver(&entry.profile, entry.rank, &message).await);
            }
            introductions.push(Introduction {
                candidate: entry.result.candidate.clone(),
                rank: entry.rank,
                message,
            });
        }

        info!(
            batch_id = %batch_id,
            introduced = introductions.len(),
            delivered = deliveries.iter().filter(|d| d.delivered()).count(),
            "introduction request complete"
        );
        Ok(IntroductionOutcome {
            batch_id,
            ranked,
            introductions,
            deliveries,
        })
    }

    async fn enrich(&self, profile: &mut Profile) {
        let Some(directory) = &self.directory else {
            return;
        };
        let Some(contact) = profile.contact.clone().filter(|c| !c.trim().is_empty()) else {
            return;
        };
        match directory.profile_by_contact(&contact).await {
            Ok(Some(record)) => {
                profile.enrich(&record);
                debug!(contact = %contact, "profile enriched from directory");
            }
            Ok(None) => debug!(contact = %contact, "no directory record"),
            Err(e) => warn!(contact = %contact, error = %e, "directory lookup failed"),
        }
    }

    async fn compose(&self, employee: &Profile, entry: &RankedCandidate) -> String {
        let provider = self.models.resolve("introduction");
        let prompt = prompts::introduction_prompt(
            employee,
            &entry.profile,
            &entry.result.commonalities,
            &entry.result.insight,
        );
        match providers::generate(
            provider.as_ref(),
            Some(prompts::SYSTEM_PROMPT),
            &prompt,
            MESSAGE_MAX_TOKENS,
        )
        .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    candidate = %entry.result.candidate,
                    error = %e,
                    "introduction composition failed"
                );
                prompts::fallback_introduction(
                    employee,
                    &entry.profile,
                    &entry.result.commonalities,
                )
            }
        }
    }
}
