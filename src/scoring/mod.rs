//! Commonality scoring between an employee and candidate colleagues.
//!
//! For each candidate the scorer combines workplace signals (department,
//! leadership level, shared office) with taste signals from the knowledge
//! graph (group comparison, biased recommendations, category and tag
//! overlap), asks the text generator for a one-sentence insight, and computes
//! a connection score with [`rank::compute_score`].
//!
//! Every candidate gets exactly one [`CommonalityResult`]. A failure inside a
//! candidate's pipeline yields the fallback result for that candidate and
//! never affects the others.

pub mod rank;

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::demographics::{map_age_range, map_gender};
use crate::profile::Profile;
use crate::prompts;
use crate::providers::{self, router::ModelRouter};
use crate::signals::{SignalBag, SignalGatherer};
use crate::taste::{InsightBias, InsightFilter, InsightSignal, TasteError, TasteGraph};

pub use rank::{compute_score, rank_candidates, RankedCandidate};

/// Score given to a candidate whose pipeline failed.
pub const FALLBACK_SCORE: f64 = 0.1;

/// Commonality reported for a candidate whose pipeline failed.
pub const FALLBACK_COMMONALITY: &str = "Same company";

/// Insight reported for a candidate whose pipeline failed.
pub const FALLBACK_INSIGHT: &str =
    "Sorry, we couldn't generate personalized insights for this match right now.";

/// Role keywords that mark a leadership position (case-insensitive substring).
pub const LEADERSHIP_KEYWORDS: &[&str] = &[
    "vp",
    "vice president",
    "director",
    "head",
    "chief",
    "lead",
    "manager",
    "principal",
    "president",
    "founder",
];

/// Ids per side sent to a group comparison.
const COMPARE_IDS_PER_SIDE: usize = 5;
/// Comparison results kept as commonalities.
const COMPARE_KEEP: usize = 3;
/// Employee / candidate entity ids in the biased recommendation signal.
const SIGNAL_EMPLOYEE_IDS: usize = 3;
const SIGNAL_CANDIDATE_IDS: usize = 2;
/// Results requested from the biased recommendation pass.
const RECOMMENDATION_TAKE: usize = 10;
/// Affinity a recommendation must exceed to become a commonality.
const SHARED_AFFINITY: f64 = 0.5;
/// Shared-affinity commonalities kept.
const SHARED_AFFINITY_KEEP: usize = 3;
/// Token budget for the insight sentence.
const INSIGHT_MAX_TOKENS: u32 = 120;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One raw entry of the affinity dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffinityEntry {
    /// Recommended entity name.
    pub name: String,
    /// Affinity in `[0, 1]`.
    pub affinity: f64,
}

/// Taste-derived commonalities plus the raw affinity dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TasteCommonalities {
    /// Human-readable statements, deduplicated by exact text.
    pub common_interests: Vec<String>,
    /// Every explainable recommendation returned by the biased pass.
    pub affinity_data: Vec<AffinityEntry>,
}

/// Scoring output for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommonalityResult {
    /// Candidate identity (contact if known, else name).
    pub candidate: String,
    /// Workplace then taste commonalities, deduplicated by exact text.
    pub commonalities: Vec<String>,
    /// One-sentence natural-language summary.
    pub insight: String,
    /// Connection score in `[0, 1]`.
    pub score: f64,
    /// Raw affinity dataset behind the score.
    pub affinity_data: Vec<AffinityEntry>,
}

impl CommonalityResult {
    /// The result used when a candidate's pipeline fails.
    pub fn fallback(candidate: &Profile) -> Self {
        Self {
            candidate: candidate.label().to_owned(),
            commonalities: vec![FALLBACK_COMMONALITY.to_owned()],
            insight: FALLBACK_INSIGHT.to_owned(),
            score: FALLBACK_SCORE,
            affinity_data: Vec::new(),
        }
    }
}

/// Errors inside one candidate's scoring pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    /// A knowledge-graph call the pipeline depends on failed.
    #[error("taste graph: {0}")]
    Taste(#[from] TasteError),
}

/// Scorer settings taken from configuration.
#[derive(Debug, Clone)]
pub struct ScorerSettings {
    /// Location token for the shared-office commonality.
    pub office_location_token: String,
    /// Entity type requested by the biased recommendation pass.
    pub recommendation_type: String,
}

// ---------------------------------------------------------------------------
// Workplace commonalities
// ---------------------------------------------------------------------------

/// Whether a role string contains a leadership keyword.
pub fn is_leadership_role(role: &str) -> bool {
    let lower = role.to_lowercase();
    LEADERSHIP_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Workplace commonalities between two profiles.
pub fn workplace_commonalities(
    employee: &Profile,
    candidate: &Profile,
    office_location_token: &str,
) -> Vec<String> {
    let mut out = Vec::new();

    let dept = employee.department.trim();
    if !dept.is_empty() && dept.eq_ignore_ascii_case(candidate.department.trim()) {
        out.push(format!("Both work in {dept}"));
    }

    if is_leadership_role(&employee.role) && is_leadership_role(&candidate.role) {
        out.push("Similar leadership roles".to_owned());
    }

    let token = office_location_token.trim().to_lowercase();
    if !token.is_empty()
        && employee.location.to_lowercase().contains(&token)
        && candidate.location.to_lowercase().contains(&token)
    {
        out.push(format!(
            "Both based in the {} area",
            office_location_token.trim()
        ));
    }

    out
}

// ---------------------------------------------------------------------------
// Overlap helpers
// ---------------------------------------------------------------------------

/// Categories present in both bags, in the employee bag's order.
pub fn shared_categories(employee: &SignalBag, candidate: &SignalBag) -> Vec<String> {
    let theirs: HashSet<&str> = candidate
        .entities
        .iter()
        .map(|e| e.category.as_str())
        .collect();
    let mut seen = HashSet::new();
    employee
        .entities
        .iter()
        .map(|e| e.category.as_str())
        .filter(|c| !c.is_empty() && theirs.contains(c) && seen.insert(*c))
        .map(str::to_owned)
        .collect()
}

/// Tag names present in both bags, in the employee bag's order.
pub fn shared_tag_names(employee: &SignalBag, candidate: &SignalBag) -> Vec<String> {
    let theirs: HashSet<&str> = candidate.tags.iter().map(|t| t.name.as_str()).collect();
    let mut seen = HashSet::new();
    employee
        .tags
        .iter()
        .map(|t| t.name.as_str())
        .filter(|n| !n.is_empty() && theirs.contains(n) && seen.insert(*n))
        .map(str::to_owned)
        .collect()
}

/// Drop exact-duplicate strings, keeping first occurrences.
pub fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Demographic bias for a pair: the employee's attributes, falling back to
/// the candidate's.
pub fn pair_bias(employee: &Profile, candidate: &Profile) -> InsightBias {
    let age = employee
        .age_range
        .as_deref()
        .and_then(map_age_range)
        .or_else(|| candidate.age_range.as_deref().and_then(map_age_range));
    let gender = employee
        .gender_identity
        .as_deref()
        .or(candidate.gender_identity.as_deref())
        .filter(|g| !g.trim().is_empty())
        .map(map_gender);
    InsightBias { age, gender }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Commonality scorer with injected collaborators.
pub struct CommonalityScorer {
    graph: Arc<dyn TasteGraph>,
    gatherer: SignalGatherer,
    models: Arc<ModelRouter>,
    settings: ScorerSettings,
}

impl CommonalityScorer {
    /// Create a scorer.
    pub fn new(
        graph: Arc<dyn TasteGraph>,
        models: Arc<ModelRouter>,
        settings: ScorerSettings,
    ) -> Self {
        Self {
            gatherer: SignalGatherer::new(Arc::clone(&graph)),
            graph,
            models,
            settings,
        }
    }

    /// Score every candidate against `employee`, one result per candidate in
    /// input order.
    ///
    /// Candidates are processed sequentially. The employee's signals are
    /// gathered once per call and shared across candidates.
    pub async fn score(
        &self,
        employee: &Profile,
        candidates: &[Profile],
    ) -> Vec<CommonalityResult> {
        let employee_bag = self.gatherer.gather(employee).await;
        let mut results = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let result = match self.score_candidate(employee, &employee_bag, candidate).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        candidate = candidate.label(),
                        error = %e,
                        "candidate scoring failed, using fallback"
                    );
                    CommonalityResult::fallback(candidate)
                }
            };
            debug!(candidate = %result.candidate, score = result.score, "candidate scored");
            results.push(result);
        }

        info!(
            employee = employee.label(),
            candidates = results.len(),
            "scoring complete"
        );
        results
    }

    async fn score_candidate(
        &self,
        employee: &Profile,
        employee_bag: &SignalBag,
        candidate: &Profile,
    ) -> Result<CommonalityResult, ScoringError> {
        let workplace =
            workplace_commonalities(employee, candidate, &self.settings.office_location_token);
        let candidate_bag = self.gatherer.gather(candidate).await;
        let taste = self
            .taste_commonalities(employee, employee_bag, candidate, &candidate_bag)
            .await?;

        let insight = self
            .insight(employee, candidate, &workplace, &taste.common_interests)
            .await;
        let score = compute_score(&taste, &workplace);

        let mut commonalities = workplace;
        commonalities.extend(taste.common_interests.iter().cloned());

        Ok(CommonalityResult {
            candidate: candidate.label().to_owned(),
            commonalities: dedupe(commonalities),
            insight,
            score,
            affinity_data: taste.affinity_data,
        })
    }

    /// Combine comparison, biased recommendations, and category and tag
    /// overlap into taste commonalities.
    ///
    /// A failed group comparison propagates; a failed recommendation pass is
    /// logged and contributes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::Taste`] when the group comparison fails.
    pub async fn taste_commonalities(
        &self,
        employee: &Profile,
        employee_bag: &SignalBag,
        candidate: &Profile,
        candidate_bag: &SignalBag,
    ) -> Result<TasteCommonalities, ScoringError> {
        let mut interests = Vec::new();

        let ids_a = employee_bag.entity_ids(COMPARE_IDS_PER_SIDE);
        let ids_b = candidate_bag.entity_ids(COMPARE_IDS_PER_SIDE);
        if !ids_a.is_empty() && !ids_b.is_empty() {
            let compared = self.graph.compare_groups(&ids_a, &ids_b).await?;
            interests.extend(
                compared
                    .into_iter()
                    .take(COMPARE_KEEP)
                    .map(|e| format!("Both might enjoy: {}", e.name)),
            );
        }

        let mut affinity_data = Vec::new();
        let mut entity_ids = employee_bag.entity_ids(SIGNAL_EMPLOYEE_IDS);
        entity_ids.extend(candidate_bag.entity_ids(SIGNAL_CANDIDATE_IDS));
        let mut tag_ids = employee_bag.tag_ids(SIGNAL_EMPLOYEE_IDS);
        tag_ids.extend(candidate_bag.tag_ids(SIGNAL_CANDIDATE_IDS));
        let signal = InsightSignal {
            entity_ids,
            tag_ids,
            location: employee
                .primary_location()
                .or_else(|| candidate.primary_location())
                .map(str::to_owned),
        };

        if signal.has_interests() {
            let filter = InsightFilter {
                entity_type: self.settings.recommendation_type.clone(),
                take: RECOMMENDATION_TAKE,
                explainable: true,
            };
            let bias = pair_bias(employee, candidate);
            match self.graph.insights(&signal, &filter, &bias).await {
                Ok(results) => {
                    interests.extend(
                        results
                            .iter()
                            .filter(|r| r.affinity > SHARED_AFFINITY)
                            .take(SHARED_AFFINITY_KEEP)
                            .map(|r| format!("Shared affinity for: {}", r.name)),
                    );
                    affinity_data = results
                        .into_iter()
                        .map(|r| AffinityEntry {
                            name: r.name,
                            affinity: r.affinity,
                        })
                        .collect();
                }
                Err(e) => warn!(
                    candidate = candidate.label(),
                    error = %e,
                    "recommendation pass failed, continuing without it"
                ),
            }
        }

        interests.extend(
            shared_categories(employee_bag, candidate_bag)
                .into_iter()
                .map(|c| format!("Shared interest in: {c}")),
        );
        interests.extend(
            shared_tag_names(employee_bag, candidate_bag)
                .into_iter()
                .map(|t| format!("Both associated with: {t}")),
        );

        Ok(TasteCommonalities {
            common_interests: dedupe(interests),
            affinity_data,
        })
    }

    async fn insight(
        &self,
        employee: &Profile,
        candidate: &Profile,
        workplace: &[String],
        taste: &[String],
    ) -> String {
        let provider = self.models.resolve("insight");
        let prompt = prompts::insight_prompt(employee, candidate, workplace, taste);
        match providers::generate(
            provider.as_ref(),
            Some(prompts::SYSTEM_PROMPT),
            &prompt,
            INSIGHT_MAX_TOKENS,
        )
        .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(candidate = candidate.label(), error = %e, "insight generation failed");
                prompts::fallback_insight(workplace)
            }
        }
    }
}
