//! Connection score and candidate ranking.

use serde::Serialize;

use crate::profile::Profile;

use super::{CommonalityResult, TasteCommonalities};

/// Weight per workplace commonality.
const WORKPLACE_WEIGHT: f64 = 0.2;
/// Weight per taste commonality.
const TASTE_WEIGHT: f64 = 0.3;
/// Weight per affinity entry, before saturation.
const AFFINITY_WEIGHT: f64 = 0.1;
/// Ceiling for the affinity-count term.
const AFFINITY_CAP: f64 = 0.3;
/// Bonus per affinity entry above [`HIGH_AFFINITY`].
const HIGH_AFFINITY_BONUS: f64 = 0.1;
/// Affinity above which an entry earns the bonus.
pub const HIGH_AFFINITY: f64 = 0.7;

/// Compute a connection score in `[0, 1]`.
///
/// `0.2·|workplace| + 0.3·|interests| + min(0.1·|affinity|, 0.3) + 0.1·|affinity > 0.7|`,
/// capped at `1.0`.
pub fn compute_score(taste: &TasteCommonalities, workplace: &[String]) -> f64 {
    let high_affinity = taste
        .affinity_data
        .iter()
        .filter(|entry| entry.affinity > HIGH_AFFINITY)
        .count();

    let sum = WORKPLACE_WEIGHT * count(workplace.len())
        + TASTE_WEIGHT * count(taste.common_interests.len())
        + (AFFINITY_WEIGHT * count(taste.affinity_data.len())).min(AFFINITY_CAP)
        + HIGH_AFFINITY_BONUS * count(high_affinity);

    sum.clamp(0.0, 1.0)
}

fn count(n: usize) -> f64 {
    f64::from(u32::try_from(n).unwrap_or(u32::MAX))
}

/// A candidate annotated with its scoring result.
#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    /// Position after ranking, starting at 0 for the best match.
    pub rank: usize,
    /// The candidate profile.
    pub profile: Profile,
    /// Scoring output for this candidate.
    pub result: CommonalityResult,
}

/// Pair candidates with their results and sort by descending score.
///
/// Candidates and results are zipped positionally. The sort is stable, so
/// equal scores keep their input order.
pub fn rank_candidates(
    candidates: Vec<Profile>,
    results: Vec<CommonalityResult>,
) -> Vec<RankedCandidate> {
    let mut paired: Vec<(Profile, CommonalityResult)> =
        candidates.into_iter().zip(results).collect();
    paired.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));
    paired
        .into_iter()
        .enumerate()
        .map(|(rank, (profile, result))| RankedCandidate {
            rank,
            profile,
            result,
        })
        .collect()
}
