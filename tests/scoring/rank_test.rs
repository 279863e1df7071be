//! Connection score and ranking.

use kindred::profile::Profile;
use kindred::scoring::{
    compute_score, rank_candidates, AffinityEntry, CommonalityResult, TasteCommonalities,
};

fn taste(interests: usize, affinities: &[f64]) -> TasteCommonalities {
    TasteCommonalities {
        common_interests: (0..interests).map(|i| format!("interest {i}")).collect(),
        affinity_data: affinities
            .iter()
            .enumerate()
            .map(|(i, a)| AffinityEntry {
                name: format!("entity {i}"),
                affinity: *a,
            })
            .collect(),
    }
}

fn workplace(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("workplace {i}")).collect()
}

fn result(candidate: &str, score: f64) -> CommonalityResult {
    CommonalityResult {
        candidate: candidate.to_owned(),
        commonalities: Vec::new(),
        insight: String::new(),
        score,
        affinity_data: Vec::new(),
    }
}

#[test]
fn score_is_monotone_in_each_input() {
    let base = compute_score(&taste(0, &[]), &workplace(1));
    let more_workplace = compute_score(&taste(0, &[]), &workplace(2));
    let more_taste = compute_score(&taste(1, &[]), &workplace(1));
    let more_affinity = compute_score(&taste(0, &[0.9]), &workplace(1));

    assert!(more_workplace >= base);
    assert!(more_taste >= base);
    assert!(more_affinity >= base);
}

#[test]
fn workplace_and_taste_weights() {
    let score = compute_score(&taste(1, &[]), &workplace(1));
    assert!((score - 0.5).abs() < 1e-9);
}

#[test]
fn large_inputs_cap_at_one() {
    let score = compute_score(&taste(10, &[0.9; 10]), &workplace(10));
    assert!((score - 1.0).abs() < f64::EPSILON);
}

#[test]
fn affinity_at_threshold_earns_no_bonus() {
    let score = compute_score(&taste(0, &[0.7]), &[]);
    assert!((score - 0.1).abs() < 1e-9);
}

#[test]
fn ranking_sorts_descending_and_numbers_from_zero() {
    let candidates = vec![
        Profile::new("Low", "", "", ""),
        Profile::new("High", "", "", ""),
        Profile::new("Mid", "", "", ""),
    ];
    let results = vec![result("Low", 0.1), result("High", 0.9), result("Mid", 0.5)];

    let ranked = rank_candidates(candidates, results);
    let order: Vec<(&str, usize)> = ranked
        .iter()
        .map(|r| (r.profile.name.as_str(), r.rank))
        .collect();
    assert_eq!(order, vec![("High", 0), ("Mid", 1), ("Low", 2)]);
}

#[test]
fn equal_scores_keep_input_order() {
    let names = ["Ana", "Bo", "Cy", "Di"];
    let candidates: Vec<Profile> = names.iter().map(|n| Profile::new(n, "", "", "")).collect();
    let results: Vec<CommonalityResult> = names.iter().map(|n| result(n, 0.4)).collect();

    let ranked = rank_candidates(candidates, results);
    let order: Vec<&str> = ranked.iter().map(|r| r.profile.name.as_str()).collect();
    assert_eq!(order, names);
}

#[test]
fn ranking_pairs_results_positionally() {
    let candidates = vec![Profile::new("Ana", "", "", ""), Profile::new("Bo", "", "", "")];
    let results = vec![result("Ana", 0.2), result("Bo", 0.8)];

    let ranked = rank_candidates(candidates, results);
    for entry in &ranked {
        assert_eq!(entry.result.candidate, entry.profile.name);
    }
}
