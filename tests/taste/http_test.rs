//! Wire parsing and query building for the HTTP knowledge-graph client.

use std::time::Duration;

use kindred::demographics::{AgeBucket, Gender};
use kindred::taste::http::{
    compare_query, insights_query, parse_compare, parse_insights, parse_search, parse_tags,
    HttpTasteGraph,
};
use kindred::taste::{sanitize_error_body, InsightBias, InsightFilter, InsightSignal, TasteError};

#[test]
fn search_narrows_entities_and_derives_category() {
    let body = r#"{
        "results": [
            {"entity_id": "A1", "name": "Radiohead", "types": ["urn:entity:artist"], "popularity": 0.98},
            {"entity_id": "B2", "name": "Lisbon", "subtype": "urn:entity:destination"},
            {"entity_id": "C3", "name": "Mystery"},
            {"entity_id": "", "name": "No id"},
            {"name": "Also no id"}
        ]
    }"#;

    let entities = parse_search(body).expect("parse");
    assert_eq!(entities.len(), 3);
    assert_eq!(entities[0].category, "artist");
    assert_eq!(entities[0].popularity, Some(0.98));
    assert_eq!(entities[1].category, "destination");
    assert_eq!(entities[2].category, "unknown");
}

#[test]
fn search_without_results_is_empty() {
    assert!(parse_search("{}").expect("parse").is_empty());
}

#[test]
fn malformed_body_is_parse_error() {
    assert!(matches!(parse_search("not json"), Err(TasteError::Parse(_))));
    assert!(matches!(parse_insights("[1,2"), Err(TasteError::Parse(_))));
}

#[test]
fn tags_come_from_v2_envelope() {
    let body = r#"{"results": {"tags": [
        {"id": "urn:tag:genre:jazz", "name": "Jazz", "type": "urn:tag:genre"},
        {"id": "urn:tag:x", "name": ""}
    ]}}"#;

    let tags = parse_tags(body).expect("parse");
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "Jazz");
    assert_eq!(tags[0].tag_type, "urn:tag:genre");
}

#[test]
fn compare_keeps_order() {
    let body = r#"{"results": {"entities": [
        {"entity_id": "1", "name": "First"},
        {"entity_id": "2", "name": "Second"}
    ]}}"#;

    let names: Vec<String> = parse_compare(body)
        .expect("parse")
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["First", "Second"]);
}

#[test]
fn insight_affinity_is_clamped_or_defaulted() {
    let body = r#"{"results": {"entities": [
        {"entity_id": "1", "name": "High", "query": {"affinity": 1.7}},
        {"entity_id": "2", "name": "Low", "query": {"affinity": -0.2}},
        {"entity_id": "3", "name": "Missing"},
        {"entity_id": "4", "name": "Normal", "query": {"affinity": 0.42}}
    ]}}"#;

    let affinities: Vec<f64> = parse_insights(body)
        .expect("parse")
        .into_iter()
        .map(|e| e.affinity)
        .collect();
    assert_eq!(affinities, vec![1.0, 0.0, 0.0, 0.42]);
}

#[test]
fn insights_query_includes_only_present_signals() {
    let signal = InsightSignal {
        entity_ids: vec!["A".to_owned(), "B".to_owned()],
        tag_ids: Vec::new(),
        location: Some("Austin".to_owned()),
    };
    let filter = InsightFilter {
        entity_type: "urn:entity:place".to_owned(),
        take: 10,
        explainable: true,
    };
    let bias = InsightBias {
        age: Some(AgeBucket::ThirtySixToFiftyFive),
        gender: Some(Gender::Male),
    };

    let params = insights_query(&signal, &filter, &bias);
    let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "filter.type",
            "signal.interests.entities",
            "signal.demographics.age",
            "signal.demographics.gender",
            "signal.location.query",
            "take",
            "feature.explainability",
        ]
    );
    assert!(params.contains(&("signal.interests.entities".to_owned(), "A,B".to_owned())));
    assert!(params.contains(&("signal.demographics.age".to_owned(), "36_to_55".to_owned())));
    assert!(params.contains(&("signal.demographics.gender".to_owned(), "male".to_owned())));
}

#[test]
fn insights_query_without_bias_or_location() {
    let signal = InsightSignal {
        tag_ids: vec!["t1".to_owned()],
        location: Some("  ".to_owned()),
        ..InsightSignal::default()
    };
    let filter = InsightFilter {
        entity_type: "urn:entity:artist".to_owned(),
        take: 5,
        explainable: false,
    };

    let params = insights_query(&signal, &filter, &InsightBias::default());
    let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["filter.type", "signal.interests.tags", "take"]);
}

#[test]
fn compare_query_joins_groups() {
    let params = compare_query(
        &["a1".to_owned(), "a2".to_owned()],
        &["b1".to_owned()],
    );
    assert_eq!(
        params,
        vec![
            ("a.signal.interests.entities".to_owned(), "a1,a2".to_owned()),
            ("b.signal.interests.entities".to_owned(), "b1".to_owned()),
        ]
    );
}

#[test]
fn error_bodies_are_sanitized() {
    let raw = format!("bad   request\n api_key=abcdefgh12345678 {}", "x".repeat(400));
    let clean = sanitize_error_body(&raw);
    assert!(!clean.contains("abcdefgh12345678"));
    assert!(clean.starts_with("bad request"));
    assert!(clean.ends_with("...[truncated]"));
}

#[test]
fn client_debug_hides_api_key() {
    let client = HttpTasteGraph::new(
        "https://graph.example.com/",
        "secret-key-123".to_owned(),
        Duration::from_secs(5),
    );
    assert_eq!(client.base_url(), "https://graph.example.com");
    assert!(!format!("{client:?}").contains("secret-key-123"));
}

#[tokio::test]
async fn empty_comparison_group_is_rejected_locally() {
    use kindred::taste::TasteGraph;

    let client = HttpTasteGraph::new(
        "http://127.0.0.1:9",
        "k".to_owned(),
        Duration::from_secs(1),
    );
    let result = client.compare_groups(&[], &["b".to_owned()]).await;
    assert!(matches!(result, Err(TasteError::InvalidRequest(_))));
}
