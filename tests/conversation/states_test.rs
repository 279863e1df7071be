//! Conversation state persistence: merge, staleness, cleanup.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use kindred::conversation::store::{InMemoryStateStore, StateStore};
use kindred::conversation::{
    ConversationKey, ConversationState, ConversationStates, Stage, StatePatch,
};

fn states() -> (Arc<dyn StateStore>, ConversationStates) {
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
    (Arc::clone(&store), ConversationStates::new(store))
}

#[tokio::test]
async fn update_merges_fields_and_advances_timestamp() {
    let (_, states) = states();
    let key = ConversationKey::new("U1", None);
    let t0 = Utc::now();

    let mut created = ConversationState::detected(t0);
    states.save(&key, &mut created, t0).await.expect("save");

    let t1 = t0 + chrono::Duration::seconds(30);
    let merged = states
        .update(
            &key,
            StatePatch {
                stage: Some(Stage::AwaitingPreferences),
                location: Some("Austin".to_owned()),
                ..StatePatch::default()
            },
            t1,
        )
        .await
        .expect("update");
    assert_eq!(merged.stage, Stage::AwaitingPreferences);

    let t2 = t1 + chrono::Duration::seconds(30);
    states
        .update(
            &key,
            StatePatch {
                age_range: Some("25-29".to_owned()),
                ..StatePatch::default()
            },
            t2,
        )
        .await
        .expect("second update");

    let read = states.load(&key, t2).await.expect("load").expect("live state");
    assert_eq!(read.stage, Stage::AwaitingPreferences);
    assert_eq!(read.location.as_deref(), Some("Austin"));
    assert_eq!(read.age_range.as_deref(), Some("25-29"));
    assert!(read.updated_at > created.updated_at);

    states.clear(&key).await.expect("clear");
    assert!(states.load(&key, t2).await.expect("load").is_none());
}

#[tokio::test]
async fn update_without_state_starts_from_detected() {
    let (_, states) = states();
    let key = ConversationKey::new("U1", None);
    let now = Utc::now();

    let state = states
        .update(
            &key,
            StatePatch {
                location: Some("Boston".to_owned()),
                ..StatePatch::default()
            },
            now,
        )
        .await
        .expect("update");
    assert_eq!(state.stage, Stage::Detected);
    assert_eq!(state.location.as_deref(), Some("Boston"));
}

#[tokio::test]
async fn stale_record_is_purged_on_read() {
    let (store, states) = states();
    let key = ConversationKey::new("U1", Some("C1".to_owned()));
    let t0 = Utc::now();

    let mut state = ConversationState::detected(t0);
    states.save(&key, &mut state, t0).await.expect("save");

    let later = t0 + chrono::Duration::seconds(601);
    assert!(states.load(&key, later).await.expect("load").is_none());
    assert!(store
        .get(&key.storage_key())
        .await
        .expect("get")
        .is_none());
}

#[tokio::test]
async fn malformed_record_reads_as_absent() {
    let (store, states) = states();
    let key = ConversationKey::new("U1", None);
    store
        .set(&key.storage_key(), "{not json", Duration::from_secs(60))
        .await
        .expect("set");

    assert!(states.load(&key, Utc::now()).await.expect("load").is_none());
    assert!(store
        .get(&key.storage_key())
        .await
        .expect("get")
        .is_none());
}

#[tokio::test]
async fn complete_record_is_never_served() {
    let (_, states) = states();
    let key = ConversationKey::new("U1", None);
    let now = Utc::now();

    let mut state = ConversationState::detected(now);
    state.stage = Stage::Complete;
    states.save(&key, &mut state, now).await.expect("save");

    assert!(states.load(&key, now).await.expect("load").is_none());
}
