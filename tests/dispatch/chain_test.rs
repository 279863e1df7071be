//! Fallback chain: assigned identity, contact lookup, broadcast.

use std::sync::Arc;

use kindred::dispatch::{
    DeliveryChannel, DeliveryOutcome, DeliveryTargets, Dispatcher, Messenger,
};
use kindred::profile::Profile;

use crate::support::FakeMessenger;

fn candidate(name: &str, contact: Option<&str>) -> Profile {
    let mut profile = Profile::new(name, "Engineer", "Platform", "Austin, TX");
    profile.contact = contact.map(str::to_owned);
    profile
}

fn targets(identities: &[Option<&str>], channel: Option<&str>) -> DeliveryTargets {
    DeliveryTargets {
        rank_identities: identities.iter().map(|id| id.map(str::to_owned)).collect(),
        default_channel: channel.map(str::to_owned),
    }
}

fn dispatcher(messenger: &Arc<FakeMessenger>, targets: DeliveryTargets) -> Dispatcher {
    Dispatcher::new(Arc::clone(messenger) as Arc<dyn Messenger>, targets)
}

#[tokio::test]
async fn assigned_identity_is_tried_first() {
    let messenger = Arc::new(FakeMessenger::default());
    let dispatcher = dispatcher(&messenger, targets(&[Some("U1")], Some("C-intros")));

    let report = dispatcher
        .deliver(&candidate("Bo", Some("bo@example.com")), 0, "Meet Bo!")
        .await;

    assert!(report.delivered());
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(
        report.outcome,
        DeliveryOutcome::Delivered {
            channel: DeliveryChannel::AssignedIdentity,
            target: "U1".to_owned(),
        }
    );
    assert_eq!(
        messenger.posted(),
        vec![("D-U1".to_owned(), "Meet Bo!".to_owned())]
    );
}

#[tokio::test]
async fn contact_lookup_follows_failed_identity() {
    let messenger = Arc::new(FakeMessenger {
        unreachable: ["U1".to_owned()].into_iter().collect(),
        directory: [("bo@example.com".to_owned(), "U77".to_owned())]
            .into_iter()
            .collect(),
        ..FakeMessenger::default()
    });
    let dispatcher = dispatcher(&messenger, targets(&[Some("U1")], Some("C-intros")));

    let report = dispatcher
        .deliver(&candidate("Bo", Some("bo@example.com")), 0, "Meet Bo!")
        .await;

    let channels: Vec<(DeliveryChannel, bool)> = report
        .attempts
        .iter()
        .map(|a| (a.channel, a.success))
        .collect();
    assert_eq!(
        channels,
        vec![
            (DeliveryChannel::AssignedIdentity, false),
            (DeliveryChannel::ContactLookup, true),
        ]
    );
    assert!(report.attempts[0].error.is_some());
    assert_eq!(report.attempts[1].target, "bo@example.com");
    assert_eq!(messenger.posted()[0].0, "D-U77");
}

#[tokio::test]
async fn broadcast_is_last_resort() {
    let messenger = Arc::new(FakeMessenger::default());
    let dispatcher = dispatcher(&messenger, targets(&[], Some("C-intros")));

    let report = dispatcher
        .deliver(&candidate("Bo", Some("bo@example.com")), 3, "Meet Bo!")
        .await;

    // Unknown contact counts as a failed lookup attempt.
    assert_eq!(report.attempts.len(), 2);
    assert_eq!(report.attempts[0].channel, DeliveryChannel::ContactLookup);
    assert!(!report.attempts[0].success);
    assert_eq!(
        report.outcome,
        DeliveryOutcome::Delivered {
            channel: DeliveryChannel::Broadcast,
            target: "C-intros".to_owned(),
        }
    );
    assert_eq!(
        messenger.posted(),
        vec![("C-intros".to_owned(), "For Bo: Meet Bo!".to_owned())]
    );
}

#[tokio::test]
async fn lookup_error_moves_on_to_broadcast() {
    let messenger = Arc::new(FakeMessenger {
        lookup_fails: true,
        ..FakeMessenger::default()
    });
    let dispatcher = dispatcher(&messenger, targets(&[], Some("C-intros")));

    let report = dispatcher
        .deliver(&candidate("Bo", Some("bo@example.com")), 0, "hi")
        .await;

    assert!(report.delivered());
    assert!(report.attempts[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("ratelimited")));
}

#[tokio::test]
async fn every_failure_is_reported_without_error() {
    let messenger = Arc::new(FakeMessenger {
        unreachable: ["U1".to_owned()].into_iter().collect(),
        broken_channels: ["C-intros".to_owned()].into_iter().collect(),
        ..FakeMessenger::default()
    });
    let dispatcher = dispatcher(&messenger, targets(&[Some("U1")], Some("C-intros")));

    let report = dispatcher
        .deliver(&candidate("Bo", Some("bo@example.com")), 0, "hi")
        .await;

    assert_eq!(report.outcome, DeliveryOutcome::Failed);
    assert_eq!(report.attempts.len(), 3);
    assert!(report.attempts.iter().all(|a| !a.success));
    assert!(messenger.posted().is_empty());
}

#[tokio::test]
async fn nothing_configured_fails_with_no_attempts() {
    let messenger = Arc::new(FakeMessenger::default());
    let dispatcher = dispatcher(&messenger, DeliveryTargets::default());

    let report = dispatcher.deliver(&candidate("Bo", None), 0, "hi").await;
    assert_eq!(report.outcome, DeliveryOutcome::Failed);
    assert!(report.attempts.is_empty());
    assert_eq!(report.candidate, "Bo");
}

#[tokio::test]
async fn candidates_are_delivered_independently() {
    let messenger = Arc::new(FakeMessenger {
        unreachable: ["U1".to_owned()].into_iter().collect(),
        ..FakeMessenger::default()
    });
    let dispatcher = dispatcher(&messenger, targets(&[Some("U1"), Some("U2")], None));

    let first = dispatcher.deliver(&candidate("Bo", None), 0, "first").await;
    let second = dispatcher.deliver(&candidate("Cy", None), 1, "second").await;

    assert!(!first.delivered());
    assert!(second.delivered());
    assert_eq!(second.rank, 1);
    assert_eq!(
        messenger.posted(),
        vec![("D-U2".to_owned(), "second".to_owned())]
    );
}
