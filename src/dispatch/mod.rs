//! Introduction delivery with a per-candidate fallback chain.
//!
//! For each ranked candidate the [`Dispatcher`] tries, in order, stopping at
//! the first success:
//! 1. the identity configured for the candidate's rank position,
//! 2. the identity resolved from the candidate's contact address,
//! 3. the shared default channel.
//!
//! Every attempt is recorded. A chain where nothing applies or everything
//! fails ends in [`DeliveryOutcome::Failed`]. Chains never affect each other.

pub mod slack;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::profile::Profile;

/// An opened conversation the messenger can post into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelHandle(pub String);

/// Messaging transport errors.
#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    /// HTTP transport failure.
    #[error("messaging request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Upstream responded with a non-success status.
    #[error("messaging API returned status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },
    /// The API accepted the request but reported an error.
    #[error("messaging API error: {0}")]
    Api(String),
    /// Response did not match the expected schema.
    #[error("messaging response parse error: {0}")]
    Parse(String),
}

/// Chat transport used to deliver introductions.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Open (or reuse) a direct conversation with `identity`.
    async fn open_conversation(&self, identity: &str) -> Result<ChannelHandle, MessengerError>;

    /// Post `content` into a conversation or channel.
    async fn post_message(&self, channel: &ChannelHandle, content: &str)
        -> Result<(), MessengerError>;

    /// Resolve a contact address to a messaging identity.
    async fn lookup_identity_by_contact(
        &self,
        contact: &str,
    ) -> Result<Option<String>, MessengerError>;
}

// ---------------------------------------------------------------------------
// Targets and reports
// ---------------------------------------------------------------------------

/// Delivery targets taken from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryTargets {
    /// Identity per rank position; `None` leaves a position unassigned.
    pub rank_identities: Vec<Option<String>>,
    /// Shared broadcast channel.
    pub default_channel: Option<String>,
}

impl DeliveryTargets {
    /// Build targets from the `[dispatch]` section. Blank entries are
    /// unassigned.
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            rank_identities: config
                .rank_identities
                .iter()
                .map(|id| non_blank(id))
                .collect(),
            default_channel: config.default_channel.as_deref().and_then(non_blank),
        }
    }

    /// The identity assigned to a rank position.
    pub fn identity_for_rank(&self, rank: usize) -> Option<&str> {
        self.rank_identities.get(rank).and_then(|id| id.as_deref())
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Delivery channel tried by one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    /// Identity configured for the rank position.
    AssignedIdentity,
    /// Identity resolved from the contact address.
    ContactLookup,
    /// Shared default channel.
    Broadcast,
}

/// One delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryAttempt {
    /// Channel tried.
    pub channel: DeliveryChannel,
    /// Identity, contact address or channel targeted.
    pub target: String,
    /// Whether the message was posted.
    pub success: bool,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final result of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Posted through `channel` to `target`.
    Delivered {
        /// Channel that succeeded.
        channel: DeliveryChannel,
        /// Target that received the message.
        target: String,
    },
    /// Nothing applied or every attempt failed.
    Failed,
}

/// Per-candidate delivery report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Candidate identity.
    pub candidate: String,
    /// Rank position of the candidate.
    pub rank: usize,
    /// Attempts in the order they were made.
    pub attempts: Vec<DeliveryAttempt>,
    /// Final result.
    pub outcome: DeliveryOutcome,
}

impl DeliveryReport {
    /// Whether the message reached someone.
    pub fn delivered(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Delivered { .. })
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Runs the fallback chain for each candidate.
pub struct Dispatcher {
    messenger: Arc<dyn Messenger>,
    targets: DeliveryTargets,
}

impl Dispatcher {
    /// Create a dispatcher.
    pub fn new(messenger: Arc<dyn Messenger>, targets: DeliveryTargets) -> Self {
        Self { messenger, targets }
    }

    /// Deliver `message` about `candidate` at rank position `rank`.
    pub async fn deliver(&self, candidate: &Profile, rank: usize, message: &str) -> DeliveryReport {
        let mut attempts = Vec::new();

        if let Some(identity) = self.targets.identity_for_rank(rank) {
            let result = self.send_direct(identity, message).await;
            if let Some(outcome) = record(
                &mut attempts,
                DeliveryChannel::AssignedIdentity,
                identity,
                result,
            ) {
                return finish(candidate, rank, attempts, outcome);
            }
        }

        if let Some(contact) = candidate.contact.as_deref().and_then(non_blank) {
            let result = match self.messenger.lookup_identity_by_contact(&contact).await {
                Ok(Some(identity)) => self.send_direct(&identity, message).await,
                Ok(None) => Err(format!("no messaging identity for {contact}")),
                Err(e) => Err(e.to_string()),
            };
            if let Some(outcome) =
                record(&mut attempts, DeliveryChannel::ContactLookup, &contact, result)
            {
                return finish(candidate, rank, attempts, outcome);
            }
        }

        if let Some(channel) = self.targets.default_channel.as_deref() {
            let content = format!("For {}: {message}", candidate.name);
            let result = self
                .messenger
                .post_message(&ChannelHandle(channel.to_owned()), &content)
                .await
                .map_err(|e| e.to_string());
            if let Some(outcome) = record(&mut attempts, DeliveryChannel::Broadcast, channel, result)
            {
                return finish(candidate, rank, attempts, outcome);
            }
        }

        warn!(
            candidate = candidate.label(),
            rank,
            attempts = attempts.len(),
            "introduction could not be delivered"
        );
        finish(candidate, rank, attempts, DeliveryOutcome::Failed)
    }

    async fn send_direct(&self, identity: &str, message: &str) -> Result<(), String> {
        let channel = self
            .messenger
            .open_conversation(identity)
            .await
            .map_err(|e| e.to_string())?;
        self.messenger
            .post_message(&channel, message)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Record an attempt. Returns the outcome when it succeeded.
fn record(
    attempts: &mut Vec<DeliveryAttempt>,
    channel: DeliveryChannel,
    target: &str,
    result: Result<(), String>,
) -> Option<DeliveryOutcome> {
    match result {
        Ok(()) => {
            debug!(channel = ?channel, target, "delivery attempt succeeded");
            attempts.push(DeliveryAttempt {
                channel,
                target: target.to_owned(),
                success: true,
                error: None,
            });
            Some(DeliveryOutcome::Delivered {
                channel,
                target: target.to_owned(),
            })
        }
        Err(error) => {
            debug!(channel = ?channel, target, error = %error, "delivery attempt failed");
            attempts.push(DeliveryAttempt {
                channel,
                target: target.to_owned(),
                success: false,
                error: Some(error),
            });
            None
        }
    }
}

fn finish(
    candidate: &Profile,
    rank: usize,
    attempts: Vec<DeliveryAttempt>,
    outcome: DeliveryOutcome,
) -> DeliveryReport {
    if let DeliveryOutcome::Delivered { channel, target } = &outcome {
        info!(
            candidate = candidate.label(),
            rank,
            channel = ?channel,
            target = %target,
            "introduction delivered"
        );
    }
    DeliveryReport {
        candidate: candidate.label().to_owned(),
        rank,
        attempts,
        outcome,
    }
}
