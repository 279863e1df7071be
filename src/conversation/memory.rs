//! Long-term conversation memory: the last few turns per user.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::store::{StateStore, StoreError};

/// Turns kept per user.
pub const MAX_TURNS: usize = 20;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The person chatting.
    User,
    /// This assistant.
    Assistant,
}

/// One remembered turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who said it.
    pub speaker: Speaker,
    /// What was said.
    pub text: String,
    /// When it was said.
    pub at: DateTime<Utc>,
}

/// Per-user turn history kept in a [`StateStore`] under a long TTL.
#[derive(Clone)]
pub struct ConversationMemory {
    store: Arc<dyn StateStore>,
    ttl: Duration,
}

impl ConversationMemory {
    /// Create a memory over `store` whose entries live for `ttl` after the
    /// last write.
    pub fn new(store: Arc<dyn StateStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(user: &str) -> String {
        format!("memory:{user}")
    }

    /// Remembered turns for a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails or holds malformed data.
    pub async fn history(&self, user: &str) -> Result<Vec<Turn>, StoreError> {
        match self.store.get(&Self::key(user)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Append a turn, dropping the oldest beyond [`MAX_TURNS`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails.
    pub async fn record(
        &self,
        user: &str,
        speaker: Speaker,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut turns = self.history(user).await.unwrap_or_default();
        turns.push(Turn {
            speaker,
            text: text.to_owned(),
            at,
        });
        let overflow = turns.len().saturating_sub(MAX_TURNS);
        turns.drain(..overflow);

        let raw = serde_json::to_string(&turns)?;
        self.store.set(&Self::key(user), &raw, self.ttl).await
    }

    /// Forget everything about a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails.
    pub async fn clear(&self, user: &str) -> Result<(), StoreError> {
        self.store.delete(&Self::key(user)).await
    }
}
