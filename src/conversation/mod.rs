//! Relocation dialogue: a per-(user, scope) state machine persisted in a
//! [`StateStore`] with a short staleness window.
//!
//! ```text
//!  (none) --housing intent--> Detected --location--> AwaitingPreferences --text--> Complete
//!                                 |   \                                            (elicit on)
//!                                 |    `--location--> Complete (placeholders, elicit off)
//!                                 `--no location--> re-prompt, state unchanged
//! ```
//!
//! `Complete` is never persisted: the pipeline runs and the state is deleted
//! whatever its outcome. A record older than [`STALENESS_WINDOW`] reads as
//! absent and is purged. A reset intent deletes the state and the user's
//! long-term memory at any stage.

pub mod extract;
pub mod memory;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::housing::{HousingAdvisor, HousingRequest};
use crate::prompts;

use self::extract::Extractor;
use self::memory::{ConversationMemory, Speaker};
use self::store::{StateStore, StoreError};

/// Age after which a conversation state is treated as absent.
pub const STALENESS_WINDOW: Duration = Duration::from_secs(600);

/// Store-level expiry slack on top of [`STALENESS_WINDOW`]. Staleness is
/// decided by [`ConversationState::is_stale`]; the store TTL only reclaims
/// abandoned records.
const STORE_TTL_SLACK: Duration = Duration::from_secs(60);

/// Age range used when none was collected.
pub const PLACEHOLDER_AGE_RANGE: &str = "25-29";

/// Preferences used when none were collected.
pub const PLACEHOLDER_PREFERENCES: &[&str] = &["walkable", "restaurants", "parks"];

const LOCATION_PROMPT: &str =
    "Happy to help you find a place! Which city are you moving to?";
const LOCATION_REPROMPT: &str =
    "I didn't catch a city there. Where are you relocating to? (e.g. \"Austin, TX\")";
const RESET_REPLY: &str = "Done, I've cleared our conversation. Start again any time.";
const OUT_OF_SCOPE_REPLY: &str =
    "I can help you find somewhere to live. Tell me you're relocating and where to.";

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Dialogue stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Housing intent seen, location not yet collected.
    Detected,
    /// Waiting for a location. Handled exactly like `Detected`.
    AwaitingLocation,
    /// Location collected, waiting for age range and preferences.
    AwaitingPreferences,
    /// Everything collected. Never observed by a later read.
    Complete,
}

impl Stage {
    /// Whether the stage still needs a location.
    pub fn awaits_location(&self) -> bool {
        matches!(self, Self::Detected | Self::AwaitingLocation)
    }
}

/// Identifies one dialogue: a user, optionally inside a scope (channel,
/// thread).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    /// User identity.
    pub user: String,
    /// Optional conversation scope.
    pub scope: Option<String>,
}

impl ConversationKey {
    /// Create a key.
    pub fn new(user: impl Into<String>, scope: Option<String>) -> Self {
        Self {
            user: user.into(),
            scope,
        }
    }

    /// Key used in the state store.
    pub fn storage_key(&self) -> String {
        match &self.scope {
            Some(scope) => format!("conversation:{}:{scope}", self.user),
            None => format!("conversation:{}", self.user),
        }
    }
}

/// Collected dialogue state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Current stage.
    pub stage: Stage,
    /// Collected location.
    pub location: Option<String>,
    /// Collected age range.
    pub age_range: Option<String>,
    /// Collected gender identity.
    pub gender: Option<String>,
    /// Collected preference terms.
    #[serde(default)]
    pub preferences: Vec<String>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Fresh state at [`Stage::Detected`].
    pub fn detected(now: DateTime<Utc>) -> Self {
        Self {
            stage: Stage::Detected,
            location: None,
            age_range: None,
            gender: None,
            preferences: Vec::new(),
            updated_at: now,
        }
    }

    /// Whether the record is older than [`STALENESS_WINDOW`] at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.updated_at)
            .to_std()
            .map(|age| age > STALENESS_WINDOW)
            .unwrap_or(false)
    }
}

/// A partial update merged into a stored state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatePatch {
    /// New stage.
    pub stage: Option<Stage>,
    /// New location.
    pub location: Option<String>,
    /// New age range.
    pub age_range: Option<String>,
    /// New gender identity.
    pub gender: Option<String>,
    /// Replacement preference list.
    pub preferences: Option<Vec<String>>,
}

impl StatePatch {
    fn apply(self, state: &mut ConversationState) {
        if let Some(stage) = self.stage {
            state.stage = stage;
        }
        if self.location.is_some() {
            state.location = self.location;
        }
        if self.age_range.is_some() {
            state.age_range = self.age_range;
        }
        if self.gender.is_some() {
            state.gender = self.gender;
        }
        if let Some(preferences) = self.preferences {
            state.preferences = preferences;
        }
    }
}

/// Conversation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    /// The state store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Typed access to conversation states in a [`StateStore`].
#[derive(Clone)]
pub struct ConversationStates {
    store: Arc<dyn StateStore>,
}

impl ConversationStates {
    /// Wrap a store.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Read a live state. Stale or malformed records are deleted and read as
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails.
    pub async fn load(
        &self,
        key: &ConversationKey,
        now: DateTime<Utc>,
    ) -> Result<Option<ConversationState>, StoreError> {
        let storage_key = key.storage_key();
        let Some(raw) = self.store.get(&storage_key).await? else {
            return Ok(None);
        };
        let state: ConversationState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!(key = %storage_key, error = %e, "discarding malformed conversation state");
                self.store.delete(&storage_key).await?;
                return Ok(None);
            }
        };
        if state.is_stale(now) || state.stage == Stage::Complete {
            debug!(key = %storage_key, stage = ?state.stage, "discarding stale conversation state");
            self.store.delete(&storage_key).await?;
            return Ok(None);
        }
        Ok(Some(state))
    }

    /// Write a state, stamping `updated_at` with `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails.
    pub async fn save(
        &self,
        key: &ConversationKey,
        state: &mut ConversationState,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        state.updated_at = now;
        let raw = serde_json::to_string(state)?;
        self.store
            .set(&key.storage_key(), &raw, STALENESS_WINDOW + STORE_TTL_SLACK)
            .await
    }

    /// Merge `patch` into the live state (or a fresh `Detected` one) and
    /// write it back. Returns the merged state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails.
    pub async fn update(
        &self,
        key: &ConversationKey,
        patch: StatePatch,
        now: DateTime<Utc>,
    ) -> Result<ConversationState, StoreError> {
        let mut state = self
            .load(key, now)
            .await?
            .unwrap_or_else(|| ConversationState::detected(now));
        patch.apply(&mut state);
        self.save(key, &mut state, now).await?;
        Ok(state)
    }

    /// Delete a state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails.
    pub async fn clear(&self, key: &ConversationKey) -> Result<(), StoreError> {
        self.store.delete(&key.storage_key()).await
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Reply to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    /// Text to send back.
    pub text: String,
    /// Whether the dialogue expects another message.
    pub continue_dialogue: bool,
}

impl Reply {
    fn ask(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            continue_dialogue: true,
        }
    }

    fn done(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            continue_dialogue: false,
        }
    }
}

/// Drives the relocation dialogue.
///
/// There is no per-key lock: two concurrent messages for the same key both
/// read, and the last write wins.
pub struct ConversationController {
    states: ConversationStates,
    memory: ConversationMemory,
    advisor: Arc<dyn HousingAdvisor>,
    extractor: Extractor,
    elicit_preferences: bool,
}

impl ConversationController {
    /// Create a controller.
    ///
    /// With `elicit_preferences` off, a found location completes the dialogue
    /// straight away using placeholder demographics and preferences.
    pub fn new(
        store: Arc<dyn StateStore>,
        memory: ConversationMemory,
        advisor: Arc<dyn HousingAdvisor>,
        elicit_preferences: bool,
    ) -> Self {
        Self {
            states: ConversationStates::new(store),
            memory,
            advisor,
            extractor: Extractor::new(),
            elicit_preferences,
        }
    }

    /// Handle a message at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError`] when the state store fails.
    pub async fn handle(
        &self,
        key: &ConversationKey,
        text: &str,
    ) -> Result<Reply, ConversationError> {
        self.handle_at(key, text, Utc::now()).await
    }

    /// Handle a message as if received at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError`] when the state store fails.
    pub async fn handle_at(
        &self,
        key: &ConversationKey,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Reply, ConversationError> {
        if self.extractor.is_reset_intent(text) {
            self.states.clear(key).await?;
            if let Err(e) = self.memory.clear(&key.user).await {
                warn!(user = %key.user, error = %e, "failed to clear conversation memory");
            }
            info!(user = %key.user, "conversation reset");
            return Ok(Reply::done(RESET_REPLY));
        }

        self.remember(&key.user, Speaker::User, text, now).await;

        let reply = match self.states.load(key, now).await? {
            None => self.start(key, text, now).await?,
            Some(state) if state.stage.awaits_location() => {
                self.collect_location(key, state, text, now).await?
            }
            Some(state) => self.collect_preferences(key, state, text).await?,
        };

        self.remember(&key.user, Speaker::Assistant, &reply.text, now)
            .await;
        Ok(reply)
    }

    async fn start(
        &self,
        key: &ConversationKey,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Reply, ConversationError> {
        if !self.extractor.is_housing_intent(text) {
            return Ok(Reply::done(OUT_OF_SCOPE_REPLY));
        }
        let mut state = ConversationState::detected(now);
        self.states.save(key, &mut state, now).await?;
        debug!(key = %key.storage_key(), "housing intent detected");
        Ok(Reply::ask(LOCATION_PROMPT))
    }

    async fn collect_location(
        &self,
        key: &ConversationKey,
        mut state: ConversationState,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Reply, ConversationError> {
        let Some(location) = self.extractor.location(text) else {
            return Ok(Reply::ask(LOCATION_REPROMPT));
        };
        state.location = Some(location.clone());

        if self.elicit_preferences {
            state.stage = Stage::AwaitingPreferences;
            self.states.save(key, &mut state, now).await?;
            return Ok(Reply::ask(format!(
                "{location}, great choice! What's your age range, and what matters \
                 most to you in a neighborhood (e.g. walkable, quiet, nightlife, parks)?"
            )));
        }

        self.complete(key, state).await
    }

    async fn collect_preferences(
        &self,
        key: &ConversationKey,
        mut state: ConversationState,
        text: &str,
    ) -> Result<Reply, ConversationError> {
        let parsed = self.extractor.preferences(text);
        if parsed.age_range.is_some() {
            state.age_range = parsed.age_range;
        }
        if parsed.gender.is_some() {
            state.gender = parsed.gender;
        }
        for preference in parsed.preferences {
            if !state.preferences.contains(&preference) {
                state.preferences.push(preference);
            }
        }
        self.complete(key, state).await
    }

    /// Fill placeholders, run the pipeline and delete the state whatever the
    /// outcome.
    async fn complete(
        &self,
        key: &ConversationKey,
        mut state: ConversationState,
    ) -> Result<Reply, ConversationError> {
        state.stage = Stage::Complete;
        if state.age_range.is_none() {
            state.age_range = Some(PLACEHOLDER_AGE_RANGE.to_owned());
        }
        if state.preferences.is_empty() {
            state.preferences = PLACEHOLDER_PREFERENCES
                .iter()
                .map(|p| (*p).to_owned())
                .collect();
        }
        let location = state.location.clone().unwrap_or_default();

        let request = HousingRequest {
            location: location.clone(),
            age_range: state.age_range,
            gender: state.gender,
            preferences: state.preferences,
        };
        let outcome = self.advisor.recommend(&request).await;
        if let Err(e) = self.states.clear(key).await {
            warn!(
                user = %key.user,
                error = %e,
                "failed to delete completed conversation state"
            );
        }

        let text = match outcome {
            Ok(text) => {
                info!(user = %key.user, location = %location, "housing dialogue complete");
                text
            }
            Err(e) => {
                warn!(
                    user = %key.user,
                    location = %location,
                    error = %e,
                    "housing pipeline failed"
                );
                prompts::degraded_housing(&location)
            }
        };
        Ok(Reply::done(text))
    }

    async fn remember(&self, user: &str, speaker: Speaker, text: &str, now: DateTime<Utc>) {
        if let Err(e) = self.memory.record(user, speaker, text, now).await {
            warn!(user, error = %e, "failed to record conversation turn");
        }
    }
}
