//! In-test fakes shared by the integration suites.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kindred::dispatch::{ChannelHandle, Messenger, MessengerError};
use kindred::housing::{HousingAdvisor, HousingError, HousingRequest};
use kindred::providers::router::ModelRouter;
use kindred::providers::{
    CompletionRequest, CompletionResponse, LlmProvider, ProviderError, UsageStats,
};
use kindred::taste::{
    ComparedEntity, Entity, InsightBias, InsightEntity, InsightFilter, InsightSignal, Tag,
    TasteError, TasteGraph,
};

// ---------------------------------------------------------------------------
// Taste graph
// ---------------------------------------------------------------------------

/// Recorded insights request.
#[derive(Debug, Clone)]
pub struct InsightCall {
    pub signal: InsightSignal,
    pub filter: InsightFilter,
    pub bias: InsightBias,
}

/// Scriptable knowledge graph.
///
/// By default every search for `q` returns one entity `e:q` in category
/// `artist`, and every tag search for `k` returns one tag `t:k` named `k`.
#[derive(Default)]
pub struct FakeGraph {
    /// Overrides for entity searches, keyed by query.
    pub search_overrides: HashMap<String, Vec<Entity>>,
    /// Queries whose entity search fails.
    pub failing_searches: HashSet<String>,
    /// Keywords whose tag search fails.
    pub failing_tag_searches: HashSet<String>,
    /// Result of every comparison.
    pub compared: Vec<ComparedEntity>,
    /// Comparison fails when group B contains one of these ids.
    pub compare_fails_for: HashSet<String>,
    /// Result of every insights call.
    pub insights: Vec<InsightEntity>,
    /// Whether insights calls fail.
    pub insights_fail: bool,
    /// Log of every call, e.g. `search:Ana`.
    pub calls: Mutex<Vec<String>>,
    /// Every insights request.
    pub insight_calls: Mutex<Vec<InsightCall>>,
}

impl FakeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn count_calls(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn insight_calls(&self) -> Vec<InsightCall> {
        self.insight_calls.lock().expect("lock").clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().expect("lock").push(call);
    }
}

pub fn entity(id: &str, name: &str, category: &str) -> Entity {
    Entity {
        id: id.to_owned(),
        name: name.to_owned(),
        category: category.to_owned(),
        popularity: None,
    }
}

pub fn insight(name: &str, affinity: f64) -> InsightEntity {
    InsightEntity {
        id: format!("i:{name}"),
        name: name.to_owned(),
        affinity,
    }
}

pub fn compared(name: &str) -> ComparedEntity {
    ComparedEntity {
        id: format!("c:{name}"),
        name: name.to_owned(),
    }
}

fn upstream_error() -> TasteError {
    TasteError::HttpStatus {
        status: 503,
        body: "unavailable".to_owned(),
    }
}

#[async_trait]
impl TasteGraph for FakeGraph {
    async fn search(&self, query: &str, take: usize) -> Result<Vec<Entity>, TasteError> {
        self.log(format!("search:{query}"));
        if self.failing_searches.contains(query) {
            return Err(upstream_error());
        }
        let mut found = self
            .search_overrides
            .get(query)
            .cloned()
            .unwrap_or_else(|| vec![entity(&format!("e:{query}"), query, "artist")]);
        found.truncate(take);
        Ok(found)
    }

    async fn search_tags(&self, query: &str, take: usize) -> Result<Vec<Tag>, TasteError> {
        self.log(format!("tags:{query}"));
        if self.failing_tag_searches.contains(query) {
            return Err(upstream_error());
        }
        let mut found = vec![Tag {
            id: format!("t:{query}"),
            name: query.to_owned(),
            tag_type: "urn:tag:keyword".to_owned(),
        }];
        found.truncate(take);
        Ok(found)
    }

    async fn compare_groups(
        &self,
        group_a: &[String],
        group_b: &[String],
    ) -> Result<Vec<ComparedEntity>, TasteError> {
        self.log(format!("compare:{}|{}", group_a.join(","), group_b.join(",")));
        if group_b.iter().any(|id| self.compare_fails_for.contains(id)) {
            return Err(upstream_error());
        }
        Ok(self.compared.clone())
    }

    async fn insights(
        &self,
        signal: &InsightSignal,
        filter: &InsightFilter,
        bias: &InsightBias,
    ) -> Result<Vec<InsightEntity>, TasteError> {
        self.log("insights".to_owned());
        self.insight_calls.lock().expect("lock").push(InsightCall {
            signal: signal.clone(),
            filter: filter.clone(),
            bias: *bias,
        });
        if self.insights_fail {
            return Err(upstream_error());
        }
        let mut found = self.insights.clone();
        found.truncate(filter.take);
        Ok(found)
    }
}

// ---------------------------------------------------------------------------
// Text generation
// ---------------------------------------------------------------------------

/// Provider returning a fixed reply (or failing), recording prompts.
pub struct FakeProvider {
    reply: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_owned()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("lock").clone()
    }
}

#[async_trait]
impl LlmProvider for FakeProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().expect("lock").push(prompt);
        match &self.reply {
            Some(text) => Ok(CompletionResponse {
                text: text.clone(),
                usage: UsageStats::default(),
                model: "fake".to_owned(),
            }),
            None => Err(ProviderError::Parse("scripted failure".to_owned())),
        }
    }

    fn model_id(&self) -> &str {
        "fake/model"
    }
}

pub fn router(provider: Arc<FakeProvider>) -> Arc<ModelRouter> {
    Arc::new(ModelRouter::for_testing("fake/model".to_owned(), provider))
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

/// Messenger with scripted identities and failures.
#[derive(Default)]
pub struct FakeMessenger {
    /// Identities for which opening a conversation fails.
    pub unreachable: HashSet<String>,
    /// Channels where posting fails.
    pub broken_channels: HashSet<String>,
    /// Contact address → identity.
    pub directory: HashMap<String, String>,
    /// Whether contact lookups error out.
    pub lookup_fails: bool,
    /// Successful posts as (channel, content).
    pub posted: Mutex<Vec<(String, String)>>,
}

impl FakeMessenger {
    pub fn posted(&self) -> Vec<(String, String)> {
        self.posted.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn open_conversation(&self, identity: &str) -> Result<ChannelHandle, MessengerError> {
        if self.unreachable.contains(identity) {
            return Err(MessengerError::Api("user_not_found".to_owned()));
        }
        Ok(ChannelHandle(format!("D-{identity}")))
    }

    async fn post_message(
        &self,
        channel: &ChannelHandle,
        content: &str,
    ) -> Result<(), MessengerError> {
        if self.broken_channels.contains(&channel.0) {
            return Err(MessengerError::Api("channel_not_found".to_owned()));
        }
        self.posted
            .lock()
            .expect("lock")
            .push((channel.0.clone(), content.to_owned()));
        Ok(())
    }

    async fn lookup_identity_by_contact(
        &self,
        contact: &str,
    ) -> Result<Option<String>, MessengerError> {
        if self.lookup_fails {
            return Err(MessengerError::Api("ratelimited".to_owned()));
        }
        Ok(self.directory.get(contact).cloned())
    }
}

// ---------------------------------------------------------------------------
// Housing
// ---------------------------------------------------------------------------

/// Advisor that echoes the request or fails, recording requests.
#[derive(Default)]
pub struct FakeAdvisor {
    pub fail: bool,
    pub requests: Mutex<Vec<HousingRequest>>,
}

impl FakeAdvisor {
    pub fn requests(&self) -> Vec<HousingRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

#[async_trait]
impl HousingAdvisor for FakeAdvisor {
    async fn recommend(&self, request: &HousingRequest) -> Result<String, HousingError> {
        self.requests.lock().expect("lock").push(request.clone());
        if self.fail {
            return Err(HousingError::Taste(TasteError::Parse("scripted".to_owned())));
        }
        Ok(format!("Try these spots in {}", request.location))
    }
}
