//! Role resolution in the model router.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use kindred::config::ModelsConfig;
use kindred::credentials::Credentials;
use kindred::providers::router::{ModelRouter, RouterError};

use crate::support::{router, FakeProvider};

fn with_anthropic_key() -> Credentials {
    Credentials::from_map(BTreeMap::from([(
        "ANTHROPIC_API_KEY".to_owned(),
        "test-key".to_owned(),
    )]))
}

fn models(default: &str, roles: &[(&str, &str)]) -> ModelsConfig {
    ModelsConfig {
        default: default.to_owned(),
        roles: roles
            .iter()
            .map(|(role, spec)| ((*role).to_owned(), (*spec).to_owned()))
            .collect::<HashMap<_, _>>(),
        ..ModelsConfig::default()
    }
}

#[test]
fn role_override_wins_over_default() {
    let config = models(
        "ollama/llama3.1:8b",
        &[("introduction", "anthropic/claude-haiku")],
    );
    let router = ModelRouter::from_config(&config, &with_anthropic_key()).expect("router");

    assert_eq!(router.resolve_spec("introduction"), "anthropic/claude-haiku");
    assert_eq!(router.resolve_spec("insight"), "ollama/llama3.1:8b");
    assert_eq!(router.resolve("introduction").model_id(), "anthropic/claude-haiku");
    assert_eq!(
        router.available_specs(),
        vec!["anthropic/claude-haiku", "ollama/llama3.1:8b"]
    );
}

#[test]
fn unavailable_role_model_falls_back_to_default() {
    let config = models("ollama/llama3.1:8b", &[("housing", "anthropic/claude-haiku")]);
    let router = ModelRouter::from_config(&config, &Credentials::default()).expect("router");

    assert_eq!(router.resolve_spec("housing"), "ollama/llama3.1:8b");
    assert_eq!(router.available_specs(), vec!["ollama/llama3.1:8b"]);
}

#[test]
fn default_without_credential_is_an_error() {
    let config = models("anthropic/claude-sonnet", &[]);
    let result = ModelRouter::from_config(&config, &Credentials::default());
    assert!(matches!(result, Err(RouterError::MissingCredential { .. })));
}

#[test]
fn unknown_provider_is_rejected() {
    let config = models("openai/gpt-5", &[]);
    let result = ModelRouter::from_config(&config, &Credentials::default());
    assert!(matches!(result, Err(RouterError::UnsupportedProvider { .. })));
}

#[test]
fn malformed_spec_is_rejected() {
    let config = models("no-slash", &[]);
    let result = ModelRouter::from_config(&config, &Credentials::default());
    assert!(matches!(result, Err(RouterError::InvalidModelSpec { .. })));
}

#[test]
fn testing_router_serves_every_role() {
    let router = router(Arc::new(FakeProvider::replying("x")));
    for role in ["insight", "introduction", "housing"] {
        assert_eq!(router.resolve(role).model_id(), "fake/model");
    }
}
