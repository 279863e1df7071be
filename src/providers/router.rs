//! Model router resolving providers by role with a default fallback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::ModelsConfig;
use crate::credentials::Credentials;

use super::anthropic::AnthropicProvider;
use super::ollama::OllamaProvider;
use super::LlmProvider;

/// Credential key read for Anthropic models.
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

/// Provider routing errors.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Model spec is not in `<provider>/<model>` format.
    #[error("invalid model spec '{spec}', expected '<provider>/<model>'")]
    InvalidModelSpec {
        /// Invalid raw spec.
        spec: String,
    },
    /// Unsupported provider type in spec prefix.
    #[error("unsupported provider '{provider}'")]
    UnsupportedProvider {
        /// Unsupported provider prefix.
        provider: String,
    },
    /// Required API credential missing for selected provider.
    #[error("missing credential for provider '{provider}': {key}")]
    MissingCredential {
        /// Provider name.
        provider: String,
        /// Missing credential key.
        key: String,
    },
}

/// Model router resolving `role -> default`.
#[derive(Clone)]
pub struct ModelRouter {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    default_provider: Arc<dyn LlmProvider>,
    default: String,
    role_overrides: HashMap<String, String>,
}

impl ModelRouter {
    /// Build a router from model config and loaded credentials.
    ///
    /// Role overrides whose provider cannot be built are skipped with a
    /// warning; resolution for that role falls back to the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the default provider cannot be instantiated.
    pub fn from_config(
        models: &ModelsConfig,
        credentials: &Credentials,
    ) -> Result<Self, RouterError> {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();

        let default = instantiate_provider(&models.default, models, credentials)?;
        providers.insert(models.default.clone(), Arc::clone(&default));

        for spec in models.roles.values() {
            if providers.contains_key(spec) {
                continue;
            }
            match instantiate_provider(spec, models, credentials) {
                Ok(provider) => {
                    providers.insert(spec.clone(), provider);
                }
                Err(e) => warn!(spec = %spec, error = %e, "skipping unavailable role model"),
            }
        }

        Ok(Self {
            providers,
            default_provider: default,
            default: models.default.clone(),
            role_overrides: models.roles.clone(),
        })
    }

    /// Create a router backed by a single provider for integration tests.
    #[doc(hidden)]
    pub fn for_testing(default_spec: String, provider: Arc<dyn LlmProvider>) -> Self {
        let mut providers = HashMap::new();
        providers.insert(default_spec.clone(), Arc::clone(&provider));
        Self {
            providers,
            default_provider: provider,
            default: default_spec,
            role_overrides: HashMap::new(),
        }
    }

    /// Resolve the provider for a role, falling back to the default.
    pub fn resolve(&self, role: &str) -> Arc<dyn LlmProvider> {
        self.providers
            .get(&self.resolve_spec(role))
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default_provider))
    }

    /// Resolve a model spec string for a role.
    pub fn resolve_spec(&self, role: &str) -> String {
        self.role_overrides
            .get(role)
            .filter(|spec| self.providers.contains_key(*spec))
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    /// Returns all available provider specs in sorted order.
    pub fn available_specs(&self) -> Vec<String> {
        let mut values: Vec<String> = self.providers.keys().cloned().collect();
        values.sort();
        values
    }
}

fn instantiate_provider(
    spec: &str,
    models: &ModelsConfig,
    credentials: &Credentials,
) -> Result<Arc<dyn LlmProvider>, RouterError> {
    let (provider, model) =
        super::parse_provider_string(spec).map_err(|_| RouterError::InvalidModelSpec {
            spec: spec.to_owned(),
        })?;
    let timeout = Duration::from_secs(models.timeout_secs);
    match provider {
        "anthropic" => {
            let key = credentials.get(ANTHROPIC_API_KEY).ok_or_else(|| {
                RouterError::MissingCredential {
                    provider: provider.to_owned(),
                    key: ANTHROPIC_API_KEY.to_owned(),
                }
            })?;
            Ok(Arc::new(AnthropicProvider::new(
                spec.to_owned(),
                model.to_owned(),
                key.to_owned(),
                timeout,
            )))
        }
        "ollama" => Ok(Arc::new(OllamaProvider::new(
            spec.to_owned(),
            model.to_owned(),
            models.ollama_url.clone(),
            timeout,
        ))),
        _ => Err(RouterError::UnsupportedProvider {
            provider: provider.to_owned(),
        }),
    }
}
