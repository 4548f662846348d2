//! Provider router: selects the completion provider based on config.
//!
//! Every provider with a credential is registered; the assistant's selected
//! provider answers. Without a credential the canned provider answers instead,
//! so the assistant never fails to start for lack of an API key.

use std::collections::HashMap;
use std::sync::Arc;

use coursemate_config::AppConfig;
use coursemate_core::provider::StructuredCompletionProvider;
use tracing::{info, warn};

use crate::anthropic::AnthropicProvider;
use crate::canned::CannedProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Registered completion providers by name.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn StructuredCompletionProvider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn StructuredCompletionProvider>,
    ) {
        self.providers.insert(name.into(), provider);
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn StructuredCompletionProvider>> {
        self.providers.get(name).cloned()
    }

    /// The selected provider, or the canned provider when it has no credential.
    pub fn selected(&self) -> Arc<dyn StructuredCompletionProvider> {
        match self.get(&self.default_provider) {
            Some(provider) => provider,
            None => {
                if self.default_provider != "canned" {
                    warn!(
                        provider = %self.default_provider,
                        "No API key for the selected provider, answers will be canned"
                    );
                }
                Arc::new(CannedProvider::new())
            }
        }
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Register every provider that has a credential.
pub fn router_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.assistant.provider);

    for (name, provider_config) in &config.providers {
        let Some(api_key) = provider_config.api_key.as_deref() else {
            continue;
        };

        let provider: Arc<dyn StructuredCompletionProvider> = match name.as_str() {
            "anthropic" => {
                let mut p = AnthropicProvider::new(api_key);
                if let Some(url) = &provider_config.api_url {
                    p = p.with_base_url(url);
                }
                Arc::new(p)
            }
            "canned" => continue,
            _ => {
                let base_url = provider_config
                    .api_url
                    .clone()
                    .unwrap_or_else(|| default_base_url(name));
                Arc::new(OpenAiCompatProvider::new(name, base_url, api_key))
            }
        };

        router.register(name.clone(), provider);
    }

    router
}

/// Build the provider the assistant should answer with.
pub fn build_from_config(config: &AppConfig) -> Arc<dyn StructuredCompletionProvider> {
    let provider = router_from_config(config).selected();
    info!(provider = provider.name(), model = %config.assistant.model, "Completion provider ready");
    provider
}

/// Get the default base URL for well-known OpenAI-compatible services.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursemate_config::ProviderConfig;

    fn with_key(name: &str, key: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.providers.insert(
            name.into(),
            ProviderConfig {
                api_key: Some(key.into()),
                api_url: None,
            },
        );
        config
    }

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("openai");
        router.register("openai", Arc::new(OpenAiCompatProvider::openai("sk-test")));
        assert!(router.get("openai").is_some());
        assert!(router.get("nonexistent").is_none());
        assert_eq!(router.selected().name(), "openai");
    }

    #[test]
    fn default_config_falls_back_to_canned() {
        let provider = build_from_config(&AppConfig::default());
        assert_eq!(provider.name(), "canned");
        assert!(!provider.is_configured());
    }

    #[test]
    fn anthropic_key_selects_anthropic() {
        let provider = build_from_config(&with_key("anthropic", "sk-ant"));
        assert_eq!(provider.name(), "anthropic");
        assert!(provider.is_configured());
    }

    #[test]
    fn openai_selected_when_configured() {
        let mut config = with_key("openai", "sk-openai");
        config.assistant.provider = "openai".into();
        let router = router_from_config(&config);
        assert_eq!(router.list(), vec!["openai"]);
        assert_eq!(build_from_config(&config).name(), "openai");
    }

    #[test]
    fn key_for_other_provider_does_not_leak() {
        // anthropic selected, only openai has a key
        let provider = build_from_config(&with_key("openai", "sk-openai"));
        assert_eq!(provider.name(), "canned");
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }
}
