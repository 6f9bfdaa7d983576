use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::{parse_llm_provider_model, LlmConfig};
use crate::error::{Result, WayfareError};
use crate::llm::api::LlmApiClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAI,
    OpenRouter,
    Ollama,
    LmStudio,
    OpenAICompatible { base_url: String },
    Unavailable { reason: String },
}

/// Optional LLM. Every caller treats it as best effort.
#[derive(Clone)]
pub struct LlmProvider {
    backend: LlmBackend,
    config: Option<Arc<LlmConfig>>,
    client: Option<Arc<LlmApiClient>>,
}

impl std::fmt::Debug for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmProvider")
            .field("backend", &self.backend)
            .finish()
    }
}

impl LlmProvider {
    pub fn new(config: Option<&LlmConfig>) -> Self {
        let Some(config) = config else {
            return Self::unavailable("No LLM configuration provided");
        };

        let (provider, _model) = parse_llm_provider_model(&config.model);

        let backend = match provider.to_lowercase().as_str() {
            "openai" => LlmBackend::OpenAI,
            "openrouter" => LlmBackend::OpenRouter,
            "ollama" => LlmBackend::Ollama,
            "lmstudio" => LlmBackend::LmStudio,
            _ => match &config.base_url {
                Some(base_url) => LlmBackend::OpenAICompatible {
                    base_url: base_url.clone(),
                },
                None => {
                    return Self::unavailable(&format!(
                        "Unknown provider in model: {}",
                        config.model
                    ))
                }
            },
        };

        let client = match LlmApiClient::new(config) {
            Ok(client) => Arc::new(client),
            Err(e) => return Self::unavailable(&e.to_string()),
        };

        Self {
            backend,
            config: Some(Arc::new(config.clone())),
            client: Some(client),
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            backend: LlmBackend::Unavailable {
                reason: reason.to_string(),
            },
            config: None,
            client: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some() && !matches!(self.backend, LlmBackend::Unavailable { .. })
    }

    pub fn backend(&self) -> &LlmBackend {
        &self.backend
    }

    pub fn config(&self) -> Option<&LlmConfig> {
        self.config.as_deref()
    }

    /// Ask for a JSON object and deserialize it into `T`.
    pub async fn complete_structured<T: DeserializeOwned>(&self, prompt: &str) -> Result<T> {
        let value = self.client()?.complete_json(prompt).await?;
        serde_json::from_value(value)
            .map_err(|e| WayfareError::Llm(format!("LLM response has unexpected shape: {e}")))
    }

    fn client(&self) -> Result<&LlmApiClient> {
        match (&self.backend, &self.client) {
            (LlmBackend::Unavailable { reason }, _) => {
                Err(WayfareError::LlmUnavailable(reason.clone()))
            }
            (_, Some(client)) => Ok(client),
            (_, None) => Err(WayfareError::LlmUnavailable(
                "No client available".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_provider_reports_reason() {
        let provider = LlmProvider::new(None);
        assert!(!provider.is_available());

        let err = provider
            .complete_structured::<serde_json::Value>("hello")
            .await
            .unwrap_err();
        assert!(matches!(err, WayfareError::LlmUnavailable(reason) if reason.contains("No LLM")));
    }

    #[test]
    fn test_unknown_prefix_without_base_url_is_unavailable() {
        let config = LlmConfig {
            model: "mystery-model".to_string(),
            api_key: None,
            base_url: None,
            timeout_secs: 5,
            max_retries: 0,
            enrich_descriptions: true,
            resolve_address_conflicts: true,
        };
        assert!(!LlmProvider::new(Some(&config)).is_available());
    }

    #[test]
    fn test_compatible_backend_with_base_url() {
        let config = LlmConfig {
            model: "mystery-model".to_string(),
            api_key: None,
            base_url: Some("http://localhost:9999/v1".to_string()),
            timeout_secs: 5,
            max_retries: 0,
            enrich_descriptions: true,
            resolve_address_conflicts: true,
        };
        let provider = LlmProvider::new(Some(&config));
        assert!(provider.is_available());
        assert_eq!(
            provider.backend(),
            &LlmBackend::OpenAICompatible {
                base_url: "http://localhost:9999/v1".to_string()
            }
        );
    }
}
