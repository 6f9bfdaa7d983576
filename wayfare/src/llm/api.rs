use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use serde_json::Value;

use crate::config::{parse_llm_provider_model, LlmConfig};
use crate::error::{Result, WayfareError};

const SYSTEM_PROMPT: &str =
    "You are a travel data assistant. Respond with a single JSON object and nothing else.";

/// Low sampling temperature; answers should be factual and repeatable.
const TEMPERATURE: f32 = 0.2;

/// How a failed completion should be handled.
#[derive(Debug, PartialEq, Eq)]
enum Failure {
    /// Quota or throttling. Surfaced immediately.
    RateLimited,
    /// Bad key or forbidden model. Retrying cannot help.
    Rejected,
    /// Network trouble or a 5xx.
    Transient,
    Other,
}

/// JSON-only chat completion client for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct LlmApiClient {
    client: Client<OpenAIConfig>,
    model: String,
    max_retries: u32,
}

impl LlmApiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let (provider, model) = parse_llm_provider_model(&config.model);
        let provider = provider.to_lowercase();
        let local = matches!(provider.as_str(), "ollama" | "lmstudio" | "local");

        if !local && config.api_key.is_none() {
            return Err(WayfareError::Llm(format!(
                "API key required for LLM provider '{provider}'"
            )));
        }

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(&provider).to_string());
        let openai_config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key(config.api_key.clone().unwrap_or_default());

        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WayfareError::Llm(format!("Failed to create LLM HTTP client: {e}")))?;

        // async-openai retries 429s internally; never beyond one request timeout.
        let backoff = backoff::ExponentialBackoff {
            max_elapsed_time: Some(timeout),
            ..Default::default()
        };

        Ok(Self {
            client: Client::with_config(openai_config)
                .with_http_client(http)
                .with_backoff(backoff),
            model: if provider == "local" {
                config.model.clone()
            } else {
                model.to_string()
            },
            max_retries: config.max_retries,
        })
    }

    /// Ask for a JSON object and parse it, tolerating a markdown fence.
    pub async fn complete_json(&self, prompt: &str) -> Result<Value> {
        let request = self.request(prompt)?;
        let content = self.send(request).await?;
        let body = strip_code_fence(&content);

        serde_json::from_str(body).map_err(|e| {
            tracing::warn!(
                preview = %body.chars().take(100).collect::<String>(),
                error = %e,
                "LLM returned invalid JSON"
            );
            WayfareError::Llm(format!("Failed to parse JSON response: {e}"))
        })
    }

    async fn send(&self, request: CreateChatCompletionRequest) -> Result<String> {
        let mut attempt = 0;
        loop {
            let error = match self.client.chat().create(request.clone()).await {
                Ok(response) => {
                    let content = response
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.message.content)
                        .unwrap_or_default();
                    if content.trim().is_empty() {
                        return Err(WayfareError::Llm("LLM returned no content".to_string()));
                    }
                    return Ok(content);
                }
                Err(error) => error,
            };

            match classify(&error) {
                Failure::RateLimited => return Err(WayfareError::LlmRateLimit { retry_after: None }),
                Failure::Transient if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(attempt, error = %error, "Retrying LLM request");
                    tokio::time::sleep(Duration::from_millis(100 << (attempt - 1))).await;
                }
                Failure::Rejected => {
                    return Err(WayfareError::Llm(format!("LLM rejected credentials: {error}")))
                }
                Failure::Transient | Failure::Other => {
                    return Err(match error {
                        OpenAIError::InvalidArgument(message) => WayfareError::validation(message),
                        other => WayfareError::Llm(other.to_string()),
                    })
                }
            }
        }
    }

    fn request(&self, prompt: &str) -> Result<CreateChatCompletionRequest> {
        if prompt.trim().is_empty() {
            return Err(WayfareError::validation("Prompt cannot be empty"));
        }

        let build_error = |e: OpenAIError| WayfareError::Llm(format!("Invalid LLM request: {e}"));
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(build_error)?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(build_error)?
                .into(),
        ];

        CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(messages)
            .temperature(TEMPERATURE)
            .build()
            .map_err(build_error)
    }
}

fn classify(error: &OpenAIError) -> Failure {
    match error {
        OpenAIError::Reqwest(e) => match e.status().map(|s| s.as_u16()) {
            Some(429) => Failure::RateLimited,
            Some(401 | 403) => Failure::Rejected,
            Some(500..=599) | None => Failure::Transient,
            Some(_) => Failure::Other,
        },
        OpenAIError::ApiError(api) => {
            let text = format!(
                "{} {} {}",
                api.message,
                api.r#type.as_deref().unwrap_or_default(),
                api.code.as_deref().unwrap_or_default()
            )
            .to_lowercase();
            if ["rate limit", "rate_limit", "insufficient_quota"]
                .iter()
                .any(|n| text.contains(n))
            {
                Failure::RateLimited
            } else if ["invalid api key", "invalid_api_key", "unauthorized", "forbidden"]
                .iter()
                .any(|n| text.contains(n))
            {
                Failure::Rejected
            } else if api.r#type.is_none() && api.code.is_none() {
                Failure::Transient
            } else {
                Failure::Other
            }
        }
        _ => Failure::Other,
    }
}

fn default_base_url(provider: &str) -> &'static str {
    match provider {
        "openrouter" => "https://openrouter.ai/api/v1",
        "ollama" => "http://localhost:11434/v1",
        "lmstudio" => "http://localhost:1234/v1",
        _ => "https://api.openai.com/v1",
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    fn local_config() -> LlmConfig {
        LlmConfig {
            model: "ollama/llama3".to_string(),
            api_key: None,
            base_url: None,
            timeout_secs: 30,
            max_retries: 0,
            enrich_descriptions: true,
            resolve_address_conflicts: true,
        }
    }

    #[test]
    fn hosted_provider_requires_api_key() {
        let mut config = local_config();
        config.model = "openai/gpt-4o-mini".to_string();
        assert!(LlmApiClient::new(&config).is_err());
    }

    #[test]
    fn local_provider_strips_prefix_from_model() {
        let client = LlmApiClient::new(&local_config()).expect("client");
        assert_eq!(client.model, "llama3");
    }

    #[test]
    fn request_carries_json_system_prompt() {
        let client = LlmApiClient::new(&local_config()).expect("client");
        let request = client.request("describe the Louvre").expect("request");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.temperature, Some(TEMPERATURE));
        assert!(client.request("   ").is_err());
    }

    #[test]
    fn quota_errors_are_rate_limits() {
        let error = OpenAIError::ApiError(ApiError {
            message: "You exceeded your current quota".to_string(),
            r#type: Some("insufficient_quota".to_string()),
            param: None,
            code: None,
        });
        assert_eq!(classify(&error), Failure::RateLimited);
    }

    #[test]
    fn strips_markdown_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }
}
