//! OpenAI-compatible chat-completions adapter.

use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};
use crate::llm::provider::{CompletionProvider, PromptMessage};
use serde::{Deserialize, Serialize};

/// Provider adapter for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_tokens: u32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

impl OpenAiProvider {
    /// Build the adapter, reading the API key from the configured
    /// environment variable.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| ProviderError::MissingKey(config.api_key_env.clone()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_tokens: config.max_tokens,
            frequency_penalty: config.frequency_penalty,
            presence_penalty: config.presence_penalty,
        })
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    max_tokens: u32,
    temperature: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl CompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: &[PromptMessage],
        model: &str,
        temperature: f32,
    ) -> Result<String> {
        let request = CompletionRequest {
            model,
            messages,
            max_tokens: self.max_tokens,
            temperature,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| ProviderError::Request(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request(format!("{status}: {body}")).into());
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|error| ProviderError::Request(error.to_string()))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ProviderError::EmptyResponse)?;

        Ok(text)
    }
}
