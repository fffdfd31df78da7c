//! "Ask a model" boundary shared by the judge and answer clients.

use crate::config::ClientConfig;
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use std::time::Duration;

/// A single chat completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

/// Sends a prompt to a text-generation model and returns its reply
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

/// Chat client for OpenAI-compatible endpoints
pub struct OpenAiClient {
    config: ClientConfig,
}

impl OpenAiClient {
    /// Create a client from an explicit configuration
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Create the OpenAI client, resolving the API key at call time
    fn create_client(&self) -> Result<Client<OpenAIConfig>> {
        let api_key = self.config.resolve_api_key()?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&self.config.api_endpoint);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Client::with_config(openai_config).with_http_client(http_client))
    }

    /// Build the chat completion request
    fn build_request(&self, request: &ChatRequest) -> Result<CreateChatCompletionRequest> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(2);

        if let Some(system_prompt) = &request.system_prompt {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt.clone())
                    .build()
                    .context("Failed to build system message")?
                    .into(),
            );
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.user_prompt.clone())
                .build()
                .context("Failed to build user message")?
                .into(),
        );

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&request.model)
            .messages(messages)
            .temperature(request.temperature as f32);
        if let Some(max_tokens) = request.max_tokens {
            args.max_tokens(max_tokens);
        }

        args.build()
            .context("Failed to build chat completion request")
    }

    /// Extract the text of the first choice
    fn extract_content(response: CreateChatCompletionResponse) -> String {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let client = self.create_client()?;
        let chat_request = self.build_request(request)?;

        let response = client
            .chat()
            .create(chat_request)
            .await
            .with_context(|| format!("Chat completion with {} failed", request.model))?;

        Ok(Self::extract_content(response))
    }
}
