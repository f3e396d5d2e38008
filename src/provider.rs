//! Model provider backend.
//!
//! One OpenAI-compatible chat client covers OpenAI, Ollama and custom local servers.
//! `ProviderGenerationService` adapts a client to the `GenerationService` seam used by
//! the dispatcher, so the rest of the crate never sees HTTP.

use crate::context::builder::DialogContext;
use crate::context::generation::GenerationService;
use crate::error::ApiError;
use crate::registry::NodeTypeRegistry;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub mod prompt;

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Completion options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Per-request model, replacing the client's configured model
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>, // 0.0-2.0
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub stop: Option<Vec<String>>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: Some(0.9),
            max_tokens: Some(256),
            top_p: None,
            stop: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
}

/// Model provider client trait
#[async_trait]
pub trait ModelProviderClient: Send + Sync {
    /// Generate a completion from a list of messages
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError>;

    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "local")]
    LocalCustom,
}

impl ProviderType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Ollama => "ollama",
            ProviderType::LocalCustom => "local",
        }
    }

    pub fn default_endpoint(self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("https://api.openai.com/v1"),
            ProviderType::Ollama => Some("http://localhost:11434/v1"),
            ProviderType::LocalCustom => None,
        }
    }

    pub fn api_key_env_var(self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("OPENAI_API_KEY"),
            ProviderType::Ollama | ProviderType::LocalCustom => None,
        }
    }
}

/// Provider configuration as it appears under `[provider]` in config files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API (".../v1")
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub default_options: CompletionOptions,
}

impl ProviderConfig {
    pub fn new(provider_type: ProviderType, model: impl Into<String>) -> Self {
        Self {
            provider_type,
            model: model.into(),
            api_key: None,
            endpoint: None,
            default_options: CompletionOptions::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.model.trim().is_empty() {
            errors.push("Provider model cannot be empty".to_string());
        }
        match self.endpoint.as_deref() {
            Some(endpoint) => {
                if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                    errors.push(format!(
                        "Provider endpoint must be an http(s) URL: {}",
                        endpoint
                    ));
                }
            }
            None if self.provider_type.default_endpoint().is_none() => {
                errors.push(format!(
                    "Provider type {} requires an endpoint",
                    self.provider_type.as_str()
                ));
            }
            None => {}
        }
        if let Some(temperature) = self.default_options.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                errors.push(format!(
                    "Temperature must be between 0.0 and 2.0, got {}",
                    temperature
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn resolved_endpoint(&self) -> Option<String> {
        self.endpoint
            .clone()
            .or_else(|| self.provider_type.default_endpoint().map(str::to_string))
    }

    /// Configured key, else the provider's conventional environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| {
            self.provider_type
                .api_key_env_var()
                .and_then(|var| std::env::var(var).ok())
                .filter(|key| !key.trim().is_empty())
        })
    }

    pub fn create_client(&self) -> Result<Arc<dyn ModelProviderClient>, ApiError> {
        self.validate()
            .map_err(|errors| ApiError::ProviderNotConfigured(errors.join("; ")))?;
        let endpoint = self.resolved_endpoint().ok_or_else(|| {
            ApiError::ProviderNotConfigured(format!(
                "No endpoint for provider {}",
                self.provider_type.as_str()
            ))
        })?;
        let api_key = self.resolved_api_key();
        if self.provider_type == ProviderType::OpenAI && api_key.is_none() {
            return Err(ApiError::ProviderNotConfigured(
                "OpenAI provider requires api_key or OPENAI_API_KEY".to_string(),
            ));
        }
        Ok(Arc::new(HttpProviderClient::new(
            self.provider_type,
            self.model.clone(),
            endpoint,
            api_key,
        )?))
    }
}

// OpenAI-compatible API request/response structures
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// Transport failures. Timeouts keep "timed out" in the message so the dispatcher
// classifies them as timeouts.
fn map_http_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::ProviderRequestFailed(format!("Request timed out: {}", error))
    } else if error.is_connect() {
        ApiError::ProviderRequestFailed(format!("Connection error: {}", error))
    } else if let Some(status) = error.status() {
        map_status_error(status, &error.to_string())
    } else {
        ApiError::ProviderError(format!("HTTP error: {}", error))
    }
}

fn map_status_error(status: StatusCode, body: &str) -> ApiError {
    match status.as_u16() {
        401 | 403 => ApiError::ProviderAuthFailed(format!("Authentication failed: {}", body)),
        404 => ApiError::ProviderModelNotFound(format!("Model not found: {}", body)),
        408 | 504 => ApiError::GenerationTimeout(format!(
            "Provider timed out with status {}: {}",
            status, body
        )),
        429 => ApiError::ProviderRateLimit(format!("Rate limit exceeded: {}", body)),
        _ => ApiError::ProviderRequestFailed(format!(
            "Request failed with status {}: {}",
            status, body
        )),
    }
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROVIDER_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

fn build_provider_http_client() -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(PROVIDER_HTTP_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ApiError::ProviderError(format!("Failed to create HTTP client: {}", e)))
}

/// OpenAI-compatible chat completions client
pub struct HttpProviderClient {
    client: Client,
    provider_type: ProviderType,
    model: String,
    chat_url: String,
    api_key: Option<String>,
}

impl HttpProviderClient {
    pub fn new(
        provider_type: ProviderType,
        model: String,
        endpoint: String,
        api_key: Option<String>,
    ) -> Result<Self, ApiError> {
        let client = build_provider_http_client()?;
        let chat_url = format!("{}/chat/completions", endpoint.trim_end_matches('/'));
        Ok(Self {
            client,
            provider_type,
            model,
            chat_url,
            api_key,
        })
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }
}

#[async_trait]
impl ModelProviderClient for HttpProviderClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        let model = options.model.as_deref().unwrap_or(&self.model);
        let request = ChatCompletionRequest {
            model,
            messages: messages
                .iter()
                .map(|msg| WireMessage {
                    role: msg.role.as_str(),
                    content: &msg.content,
                })
                .collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
            stop: options.stop.as_deref(),
            stream: false,
        };

        debug!(
            provider = self.provider_type.as_str(),
            model,
            messages = messages.len(),
            "Sending chat completion request"
        );
        let mut builder = self.client.post(&self.chat_url).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let response = builder.send().await.map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_status_error(status, &error_text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ProviderError(format!("Failed to parse response: {}", e)))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::ProviderError("No choices in response".to_string()))?;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model: completion.model.unwrap_or_else(|| model.to_string()),
            usage: completion.usage.unwrap_or_default(),
            finish_reason: choice.finish_reason,
        })
    }

    fn provider_name(&self) -> &str {
        self.provider_type.as_str()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Scripted provider for tests and dry runs.
///
/// Replies are consumed in order; once exhausted every call answers with the
/// fallback text. Every request is recorded.
pub struct MockProvider {
    replies: Mutex<Vec<Result<String, String>>>,
    fallback: String,
    requests: Mutex<Vec<(Vec<ChatMessage>, CompletionOptions)>>,
    model_name: String,
}

impl MockProvider {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(Vec::new()),
            fallback: "Mock response".to_string(),
            requests: Mutex::new(Vec::new()),
            model_name: model_name.into(),
        }
    }

    pub fn with_replies<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = Result<S, S>>,
        S: Into<String>,
    {
        let mut scripted: Vec<Result<String, String>> = replies
            .into_iter()
            .map(|reply| reply.map(Into::into).map_err(Into::into))
            .collect();
        scripted.reverse();
        *self.replies.lock() = scripted;
        self
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    pub fn requests(&self) -> Vec<(Vec<ChatMessage>, CompletionOptions)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ModelProviderClient for MockProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.model_name.clone());
        self.requests.lock().push((messages, options));
        let reply = self
            .replies
            .lock()
            .pop()
            .unwrap_or_else(|| Ok(self.fallback.clone()));
        let content = reply.map_err(ApiError::ProviderRequestFailed)?;
        Ok(CompletionResponse {
            content,
            model,
            usage: TokenUsage::default(),
            finish_reason: Some("stop".to_string()),
        })
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// `GenerationService` backed by a chat completion client
pub struct ProviderGenerationService {
    client: Arc<dyn ModelProviderClient>,
    registry: Arc<NodeTypeRegistry>,
    options: CompletionOptions,
}

impl ProviderGenerationService {
    pub fn new(client: Arc<dyn ModelProviderClient>, registry: Arc<NodeTypeRegistry>) -> Self {
        Self {
            client,
            registry,
            options: CompletionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    async fn send(
        &self,
        messages: Vec<ChatMessage>,
        model_override: Option<&str>,
    ) -> Result<String, ApiError> {
        let mut options = self.options.clone();
        if let Some(model) = model_override {
            options.model = Some(model.to_string());
        }
        let response = self.client.complete(messages, options).await?;
        Ok(response.content)
    }
}

#[async_trait]
impl GenerationService for ProviderGenerationService {
    async fn generate_dialog(
        &self,
        node_type: &str,
        context: &DialogContext,
        raw_mode: &str,
        model_override: Option<&str>,
        ignore_connections: bool,
    ) -> Result<String, ApiError> {
        let messages = prompt::generate_messages(
            node_type,
            self.registry.prompt_hint(node_type),
            context,
            raw_mode,
            ignore_connections,
        );
        self.send(messages, model_override).await
    }

    async fn improve_dialog(
        &self,
        node_type: &str,
        context: &DialogContext,
        current_text: &str,
        ignore_connections: bool,
    ) -> Result<String, ApiError> {
        let messages = prompt::improve_messages(
            node_type,
            self.registry.prompt_hint(node_type),
            context,
            current_text,
            ignore_connections,
        );
        self.send(messages, None).await
    }

    async fn generate_with_custom_prompt(
        &self,
        node_type: &str,
        context: &DialogContext,
        user_prompt: &str,
        system_prompt: Option<&str>,
        ignore_connections: bool,
    ) -> Result<String, ApiError> {
        let messages = prompt::custom_messages(
            node_type,
            self.registry.prompt_hint(node_type),
            context,
            user_prompt,
            system_prompt,
            ignore_connections,
        );
        self.send(messages, None).await
    }
}
