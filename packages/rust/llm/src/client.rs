//! Chat-completion client speaking the OpenAI-compatible wire format.
//!
//! Both provider profiles expose the same `POST {base}/chat/completions`
//! shape, so one client covers them. A per-request timeout is configured on
//! the underlying HTTP client; a timed-out call surfaces as a network error
//! against its row, never as a hung wave.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use assetpilot_shared::{AssetPilotError, Result};

use crate::provider::ProviderAuth;

/// User-Agent string for completion requests.
const USER_AGENT: &str = concat!("AssetPilot/", env!("CARGO_PKG_VERSION"));

/// Longest error-body excerpt kept in an [`AssetPilotError::Api`] message.
const ERROR_BODY_LIMIT: usize = 300;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One message in a completion conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
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
    content: String,
}

// ---------------------------------------------------------------------------
// Completer trait & client
// ---------------------------------------------------------------------------

/// The completion capability the engine depends on. Tests substitute
/// scripted implementations; production uses [`ChatClient`].
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Run one completion and return the raw response text, trimmed.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String>;
}

/// HTTP chat-completion client for one provider endpoint.
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl ChatClient {
    /// Create a client for a selected provider.
    pub fn new(auth: &ProviderAuth, timeout: Duration) -> Result<Self> {
        Self::with_endpoint(
            auth.provider.base_url(),
            &auth.api_key,
            auth.provider.model(),
            timeout,
        )
    }

    /// Create a client against an explicit base URL (self-hosted gateways,
    /// mock servers in tests).
    pub fn with_endpoint(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(&format!("{}/chat/completions", base_url.trim_end_matches('/')))
            .map_err(|e| AssetPilotError::config(format!("invalid provider URL: {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AssetPilotError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// The model name this client sends.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatCompleter for ChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens,
            temperature,
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AssetPilotError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let detail = detail.chars().take(ERROR_BODY_LIMIT).collect::<String>();
            tracing::debug!(status = status.as_u16(), %detail, "completion request failed");
            return Err(AssetPilotError::Api {
                status: Some(status.as_u16()),
                message: detail,
            });
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| {
            AssetPilotError::parse(format!("invalid completion response: {e}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| AssetPilotError::parse("completion response carried no choices"))
    }
}
