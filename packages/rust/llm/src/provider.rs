//! Provider profiles and per-step selection policy.
//!
//! Two OpenAI-compatible completion providers are supported, chosen by
//! which API key is configured: a web-search-capable provider (model
//! `sonar`) and a general-purpose provider (model `gpt-4o-mini`). Steps
//! that depend on live web search require the search provider; the rest
//! fall back to the general provider when the search key is absent.

use assetpilot_shared::{ApiKeys, AssetPilotError, Result};

/// A completion provider profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Web-search-capable provider (Perplexity wire-compatible).
    WebSearch,
    /// General-purpose provider (OpenAI).
    General,
}

impl Provider {
    /// Model name sent on every completion request.
    pub fn model(&self) -> &'static str {
        match self {
            Self::WebSearch => "sonar",
            Self::General => "gpt-4o-mini",
        }
    }

    /// API base URL; the chat-completions path is appended by the client.
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::WebSearch => "https://api.perplexity.ai",
            Self::General => "https://api.openai.com/v1",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WebSearch => write!(f, "web-search"),
            Self::General => write!(f, "general"),
        }
    }
}

/// Per-step provider requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderPolicy {
    /// The web-search provider is mandatory; a missing search key is a
    /// configuration error detected before any job is dispatched.
    RequireSearch,
    /// Prefer the web-search provider, fall back to the general-purpose
    /// provider when the search key is absent.
    PreferSearch,
}

/// A selected provider together with its API key.
#[derive(Debug, Clone)]
pub struct ProviderAuth {
    pub provider: Provider,
    pub api_key: String,
}

/// Select the provider for a run according to the step's policy.
pub fn select_provider(keys: &ApiKeys, policy: ProviderPolicy) -> Result<ProviderAuth> {
    if let Some(key) = &keys.search {
        return Ok(ProviderAuth {
            provider: Provider::WebSearch,
            api_key: key.clone(),
        });
    }

    match policy {
        ProviderPolicy::RequireSearch => Err(AssetPilotError::config(
            "this step requires the web-search provider. \
             Set PERPLEXITY_API_KEY in your environment (keys start with 'pplx-').",
        )),
        ProviderPolicy::PreferSearch => match &keys.general {
            Some(key) => {
                tracing::debug!("search provider key absent, falling back to general provider");
                Ok(ProviderAuth {
                    provider: Provider::General,
                    api_key: key.clone(),
                })
            }
            None => Err(AssetPilotError::config(
                "no completion API key configured. \
                 Set PERPLEXITY_API_KEY or OPENAI_API_KEY in your environment.",
            )),
        },
    }
}
