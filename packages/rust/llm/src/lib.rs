//! Completion provider client for AssetPilot.
//!
//! This crate provides:
//! - Provider profiles and per-step selection ([`Provider`],
//!   [`ProviderPolicy`], [`select_provider`])
//! - The OpenAI-compatible [`ChatClient`] and the [`ChatCompleter`] trait
//!   the engine depends on
//! - Failure classification ([`classify`], [`critical_message`])

pub mod classify;
pub mod client;
pub mod provider;

pub use classify::{FailureClass, classify, critical_message};
pub use client::{ChatClient, ChatCompleter, ChatMessage, Role};
pub use provider::{Provider, ProviderAuth, ProviderPolicy, select_provider};
