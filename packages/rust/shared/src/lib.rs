//! Shared types, error model, and configuration for AssetPilot.
//!
//! This crate is the foundation depended on by all other AssetPilot crates.
//! It provides:
//! - [`AssetPilotError`] — the unified error type
//! - Collaborator wire shapes ([`ProcessRequest`], [`ProcessResponse`],
//!   [`ProgressEvent`], [`RunStats`])
//! - Configuration ([`AppConfig`], API-key loading, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiKeys, AppConfig, DefaultsConfig, ProvidersConfig, config_dir, config_file_path,
    expand_home, init_config, is_usable_search_key, load_api_keys, load_config,
    load_config_from, sanitize_key,
};
pub use error::{AssetPilotError, Result};
pub use types::{ProcessId, ProcessRequest, ProcessResponse, ProgressEvent, RunStats, RunStatus};
