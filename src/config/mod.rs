//! Engine configuration
//!
//! Two configuration surfaces live here. [`TransferConfig`] is the ambient
//! engine tuning (page size, retry budget, scheduler cadence) loaded once at
//! startup from a TOML file. [`SourceConfig`] is the per-migration remote
//! connection description supplied by the initiator, carrying the one piece
//! of genuinely shared mutable state in the engine: the short-lived access
//! credential, which is write-once-then-purge.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::errors::ExtractError;

/// URL schemes a migration source is allowed to use
///
/// Anything else (`file://`, `ftp://`, ...) is rejected before the first
/// extractor call is made.
pub const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Tuning knobs for the transfer engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Maximum records requested per extractor page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Retry attempts for retryable extraction failures before escalating
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential retry backoff, in milliseconds
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Upper bound on a single backoff delay, in milliseconds
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// Jitter applied to backoff delays, as a percentage of the delay
    #[serde(default = "default_retry_jitter_percent")]
    pub retry_jitter_percent: u8,
    /// Delay before the orchestrator re-checks a migration with in-flight
    /// entities but nothing new to start, in seconds
    #[serde(default = "default_recheck_delay_secs")]
    pub recheck_delay_secs: u64,
    /// Job runner queue poll interval, in seconds
    #[serde(default = "default_runner_tick_secs")]
    pub runner_tick_secs: u64,
    /// Maximum jobs executing concurrently across all types
    #[serde(default = "default_global_max_jobs")]
    pub global_max_jobs: usize,
    /// Maximum concurrent entity import jobs
    #[serde(default = "default_entity_import_limit")]
    pub entity_import_limit: usize,
}

fn default_page_size() -> u32 {
    100
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_retry_max_delay_ms() -> u64 {
    30_000
}
fn default_retry_jitter_percent() -> u8 {
    25
}
fn default_recheck_delay_secs() -> u64 {
    5
}
fn default_runner_tick_secs() -> u64 {
    1
}
fn default_global_max_jobs() -> usize {
    8
}
fn default_entity_import_limit() -> usize {
    4
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            retry_jitter_percent: default_retry_jitter_percent(),
            recheck_delay_secs: default_recheck_delay_secs(),
            runner_tick_secs: default_runner_tick_secs(),
            global_max_jobs: default_global_max_jobs(),
            entity_import_limit: default_entity_import_limit(),
        }
    }
}

impl TransferConfig {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "transfer.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }
}

/// Remote source connection description for one migration
///
/// The credential is short-lived by contract: once the migration reaches a
/// terminal state, [`SourceConfig::purge_credential`] removes it and it can
/// no longer be read back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    url: String,
    credential: Option<String>,
}

impl SourceConfig {
    pub fn new<U: Into<String>, C: Into<String>>(url: U, credential: C) -> Self {
        Self {
            url: url.into(),
            credential: Some(credential.into()),
        }
    }

    /// Base URL of the remote instance
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Access credential, if it has not been purged yet
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    /// Remove the access credential permanently
    pub fn purge_credential(&mut self) {
        self.credential = None;
    }

    /// Validate the source URL against the scheme allow-list
    ///
    /// Returns a fatal, non-retryable error for anything outside
    /// [`ALLOWED_SCHEMES`], surfaced before any network call is made.
    pub fn validate_scheme(&self) -> Result<(), ExtractError> {
        let parsed = Url::parse(&self.url)
            .map_err(|e| ExtractError::fatal(format!("invalid source url '{}': {e}", self.url)))?;

        if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
            return Err(ExtractError::fatal(format!(
                "disallowed url scheme '{}' for source '{}' (allowed: {})",
                parsed.scheme(),
                self.url,
                ALLOWED_SCHEMES.join(", ")
            )));
        }

        Ok(())
    }
}
