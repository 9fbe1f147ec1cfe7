// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use crate::models::{MetadataField, QuestionMap};
use crate::services::http::RetryPolicy;
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

/// Minimum length of `COOKIE_SECRET`.
const MIN_COOKIE_SECRET_LEN: usize = 32;

/// Default lifetime of a Discord token set beyond its access token (30 days).
const DEFAULT_DISCORD_TOKEN_RETENTION_SECS: u64 = 30 * 24 * 60 * 60;

/// Which credential store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Firestore,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Server port
    pub port: u16,
    /// Externally visible base URL of this service, e.g. `https://link.example.org`
    pub public_base_url: String,
    /// Discord application (OAuth client) ID
    pub discord_client_id: String,
    /// Discord REST base, normally `https://discord.com/api/v10`
    pub discord_api_base: String,
    /// Discord OAuth2 authorize page
    pub discord_authorize_url: String,
    /// Operator-pinned guild; when unset the user's guild list is queried
    pub discord_guild_id: Option<String>,
    /// Guild role to grant for each set metadata flag
    pub discord_role_names: BTreeMap<MetadataField, String>,
    /// How long Discord token sets are kept after the access token expires
    pub discord_token_retention: Duration,
    /// ScoutID OIDC issuer
    pub scoutid_issuer: String,
    pub scoutid_client_id: String,
    /// ScoutNet API base, normally `https://www.scoutnet.se`
    pub scoutnet_api_base: String,
    pub scoutnet_project_id: String,
    pub scoutnet_cache_ttl: Duration,
    pub scoutnet_questions: QuestionMap,
    pub store_backend: StoreBackend,
    /// GCP project ID (Firestore backend)
    pub gcp_project_id: String,
    pub retry_policy: RetryPolicy,

    // --- Secrets ---
    pub discord_client_secret: String,
    pub discord_bot_token: String,
    pub scoutid_client_secret: String,
    pub scoutnet_api_key: String,
    /// Cookie signing secret (raw bytes)
    pub cookie_secret: Vec<u8>,
    /// Bearer token required by `/update-metadata`, if set
    pub metadata_webhook_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let questions_file = required("SCOUTNET_QUESTIONS_FILE")?;
        let scoutnet_questions = QuestionMap::load_from_file(&questions_file)
            .map_err(|e| ConfigError::Invalid("SCOUTNET_QUESTIONS_FILE", e.to_string()))?;

        let discord_role_names = match optional("DISCORD_ROLE_NAMES") {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| ConfigError::Invalid("DISCORD_ROLE_NAMES", e.to_string()))?,
            None => BTreeMap::new(),
        };

        let store_backend = match optional("STORE_BACKEND").as_deref() {
            None | Some("memory") => StoreBackend::Memory,
            Some("firestore") => StoreBackend::Firestore,
            Some(other) => {
                return Err(ConfigError::Invalid(
                    "STORE_BACKEND",
                    format!("unknown backend {other:?}"),
                ))
            }
        };

        let cookie_secret = required("COOKIE_SECRET")?.into_bytes();
        if cookie_secret.len() < MIN_COOKIE_SECRET_LEN {
            return Err(ConfigError::Invalid(
                "COOKIE_SECRET",
                format!("must be at least {MIN_COOKIE_SECRET_LEN} bytes"),
            ));
        }

        Ok(Self {
            port: parse_or("PORT", 8080)?,
            public_base_url: optional("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8080".to_string())
                .trim_end_matches('/')
                .to_string(),
            discord_client_id: required("DISCORD_CLIENT_ID")?,
            discord_api_base: optional("DISCORD_API_BASE")
                .unwrap_or_else(|| "https://discord.com/api/v10".to_string()),
            discord_authorize_url: optional("DISCORD_AUTHORIZE_URL")
                .unwrap_or_else(|| "https://discord.com/oauth2/authorize".to_string()),
            discord_guild_id: optional("DISCORD_GUILD_ID"),
            discord_role_names,
            discord_token_retention: Duration::from_secs(parse_or(
                "DISCORD_TOKEN_RETENTION_SECS",
                DEFAULT_DISCORD_TOKEN_RETENTION_SECS,
            )?),
            scoutid_issuer: required("SCOUTID_ISSUER")?,
            scoutid_client_id: required("SCOUTID_CLIENT_ID")?,
            scoutnet_api_base: optional("SCOUTNET_API_BASE")
                .unwrap_or_else(|| "https://www.scoutnet.se".to_string()),
            scoutnet_project_id: required("SCOUTNET_PROJECT_ID")?,
            scoutnet_cache_ttl: Duration::from_secs(parse_or("SCOUTNET_CACHE_TTL_SECS", 60)?),
            scoutnet_questions,
            store_backend,
            gcp_project_id: optional("GCP_PROJECT_ID").unwrap_or_else(|| "local-dev".to_string()),
            retry_policy: RetryPolicy::default(),

            discord_client_secret: required("DISCORD_CLIENT_SECRET")?,
            discord_bot_token: required("DISCORD_BOT_TOKEN")?,
            scoutid_client_secret: required("SCOUTID_CLIENT_SECRET")?,
            scoutnet_api_key: required("SCOUTNET_API_KEY")?,
            cookie_secret,
            metadata_webhook_token: optional("METADATA_WEBHOOK_TOKEN"),
        })
    }

    /// Config for tests. Provider URLs point nowhere until overridden.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            public_base_url: "http://localhost:8080".to_string(),
            discord_client_id: "test_discord_client".to_string(),
            discord_api_base: "http://127.0.0.1:9/api".to_string(),
            discord_authorize_url: "https://discord.com/oauth2/authorize".to_string(),
            discord_guild_id: None,
            discord_role_names: BTreeMap::new(),
            discord_token_retention: Duration::from_secs(DEFAULT_DISCORD_TOKEN_RETENTION_SECS),
            scoutid_issuer: "http://127.0.0.1:9".to_string(),
            scoutid_client_id: "test_scoutid_client".to_string(),
            scoutnet_api_base: "http://127.0.0.1:9".to_string(),
            scoutnet_project_id: "1234".to_string(),
            scoutnet_cache_ttl: Duration::from_secs(60),
            scoutnet_questions: QuestionMap::default(),
            store_backend: StoreBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            retry_policy: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(10),
            },
            discord_client_secret: "test_discord_secret".to_string(),
            discord_bot_token: "test_bot_token".to_string(),
            scoutid_client_secret: "test_scoutid_secret".to_string(),
            scoutnet_api_key: "test_scoutnet_key".to_string(),
            cookie_secret: b"test_cookie_secret_32_bytes_min!".to_vec(),
            metadata_webhook_token: None,
        }
    }

    pub fn discord_redirect_uri(&self) -> String {
        format!("{}/discord-oauth-callback", self.public_base_url)
    }

    pub fn scoutid_redirect_uri(&self) -> String {
        format!("{}/scoutid-oauth-callback", self.public_base_url)
    }

    /// Cookies get the `Secure` attribute unless served over plain HTTP.
    pub fn secure_cookies(&self) -> bool {
        !self.public_base_url.starts_with("http://")
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid(name, format!("cannot parse {raw:?}"))),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
