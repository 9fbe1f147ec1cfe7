// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential store: a key-value store with per-key expiry.
//!
//! Backends implement [`KeyValueStore`]. The rest of the crate only talks to
//! [`CredentialStore`], which owns the four key families and their TTLs.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{DiscordTokenSet, LinkState, ScoutIdTokenSet};
use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Lifetime of a pending link request.
pub const LINK_STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Key families.
pub mod keys {
    pub fn discord_tokens(user_id: &str) -> String {
        format!("discord-{user_id}")
    }

    pub fn scoutid_tokens(subject: &str) -> String {
        format!("scoutid-{subject}")
    }

    pub fn link_state(token: &str) -> String {
        format!("state-{token}")
    }

    pub fn identity_link(user_id: &str) -> String {
        format!("discord-link-{user_id}")
    }
}

/// Raw single-key storage. Each operation is atomic per key; nothing spans keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Store `value`; `ttl = None` keeps it until deleted.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), AppError>;

    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// Remove expired entries nobody has read. Returns how many were dropped.
    async fn purge_expired(&self) -> Result<usize, AppError>;

    async fn close(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Typed repository over a [`KeyValueStore`].
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
    discord_token_retention: Duration,
}

impl CredentialStore {
    /// `discord_token_retention` is how long a Discord token set outlives its
    /// access token, so the refresh token is still around when it is needed.
    pub fn new(backend: Arc<dyn KeyValueStore>, discord_token_retention: Duration) -> Self {
        Self {
            backend,
            discord_token_retention,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let Some(raw) = self.backend.get(key).await? else {
            return Ok(None);
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| AppError::Store(format!("corrupt value under {key}: {e}")))
    }

    async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), AppError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| AppError::Store(format!("failed to encode {key}: {e}")))?;
        self.backend.set(key, raw, ttl).await
    }

    // ─── Discord tokens ──────────────────────────────────────────

    /// A miss means the user has to authorize with Discord again.
    pub async fn get_discord_tokens(
        &self,
        user_id: &str,
    ) -> Result<Option<DiscordTokenSet>, AppError> {
        self.get_json(&keys::discord_tokens(user_id)).await
    }

    pub async fn set_discord_tokens(
        &self,
        user_id: &str,
        tokens: &DiscordTokenSet,
    ) -> Result<(), AppError> {
        let remaining = (tokens.expires_at - Utc::now())
            .to_std()
            .unwrap_or_default();
        let ttl = remaining + self.discord_token_retention;
        self.set_json(&keys::discord_tokens(user_id), tokens, Some(ttl))
            .await
    }

    pub async fn delete_discord_tokens(&self, user_id: &str) -> Result<(), AppError> {
        self.backend.delete(&keys::discord_tokens(user_id)).await
    }

    // ─── ScoutID tokens ──────────────────────────────────────────

    pub async fn get_scoutid_tokens(
        &self,
        subject: &str,
    ) -> Result<Option<ScoutIdTokenSet>, AppError> {
        self.get_json(&keys::scoutid_tokens(subject)).await
    }

    pub async fn set_scoutid_tokens(
        &self,
        subject: &str,
        tokens: &ScoutIdTokenSet,
    ) -> Result<(), AppError> {
        self.set_json(&keys::scoutid_tokens(subject), tokens, None)
            .await
    }

    pub async fn delete_scoutid_tokens(&self, subject: &str) -> Result<(), AppError> {
        self.backend.delete(&keys::scoutid_tokens(subject)).await
    }

    // ─── Link state ──────────────────────────────────────────────

    pub async fn put_link_state(&self, token: &str, state: &LinkState) -> Result<(), AppError> {
        self.set_json(&keys::link_state(token), state, Some(LINK_STATE_TTL))
            .await
    }

    /// Read and delete a pending link request. A second call returns `None`.
    pub async fn take_link_state(&self, token: &str) -> Result<Option<LinkState>, AppError> {
        let key = keys::link_state(token);
        let state = self.get_json(&key).await?;
        if state.is_some() {
            self.backend.delete(&key).await?;
        }
        Ok(state)
    }

    // ─── Identity links ──────────────────────────────────────────

    /// ScoutID subject linked to a Discord user, if any.
    pub async fn get_identity_link(&self, user_id: &str) -> Result<Option<String>, AppError> {
        self.get_json(&keys::identity_link(user_id)).await
    }

    pub async fn set_identity_link(&self, user_id: &str, subject: &str) -> Result<(), AppError> {
        self.set_json(&keys::identity_link(user_id), &subject, None)
            .await
    }

    pub async fn delete_identity_link(&self, user_id: &str) -> Result<(), AppError> {
        self.backend.delete(&keys::identity_link(user_id)).await
    }

    pub async fn close(&self) -> Result<(), AppError> {
        self.backend.close().await
    }
}
