// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stored OAuth/OIDC token sets and pending link requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token endpoint response shared by Discord and ScoutID.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default)]
    pub id_token: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

/// Discord tokens, stored under `discord-<userId>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordTokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl DiscordTokenSet {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// ScoutID tokens, stored under `scoutid-<subject>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoutIdTokenSet {
    /// Owning Discord user; the join key for metadata syncs.
    pub discord_user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub code_verifier: String,
}

impl ScoutIdTokenSet {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Pending second leg of the flow, stored under `state-<token>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkState {
    pub discord_user_id: String,
    pub code_verifier: String,
    pub nonce: String,
}
