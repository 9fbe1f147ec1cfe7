// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Discord API client and token-managing service.
//!
//! Handles:
//! - OAuth2 authorize URL, code exchange, and token refresh
//! - Profile and guild-list lookups with the user's token
//! - Role connection metadata pushes
//! - Bot-token calls for nicknames and guild roles

use crate::config::Config;
use crate::db::CredentialStore;
use crate::error::{AppError, Provider};
use crate::models::metadata::MetadataSchemaRecord;
use crate::models::{DiscordTokenSet, MetadataSnapshot, TokenResponse};
use crate::services::http::{check_response, read_json, send_with_retry, RetryPolicy};
use crate::time_utils::expiry_from_now;
use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Scopes requested from the user.
const OAUTH_SCOPES: &str = "role_connections.write identify guilds";

/// `platform_name` shown on the user's Discord profile.
pub const PLATFORM_NAME: &str = "ScoutID";

/// Discord REST client.
#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    authorize_url: String,
    client_id: String,
    client_secret: String,
    bot_token: String,
    redirect_uri: String,
    retry: RetryPolicy,
}

impl DiscordClient {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            api_base: config.discord_api_base.trim_end_matches('/').to_string(),
            authorize_url: config.discord_authorize_url.clone(),
            client_id: config.discord_client_id.clone(),
            client_secret: config.discord_client_secret.clone(),
            bot_token: config.discord_bot_token.clone(),
            redirect_uri: config.discord_redirect_uri(),
            retry: config.retry_policy,
        }
    }

    /// Authorization URL for the first leg, carrying `state`.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&prompt=consent",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(OAUTH_SCOPES),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, grant: &[(&str, &str)]) -> Result<TokenResponse, AppError> {
        let url = format!("{}/oauth2/token", self.api_base);
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(grant);

        let response =
            send_with_retry(&self.retry, Provider::Discord, || self.http.post(&url).form(&form))
                .await?;
        read_json(Provider::Discord, response).await
    }

    /// Get the user behind an access token.
    pub async fn get_current_user(&self, access_token: &str) -> Result<DiscordUser, AppError> {
        let url = format!("{}/users/@me", self.api_base);
        let response = send_with_retry(&self.retry, Provider::Discord, || {
            self.http.get(&url).bearer_auth(access_token)
        })
        .await?;
        read_json(Provider::Discord, response).await
    }

    /// Guilds the user is a member of (`guilds` scope).
    pub async fn get_current_user_guilds(
        &self,
        access_token: &str,
    ) -> Result<Vec<PartialGuild>, AppError> {
        let url = format!("{}/users/@me/guilds", self.api_base);
        let response = send_with_retry(&self.retry, Provider::Discord, || {
            self.http.get(&url).bearer_auth(access_token)
        })
        .await?;
        read_json(Provider::Discord, response).await
    }

    /// Replace the user's role connection for this application.
    pub async fn put_role_connection(
        &self,
        access_token: &str,
        connection: &RoleConnection,
    ) -> Result<(), AppError> {
        let url = format!(
            "{}/users/@me/applications/{}/role-connection",
            self.api_base, self.client_id
        );
        let response = send_with_retry(&self.retry, Provider::Discord, || {
            self.http.put(&url).bearer_auth(access_token).json(connection)
        })
        .await?;
        check_response(Provider::Discord, response).await?;
        Ok(())
    }

    fn bot_auth(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    /// Set a member's nickname in a guild (bot needs MANAGE_NICKNAMES).
    pub async fn set_member_nickname(
        &self,
        guild_id: &str,
        user_id: &str,
        nickname: &str,
    ) -> Result<(), AppError> {
        let url = format!("{}/guilds/{}/members/{}", self.api_base, guild_id, user_id);
        let body = serde_json::json!({ "nick": nickname });
        let response = send_with_retry(&self.retry, Provider::Discord, || {
            self.http
                .patch(&url)
                .header(AUTHORIZATION, self.bot_auth())
                .json(&body)
        })
        .await?;
        check_response(Provider::Discord, response).await?;
        Ok(())
    }

    /// List a guild's roles.
    pub async fn get_guild_roles(&self, guild_id: &str) -> Result<Vec<GuildRole>, AppError> {
        let url = format!("{}/guilds/{}/roles", self.api_base, guild_id);
        let response = send_with_retry(&self.retry, Provider::Discord, || {
            self.http.get(&url).header(AUTHORIZATION, self.bot_auth())
        })
        .await?;
        read_json(Provider::Discord, response).await
    }

    /// Grant a role to a guild member (bot needs MANAGE_ROLES).
    pub async fn add_member_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), AppError> {
        let url = format!(
            "{}/guilds/{}/members/{}/roles/{}",
            self.api_base, guild_id, user_id, role_id
        );
        let response = send_with_retry(&self.retry, Provider::Discord, || {
            self.http.put(&url).header(AUTHORIZATION, self.bot_auth())
        })
        .await?;
        check_response(Provider::Discord, response).await?;
        Ok(())
    }

    /// Register the application's role connection metadata schema.
    pub async fn register_metadata_schema(
        &self,
        schema: &[MetadataSchemaRecord],
    ) -> Result<Value, AppError> {
        let url = format!(
            "{}/applications/{}/role-connections/metadata",
            self.api_base, self.client_id
        );
        let response = send_with_retry(&self.retry, Provider::Discord, || {
            self.http
                .put(&url)
                .header(AUTHORIZATION, self.bot_auth())
                .json(schema)
        })
        .await?;
        read_json(Provider::Discord, response).await
    }
}

/// Discord user profile (subset).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
}

/// Guild entry from `/users/@me/guilds`.
#[derive(Debug, Clone, Deserialize)]
pub struct PartialGuild {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Guild role (subset).
#[derive(Debug, Clone, Deserialize)]
pub struct GuildRole {
    pub id: String,
    pub name: String,
}

/// Body of the role connection PUT.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleConnection {
    pub platform_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_username: Option<String>,
    pub metadata: Map<String, Value>,
}

impl From<&MetadataSnapshot> for RoleConnection {
    fn from(snapshot: &MetadataSnapshot) -> Self {
        Self {
            platform_name: PLATFORM_NAME.to_string(),
            platform_username: snapshot.username().map(str::to_string),
            metadata: snapshot.metadata_object(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DiscordService - client plus stored-token lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Discord calls made on behalf of a stored user.
#[derive(Clone)]
pub struct DiscordService {
    client: DiscordClient,
    store: CredentialStore,
}

impl DiscordService {
    pub fn new(client: DiscordClient, store: CredentialStore) -> Self {
        Self { client, store }
    }

    pub fn client(&self) -> &DiscordClient {
        &self.client
    }

    /// Exchange the callback code, learn who the user is, and store their tokens.
    pub async fn handle_oauth_callback(&self, code: &str) -> Result<DiscordUser, AppError> {
        let response = self.client.exchange_code(code).await?;
        let refresh_token = response.refresh_token.clone().ok_or_else(|| {
            AppError::upstream(Provider::Discord, "token response without refresh_token")
        })?;

        let user = self.client.get_current_user(&response.access_token).await?;

        let tokens = DiscordTokenSet {
            access_token: response.access_token,
            refresh_token,
            expires_at: expiry_from_now(response.expires_in),
        };
        self.store.set_discord_tokens(&user.id, &tokens).await?;

        tracing::info!(user_id = %user.id, "Discord tokens stored");
        Ok(user)
    }

    /// Get a valid (non-expired) access token for the given Discord user.
    ///
    /// Refreshes and persists a new token set when the stored one has expired.
    /// A missing token set means the user must authorize again.
    pub async fn get_valid_access_token(&self, user_id: &str) -> Result<String, AppError> {
        let tokens = self
            .store
            .get_discord_tokens(user_id)
            .await?
            .ok_or_else(|| AppError::ReauthorizationRequired {
                provider: Provider::Discord,
                key: user_id.to_string(),
            })?;

        if !tokens.is_expired(Utc::now()) {
            return Ok(tokens.access_token);
        }

        tracing::info!(user_id, "Discord access token expired, refreshing");

        let response = self.client.refresh_token(&tokens.refresh_token).await?;
        let refreshed = DiscordTokenSet {
            access_token: response.access_token,
            refresh_token: response.refresh_token.unwrap_or(tokens.refresh_token),
            expires_at: expiry_from_now(response.expires_in),
        };
        self.store.set_discord_tokens(user_id, &refreshed).await?;

        tracing::info!(user_id, "Discord token refreshed");
        Ok(refreshed.access_token)
    }

    /// Push a metadata snapshot as the user's role connection.
    pub async fn push_metadata(
        &self,
        user_id: &str,
        snapshot: &MetadataSnapshot,
    ) -> Result<(), AppError> {
        let access_token = self.get_valid_access_token(user_id).await?;
        self.client
            .put_role_connection(&access_token, &RoleConnection::from(snapshot))
            .await
    }

    /// Ids of the guilds the user belongs to.
    pub async fn user_guild_ids(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let access_token = self.get_valid_access_token(user_id).await?;
        let guilds = self.client.get_current_user_guilds(&access_token).await?;
        Ok(guilds.into_iter().map(|g| g.id).collect())
    }
}
