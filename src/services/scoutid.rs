// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ScoutID OIDC client and token-managing service.
//!
//! Handles:
//! - Provider discovery (`.well-known/openid-configuration`)
//! - Authorization URL with nonce and PKCE S256
//! - Code exchange with the stored verifier, token refresh
//! - Userinfo lookup

use crate::config::Config;
use crate::db::CredentialStore;
use crate::error::{AppError, Provider};
use crate::models::{LinkState, ScoutIdTokenSet, TokenResponse};
use crate::services::http::{read_json, send_with_retry, RetryPolicy};
use crate::services::scoutid_oidc::IdTokenVerifier;
use crate::time_utils::expiry_from_now;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const OIDC_SCOPES: &str = "openid profile email";

/// The subset of the OIDC discovery document we use.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
}

impl ProviderMetadata {
    /// Conventional endpoint layout under `issuer`, for tests and fixtures.
    pub fn for_issuer(issuer: &str) -> Self {
        let issuer = issuer.trim_end_matches('/');
        Self {
            issuer: issuer.to_string(),
            authorization_endpoint: format!("{issuer}/authorize"),
            token_endpoint: format!("{issuer}/token"),
            userinfo_endpoint: format!("{issuer}/userinfo"),
            jwks_uri: format!("{issuer}/jwks"),
        }
    }
}

/// Userinfo claims.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ScoutIdUser {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// ScoutID OIDC client.
#[derive(Clone)]
pub struct ScoutIdClient {
    http: reqwest::Client,
    metadata: ProviderMetadata,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    retry: RetryPolicy,
}

impl ScoutIdClient {
    /// Fetch the provider's discovery document and build a client from it.
    pub async fn discover(config: &Config, http: reqwest::Client) -> Result<Self, AppError> {
        let url = format!(
            "{}/.well-known/openid-configuration",
            config.scoutid_issuer.trim_end_matches('/')
        );
        let response =
            send_with_retry(&config.retry_policy, Provider::ScoutId, || http.get(&url)).await?;
        let metadata: ProviderMetadata = read_json(Provider::ScoutId, response).await?;

        tracing::info!(issuer = %metadata.issuer, "ScoutID provider metadata loaded");
        Ok(Self::with_metadata(config, http, metadata))
    }

    pub fn with_metadata(config: &Config, http: reqwest::Client, metadata: ProviderMetadata) -> Self {
        Self {
            http,
            metadata,
            client_id: config.scoutid_client_id.clone(),
            client_secret: config.scoutid_client_secret.clone(),
            redirect_uri: config.scoutid_redirect_uri(),
            retry: config.retry_policy,
        }
    }

    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    /// Authorization URL for the second leg.
    pub fn authorize_url(&self, state: &str, nonce: &str, code_challenge: &str) -> String {
        let separator = if self.metadata.authorization_endpoint.contains('?') {
            '&'
        } else {
            '?'
        };
        format!(
            "{}{}response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&nonce={}&code_challenge={}&code_challenge_method=S256",
            self.metadata.authorization_endpoint,
            separator,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(OIDC_SCOPES),
            urlencoding::encode(state),
            urlencoding::encode(nonce),
            urlencoding::encode(code_challenge),
        )
    }

    /// Exchange an authorization code plus the PKCE verifier for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
        ])
        .await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, grant: &[(&str, &str)]) -> Result<TokenResponse, AppError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(grant);

        let response = send_with_retry(&self.retry, Provider::ScoutId, || {
            self.http.post(&self.metadata.token_endpoint).form(&form)
        })
        .await?;
        read_json(Provider::ScoutId, response).await
    }

    pub async fn userinfo(&self, access_token: &str) -> Result<ScoutIdUser, AppError> {
        let response = send_with_retry(&self.retry, Provider::ScoutId, || {
            self.http
                .get(&self.metadata.userinfo_endpoint)
                .bearer_auth(access_token)
        })
        .await?;
        read_json(Provider::ScoutId, response).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ScoutIdService - client plus stored-token lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a completed ScoutID login.
#[derive(Debug, Clone)]
pub struct ScoutIdLogin {
    pub user: ScoutIdUser,
    pub tokens: ScoutIdTokenSet,
}

#[derive(Clone)]
pub struct ScoutIdService {
    client: ScoutIdClient,
    store: CredentialStore,
    verifier: Arc<IdTokenVerifier>,
}

impl ScoutIdService {
    pub fn new(client: ScoutIdClient, store: CredentialStore, verifier: Arc<IdTokenVerifier>) -> Self {
        Self {
            client,
            store,
            verifier,
        }
    }

    pub fn client(&self) -> &ScoutIdClient {
        &self.client
    }

    /// Exchange the callback code and establish who logged in.
    ///
    /// Nothing is persisted here; the caller writes the identity link first
    /// and the token set after it.
    pub async fn complete_login(
        &self,
        code: &str,
        link_state: &LinkState,
    ) -> Result<ScoutIdLogin, AppError> {
        let response = self
            .client
            .exchange_code(code, &link_state.code_verifier)
            .await?;

        let id_token = response
            .id_token
            .as_deref()
            .ok_or_else(|| AppError::IdTokenRejected("token response without id_token".into()))?;
        let claims = self.verifier.verify(id_token, &link_state.nonce).await?;

        let user = self.client.userinfo(&response.access_token).await?;
        if user.sub != claims.sub {
            return Err(AppError::IdTokenRejected(
                "userinfo subject differs from ID token subject".to_string(),
            ));
        }

        let refresh_token = response.refresh_token.ok_or_else(|| {
            AppError::upstream(Provider::ScoutId, "token response without refresh_token")
        })?;

        let tokens = ScoutIdTokenSet {
            discord_user_id: link_state.discord_user_id.clone(),
            access_token: response.access_token,
            refresh_token,
            expires_at: expiry_from_now(response.expires_in),
            code_verifier: link_state.code_verifier.clone(),
        };

        tracing::info!(
            discord_user_id = %link_state.discord_user_id,
            subject = %user.sub,
            "ScoutID login completed"
        );
        Ok(ScoutIdLogin { user, tokens })
    }

    /// Get a valid access token for a ScoutID subject, refreshing if expired.
    pub async fn get_valid_access_token(&self, subject: &str) -> Result<String, AppError> {
        let tokens = self
            .store
            .get_scoutid_tokens(subject)
            .await?
            .ok_or_else(|| AppError::ReauthorizationRequired {
                provider: Provider::ScoutId,
                key: subject.to_string(),
            })?;

        if !tokens.is_expired(Utc::now()) {
            return Ok(tokens.access_token);
        }

        tracing::info!(subject, "ScoutID access token expired, refreshing");

        let response = self.client.refresh_token(&tokens.refresh_token).await?;
        let refreshed = ScoutIdTokenSet {
            access_token: response.access_token,
            refresh_token: response.refresh_token.unwrap_or(tokens.refresh_token),
            expires_at: expiry_from_now(response.expires_in),
            ..tokens
        };
        self.store.set_scoutid_tokens(subject, &refreshed).await?;

        Ok(refreshed.access_token)
    }

    /// Current userinfo for a stored subject.
    pub async fn fetch_profile(&self, subject: &str) -> Result<ScoutIdUser, AppError> {
        let access_token = self.get_valid_access_token(subject).await?;
        self.client.userinfo(&access_token).await
    }
}
