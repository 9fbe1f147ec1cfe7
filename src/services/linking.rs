// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The two-leg linking flow: Discord OAuth2, then ScoutID OIDC with PKCE.
//!
//! Callers verify the signed correlation cookie against the returned `state`
//! before invoking a callback step. This service owns everything behind it:
//! token exchange, the pending [`LinkState`], the identity link, and the
//! post-link metadata and guild sync.

use crate::db::CredentialStore;
use crate::error::AppError;
use crate::models::{LinkState, RoleMetadata};
use crate::services::discord::DiscordService;
use crate::services::guilds::{GuildSync, GuildSyncSummary};
use crate::services::metadata::{MetadataService, SyncOutcome};
use crate::services::oauth_state::{random_token, PkcePair};
use crate::services::scoutid::ScoutIdService;

/// Where to send the browser next, and the correlation token to put in the
/// signed cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRedirect {
    pub url: String,
    pub state: String,
}

/// Result of a completed link.
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub discord_user_id: String,
    pub scoutid_subject: String,
    pub sync: SyncOutcome,
    pub guilds: GuildSyncSummary,
}

#[derive(Clone)]
pub struct LinkService {
    store: CredentialStore,
    discord: DiscordService,
    scoutid: ScoutIdService,
    metadata: MetadataService,
    guilds: GuildSync,
}

impl LinkService {
    pub fn new(
        store: CredentialStore,
        discord: DiscordService,
        scoutid: ScoutIdService,
        metadata: MetadataService,
        guilds: GuildSync,
    ) -> Self {
        Self {
            store,
            discord,
            scoutid,
            metadata,
            guilds,
        }
    }

    /// Start the Discord leg with a fresh correlation token.
    pub fn begin(&self) -> Result<AuthorizationRedirect, AppError> {
        let state = random_token()?;
        let url = self.discord.client().authorize_url(&state);
        Ok(AuthorizationRedirect { url, state })
    }

    /// Finish the Discord leg and start the ScoutID leg.
    pub async fn complete_discord(&self, code: &str) -> Result<AuthorizationRedirect, AppError> {
        let user = self.discord.handle_oauth_callback(code).await?;

        let state = random_token()?;
        let nonce = random_token()?;
        let pkce = PkcePair::generate()?;

        let pending = LinkState {
            discord_user_id: user.id.clone(),
            code_verifier: pkce.verifier,
            nonce,
        };
        self.store.put_link_state(&state, &pending).await?;

        let url = self
            .scoutid
            .client()
            .authorize_url(&state, &pending.nonce, &pkce.challenge);

        tracing::info!(discord_user_id = %user.id, "Discord leg complete, redirecting to ScoutID");
        Ok(AuthorizationRedirect { url, state })
    }

    /// Finish the ScoutID leg: link identities, then publish metadata and
    /// sync guilds once.
    ///
    /// The pending state is consumed before the code exchange, so a replayed
    /// callback finds nothing and fails with [`AppError::LinkExpired`].
    pub async fn complete_scoutid(&self, code: &str, state: &str) -> Result<LinkOutcome, AppError> {
        let pending = self
            .store
            .take_link_state(state)
            .await?
            .ok_or(AppError::LinkExpired)?;

        let login = self.scoutid.complete_login(code, &pending).await?;
        let subject = login.user.sub.clone();

        // Link first: a token set must never exist without its link.
        self.store
            .set_identity_link(&pending.discord_user_id, &subject)
            .await?;
        self.store.set_scoutid_tokens(&subject, &login.tokens).await?;

        tracing::info!(
            discord_user_id = %pending.discord_user_id,
            subject = %subject,
            "Identities linked"
        );

        let sync = self.metadata.sync(&pending.discord_user_id).await?;

        // The nickname is set even when metadata was cleared; roles only
        // follow published metadata.
        let fallback_name = login.user.name.as_deref().unwrap_or(&subject);
        let cleared = RoleMetadata::default();
        let (display_name, roles) = match &sync {
            SyncOutcome::Published {
                metadata,
                display_name,
            } => (display_name.as_str(), metadata),
            SyncOutcome::NotLinked | SyncOutcome::Cleared => (fallback_name, &cleared),
        };
        let guilds = self
            .guilds
            .sync_member(&pending.discord_user_id, display_name, roles)
            .await;

        Ok(LinkOutcome {
            discord_user_id: pending.discord_user_id,
            scoutid_subject: subject,
            sync,
            guilds,
        })
    }

    /// Remove a user's identity link and ScoutID tokens.
    ///
    /// The next sync for the user is a no-op.
    pub async fn unlink(&self, discord_user_id: &str) -> Result<bool, AppError> {
        let Some(subject) = self.store.get_identity_link(discord_user_id).await? else {
            return Ok(false);
        };
        self.store.delete_scoutid_tokens(&subject).await?;
        self.store.delete_identity_link(discord_user_id).await?;
        tracing::info!(discord_user_id, subject = %subject, "Identity link removed");
        Ok(true)
    }
}
