// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Metadata publisher: derive role metadata from ScoutID/ScoutNet and push it
//! to Discord.

use crate::db::CredentialStore;
use crate::error::AppError;
use crate::models::{MetadataSnapshot, QuestionMap, RoleMetadata};
use crate::services::discord::DiscordService;
use crate::services::scoutid::ScoutIdService;
use crate::services::scoutnet::ScoutnetClient;
use std::sync::Arc;

/// Result of one [`MetadataService::sync`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No identity link; nothing was called or pushed.
    NotLinked,
    /// Derived metadata was pushed.
    Published {
        metadata: RoleMetadata,
        display_name: String,
    },
    /// Upstream data was unavailable; an empty object was pushed.
    Cleared,
}

#[derive(Clone)]
pub struct MetadataService {
    store: CredentialStore,
    discord: DiscordService,
    scoutid: ScoutIdService,
    scoutnet: Arc<ScoutnetClient>,
    questions: Arc<QuestionMap>,
}

impl MetadataService {
    pub fn new(
        store: CredentialStore,
        discord: DiscordService,
        scoutid: ScoutIdService,
        scoutnet: Arc<ScoutnetClient>,
        questions: QuestionMap,
    ) -> Self {
        Self {
            store,
            discord,
            scoutid,
            scoutnet,
            questions: Arc::new(questions),
        }
    }

    /// Recompute and publish metadata for a Discord user.
    ///
    /// Only the Discord push (and the store read) can fail this call. Any
    /// error while gathering upstream data turns into an empty push.
    pub async fn sync(&self, discord_user_id: &str) -> Result<SyncOutcome, AppError> {
        let Some(subject) = self.store.get_identity_link(discord_user_id).await? else {
            tracing::debug!(discord_user_id, "No linked ScoutID, skipping metadata sync");
            return Ok(SyncOutcome::NotLinked);
        };

        let snapshot = match self.derive(&subject).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    discord_user_id,
                    subject = %subject,
                    error = %e,
                    "Upstream data unavailable, clearing metadata"
                );
                MetadataSnapshot::Cleared
            }
        };

        self.discord.push_metadata(discord_user_id, &snapshot).await?;

        let outcome = match snapshot {
            MetadataSnapshot::Derived { metadata, username } => SyncOutcome::Published {
                metadata,
                display_name: username,
            },
            MetadataSnapshot::Cleared => SyncOutcome::Cleared,
        };
        tracing::info!(discord_user_id, outcome = ?outcome, "Metadata published");
        Ok(outcome)
    }

    async fn derive(&self, subject: &str) -> Result<MetadataSnapshot, AppError> {
        let profile = self.scoutid.fetch_profile(subject).await?;
        let participant = self.scoutnet.participant(&profile.sub).await?;
        let metadata = self.questions.derive(participant.as_ref());

        Ok(MetadataSnapshot::Derived {
            metadata,
            username: profile.name.unwrap_or(profile.sub),
        })
    }
}
