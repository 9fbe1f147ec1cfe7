// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Best-effort nickname and role sync across the user's guilds.

use crate::models::{MetadataField, RoleMetadata};
use crate::services::discord::DiscordService;
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeMap;

/// Discord's nickname length limit, in characters.
pub const MAX_NICKNAME_CHARS: usize = 32;

const MAX_CONCURRENT_GUILDS: usize = 4;

/// Truncate a display name to a valid nickname.
pub fn truncate_nickname(name: &str) -> String {
    name.trim().chars().take(MAX_NICKNAME_CHARS).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildFailure {
    pub guild_id: String,
    pub reason: String,
}

/// Per-run result: how many guilds were tried and which failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuildSyncSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<GuildFailure>,
}

#[derive(Clone)]
pub struct GuildSync {
    discord: DiscordService,
    pinned_guild: Option<String>,
    role_names: BTreeMap<MetadataField, String>,
}

impl GuildSync {
    pub fn new(
        discord: DiscordService,
        pinned_guild: Option<String>,
        role_names: BTreeMap<MetadataField, String>,
    ) -> Self {
        Self {
            discord,
            pinned_guild,
            role_names,
        }
    }

    /// Set the nickname and grant mapped roles in every guild. Never fails;
    /// each guild's outcome lands in the summary.
    pub async fn sync_member(
        &self,
        user_id: &str,
        display_name: &str,
        metadata: &RoleMetadata,
    ) -> GuildSyncSummary {
        let guild_ids = match &self.pinned_guild {
            Some(id) => vec![id.clone()],
            None => match self.discord.user_guild_ids(user_id).await {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Could not list user's guilds");
                    return GuildSyncSummary::default();
                }
            },
        };

        let nickname = truncate_nickname(display_name);
        let wanted_roles: Vec<&str> = self
            .role_names
            .iter()
            .filter(|(field, _)| metadata.is_set(**field))
            .map(|(_, name)| name.as_str())
            .collect();

        let results: Vec<(String, Result<(), String>)> = stream::iter(guild_ids)
            .map(|guild_id| {
                let nickname = nickname.as_str();
                let wanted_roles = wanted_roles.as_slice();
                async move {
                    let result = self
                        .sync_guild(&guild_id, user_id, nickname, wanted_roles)
                        .await;
                    (guild_id, result)
                }
            })
            .buffer_unordered(MAX_CONCURRENT_GUILDS)
            .collect()
            .await;

        let mut summary = GuildSyncSummary {
            attempted: results.len(),
            ..GuildSyncSummary::default()
        };
        for (guild_id, result) in results {
            match result {
                Ok(()) => summary.succeeded += 1,
                Err(reason) => {
                    tracing::debug!(guild_id = %guild_id, reason = %reason, "Guild sync failed");
                    summary.failures.push(GuildFailure { guild_id, reason });
                }
            }
        }

        tracing::info!(
            user_id,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failures.len(),
            "Guild sync finished"
        );
        summary
    }

    /// Every step is attempted; failures are joined into one reason.
    async fn sync_guild(
        &self,
        guild_id: &str,
        user_id: &str,
        nickname: &str,
        wanted_roles: &[&str],
    ) -> Result<(), String> {
        let client = self.discord.client();
        let mut problems = Vec::new();

        // Discord refuses to rename the guild owner; roles are still granted.
        if !nickname.is_empty() {
            if let Err(e) = client.set_member_nickname(guild_id, user_id, nickname).await {
                problems.push(format!("nickname: {e}"));
            }
        }

        if !wanted_roles.is_empty() {
            match client.get_guild_roles(guild_id).await {
                Ok(roles) => {
                    for name in wanted_roles {
                        let Some(role) = roles.iter().find(|r| r.name == *name) else {
                            problems.push(format!("guild has no role named {name:?}"));
                            continue;
                        };
                        if let Err(e) = client.add_member_role(guild_id, user_id, &role.id).await {
                            problems.push(format!("role {name:?}: {e}"));
                        }
                    }
                }
                Err(e) => problems.push(format!("roles: {e}")),
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_truncated_to_32_chars() {
        let long = "Åsa Öberg-Lindqvist från Scoutkåren i Norrköping";
        let nick = truncate_nickname(long);
        assert_eq!(nick.chars().count(), MAX_NICKNAME_CHARS);
        assert!(long.starts_with(&nick));
    }

    #[test]
    fn short_nickname_kept() {
        assert_eq!(truncate_nickname("  Alva  "), "Alva");
    }
}
