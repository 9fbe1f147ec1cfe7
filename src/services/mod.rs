// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod discord;
pub mod guilds;
pub mod http;
pub mod linking;
pub mod metadata;
pub mod oauth_state;
pub mod scoutid;
pub mod scoutid_oidc;
pub mod scoutnet;

pub use discord::{DiscordClient, DiscordService};
pub use guilds::{GuildSync, GuildSyncSummary};
pub use linking::{AuthorizationRedirect, LinkOutcome, LinkService};
pub use metadata::{MetadataService, SyncOutcome};
pub use oauth_state::StateSigner;
pub use scoutid::{ProviderMetadata, ScoutIdClient, ScoutIdService};
pub use scoutid_oidc::IdTokenVerifier;
pub use scoutnet::ScoutnetClient;
