// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ScoutID linked roles: link a Discord account to ScoutID and publish
//! ScoutNet-derived role connection metadata to Discord.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::CredentialStore;
use error::AppError;
use services::{
    DiscordClient, DiscordService, GuildSync, IdTokenVerifier, LinkService, MetadataService,
    ScoutIdClient, ScoutIdService, ScoutnetClient, StateSigner,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: CredentialStore,
    pub state_signer: StateSigner,
    pub linker: LinkService,
    pub metadata: MetadataService,
}

impl AppState {
    /// Wire the services around an already-opened store and a discovered
    /// ScoutID client.
    pub fn new(
        config: Config,
        store: CredentialStore,
        http: reqwest::Client,
        scoutid_client: ScoutIdClient,
        id_token_verifier: Arc<IdTokenVerifier>,
    ) -> Result<Self, AppError> {
        let state_signer = StateSigner::new(&config.cookie_secret)?;

        let discord = DiscordService::new(DiscordClient::new(&config, http.clone()), store.clone());
        let scoutid = ScoutIdService::new(scoutid_client, store.clone(), id_token_verifier);
        let scoutnet = Arc::new(ScoutnetClient::new(&config, http));

        let metadata = MetadataService::new(
            store.clone(),
            discord.clone(),
            scoutid.clone(),
            scoutnet,
            config.scoutnet_questions.clone(),
        );
        let guilds = GuildSync::new(
            discord.clone(),
            config.discord_guild_id.clone(),
            config.discord_role_names.clone(),
        );
        let linker = LinkService::new(store.clone(), discord, scoutid, metadata.clone(), guilds);

        Ok(Self {
            config,
            store,
            state_signer,
            linker,
            metadata,
        })
    }
}
