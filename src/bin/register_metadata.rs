// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Register the role connection metadata schema with Discord.
//!
//! Run once per application, and again whenever the schema changes.

use anyhow::Context;
use scoutid_linked_roles::{
    config::Config,
    models::metadata::metadata_schema,
    services::{http::build_http_client, DiscordClient},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    let client = DiscordClient::new(&config, build_http_client()?);

    let schema = metadata_schema();
    tracing::info!(
        application = %config.discord_client_id,
        fields = schema.len(),
        "Registering role connection metadata"
    );

    let registered = client
        .register_metadata_schema(&schema)
        .await
        .context("Discord rejected the metadata schema")?;

    println!("{}", serde_json::to_string_pretty(&registered)?);
    Ok(())
}
