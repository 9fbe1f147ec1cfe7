// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ScoutID linked roles server.
//!
//! Serves the Discord linked-role flow and the on-demand metadata webhook.

use anyhow::Context;
use scoutid_linked_roles::{
    config::{Config, StoreBackend},
    db::{CredentialStore, FirestoreStore, KeyValueStore, MemoryStore},
    services::{http::build_http_client, IdTokenVerifier, ScoutIdClient},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often the store drops expired entries nobody read.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!(port = config.port, "Starting ScoutID linked roles");

    let backend: Arc<dyn KeyValueStore> = match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory credential store");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Firestore => {
            let store = FirestoreStore::new(&config.gcp_project_id)
                .await
                .context("failed to connect to Firestore")?;
            tracing::info!(project = %config.gcp_project_id, "Using Firestore credential store");
            Arc::new(store)
        }
    };
    spawn_purge_task(backend.clone());
    let store = CredentialStore::new(backend, config.discord_token_retention);

    let http = build_http_client()?;
    let scoutid_client = ScoutIdClient::discover(&config, http.clone())
        .await
        .context("ScoutID discovery failed")?;
    let verifier = Arc::new(IdTokenVerifier::new(
        http.clone(),
        scoutid_client.metadata().issuer.clone(),
        config.scoutid_client_id.clone(),
        scoutid_client.metadata().jwks_uri.clone(),
    ));
    tracing::info!(
        questions = config.scoutnet_questions.rules().len(),
        pinned_guild = ?config.discord_guild_id,
        "Providers configured"
    );

    let port = config.port;
    let state = Arc::new(AppState::new(
        config,
        store.clone(),
        http,
        scoutid_client,
        verifier,
    )?);
    let app = scoutid_linked_roles::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server drained, closing credential store");
    store.close().await?;
    Ok(())
}

fn spawn_purge_task(store: Arc<dyn KeyValueStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "Purged expired store entries"),
                Err(e) => tracing::warn!(error = %e, "Failed to purge expired store entries"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scoutid_linked_roles=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
