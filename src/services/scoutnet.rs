// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ScoutNet project participant lookups.

use crate::config::Config;
use crate::error::{AppError, Provider};
use crate::models::scoutnet::ParticipantsResponse;
use crate::models::Participant;
use crate::services::http::{read_json, send_with_retry, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

#[derive(Clone)]
struct CachedParticipants {
    response: Arc<ParticipantsResponse>,
    fetched_at: Instant,
}

/// Client for the ScoutNet participants endpoint.
///
/// The whole participant list is fetched at once and kept for `cache_ttl`,
/// so a burst of syncs costs one upstream request.
pub struct ScoutnetClient {
    http: reqwest::Client,
    url: String,
    project_id: String,
    api_key: String,
    cache_ttl: Duration,
    retry: RetryPolicy,
    cache: RwLock<Option<CachedParticipants>>,
    refresh_lock: Mutex<()>,
}

impl ScoutnetClient {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            url: format!(
                "{}/api/project/get/participants",
                config.scoutnet_api_base.trim_end_matches('/')
            ),
            project_id: config.scoutnet_project_id.clone(),
            api_key: config.scoutnet_api_key.clone(),
            cache_ttl: config.scoutnet_cache_ttl,
            retry: config.retry_policy,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Participant record for a member number; `None` if not registered.
    pub async fn participant(&self, member_no: &str) -> Result<Option<Participant>, AppError> {
        let participants = self.participants().await?;
        Ok(participants.participants.get(member_no).cloned())
    }

    async fn participants(&self) -> Result<Arc<ParticipantsResponse>, AppError> {
        if let Some(fresh) = self.cached().await {
            return Ok(fresh);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another task may have refreshed while we waited.
        if let Some(fresh) = self.cached().await {
            return Ok(fresh);
        }

        tracing::debug!(project_id = %self.project_id, "Fetching ScoutNet participants");

        let response = send_with_retry(&self.retry, Provider::Scoutnet, || {
            self.http
                .get(&self.url)
                .query(&[("id", self.project_id.as_str())])
                .basic_auth(&self.project_id, Some(&self.api_key))
        })
        .await?;
        let participants: Arc<ParticipantsResponse> =
            Arc::new(read_json(Provider::Scoutnet, response).await?);

        tracing::info!(
            count = participants.participants.len(),
            "ScoutNet participants refreshed"
        );

        *self.cache.write().await = Some(CachedParticipants {
            response: participants.clone(),
            fetched_at: Instant::now(),
        });
        Ok(participants)
    }

    async fn cached(&self) -> Option<Arc<ParticipantsResponse>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < self.cache_ttl)
            .map(|entry| entry.response.clone())
    }
}
