// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed credential store.
//!
//! Each key is one document in the `credential_store` collection. Firestore
//! has no per-document expiry on reads, so the expiry time is stored next to
//! the value and expired documents are treated as misses (and deleted).
//! Documents nobody reads again are removed by `purge_expired`.

use crate::db::KeyValueStore;
use crate::error::AppError;
use crate::time_utils::format_utc_rfc3339;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const COLLECTION: &str = "credential_store";

/// Stored document shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredValue {
    value: String,
    /// RFC3339; absent for entries without a TTL.
    #[serde(default)]
    expires_at: Option<String>,
}

/// Just the document id, for purging.
#[derive(Debug, Deserialize)]
struct StoredKey {
    #[serde(alias = "_firestore_id")]
    id: Option<String>,
}

impl StoredValue {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .as_deref()
            .and_then(|at| DateTime::parse_from_rfc3339(at).ok())
            .is_some_and(|at| now >= at.with_timezone(&Utc))
    }
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: firestore::FirestoreDb,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Store(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| AppError::Store(format!("Failed to connect to Firestore Emulator: {}", e)))?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }
}

#[async_trait]
impl KeyValueStore for FirestoreStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let stored: Option<StoredValue> = self
            .client
            .fluent()
            .select()
            .by_id_in(COLLECTION)
            .obj()
            .one(key)
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        match stored {
            Some(doc) if doc.is_expired(Utc::now()) => {
                tracing::debug!(key, "Dropping expired store entry");
                if let Err(e) = self.delete(key).await {
                    tracing::warn!(error = %e, key, "Failed to delete expired store entry");
                }
                Ok(None)
            }
            Some(doc) => Ok(Some(doc.value)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), AppError> {
        let expires_at = match ttl {
            Some(ttl) => {
                let ttl = chrono::Duration::from_std(ttl)
                    .map_err(|e| AppError::Store(format!("TTL out of range: {e}")))?;
                Some(format_utc_rfc3339(Utc::now() + ttl))
            }
            None => None,
        };

        let doc = StoredValue { value, expires_at };

        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(COLLECTION)
            .document_id(key)
            .object(&doc)
            .execute()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .fluent()
            .delete()
            .from(COLLECTION)
            .document_id(key)
            .execute()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, AppError> {
        // Fixed-width `Z` timestamps order correctly as strings; documents
        // without an expiry hold null and never match a string range.
        let now = format_utc_rfc3339(Utc::now());
        let expired: Vec<StoredKey> = self
            .client
            .fluent()
            .select()
            .fields(["expires_at"])
            .from(COLLECTION)
            .filter(move |q| q.field("expires_at").less_than_or_equal(now.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        let mut purged = 0;
        for key in expired.into_iter().filter_map(|doc| doc.id) {
            self.delete(&key).await?;
            purged += 1;
        }
        Ok(purged)
    }

    async fn close(&self) -> Result<(), AppError> {
        // The gRPC channel is dropped with the client; nothing to flush.
        tracing::info!("Firestore store closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_value_expiry() {
        let now = Utc::now();
        let live = StoredValue {
            value: "v".to_string(),
            expires_at: Some(format_utc_rfc3339(now + chrono::Duration::minutes(5))),
        };
        let dead = StoredValue {
            value: "v".to_string(),
            expires_at: Some(format_utc_rfc3339(now - chrono::Duration::minutes(5))),
        };
        let forever = StoredValue {
            value: "v".to_string(),
            expires_at: None,
        };

        assert!(!live.is_expired(now));
        assert!(dead.is_expired(now));
        assert!(!forever.is_expired(now));
    }
}
