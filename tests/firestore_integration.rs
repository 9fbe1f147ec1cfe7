// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore credential store tests.
//!
//! These tests require the Firestore emulator to be running
//! (`FIRESTORE_EMULATOR_HOST`); they are skipped otherwise.

use chrono::{Duration as ChronoDuration, Utc};
use scoutid_linked_roles::db::{CredentialStore, FirestoreStore, KeyValueStore};
use scoutid_linked_roles::models::{DiscordTokenSet, LinkState};
use std::sync::Arc;
use std::time::Duration;

mod common;

/// Unique key suffix for test isolation.
fn unique_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos()
        .to_string()
}

async fn test_store() -> FirestoreStore {
    FirestoreStore::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

#[tokio::test]
async fn test_raw_set_get_delete() {
    require_emulator!();
    let store = test_store().await;
    let key = format!("raw-{}", unique_id());

    store.set(&key, "hello".to_string(), None).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("hello"));

    store.delete(&key).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), None);
}

#[tokio::test]
async fn test_expired_entry_reads_as_miss() {
    require_emulator!();
    let store = test_store().await;
    let key = format!("ttl-{}", unique_id());

    store
        .set(&key, "short".to_string(), Some(Duration::from_secs(1)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(store.get(&key).await.unwrap(), None);
}

#[tokio::test]
async fn test_credential_store_over_firestore() {
    require_emulator!();
    let store = CredentialStore::new(Arc::new(test_store().await), Duration::from_secs(3600));
    let user_id = unique_id();

    let tokens = DiscordTokenSet {
        access_token: "a".to_string(),
        refresh_token: "r".to_string(),
        expires_at: Utc::now() + ChronoDuration::hours(1),
    };
    store.set_discord_tokens(&user_id, &tokens).await.unwrap();
    let loaded = store.get_discord_tokens(&user_id).await.unwrap().unwrap();
    assert_eq!(loaded.access_token, "a");

    let state = LinkState {
        discord_user_id: user_id.clone(),
        code_verifier: "v".to_string(),
        nonce: "n".to_string(),
    };
    store.put_link_state(&user_id, &state).await.unwrap();
    assert_eq!(store.take_link_state(&user_id).await.unwrap(), Some(state));
    assert_eq!(store.take_link_state(&user_id).await.unwrap(), None);

    store.set_identity_link(&user_id, "subject").await.unwrap();
    assert_eq!(
        store.get_identity_link(&user_id).await.unwrap().as_deref(),
        Some("subject")
    );
    store.delete_identity_link(&user_id).await.unwrap();
    store.delete_discord_tokens(&user_id).await.unwrap();
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_purge_removes_unread_expired_entries() {
    require_emulator!();
    let store = test_store().await;
    let abandoned = format!("state-{}", unique_id());
    let kept = format!("discord-link-{}", unique_id());

    store
        .set(&abandoned, "pending".to_string(), Some(Duration::from_secs(1)))
        .await
        .unwrap();
    store.set(&kept, "subject".to_string(), None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2100)).await;

    assert!(store.purge_expired().await.unwrap() >= 1);

    assert_eq!(store.get(&abandoned).await.unwrap(), None);
    assert_eq!(store.get(&kept).await.unwrap().as_deref(), Some("subject"));
    store.delete(&kept).await.unwrap();
}
