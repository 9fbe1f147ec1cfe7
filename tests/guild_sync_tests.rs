// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Nickname and role fan-out across guilds.

use scoutid_linked_roles::models::{MetadataField, RoleMetadata};
use scoutid_linked_roles::services::GuildSync;
use serde_json::json;
use std::collections::BTreeMap;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

mod common;
use common::{TestEnv, DISCORD_USER_ID};

fn leader() -> RoleMetadata {
    RoleMetadata {
        participant: true,
        leader: true,
        ..RoleMetadata::default()
    }
}

#[tokio::test]
async fn one_forbidden_guild_does_not_stop_the_others() {
    let env = TestEnv::start().await;
    env.seed_discord_tokens(DISCORD_USER_ID, common::in_an_hour())
        .await;
    Mock::given(method("GET"))
        .and(path("/users/@me/guilds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "g1", "name": "Jamboree"},
            {"id": "g2", "name": "Elsewhere"},
            {"id": "g3", "name": "Patrol"}
        ])))
        .expect(1)
        .mount(&env.discord)
        .await;
    for guild in ["g1", "g3"] {
        Mock::given(method("PATCH"))
            .and(path(format!("/guilds/{guild}/members/42")))
            .and(header("authorization", "Bot test_bot_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&env.discord)
            .await;
    }
    Mock::given(method("PATCH"))
        .and(path("/guilds/g2/members/42"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "Missing Permissions", "code": 50013
        })))
        .expect(1)
        .mount(&env.discord)
        .await;

    let sync = GuildSync::new(env.discord_service(), None, BTreeMap::new());
    let summary = sync
        .sync_member(DISCORD_USER_ID, "Alva Andersson", &leader())
        .await;

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].guild_id, "g2");
}

#[tokio::test]
async fn pinned_guild_skips_guild_listing_and_truncates_nickname() {
    let env = TestEnv::start().await;
    Mock::given(method("PATCH"))
        .and(path("/guilds/pinned/members/42"))
        .and(body_json(json!({"nick": "Maximiliana Charlotta Gyllenstie"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&env.discord)
        .await;

    let sync = GuildSync::new(
        env.discord_service(),
        Some("pinned".to_string()),
        BTreeMap::new(),
    );
    let summary = sync
        .sync_member(
            DISCORD_USER_ID,
            "Maximiliana Charlotta Gyllenstierna af Lundholm",
            &leader(),
        )
        .await;

    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.succeeded, 1);
    // No user token needed: the guild list was never fetched.
    assert_eq!(TestEnv::request_count(&env.discord).await, 1);
}

#[tokio::test]
async fn mapped_roles_are_granted_for_set_flags_only() {
    let env = TestEnv::start().await;
    Mock::given(method("PATCH"))
        .and(path("/guilds/g1/members/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&env.discord)
        .await;
    Mock::given(method("GET"))
        .and(path("/guilds/g1/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "r-leader", "name": "Ledare"},
            {"id": "r-ist", "name": "IST"}
        ])))
        .expect(1)
        .mount(&env.discord)
        .await;
    Mock::given(method("PUT"))
        .and(path("/guilds/g1/members/42/roles/r-leader"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&env.discord)
        .await;
    Mock::given(method("PUT"))
        .and(path("/guilds/g1/members/42/roles/r-ist"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&env.discord)
        .await;

    let roles = BTreeMap::from([
        (MetadataField::Leader, "Ledare".to_string()),
        (MetadataField::Ist, "IST".to_string()),
    ]);
    let sync = GuildSync::new(env.discord_service(), Some("g1".to_string()), roles);
    let summary = sync.sync_member(DISCORD_USER_ID, "Alva", &leader()).await;

    assert_eq!(summary.succeeded, 1);
    assert!(summary.failures.is_empty());
}

#[tokio::test]
async fn unknown_role_name_is_reported_as_failure() {
    let env = TestEnv::start().await;
    Mock::given(method("PATCH"))
        .and(path("/guilds/g1/members/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&env.discord)
        .await;
    Mock::given(method("GET"))
        .and(path("/guilds/g1/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&env.discord)
        .await;

    let roles = BTreeMap::from([(MetadataField::Leader, "Ledare".to_string())]);
    let sync = GuildSync::new(env.discord_service(), Some("g1".to_string()), roles);
    let summary = sync.sync_member(DISCORD_USER_ID, "Alva", &leader()).await;

    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.succeeded, 0);
    assert!(summary.failures[0].reason.contains("Ledare"));
}

#[tokio::test]
async fn guild_listing_failure_yields_empty_summary() {
    let env = TestEnv::start().await;

    // No Discord tokens stored for the user.
    let sync = GuildSync::new(env.discord_service(), None, BTreeMap::new());
    let summary = sync.sync_member(DISCORD_USER_ID, "Alva", &leader()).await;

    assert_eq!(summary, Default::default());
}

#[tokio::test]
async fn refused_nickname_still_grants_roles() {
    let env = TestEnv::start().await;
    Mock::given(method("PATCH"))
        .and(path("/guilds/g1/members/42"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "Missing Permissions", "code": 50013
        })))
        .expect(1)
        .mount(&env.discord)
        .await;
    Mock::given(method("GET"))
        .and(path("/guilds/g1/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "r-leader", "name": "Ledare"}
        ])))
        .mount(&env.discord)
        .await;
    Mock::given(method("PUT"))
        .and(path("/guilds/g1/members/42/roles/r-leader"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&env.discord)
        .await;

    let roles = BTreeMap::from([(MetadataField::Leader, "Ledare".to_string())]);
    let sync = GuildSync::new(env.discord_service(), Some("g1".to_string()), roles);
    let summary = sync.sync_member(DISCORD_USER_ID, "Alva", &leader()).await;

    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].reason.starts_with("nickname:"));
}

#[tokio::test]
async fn missing_role_does_not_skip_the_rest() {
    let env = TestEnv::start().await;
    Mock::given(method("PATCH"))
        .and(path("/guilds/g1/members/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&env.discord)
        .await;
    Mock::given(method("GET"))
        .and(path("/guilds/g1/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "r-ist", "name": "IST"}
        ])))
        .mount(&env.discord)
        .await;
    Mock::given(method("PUT"))
        .and(path("/guilds/g1/members/42/roles/r-ist"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&env.discord)
        .await;

    let metadata = RoleMetadata {
        participant: true,
        leader: true,
        ist: true,
        ..RoleMetadata::default()
    };
    let roles = BTreeMap::from([
        (MetadataField::Leader, "Ledare".to_string()),
        (MetadataField::Ist, "IST".to_string()),
    ]);
    let sync = GuildSync::new(env.discord_service(), Some("g1".to_string()), roles);
    let summary = sync.sync_member(DISCORD_USER_ID, "Alva", &metadata).await;

    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].reason.contains("Ledare"));
    assert!(!summary.failures[0].reason.contains("IST"));
}
