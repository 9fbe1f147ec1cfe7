// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared harness: the real router wired to wiremock fakes of Discord,
//! ScoutID and ScoutNet, over an in-memory credential store.

#![allow(dead_code)]

use axum::{body::Body, http::Request, response::Response, Router};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use scoutid_linked_roles::config::Config;
use scoutid_linked_roles::db::{CredentialStore, MemoryStore};
use scoutid_linked_roles::models::{DiscordTokenSet, QuestionMap, ScoutIdTokenSet};
use scoutid_linked_roles::routes::create_router;
use scoutid_linked_roles::services::http::build_http_client;
use scoutid_linked_roles::services::{
    DiscordClient, DiscordService, IdTokenVerifier, ProviderMetadata, ScoutIdClient,
    ScoutIdService,
};
use scoutid_linked_roles::AppState;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::MockServer;

pub const ID_TOKEN_SECRET: &[u8] = b"integration-id-token-secret";

pub const DISCORD_USER_ID: &str = "42";
pub const SCOUTID_SUBJECT: &str = "3001234";

pub const QUESTIONS: &str = r#"[
    {"question_id": "101", "field": "leader", "true_answer": "1"},
    {"question_id": "102", "field": "ist", "true_answer": "1"},
    {"question_id": "103", "field": "troop"},
    {"question_id": "104", "field": "patrol"}
]"#;

/// Check if emulator is available via environment variable.
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

pub struct TestEnv {
    pub discord: MockServer,
    pub scoutid: MockServer,
    pub scoutnet: MockServer,
    pub memory: Arc<MemoryStore>,
    pub store: CredentialStore,
    pub state: Arc<AppState>,
    pub app: Router,
}

impl TestEnv {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start the fakes and build the app; `customize` may adjust the config.
    pub async fn start_with(customize: impl FnOnce(&mut Config)) -> Self {
        let discord = MockServer::start().await;
        let scoutid = MockServer::start().await;
        let scoutnet = MockServer::start().await;

        let mut config = Config::test_default();
        config.discord_api_base = discord.uri();
        config.scoutid_issuer = scoutid.uri();
        config.scoutnet_api_base = scoutnet.uri();
        config.scoutnet_questions = QuestionMap::from_json(QUESTIONS).unwrap();
        customize(&mut config);

        let memory = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(memory.clone(), config.discord_token_retention);

        let http = build_http_client().unwrap();
        let scoutid_client = ScoutIdClient::with_metadata(
            &config,
            http.clone(),
            ProviderMetadata::for_issuer(&scoutid.uri()),
        );
        let verifier = Arc::new(IdTokenVerifier::new_with_static_key(
            scoutid.uri(),
            config.scoutid_client_id.clone(),
            Algorithm::HS256,
            DecodingKey::from_secret(ID_TOKEN_SECRET),
        ));

        let state = Arc::new(
            AppState::new(config, store.clone(), http, scoutid_client, verifier).unwrap(),
        );
        let app = create_router(state.clone());

        Self {
            discord,
            scoutid,
            scoutnet,
            memory,
            store,
            state,
            app,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// `Cookie` header value carrying a freshly signed correlation cookie.
    pub fn cookie_for(&self, token: &str) -> String {
        let value = self.state.state_signer.sign(token, Utc::now()).unwrap();
        format!("link_state={value}")
    }

    /// An ID token as ScoutID would issue it.
    pub fn id_token(&self, subject: &str, nonce: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &json!({
                "iss": self.scoutid.uri(),
                "aud": self.state.config.scoutid_client_id,
                "sub": subject,
                "nonce": nonce,
                "iat": Utc::now().timestamp(),
                "exp": (Utc::now() + Duration::minutes(10)).timestamp(),
            }),
            &EncodingKey::from_secret(ID_TOKEN_SECRET),
        )
        .unwrap()
    }

    pub fn discord_service(&self) -> DiscordService {
        let client = DiscordClient::new(&self.state.config, build_http_client().unwrap());
        DiscordService::new(client, self.store.clone())
    }

    pub fn scoutid_service(&self) -> ScoutIdService {
        let http = build_http_client().unwrap();
        let client = ScoutIdClient::with_metadata(
            &self.state.config,
            http,
            ProviderMetadata::for_issuer(&self.scoutid.uri()),
        );
        let verifier = Arc::new(IdTokenVerifier::new_with_static_key(
            self.scoutid.uri(),
            self.state.config.scoutid_client_id.clone(),
            Algorithm::HS256,
            DecodingKey::from_secret(ID_TOKEN_SECRET),
        ));
        ScoutIdService::new(client, self.store.clone(), verifier)
    }

    pub async fn seed_discord_tokens(&self, user_id: &str, expires_at: DateTime<Utc>) {
        self.store
            .set_discord_tokens(
                user_id,
                &DiscordTokenSet {
                    access_token: "discord-access".to_string(),
                    refresh_token: "discord-refresh".to_string(),
                    expires_at,
                },
            )
            .await
            .unwrap();
    }

    /// Identity link plus a ScoutID token set, as a completed flow leaves them.
    pub async fn seed_link(&self, user_id: &str, subject: &str, expires_at: DateTime<Utc>) {
        self.store.set_identity_link(user_id, subject).await.unwrap();
        self.store
            .set_scoutid_tokens(
                subject,
                &ScoutIdTokenSet {
                    discord_user_id: user_id.to_string(),
                    access_token: "scoutid-access".to_string(),
                    refresh_token: "scoutid-refresh".to_string(),
                    expires_at,
                    code_verifier: "v".to_string(),
                },
            )
            .await
            .unwrap();
    }

    /// Number of requests a fake has seen.
    pub async fn request_count(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or_default()
    }
}

pub fn in_an_hour() -> DateTime<Utc> {
    Utc::now() + Duration::hours(1)
}

pub fn an_hour_ago() -> DateTime<Utc> {
    Utc::now() - Duration::hours(1)
}

/// ScoutNet participants payload with one registered leader in troop 12.
pub fn participants_body(member_no: &str) -> serde_json::Value {
    json!({
        "participants": {
            (member_no): {
                "member_no": member_no.parse::<u64>().unwrap(),
                "cancelled_date": null,
                "questions": {"101": "1", "102": "0", "103": "12"}
            }
        }
    })
}
