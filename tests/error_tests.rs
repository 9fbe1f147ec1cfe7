// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{http::StatusCode, response::IntoResponse};
use scoutid_linked_roles::error::{AppError, Provider};
use serde_json::Value;

async fn render(err: AppError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_verification_failures_are_forbidden() {
    for (err, code) in [
        (AppError::StateMismatch, "state_mismatch"),
        (AppError::LinkExpired, "link_expired"),
        (
            AppError::IdTokenRejected("nonce mismatch".to_string()),
            "id_token_rejected",
        ),
    ] {
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], code);
        assert!(body.get("details").is_none());
    }
}

#[tokio::test]
async fn test_bad_request_carries_details() {
    let (status, body) = render(AppError::BadRequest("missing userId".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert_eq!(body["details"], "missing userId");
}

#[tokio::test]
async fn test_upstream_failures_are_opaque() {
    for err in [
        AppError::Upstream {
            provider: Provider::Discord,
            status: Some(403),
            message: "secret upstream detail".to_string(),
        },
        AppError::RateLimited(Provider::Scoutnet),
        AppError::Store("connection reset".to_string()),
        AppError::Internal(anyhow::anyhow!("boom")),
    ] {
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal_error");
        assert!(body.get("details").is_none());
    }
}

#[tokio::test]
async fn test_reauthorization_and_unauthorized() {
    let (status, body) = render(AppError::ReauthorizationRequired {
        provider: Provider::Discord,
        key: "42".to_string(),
    })
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "reauthorization_required");

    let (status, _) = render(AppError::Unauthorized).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[test]
fn test_upstream_status() {
    assert_eq!(
        AppError::upstream(Provider::ScoutId, "timeout").upstream_status(),
        None
    );
    assert_eq!(
        AppError::RateLimited(Provider::Discord).upstream_status(),
        Some(429)
    );
    assert_eq!(AppError::LinkExpired.upstream_status(), None);
    assert_eq!(Provider::ScoutId.to_string(), "ScoutID");
}
