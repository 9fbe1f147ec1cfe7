// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer-token guard for the metadata webhook.

use crate::error::AppError;
use crate::services::oauth_state::tokens_match;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Require `Authorization: Bearer <METADATA_WEBHOOK_TOKEN>` when a token is
/// configured. Without one the route is open.
pub async fn require_sync_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config.metadata_webhook_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match presented {
        Some(token) if tokens_match(token.trim(), expected) => Ok(next.run(request).await),
        _ => {
            tracing::warn!("Rejected metadata sync request without valid bearer token");
            Err(AppError::Unauthorized)
        }
    }
}
