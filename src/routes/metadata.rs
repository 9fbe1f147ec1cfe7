// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! On-demand metadata re-sync (`/update-metadata`).
//!
//! Called by a webhook or cron job with a Discord user id. The id may come in
//! the query string, a JSON body, or a form body.

use axum::{
    extract::{FromRequest, Query, Request, State},
    http::{header, StatusCode},
    routing::get,
    Form, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::{Validate, ValidationError};

use crate::error::{AppError, Result};
use crate::middleware::require_sync_token;
use crate::AppState;

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/update-metadata",
            get(update_metadata_get).post(update_metadata_post),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            require_sync_token,
        ))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserIdParams {
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
}

/// A validated sync request.
#[derive(Debug, Validate)]
pub struct SyncRequest {
    #[validate(length(min = 1, max = 32), custom(function = "validate_snowflake"))]
    pub user_id: String,
}

fn validate_snowflake(id: &str) -> std::result::Result<(), ValidationError> {
    if id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("snowflake").with_message("userId must be numeric".into()))
    }
}

impl SyncRequest {
    fn parse(user_id: Option<String>) -> Result<Self> {
        let user_id =
            user_id.ok_or_else(|| AppError::BadRequest("missing userId".to_string()))?;
        let request = Self {
            user_id: user_id.trim().to_string(),
        };
        request
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(request)
    }
}

async fn update_metadata_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserIdParams>,
) -> Result<StatusCode> {
    let request = SyncRequest::parse(params.user_id)?;
    run_sync(&state, &request.user_id).await
}

async fn update_metadata_post(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<StatusCode> {
    let from_query = Query::<UserIdParams>::try_from_uri(request.uri())
        .map(|Query(params)| params.user_id)
        .unwrap_or_default();

    let user_id = match from_query {
        Some(id) => Some(id),
        None => user_id_from_body(request).await?,
    };

    let request = SyncRequest::parse(user_id)?;
    run_sync(&state, &request.user_id).await
}

async fn user_id_from_body(request: Request) -> Result<Option<String>> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/json") {
        let Json(params) = Json::<UserIdParams>::from_request(request, &())
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(params.user_id)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(params) = Form::<UserIdParams>::from_request(request, &())
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(params.user_id)
    } else {
        Ok(None)
    }
}

async fn run_sync(state: &AppState, user_id: &str) -> Result<StatusCode> {
    let outcome = state.metadata.sync(user_id).await?;
    tracing::info!(user_id, outcome = ?outcome, "On-demand metadata sync finished");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_snowflakes() {
        let request = SyncRequest::parse(Some(" 80351110224678912 ".to_string())).unwrap();
        assert_eq!(request.user_id, "80351110224678912");
    }

    #[test]
    fn rejects_non_numeric_or_oversized_ids() {
        for bad in ["", "abc", "12a4", "1234567890123456789012345678901234"] {
            assert!(
                matches!(
                    SyncRequest::parse(Some(bad.to_string())),
                    Err(AppError::BadRequest(_))
                ),
                "{bad:?} should be rejected"
            );
        }
        assert!(SyncRequest::parse(None).is_err());
    }
}
