// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Remote services the linking flow talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Discord,
    ScoutId,
    Scoutnet,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Discord => "Discord",
            Provider::ScoutId => "ScoutID",
            Provider::Scoutnet => "ScoutNet",
        })
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    /// The signed correlation cookie is missing, expired, tampered with,
    /// or does not match the `state` returned by the provider.
    #[error("OAuth state mismatch")]
    StateMismatch,

    /// No pending link request exists for the returned `state`.
    #[error("Link request expired or unknown")]
    LinkExpired,

    #[error("ID token rejected: {0}")]
    IdTokenRejected(String),

    /// Stored tokens are gone; the user has to run the linking flow again.
    #[error("{provider} re-authorization required for {key}")]
    ReauthorizationRequired { provider: Provider, key: String },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{provider} API error (status {status:?}): {message}")]
    Upstream {
        provider: Provider,
        status: Option<u16>,
        message: String,
    },

    #[error("{0} rate limit exceeded")]
    RateLimited(Provider),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for an upstream failure without an HTTP status (transport, parse).
    pub fn upstream(provider: Provider, message: impl Into<String>) -> Self {
        AppError::Upstream {
            provider,
            status: None,
            message: message.into(),
        }
    }

    /// HTTP status reported by the provider, if this is an upstream failure.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            AppError::Upstream { status, .. } => *status,
            AppError::RateLimited(_) => Some(429),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::RateLimited(_))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::StateMismatch => {
                tracing::warn!("Rejected callback: OAuth state mismatch");
                (StatusCode::FORBIDDEN, "state_mismatch", None)
            }
            AppError::LinkExpired => {
                tracing::warn!("Rejected callback: link request expired or unknown");
                (StatusCode::FORBIDDEN, "link_expired", None)
            }
            AppError::IdTokenRejected(reason) => {
                tracing::warn!(reason = %reason, "Rejected ScoutID ID token");
                (StatusCode::FORBIDDEN, "id_token_rejected", None)
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::ReauthorizationRequired { provider, key } => {
                tracing::warn!(%provider, key = %key, "Stored tokens missing, re-authorization required");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "reauthorization_required",
                    None,
                )
            }
            AppError::Upstream { .. } | AppError::RateLimited(_) => {
                tracing::error!(error = %self, "Upstream provider error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Store(msg) => {
                tracing::error!(error = %msg, "Store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
