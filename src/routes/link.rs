// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Linking flow routes: `/linked-role` and the two provider callbacks.

use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Provider, Result};
use crate::services::oauth_state::{STATE_COOKIE_MAX_AGE_SECS, STATE_COOKIE_NAME};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/linked-role", get(begin_link))
        .route("/discord-oauth-callback", get(discord_callback))
        .route("/scoutid-oauth-callback", get(scoutid_callback))
}

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Account linked</title>
<style>
body { font-family: system-ui, sans-serif; display: flex; align-items: center; justify-content: center; min-height: 100vh; margin: 0; background: #f4f6fb; color: #1f2330; }
main { text-align: center; padding: 2rem 3rem; background: #fff; border-radius: 12px; box-shadow: 0 2px 12px rgba(0, 0, 0, 0.08); }
</style>
</head>
<body>
<main>
<h1>Account linked</h1>
<p>Your ScoutID is now connected. You can close this window and return to Discord.</p>
</main>
</body>
</html>
"#;

/// Query parameters of an OAuth2/OIDC redirect back to us.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl CallbackParams {
    /// `(code, state)`, or 400 if the provider reported an error or left one out.
    fn into_code_and_state(self, provider: Provider) -> Result<(String, String)> {
        if let Some(error) = self.error {
            tracing::warn!(%provider, error = %error, "Authorization denied or failed");
            return Err(AppError::BadRequest(format!(
                "{provider} authorization failed: {error}"
            )));
        }

        match (self.code, self.state) {
            (Some(code), Some(state)) if !code.is_empty() && !state.is_empty() => {
                Ok((code, state))
            }
            _ => Err(AppError::BadRequest(
                "missing code or state parameter".to_string(),
            )),
        }
    }
}

fn state_cookie(state: &AppState, value: String) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.secure_cookies())
        .max_age(time::Duration::seconds(STATE_COOKIE_MAX_AGE_SECS))
        .build()
}

/// Reject the callback unless the signed cookie carries exactly `returned_state`.
fn verify_state_cookie(state: &AppState, jar: &CookieJar, returned_state: &str) -> Result<()> {
    let cookie = jar.get(STATE_COOKIE_NAME).map(|c| c.value());
    if state
        .state_signer
        .matches(cookie, returned_state, Utc::now())
    {
        Ok(())
    } else {
        Err(AppError::StateMismatch)
    }
}

/// Start the flow: set the correlation cookie and redirect to Discord.
async fn begin_link(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let redirect = state.linker.begin()?;
    let cookie = state.state_signer.sign(&redirect.state, Utc::now())?;

    tracing::info!("Starting link flow, redirecting to Discord");
    Ok((
        jar.add(state_cookie(&state, cookie)),
        Redirect::temporary(&redirect.url),
    ))
}

/// Discord leg done: store Discord tokens and redirect to ScoutID.
async fn discord_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    let (code, returned_state) = params.into_code_and_state(Provider::Discord)?;
    verify_state_cookie(&state, &jar, &returned_state)?;

    let redirect = state.linker.complete_discord(&code).await?;
    let cookie = state.state_signer.sign(&redirect.state, Utc::now())?;

    Ok((
        jar.add(state_cookie(&state, cookie)),
        Redirect::temporary(&redirect.url),
    ))
}

/// ScoutID leg done: link identities, sync, and show the success page.
async fn scoutid_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Html<&'static str>)> {
    let (code, returned_state) = params.into_code_and_state(Provider::ScoutId)?;
    verify_state_cookie(&state, &jar, &returned_state)?;

    let outcome = state.linker.complete_scoutid(&code, &returned_state).await?;

    tracing::info!(
        discord_user_id = %outcome.discord_user_id,
        subject = %outcome.scoutid_subject,
        sync = ?outcome.sync,
        guilds_succeeded = outcome.guilds.succeeded,
        "Link flow complete"
    );

    let removal = Cookie::build(STATE_COOKIE_NAME)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.secure_cookies());
    Ok((jar.remove(removal), Html(SUCCESS_PAGE)))
}
