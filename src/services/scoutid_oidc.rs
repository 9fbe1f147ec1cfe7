// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ScoutID ID token verification.
//!
//! Checks signature (JWKS, cached), issuer, audience, expiry, and the nonce
//! that was sent with the authorization request.

use crate::error::{AppError, Provider};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

use crate::services::oauth_state::tokens_match;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Claims we rely on after validation.
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone)]
enum VerifierMode {
    Jwks {
        jwks_uri: String,
    },
    StaticKey {
        algorithm: Algorithm,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for ScoutID-issued ID tokens.
pub struct IdTokenVerifier {
    http_client: reqwest::Client,
    issuer: String,
    audience: String,
    mode: VerifierMode,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl IdTokenVerifier {
    /// Verifier that fetches RS256 keys from the provider's JWKS endpoint.
    pub fn new(
        http_client: reqwest::Client,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        jwks_uri: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            issuer: issuer.into(),
            audience: audience.into(),
            mode: VerifierMode::Jwks {
                jwks_uri: jwks_uri.into(),
            },
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Verifier with a fixed key, for deterministic local/integration tests.
    pub fn new_with_static_key(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        algorithm: Algorithm,
        decoding_key: DecodingKey,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            issuer: issuer.into(),
            audience: audience.into(),
            mode: VerifierMode::StaticKey {
                algorithm,
                decoding_key: Arc::new(decoding_key),
            },
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Validate `id_token` and check it was minted for `expected_nonce`.
    pub async fn verify(
        &self,
        id_token: &str,
        expected_nonce: &str,
    ) -> Result<IdTokenClaims, AppError> {
        let header = decode_header(id_token)
            .map_err(|e| AppError::IdTokenRejected(format!("invalid JWT header: {e}")))?;

        let (algorithm, decoding_key) = match &self.mode {
            VerifierMode::StaticKey {
                algorithm,
                decoding_key,
            } => (*algorithm, decoding_key.clone()),
            VerifierMode::Jwks { jwks_uri } => {
                if header.alg != Algorithm::RS256 {
                    return Err(AppError::IdTokenRejected(format!(
                        "unexpected JWT alg: {:?}",
                        header.alg
                    )));
                }
                let kid = header
                    .kid
                    .ok_or_else(|| AppError::IdTokenRejected("missing JWT kid".to_string()))?;
                (Algorithm::RS256, self.decoding_key_for_kid(jwks_uri, &kid).await?)
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<IdTokenClaims>(id_token, decoding_key.as_ref(), &validation)
            .map_err(|e| AppError::IdTokenRejected(format!("JWT validation failed: {e}")))?
            .claims;

        match claims.nonce.as_deref() {
            Some(nonce) if tokens_match(nonce, expected_nonce) => Ok(claims),
            Some(_) => Err(AppError::IdTokenRejected("nonce mismatch".to_string())),
            None => Err(AppError::IdTokenRejected("missing nonce claim".to_string())),
        }
    }

    async fn decoding_key_for_kid(
        &self,
        jwks_uri: &str,
        kid: &str,
    ) -> Result<Arc<DecodingKey>, AppError> {
        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(jwks_uri, force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(AppError::IdTokenRejected(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, jwks_uri: &str, force_refresh: bool) -> Result<(), AppError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(jwks_uri = %jwks_uri, "Refreshing ScoutID JWKS cache");

        let response = self
            .http_client
            .get(jwks_uri)
            .send()
            .await
            .map_err(|e| AppError::upstream(Provider::ScoutId, format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream {
                provider: Provider::ScoutId,
                status: Some(response.status().as_u16()),
                message: "JWKS request failed".to_string(),
            });
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AppError::upstream(Provider::ScoutId, format!("invalid JWKS JSON: {e}")))?;

        let keys_by_kid: HashMap<String, Arc<DecodingKey>> = jwks
            .keys
            .into_iter()
            .filter(|jwk| jwk.kty == "RSA" && !jwk.kid.trim().is_empty())
            .filter(|jwk| jwk.alg.as_deref().map_or(true, |alg| alg == "RS256"))
            .filter(|jwk| jwk.use_.as_deref().map_or(true, |use_| use_ == "sig"))
            .filter_map(|jwk| match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => Some((jwk.kid, Arc::new(key))),
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                    None
                }
            })
            .collect();

        if keys_by_kid.is_empty() {
            return Err(AppError::upstream(
                Provider::ScoutId,
                "JWKS response did not include any usable RSA keys",
            ));
        }

        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "ScoutID JWKS cache refreshed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    #[serde(default)]
    kid: String,
    kty: String,
    alg: Option<String>,
    #[serde(default)]
    n: String,
    #[serde(default)]
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value.split(',').find_map(|directive| {
        directive
            .trim()
            .strip_prefix("max-age=")
            .and_then(|raw| raw.trim_matches('"').parse().ok())
    })
}
