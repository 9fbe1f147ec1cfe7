// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Correlation tokens, PKCE pairs, and the signed state cookie.
//!
//! The browser carries the current correlation token in a short-lived cookie
//! whose value is `base64url(token|issued_at_hex|hmac_hex)`. A callback is only
//! accepted when that cookie verifies and its token equals the `state`
//! parameter the provider sent back.

use crate::error::AppError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Name of the correlation cookie.
pub const STATE_COOKIE_NAME: &str = "link_state";

/// How long a correlation cookie is honoured.
pub const STATE_COOKIE_MAX_AGE_SECS: i64 = 5 * 60;

/// Tolerated clock skew for cookies issued "in the future".
const CLOCK_SKEW_SECS: i64 = 60;

const COOKIE_KEY_INFO: &[u8] = b"link-state-cookie";

/// 32 random bytes, base64url without padding (43 characters).
pub fn random_token() -> Result<String, AppError> {
    let mut bytes = [0u8; 32];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG failure")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// PKCE S256 challenge for a verifier.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// PKCE verifier and its S256 challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    pub fn generate() -> Result<Self, AppError> {
        let verifier = random_token()?;
        let challenge = code_challenge(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }
}

/// Constant-time string equality.
pub fn tokens_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Signs and verifies correlation cookie values.
#[derive(Clone)]
pub struct StateSigner {
    key: [u8; 32],
}

impl StateSigner {
    /// Derive the cookie MAC key from the configured secret.
    pub fn new(secret: &[u8]) -> Result<Self, AppError> {
        let mut key = [0u8; 32];
        Hkdf::<Sha256>::new(None, secret)
            .expand(COOKIE_KEY_INFO, &mut key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HKDF expand failed: {e}")))?;
        Ok(Self { key })
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256, AppError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    /// Cookie value carrying `token`.
    pub fn sign(&self, token: &str, issued_at: DateTime<Utc>) -> Result<String, AppError> {
        let payload = format!("{}|{:x}", token, issued_at.timestamp());
        let signature = hex::encode(self.mac(&payload)?.finalize().into_bytes());
        Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
    }

    /// Token inside a cookie value, if the signature holds and it is not stale.
    pub fn verify(&self, cookie: &str, now: DateTime<Utc>) -> Option<String> {
        let bytes = URL_SAFE_NO_PAD.decode(cookie).ok()?;
        let decoded = String::from_utf8(bytes).ok()?;

        // Format is "token|issued_at_hex|signature_hex"
        let parts: Vec<&str> = decoded.splitn(3, '|').collect();
        let [token, issued_hex, signature_hex] = parts.as_slice() else {
            return None;
        };

        let signature = hex::decode(signature_hex).ok()?;
        let payload = format!("{}|{}", token, issued_hex);
        if self.mac(&payload).ok()?.verify_slice(&signature).is_err() {
            tracing::warn!("State cookie signature mismatch");
            return None;
        }

        let issued_at = i64::from_str_radix(issued_hex, 16).ok()?;
        let age = now.timestamp() - issued_at;
        if age > STATE_COOKIE_MAX_AGE_SECS || age < -CLOCK_SKEW_SECS {
            tracing::info!(age_secs = age, "State cookie expired");
            return None;
        }

        Some(token.to_string())
    }

    /// True when `cookie` verifies and carries exactly `returned_state`.
    pub fn matches(&self, cookie: Option<&str>, returned_state: &str, now: DateTime<Utc>) -> bool {
        cookie
            .and_then(|c| self.verify(c, now))
            .is_some_and(|token| tokens_match(&token, returned_state))
    }
}
