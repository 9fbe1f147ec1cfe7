// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Absolute expiry for a token that is valid for `expires_in` seconds from now.
pub fn expiry_from_now(expires_in: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(expires_in.max(0))
}
