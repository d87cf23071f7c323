// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for timestamps stored in documents and tokens.

use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
///
/// Fixed microsecond precision keeps stored strings fixed-width, so they
/// order lexicographically the same way they order in time.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time in the stored string format.
pub fn now_rfc3339() -> String {
    format_utc_rfc3339(Utc::now())
}

/// Hands out strictly increasing creation timestamps.
///
/// Two records created within the same clock tick still sort in creation
/// order.
#[derive(Debug, Default)]
pub struct CreationClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl CreationClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> String {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        format_utc_rfc3339(now)
    }
}

/// Convert a JWT `exp`/`iat` value to a timestamp.
pub fn from_unix_seconds(secs: u64) -> Option<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}
