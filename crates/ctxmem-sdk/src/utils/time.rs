//! Time Utilities

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Time elapsed since `then`; zero if `then` is in the future
pub fn elapsed_since(then: DateTime<Utc>) -> Duration {
    (now_utc() - then).to_std().unwrap_or(Duration::ZERO)
}
