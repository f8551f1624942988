//! Expiry Policy
//!
//! Expiry is never stored. It is recomputed from the record's last access time
//! and its effective TTL every time a session is read or reaped:
//!
//! ```text
//! effective_ttl = cookie.originalMaxAge   (if present and non-zero)
//!               | ttl_secs * 1000         (otherwise)
//!
//! expired = effective_ttl == 0 || last_access + effective_ttl < now
//! ```
//!
//! A missing record is always expired. A record without `__lastAccess` has no
//! age to compare and never expires through the TTL, so the reaper leaves
//! foreign JSON files in the directory alone.

use crate::session::{now_millis, Session};

/// Effective TTL of `session` in milliseconds.
pub fn effective_ttl_ms(session: &Session, ttl_secs: u64) -> f64 {
    session
        .original_max_age()
        .unwrap_or(ttl_secs as f64 * 1000.0)
}

/// Returns true if `session` is stale at the current time.
pub fn is_expired(session: Option<&Session>, ttl_secs: u64) -> bool {
    is_expired_at(session, ttl_secs, now_millis())
}

/// Returns true if `session` is stale at `now_ms`.
pub fn is_expired_at(session: Option<&Session>, ttl_secs: u64, now_ms: i64) -> bool {
    let Some(session) = session else {
        return true;
    };

    let ttl = effective_ttl_ms(session, ttl_secs);
    if ttl == 0.0 {
        return true;
    }

    match session.last_access() {
        Some(last_access) => (last_access as f64 + ttl) < now_ms as f64,
        None => false,
    }
}
