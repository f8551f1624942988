//! Session Records
//!
//! A [`Session`] is the value persisted for one session id. The store treats it
//! as an opaque JSON object, with two exceptions:
//!
//! - `__lastAccess`: milliseconds since the Unix epoch, written on every save
//! - `cookie.originalMaxAge`: milliseconds, overrides the store TTL when truthy
//!
//! Everything else belongs to the caller and is round-tripped untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Reserved field holding the last write time in epoch milliseconds.
pub const LAST_ACCESS_FIELD: &str = "__lastAccess";

/// Conventional field holding the session cookie.
pub const COOKIE_FIELD: &str = "cookie";

/// Cookie field that overrides the store-level TTL.
pub const ORIGINAL_MAX_AGE_FIELD: &str = "originalMaxAge";

/// Returns the current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A session record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session(Map<String, Value>);

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a field of the record.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Sets a field of the record, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes a field of the record.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Builder-style variant of [`Session::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Last write time in epoch milliseconds, if the record has been stamped.
    pub fn last_access(&self) -> Option<i64> {
        self.0.get(LAST_ACCESS_FIELD).and_then(Value::as_i64)
    }

    /// Stamps the record with the current time.
    pub fn stamp_last_access(&mut self) {
        self.set_last_access(now_millis());
    }

    pub fn set_last_access(&mut self, millis: i64) {
        self.0.insert(LAST_ACCESS_FIELD.to_string(), Value::from(millis));
    }

    pub fn cookie(&self) -> Option<&Value> {
        self.0.get(COOKIE_FIELD)
    }

    pub fn set_cookie(&mut self, cookie: Value) {
        self.0.insert(COOKIE_FIELD.to_string(), cookie);
    }

    /// The cookie's `originalMaxAge` in milliseconds, when it is a non-zero number.
    pub fn original_max_age(&self) -> Option<f64> {
        self.cookie()
            .and_then(|cookie| cookie.get(ORIGINAL_MAX_AGE_FIELD))
            .and_then(Value::as_f64)
            .filter(|age| *age != 0.0 && !age.is_nan())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Session {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
