use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Keyset pagination cursor: the `(sort timestamp, row id)` pair of the last
/// row the previous page returned. Encoded as base64 JSON so it survives
/// query strings untouched.
///
/// Field names are deliberately terse (`u`, `i`) — cursors are opaque to
/// clients and ride on every paginated request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    /// Sort timestamp of the last row.
    pub u: DateTime<Utc>,
    /// Row id of the last row (tie-breaker).
    pub i: String,
}

impl Cursor {
    pub fn new(u: DateTime<Utc>, i: impl Into<String>) -> Self {
        Self { u, i: i.into() }
    }

    pub fn encode(&self) -> String {
        // Serialization of a two-field struct cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(raw)
            .map_err(|e| Error::InvalidCursor(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::InvalidCursor(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cursor_round_trip() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();
        let cursor = Cursor::new(ts, "01JD0A7GK2M3N4P5Q6R7S8T9VW");
        let encoded = cursor.encode();
        let decoded = Cursor::decode(&encoded).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(Cursor::decode("not base64 at all!!!").is_err());
        // Valid base64, invalid JSON inside.
        let junk = STANDARD.encode(b"{\"u\": 12}");
        assert!(Cursor::decode(&junk).is_err());
    }

    #[test]
    fn test_cursor_is_url_safe_enough() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let encoded = Cursor::new(ts, "abc").encode();
        // Standard base64 never emits characters that need query escaping
        // beyond '+', '/', '=' which axum's extractor handles.
        assert!(encoded.chars().all(|c| c.is_ascii_alphanumeric()
            || c == '+'
            || c == '/'
            || c == '='));
    }
}
