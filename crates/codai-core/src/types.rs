//! Common types used throughout Codai Core
//!
//! - Timestamps
//! - Opaque entity identifiers

use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Timestamp type alias
pub type Timestamp = DateTime<Utc>;

/// Create a timestamp for the current moment
pub fn now() -> Timestamp {
    Utc::now()
}

/// Render a timestamp the way it crosses service boundaries (ISO-8601, UTC)
pub fn to_iso8601(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `serialize_with` adapter writing a timestamp through [`to_iso8601`]
pub fn serialize_iso8601<S>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&to_iso8601(ts))
}

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Characters per random id fragment
const FRAGMENT_LEN: usize = 9;

/// Opaque identifier of a stored record.
///
/// Callers must treat the contents as an unstructured key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Generate a fresh id from two random base-36 fragments.
    ///
    /// No collision detection is performed.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut id = String::with_capacity(FRAGMENT_LEN * 2);
        push_fragment(&mut id, &mut rng);
        push_fragment(&mut id, &mut rng);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn push_fragment(out: &mut String, rng: &mut impl Rng) {
    let mut buf = [b'0'; FRAGMENT_LEN];
    let mut value: u64 = rng.gen_range(0..36u64.pow(FRAGMENT_LEN as u32));
    for slot in buf.iter_mut().rev() {
        *slot = BASE36[(value % 36) as usize];
        value /= 36;
    }
    out.extend(buf.iter().map(|&b| b as char));
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_base36() {
        let id = EntityId::generate();
        assert_eq!(id.as_str().len(), FRAGMENT_LEN * 2);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_generated_ids_differ() {
        let ids: HashSet<EntityId> = (0..1000).map(|_| EntityId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = EntityId::from("abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
    }

    #[test]
    fn test_iso8601_is_utc() {
        let ts = now();
        let rendered = to_iso8601(&ts);
        assert!(rendered.ends_with('Z'));
        let parsed: Timestamp = rendered.parse().unwrap();
        assert_eq!(parsed.timestamp_millis(), ts.timestamp_millis());
    }
}
