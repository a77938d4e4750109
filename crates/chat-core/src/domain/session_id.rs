//! Session identifiers.
//!
//! Every logged-in connection is identified by a [`SessionId`] issued by the
//! broker.  Ids are positive integers; `0` is reserved for frames that the
//! broker itself originates (see [`SessionId::SYSTEM`]).
//!
//! # Wire representation
//!
//! The broker always writes ids as JSON numbers.  When reading, both numbers
//! and decimal strings are accepted, because JSON object keys are always
//! strings (the `online` reply is keyed by id) and older clients send ids as
//! quoted strings.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Unique, broker-assigned identifier of one online session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Sender id carried by every broker-originated frame.
    pub const SYSTEM: SessionId = SessionId(0);

    /// Wraps a raw id value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// `true` for the reserved System id.
    pub const fn is_system(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(SessionId)
    }
}

impl From<u64> for SessionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // serde_json turns integer map keys into quoted strings on its own,
        // so a plain u64 works both as a value and as an object key.
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // `deserialize_any` lets the visitor see whatever the input holds.
        // This also works when the value has been buffered by serde (as
        // happens inside `#[serde(untagged)]` and internally tagged enums).
        deserializer.deserialize_any(SessionIdVisitor)
    }
}

struct SessionIdVisitor;

impl<'de> Visitor<'de> for SessionIdVisitor {
    type Value = SessionId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer session id or its decimal string form")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(SessionId(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(SessionId)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse::<SessionId>()
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_system_id_is_zero() {
        assert_eq!(SessionId::SYSTEM.get(), 0);
        assert!(SessionId::SYSTEM.is_system());
        assert!(!SessionId::new(7).is_system());
    }

    #[test]
    fn test_serializes_as_json_number() {
        let json = serde_json::to_string(&SessionId::new(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_deserializes_from_number_and_string() {
        // Arrange / Act
        let from_number: SessionId = serde_json::from_str("17").unwrap();
        let from_string: SessionId = serde_json::from_str(r#""17""#).unwrap();

        // Assert: both encodings identify the same session
        assert_eq!(from_number, SessionId::new(17));
        assert_eq!(from_string, SessionId::new(17));
    }

    #[test]
    fn test_rejects_negative_and_non_numeric_input() {
        assert!(serde_json::from_str::<SessionId>("-3").is_err());
        assert!(serde_json::from_str::<SessionId>(r#""bob""#).is_err());
        assert!(serde_json::from_str::<SessionId>("1.5").is_err());
    }

    #[test]
    fn test_map_keys_are_written_as_strings_and_read_back() {
        // Arrange
        let mut users = BTreeMap::new();
        users.insert(SessionId::new(2), "bob".to_string());
        users.insert(SessionId::new(10), "carol".to_string());

        // Act
        let json = serde_json::to_string(&users).unwrap();
        let restored: BTreeMap<SessionId, String> = serde_json::from_str(&json).unwrap();

        // Assert: JSON object keys are strings, ordering is numeric
        assert_eq!(json, r#"{"2":"bob","10":"carol"}"#);
        assert_eq!(restored, users);
    }

    #[test]
    fn test_from_str_trims_whitespace() {
        assert_eq!(" 5 ".parse::<SessionId>().unwrap(), SessionId::new(5));
        assert!("five".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_display_prints_raw_value() {
        assert_eq!(SessionId::new(99).to_string(), "99");
    }
}
