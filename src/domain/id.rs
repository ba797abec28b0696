//! Task identifiers
//!
//! IDs are short base36 strings (e.g. `k3f`) derived from a blake3 hash of the
//! title, creation timestamp and process id. Generation starts at 3 characters
//! and grows up to 8 until the candidate does not collide with an existing ID.
//!
//! IDs double as file names in the store, so parsing only accepts ASCII
//! alphanumerics, `-` and `_`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MIN_ID_LENGTH: usize = 3;
const MAX_ID_LENGTH: usize = 8;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Task ID must not be empty")]
    Empty,

    #[error("Invalid task ID '{0}': only letters, digits, '-' and '_' are allowed")]
    InvalidCharacters(String),
}

/// Encodes the leading bytes of a hash as base36
fn to_base36(bytes: &[u8]) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut out = String::new();
    for chunk in bytes.chunks(8) {
        let mut buf = [0u8; 8];
        buf[..chunk.len()].copy_from_slice(chunk);
        let mut value = u64::from_be_bytes(buf);

        let mut digits = Vec::new();
        while value > 0 {
            digits.push(ALPHABET[(value % 36) as usize] as char);
            value /= 36;
        }
        if digits.is_empty() {
            digits.push('0');
        }
        out.extend(digits.into_iter().rev());
    }
    out
}

/// Generates the base36 hash string for a title and timestamp
fn generate_hash(title: &str, timestamp: DateTime<Utc>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(title.as_bytes());
    hasher.update(&timestamp.timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    to_base36(hasher.finalize().as_bytes())
}

/// Identifier of a task, unique within a store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Generates a fresh ID, growing the prefix until `exists` reports no collision
    pub fn generate(title: &str, created_at: DateTime<Utc>, exists: impl Fn(&str) -> bool) -> Self {
        let hash = generate_hash(title, created_at);

        for len in MIN_ID_LENGTH..=MAX_ID_LENGTH.min(hash.len()) {
            let candidate = &hash[..len];
            if !exists(candidate) {
                return Self(candidate.to_string());
            }
        }

        // All prefixes taken; the full-length prefix is the best remaining choice
        Self(hash[..MAX_ID_LENGTH.min(hash.len())].to_string())
    }

    /// Returns the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaskId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(IdError::InvalidCharacters(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for TaskId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_id_starts_short() {
        let id = TaskId::generate("Write docs", Utc::now(), |_| false);
        assert_eq!(id.as_str().len(), MIN_ID_LENGTH);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_id_grows_on_collision() {
        let now = Utc::now();
        let first = TaskId::generate("Same title", now, |_| false);

        let taken: HashSet<String> = [first.to_string()].into_iter().collect();
        let second = TaskId::generate("Same title", now, |c| taken.contains(c));

        assert_eq!(second.as_str().len(), MIN_ID_LENGTH + 1);
        assert!(second.as_str().starts_with(first.as_str()));
    }

    #[test]
    fn generated_id_caps_at_max_length() {
        let id = TaskId::generate("Crowded", Utc::now(), |_| true);
        assert_eq!(id.as_str().len(), MAX_ID_LENGTH);
    }

    #[test]
    fn parse_valid_ids() {
        let id: TaskId = "abc".parse().unwrap();
        assert_eq!(id.as_str(), "abc");

        let id: TaskId = "  task-1_b ".parse().unwrap();
        assert_eq!(id.as_str(), "task-1_b");
    }

    #[test]
    fn parse_rejects_invalid_ids() {
        assert_eq!("".parse::<TaskId>(), Err(IdError::Empty));
        assert!(matches!(
            "../etc".parse::<TaskId>(),
            Err(IdError::InvalidCharacters(_))
        ));
        assert!(matches!(
            "a b".parse::<TaskId>(),
            Err(IdError::InvalidCharacters(_))
        ));
    }

    #[test]
    fn serde_as_plain_string() {
        let id: TaskId = "x1".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"x1\"");

        let parsed: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);

        assert!(serde_json::from_str::<TaskId>("\"bad/id\"").is_err());
    }

    #[test]
    fn base36_encoding() {
        assert_eq!(to_base36(&[0, 0, 0, 0, 0, 0, 0, 35]), "z");
        assert_eq!(to_base36(&[0, 0, 0, 0, 0, 0, 0, 36]), "10");
        assert_eq!(to_base36(&[0; 8]), "0");
    }
}
