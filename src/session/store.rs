//! Session ownership record
//!
//! One `session.json` per store records which agent session owns the project
//! and whether drain mode is on. Ownership is first-writer-wins: whoever
//! finds the file absent creates it, and only that session may change or
//! remove it. The existence check and the write are not atomic together, so
//! two truly concurrent claimants can both succeed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SESSION_FILE: &str = "session.json";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No session file exists. Run 'bits session claim' first.")]
    NoSession,
}

/// The persisted session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub drain_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drain_started_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            started_at: Utc::now(),
            source: source.into(),
            drain_active: false,
            drain_started_at: None,
        }
    }

    pub fn is_owned_by(&self, session_id: &str) -> bool {
        self.session_id == session_id
    }
}

/// Result of a claim attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionClaim {
    /// The caller now owns the session
    Granted,
    /// Another session already owns it
    Denied { owner: String },
}

impl SessionClaim {
    pub fn is_granted(&self) -> bool {
        matches!(self, SessionClaim::Granted)
    }

    /// The existing owner when denied, empty when granted
    pub fn owner(&self) -> &str {
        match self {
            SessionClaim::Granted => "",
            SessionClaim::Denied { owner } => owner,
        }
    }
}

/// Reads and writes the session record of one store
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the store directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the session file
    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Loads the record, `None` if there is no session
    pub fn load(&self) -> Result<Option<Session>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session: {}", path.display()))?;

        let session = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session: {}", path.display()))?;

        Ok(Some(session))
    }

    /// Loads the record, failing with [`SessionError::NoSession`] if absent
    pub fn require(&self) -> Result<Session> {
        self.load()?.ok_or_else(|| SessionError::NoSession.into())
    }

    /// Writes the record atomically (temp file + rename)
    pub fn save(&self, session: &Session) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory: {}", self.dir.display()))?;

        let path = self.path();
        let temp_path = path.with_extension("json.tmp");
        let content =
            serde_json::to_string_pretty(session).context("Failed to serialize session")?;

        fs::write(&temp_path, content)
            .with_context(|| format!("Failed to write temp file: {}", temp_path.display()))?;

        fs::rename(&temp_path, &path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                path.display()
            )
        })
    }

    /// Removes the record regardless of owner; returns false if there was none
    pub fn delete(&self) -> Result<bool> {
        let path = self.path();
        if !path.exists() {
            return Ok(false);
        }

        fs::remove_file(&path)
            .with_context(|| format!("Failed to remove session: {}", path.display()))?;
        Ok(true)
    }

    /// Claims ownership if no session exists
    ///
    /// An existing record is never overwritten, even one owned by the caller.
    pub fn claim(&self, session_id: &str, source: &str) -> Result<SessionClaim> {
        if let Some(existing) = self.load()? {
            return Ok(SessionClaim::Denied {
                owner: existing.session_id,
            });
        }

        self.save(&Session::new(session_id, source))?;
        Ok(SessionClaim::Granted)
    }

    /// Deletes the record if `session_id` owns it
    pub fn release(&self, session_id: &str) -> Result<bool> {
        match self.load()? {
            Some(existing) if existing.is_owned_by(session_id) => self.delete(),
            _ => Ok(false),
        }
    }

    /// Turns drain mode on or off if `session_id` owns the record
    ///
    /// Returns false without writing when the caller is not the owner.
    pub fn set_drain_active(&self, session_id: &str, active: bool) -> Result<bool> {
        let mut session = self.require()?;
        if !session.is_owned_by(session_id) {
            return Ok(false);
        }

        session.drain_active = active;
        session.drain_started_at = active.then(Utc::now);
        self.save(&session)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("store"))
    }

    #[test]
    fn first_writer_wins() {
        let dir = TempDir::new().unwrap();
        let sessions = store(&dir);

        let claim = sessions.claim("session-1", "startup").unwrap();
        assert_eq!(claim, SessionClaim::Granted);
        assert!(claim.is_granted());
        assert_eq!(claim.owner(), "");

        let claim = sessions.claim("session-2", "startup").unwrap();
        assert_eq!(
            claim,
            SessionClaim::Denied {
                owner: "session-1".to_string()
            }
        );
        assert_eq!(claim.owner(), "session-1");

        assert!(!sessions.release("session-2").unwrap());
        assert!(sessions.exists());

        assert!(sessions.release("session-1").unwrap());
        assert!(!sessions.exists());
    }

    #[test]
    fn reclaim_by_owner_is_denied() {
        let dir = TempDir::new().unwrap();
        let sessions = store(&dir);

        sessions.claim("s1", "startup").unwrap();
        let before = sessions.load().unwrap().unwrap();

        let claim = sessions.claim("s1", "resume").unwrap();
        assert_eq!(claim.owner(), "s1");
        assert_eq!(sessions.load().unwrap().unwrap(), before);
    }

    #[test]
    fn release_without_session() {
        let dir = TempDir::new().unwrap();
        assert!(!store(&dir).release("anyone").unwrap());
    }

    #[test]
    fn drain_flag_requires_owner() {
        let dir = TempDir::new().unwrap();
        let sessions = store(&dir);
        sessions.claim("s1", "startup").unwrap();

        assert!(!sessions.set_drain_active("s2", true).unwrap());
        assert!(!sessions.load().unwrap().unwrap().drain_active);

        assert!(sessions.set_drain_active("s1", true).unwrap());
        let session = sessions.load().unwrap().unwrap();
        assert!(session.drain_active);
        assert!(session.drain_started_at.is_some());

        assert!(sessions.set_drain_active("s1", false).unwrap());
        let session = sessions.load().unwrap().unwrap();
        assert!(!session.drain_active);
        assert!(session.drain_started_at.is_none());
    }

    #[test]
    fn drain_flag_without_session_fails() {
        let dir = TempDir::new().unwrap();
        let err = store(&dir).set_drain_active("s1", true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::NoSession)
        ));
    }

    #[test]
    fn file_format() {
        let dir = TempDir::new().unwrap();
        let sessions = store(&dir);
        sessions.claim("abc", "startup").unwrap();

        let content = fs::read_to_string(sessions.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["session_id"], "abc");
        assert_eq!(value["source"], "startup");
        assert_eq!(value["drain_active"], false);
        assert!(value["started_at"].is_string());
        assert!(value.get("drain_started_at").is_none());

        // Pretty-printed
        assert!(content.contains("\n  \"session_id\""));
    }

    #[test]
    fn malformed_session_is_an_error() {
        let dir = TempDir::new().unwrap();
        let sessions = store(&dir);
        fs::create_dir_all(sessions.dir()).unwrap();
        fs::write(sessions.path(), "not json").unwrap();

        assert!(sessions.load().is_err());
        assert!(sessions.claim("s1", "startup").is_err());
        assert!(sessions.delete().unwrap());
    }
}
