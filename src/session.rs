//! On-disk layout of sessions and their turn artifacts.
//!
//! ```text
//! <root>/<session>/user_input.wav
//! <root>/<session>/turn-0001/response_001.wav
//! ```
//!
//! Each turn gets its own directory so a late synthesis result from an
//! earlier turn can never overwrite a clip of the current one.

use crate::defaults;
use crate::error::{Result, VoxturnError};
use crate::pipeline::types::{Sequence, TurnId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of a session directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Accepts ids made of ASCII letters, digits, `-` and `_`.
    pub fn parse(id: &str) -> Result<Self> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(VoxturnError::Session {
                message: format!("invalid session id '{}'", id),
            });
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = VoxturnError;

    fn try_from(id: String) -> Result<Self> {
        Self::parse(&id)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory receiving the clips of one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnDir {
    dir: PathBuf,
}

impl TurnDir {
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Path of the clip for `sequence`, e.g. `response_003.wav`.
    pub fn artifact_path(&self, sequence: Sequence) -> PathBuf {
        self.dir.join(defaults::artifact_filename(sequence))
    }
}

/// Creates and resolves session directories under a root directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

static SESSION_COUNTER: AtomicU32 = AtomicU32::new(0);

impl SessionStore {
    /// Uses `root`, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| VoxturnError::Session {
            message: format!("failed to create {}: {}", root.display(), e),
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a fresh, uniquely named session directory.
    pub fn create_session(&self) -> Result<SessionId> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let counter = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let id = SessionId(format!("session_{}_{}", millis, counter));

        self.session_dir(&id)?;
        tracing::info!(session = %id, "session created");
        Ok(id)
    }

    /// Directory of `session`, created if missing.
    pub fn session_dir(&self, session: &SessionId) -> Result<PathBuf> {
        let dir = self.root.join(session.as_str());
        self.ensure_dir(&dir)?;
        Ok(dir)
    }

    /// Path of `filename` inside the session directory.
    pub fn file_path(&self, session: &SessionId, filename: &str) -> Result<PathBuf> {
        Ok(self.session_dir(session)?.join(filename))
    }

    /// Where the user recording of the session is stored.
    pub fn input_path(&self, session: &SessionId) -> Result<PathBuf> {
        self.file_path(session, defaults::INPUT_FILENAME)
    }

    /// Directory for the clips of `turn`, created if missing.
    pub fn turn_dir(&self, session: &SessionId, turn: TurnId) -> Result<TurnDir> {
        let dir = self
            .session_dir(session)?
            .join(format!("turn-{:04}", turn.0));
        self.ensure_dir(&dir)?;
        Ok(TurnDir { dir })
    }

    /// Session ids present on disk, sorted.
    pub fn list_sessions(&self) -> Result<Vec<SessionId>> {
        let entries = fs::read_dir(&self.root).map_err(|e| VoxturnError::Session {
            message: format!("failed to read {}: {}", self.root.display(), e),
        })?;

        let mut ids: Vec<SessionId> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| SessionId::parse(&entry.file_name().to_string_lossy()).ok())
            .collect();
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(ids)
    }

    fn ensure_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| VoxturnError::Session {
            message: format!("failed to create {}: {}", dir.display(), e),
        })
    }
}
