use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use quill_types::models::UserProfile;

use crate::error::Result;

/// On-disk shape: `{"user": {...}, "token": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub user: UserProfile,
    pub token: String,
}

/// The signed-in identity, mirrored to a JSON file so it survives restarts.
/// User and token are always written and removed together.
pub struct Session {
    path: PathBuf,
    current: Mutex<Option<StoredSession>>,
}

impl Session {
    /// Read the session file at `path`. A missing file is an empty session;
    /// an unreadable one is discarded.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<StoredSession>(&bytes) {
                Ok(stored) => {
                    debug!("Restored session for {}", stored.user.username);
                    Some(stored)
                }
                Err(e) => {
                    warn!("Discarding corrupt session file {}: {}", path.display(), e);
                    remove_if_present(&path)?;
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            current: Mutex::new(current),
        })
    }

    pub fn persist(&self, user: UserProfile, token: String) -> Result<()> {
        let stored = StoredSession { user, token };
        let json = serde_json::to_vec_pretty(&stored)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        *self.lock() = Some(stored);
        Ok(())
    }

    /// Forget the identity. Memory is cleared even if the file removal fails.
    pub fn clear(&self) -> Result<()> {
        *self.lock() = None;
        remove_if_present(&self.path)
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.lock().as_ref().map(|s| s.user.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.lock().as_ref().map(|s| s.token.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.lock().is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Option<StoredSession>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> UserProfile {
        UserProfile {
            username: "ana".into(),
            email: "ana@example.com".into(),
        }
    }

    #[test]
    fn missing_file_is_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::load(dir.path().join("session.json")).unwrap();
        assert!(!session.is_signed_in());
        assert_eq!(session.token(), None);
    }

    #[test]
    fn persist_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let session = Session::load(&path).unwrap();
        session.persist(ana(), "tok".into()).unwrap();
        assert_eq!(session.user(), Some(ana()));

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["token"], "tok");
        assert_eq!(raw["user"]["username"], "ana");

        let reloaded = Session::load(&path).unwrap();
        assert_eq!(reloaded.user(), Some(ana()));
        assert_eq!(reloaded.token().as_deref(), Some("tok"));
    }

    #[test]
    fn clear_removes_both_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let session = Session::load(&path).unwrap();
        session.persist(ana(), "tok".into()).unwrap();
        session.clear().unwrap();

        assert!(!session.is_signed_in());
        assert!(!path.exists());
        assert!(!Session::load(&path).unwrap().is_signed_in());

        // Clearing twice is fine.
        session.clear().unwrap();
    }

    #[test]
    fn corrupt_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, b"{\"token\": \"only half\"}").unwrap();

        let session = Session::load(&path).unwrap();
        assert!(!session.is_signed_in());
        assert!(!path.exists());
    }
}
