use crate::identity::Identity;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

const SESSION_FILE: &str = "session.json";

/// File-backed record of the signed-in identity, read on cold start.
#[derive(Clone, Debug)]
pub struct SessionStore {
    root: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct PersistedSession {
    identity: Identity,
    saved_at: DateTime<Utc>,
}

impl SessionStore {
    pub fn new(root: PathBuf) -> Self {
        fs::create_dir_all(&root).ok();
        Self { root }
    }

    fn session_path(&self) -> PathBuf {
        self.root.join(SESSION_FILE)
    }

    pub fn load_current(&self) -> Result<Option<Identity>> {
        let path = self.session_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        let persisted: PersistedSession = serde_json::from_str(&contents)
            .with_context(|| format!("invalid session file {}", path.display()))?;
        Ok(Some(persisted.identity))
    }

    pub fn save_current(&self, identity: &Identity) -> Result<()> {
        fs::create_dir_all(&self.root).ok();
        let persisted = PersistedSession {
            identity: identity.clone(),
            saved_at: Utc::now(),
        };
        let serialized = serde_json::to_vec_pretty(&persisted)?;
        // Stage beside the target, then rename over it.
        let staging = self.root.join(format!("{SESSION_FILE}.tmp"));
        fs::write(&staging, serialized)
            .with_context(|| format!("failed to write {}", staging.display()))?;
        fs::rename(&staging, self.session_path())?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(self.session_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
