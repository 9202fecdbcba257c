use super::{Context, SessionState};
use crate::error::SessionError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One JSON file per conversation id.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load a conversation, or create it seeded with `default_context`
    pub fn open(
        &self,
        conversation_id: &str,
        default_context: Option<&Context>,
    ) -> Result<SessionState, SessionError> {
        let path = self.session_path(conversation_id);
        if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| SessionError::Read {
                path: path.clone(),
                source: e,
            })?;
            match serde_json::from_str::<SessionState>(&content) {
                Ok(state) => {
                    debug!("Loaded session {} from {}", conversation_id, path.display());
                    return Ok(state);
                }
                Err(e) => {
                    // Keep the old history out of the way of the next save
                    let aside = path.with_extension("json.corrupt");
                    fs::rename(&path, &aside).map_err(SessionError::Write)?;
                    warn!(
                        "Session file {} is unreadable ({}), moved to {} and starting a fresh session",
                        path.display(),
                        e,
                        aside.display()
                    );
                }
            }
        }

        let mut state = SessionState::new(conversation_id);
        if let Some(context) = default_context {
            state.set_context(context.clone())?;
        }
        Ok(state)
    }

    pub fn save(&self, state: &SessionState) -> Result<(), SessionError> {
        fs::create_dir_all(&self.dir).map_err(SessionError::Write)?;
        let json = serde_json::to_string_pretty(state)?;
        fs::write(self.session_path(state.conversation_id()), json).map_err(SessionError::Write)
    }

    /// Destroy a conversation. Returns whether anything was removed.
    pub fn remove(&self, conversation_id: &str) -> Result<bool, SessionError> {
        let path = self.session_path(conversation_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(SessionError::Write)?;
        Ok(true)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, conversation_id: &str) -> PathBuf {
        let hash = Sha256::digest(conversation_id.as_bytes());
        self.dir.join(format!("{}.json", &format!("{:x}", hash)[..16]))
    }
}
