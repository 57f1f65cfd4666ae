//! services/client/src/adapters/storage.rs
//!
//! File-backed `SessionStorage`. Both slots live in one small JSON object on
//! disk. Writes go through a temp file and a rename so a crash never leaves a
//! half-written session behind.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use decipher_core::ports::{PortError, PortResult, SessionStorage, Slot};

#[cfg(unix)]
const FILE_MODE: u32 = 0o600;
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

type SlotFile = BTreeMap<String, String>;

pub struct FileSessionStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<data dir>/decipher/session.json`, falling back to the working directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("decipher")
            .join("session.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> PortResult<SlotFile> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SlotFile::new()),
            Err(e) => {
                return Err(PortError::Storage(format!(
                    "Failed to read session file '{}': {}",
                    self.path.display(),
                    e
                )))
            }
        };
        if content.trim().is_empty() {
            return Ok(SlotFile::new());
        }
        match serde_json::from_str(&content) {
            Ok(slots) => Ok(slots),
            Err(e) => {
                // A corrupt file means no session, not a dead client.
                warn!(
                    "Ignoring unreadable session file '{}': {}",
                    self.path.display(),
                    e
                );
                Ok(SlotFile::new())
            }
        }
    }

    async fn save(&self, slots: &SlotFile) -> PortResult<()> {
        if slots.is_empty() {
            return match tokio::fs::remove_file(&self.path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(PortError::Storage(format!(
                    "Failed to remove session file '{}': {}",
                    self.path.display(),
                    e
                ))),
            };
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| storage_error("create directory", parent, e))?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = std::fs::Permissions::from_mode(DIR_MODE);
                    tokio::fs::set_permissions(parent, perms)
                        .await
                        .map_err(|e| storage_error("set permissions on", parent, e))?;
                }
            }
        }

        let content = serde_json::to_string_pretty(slots)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let temp_path = self
            .path
            .with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| storage_error("write", &temp_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(FILE_MODE);
            tokio::fs::set_permissions(&temp_path, perms)
                .await
                .map_err(|e| storage_error("set permissions on", &temp_path, e))?;
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(storage_error("replace", &self.path, e));
        }
        debug!("Saved session file {}", self.path.display());
        Ok(())
    }
}

fn storage_error(action: &str, path: &Path, err: std::io::Error) -> PortError {
    PortError::Storage(format!("Failed to {} '{}': {}", action, path.display(), err))
}

#[async_trait]
impl SessionStorage for FileSessionStorage {
    async fn read(&self, slot: Slot) -> PortResult<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(slot.key()))
    }

    async fn write(&self, slot: Slot, value: &str) -> PortResult<()> {
        let _guard = self.lock.lock().await;
        let mut slots = self.load().await?;
        slots.insert(slot.key().to_string(), value.to_string());
        self.save(&slots).await
    }

    async fn remove(&self, slot: Slot) -> PortResult<()> {
        let _guard = self.lock.lock().await;
        let mut slots = self.load().await?;
        if slots.remove(slot.key()).is_none() {
            return Ok(());
        }
        self.save(&slots).await
    }
}
