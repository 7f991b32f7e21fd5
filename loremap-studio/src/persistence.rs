//! Session persistence: a single fixed slot plus an autosave subscriber.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use loremap_core::{AppState, SessionData, Store, Subscription};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::StorageResult;

/// File name of the session slot.
pub const SESSION_SLOT: &str = "current.json";

/// Backend holding the one persisted session.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// The stored session, or `None` if nothing was saved yet.
    async fn load(&self) -> StorageResult<Option<SessionData>>;

    /// Replace the stored session.
    async fn save(&self, data: &SessionData) -> StorageResult<()>;
}

/// JSON file in a data directory.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    dir: PathBuf,
}

impl FileSessionStorage {
    /// Storage rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the session slot.
    #[must_use]
    pub fn slot_path(&self) -> PathBuf {
        self.dir.join(SESSION_SLOT)
    }

    /// Data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl SessionStorage for FileSessionStorage {
    async fn load(&self) -> StorageResult<Option<SessionData>> {
        let path = self.slot_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, data: &SessionData) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec(data)?;
        // Write aside and rename so a crash never leaves half a session.
        let tmp = self.dir.join(format!("{SESSION_SLOT}.tmp"));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, self.slot_path()).await?;
        Ok(())
    }
}

/// Load the stored session. Failures are logged and treated as "nothing
/// stored".
pub async fn load_or_default(storage: &dyn SessionStorage) -> SessionData {
    match storage.load().await {
        Ok(Some(data)) => data,
        Ok(None) => SessionData::default(),
        Err(e) => {
            warn!(error = %e, "Failed to load session, starting fresh");
            SessionData::default()
        }
    }
}

/// Saves the persisted projection after every accepted update once the
/// state is loaded. Updates that leave the projection unchanged, such as
/// timer ticks, are skipped before anything is copied.
#[derive(Debug)]
pub struct Autosave {
    subscription: Subscription<AppState>,
    writer: JoinHandle<()>,
}

impl Autosave {
    /// Subscribe to `app` and start the writer task on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn attach(app: &Store<AppState>, storage: Arc<dyn SessionStorage>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<SessionData>();
        let writer = tokio::spawn(async move {
            while let Some(data) = rx.recv().await {
                match storage.save(&data).await {
                    Ok(()) => debug!(assets = data.generated_images.len(), "Session saved"),
                    Err(e) => warn!(error = %e, "Failed to save session"),
                }
            }
        });

        let last: Mutex<Option<Arc<AppState>>> = Mutex::new(None);
        let subscription = app.subscribe(move |state| {
            if !state.is_loaded {
                return;
            }
            let mut last = last.lock().unwrap_or_else(PoisonError::into_inner);
            if last.as_ref().is_some_and(|saved| saved.persists_same_as(state)) {
                return;
            }
            *last = Some(Arc::clone(state));
            if tx.send(SessionData::from_state(state)).is_err() {
                warn!("Session writer is gone, change not saved");
            }
        });

        Self {
            subscription,
            writer,
        }
    }

    /// Stop listening and wait until every queued write has finished.
    pub async fn flush(self) {
        self.subscription.unsubscribe();
        if let Err(e) = self.writer.await {
            warn!(error = %e, "Session writer ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loremap_core::GeneratedAsset;

    #[tokio::test]
    async fn test_missing_slot_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSessionStorage::new(dir.path().join("nested"));
        assert!(storage.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSessionStorage::new(dir.path().join("nested"));

        let mut state = AppState::default();
        state.location_request = "Sunken temple".into();
        state.push_asset(GeneratedAsset::from_url("data:image/png;base64,AA"));
        let data = SessionData::from_state(&state);

        storage.save(&data).await.unwrap();
        assert_eq!(storage.load().await.unwrap(), Some(data));
        assert!(!dir.path().join("nested").join("current.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_slot_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSessionStorage::new(dir.path());
        std::fs::write(storage.slot_path(), "{not json").unwrap();
        assert!(storage.load().await.is_err());
        assert_eq!(load_or_default(&storage).await, SessionData::default());
    }
}
