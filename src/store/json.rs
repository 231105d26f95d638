//! JSON file store with a single background writer

use super::{PersistedState, StateStore, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Latest snapshot handed to the writer, tagged with a version
type Queued = (u64, Option<Arc<PersistedState>>);
/// Last version written, with its error if the write failed
type Written = (u64, Option<String>);

/// Stores state as pretty JSON at `path`.
///
/// Saves never block on disk: each one replaces the snapshot waiting for the
/// writer task, so at most one write is in flight and only the newest
/// snapshot is queued behind it. Writes go to a temp file that is renamed
/// over the target.
pub struct JsonFileStore {
    path: PathBuf,
    queued: watch::Sender<Queued>,
    written: watch::Receiver<Written>,
}

impl JsonFileStore {
    /// Create the store and spawn its writer. Must be called inside a tokio runtime.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (queued_tx, queued_rx) = watch::channel((0, None));
        let (written_tx, written_rx) = watch::channel((0, None));
        tokio::spawn(run_writer(path.clone(), queued_rx, written_tx));
        Self {
            path,
            queued: queued_tx,
            written: written_rx,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<PersistedState, StoreError> {
        read_state(&self.path).await
    }

    async fn save(&self, state: PersistedState) -> Result<(), StoreError> {
        if self.queued.is_closed() {
            return Err(StoreError::Closed);
        }
        self.queued.send_modify(|(version, slot)| {
            *version += 1;
            *slot = Some(Arc::new(state));
        });
        Ok(())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let target = self.queued.borrow().0;
        let mut written = self.written.clone();
        let (_, error) = written
            .wait_for(|(version, _)| *version >= target)
            .await
            .map_err(|_| StoreError::Closed)?
            .clone();
        match error {
            Some(e) => Err(StoreError::Write(e)),
            None => Ok(()),
        }
    }
}

/// Read a state file; a missing file is an empty state
pub async fn read_state(path: &Path) -> Result<PersistedState, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::default()),
        Err(e) => Err(e.into()),
    }
}

async fn run_writer(
    path: PathBuf,
    mut queued: watch::Receiver<Queued>,
    written: watch::Sender<Written>,
) {
    while queued.changed().await.is_ok() {
        let (version, snapshot) = queued.borrow_and_update().clone();
        let Some(snapshot) = snapshot else {
            continue;
        };

        let error = match write_atomic(&path, &snapshot).await {
            Ok(()) => {
                tracing::trace!(path = %path.display(), version, "State written");
                None
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to write state");
                Some(e.to_string())
            }
        };
        let _ = written.send((version, error));
    }
    tracing::debug!(path = %path.display(), "State writer stopped");
}

async fn write_atomic(path: &Path, state: &PersistedState) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(state)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
