//! File-based storage implementation.

use super::{newest_first, BoxFuture, SessionStore, StorageError, StorageResult};
use crate::session::{Element, ParticipantId, Session, SessionId};
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// File-based session storage.
///
/// Stores each session as a JSON file in a specified directory. File work runs
/// on the blocking thread pool, and operations on one session never overlap.
pub struct FileStorage {
    /// Base directory for session storage.
    base_path: PathBuf,
    /// One lock per session file.
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
}

impl FileStorage {
    /// Create a new file storage with the given base directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
            log::info!("Created session directory {}", base_path.display());
        }
        Ok(Self {
            base_path,
            locks: DashMap::new(),
        })
    }

    /// Create file storage in the default location.
    ///
    /// On Unix: `~/.local/share/inkshare/sessions/`
    /// On Windows: `%LOCALAPPDATA%\inkshare\sessions\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;

        Self::new(base.join("inkshare").join("sessions"))
    }

    /// Get the file path for a session ID.
    ///
    /// The file name is the hex-encoded id, so distinct ids never share a file.
    fn session_path(&self, id: &SessionId) -> PathBuf {
        self.base_path
            .join(format!("{}.json", hex::encode(id.as_str())))
    }

    /// Get the base path.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Run `op` on the session's file from the blocking pool while holding
    /// that session's lock.
    fn with_session_file<T, F>(&self, id: &SessionId, op: F) -> BoxFuture<'_, StorageResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> StorageResult<T> + Send + 'static,
    {
        let path = self.session_path(id);
        let lock = self.locks.entry(id.clone()).or_default().clone();

        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let _guard = lock
                    .lock()
                    .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
                op(&path)
            })
            .await
            .map_err(|e| StorageError::Other(format!("Storage task failed: {}", e)))?
        })
    }
}

/// Read a session file, treating a record for some other id as absent.
fn read_session(path: &Path, id: &SessionId) -> StorageResult<Session> {
    if !path.exists() {
        return Err(StorageError::NotFound(id.clone()));
    }
    let session = read_session_file(path)?;
    if &session.id != id {
        log::warn!(
            "{} holds session {} instead of {}",
            path.display(),
            session.id,
            id
        );
        return Err(StorageError::NotFound(id.clone()));
    }
    Ok(session)
}

fn read_session_file(path: &Path) -> StorageResult<Session> {
    let json = fs::read_to_string(path)
        .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;

    Session::from_json(&json).map_err(|e| {
        StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
    })
}

fn write_session(path: &Path, session: &Session) -> StorageResult<()> {
    let json = session
        .to_json()
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

    // Readers never observe a partially written record
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path)
        .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
}

impl SessionStore for FileStorage {
    fn insert(&self, session: &Session) -> BoxFuture<'_, StorageResult<()>> {
        let id = session.id.clone();
        let session = session.clone();
        self.with_session_file(&id, move |path| write_session(path, &session))
    }

    fn find_by_id(&self, id: &SessionId) -> BoxFuture<'_, StorageResult<Session>> {
        let id_owned = id.clone();
        self.with_session_file(id, move |path| read_session(path, &id_owned))
    }

    fn replace_elements(
        &self,
        id: &SessionId,
        elements: &[Element],
    ) -> BoxFuture<'_, StorageResult<()>> {
        let id_owned = id.clone();
        let elements = elements.to_vec();

        self.with_session_file(id, move |path| {
            let mut session = read_session(path, &id_owned)?;
            session.elements = elements;
            write_session(path, &session)
        })
    }

    fn delete(&self, id: &SessionId) -> BoxFuture<'_, StorageResult<()>> {
        self.with_session_file(id, |path| {
            if path.exists() {
                fs::remove_file(path).map_err(|e| {
                    StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
                })?;
            }
            Ok(())
        })
    }

    fn list_for_participant(
        &self,
        participant: &ParticipantId,
    ) -> BoxFuture<'_, StorageResult<Vec<Session>>> {
        let base = self.base_path.clone();
        let participant = participant.clone();

        Box::pin(async move {
            tokio::task::spawn_blocking(move || list_visible(&base, &participant))
                .await
                .map_err(|e| StorageError::Other(format!("Storage task failed: {}", e)))?
        })
    }
}

fn list_visible(base: &Path, participant: &ParticipantId) -> StorageResult<Vec<Session>> {
    if !base.exists() {
        return Ok(vec![]);
    }

    let entries = fs::read_dir(base)
        .map_err(|e| StorageError::Io(format!("Failed to read directory: {}", e)))?;

    let mut sessions = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        // Only include .json files
        if path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }
        match read_session_file(&path) {
            Ok(session) if session.can_join(participant) => sessions.push(session),
            Ok(_) => {}
            Err(e) => log::warn!("Skipping unreadable session file: {}", e),
        }
    }
    newest_first(&mut sessions);
    Ok(sessions)
}
