// In-memory storage для тестов и как эталонная реализация WhisperStorage

use crate::storage::models::*;
use crate::storage::traits::WhisperStorage;
use crate::utils::error::{Result, WhisperError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct Inner {
    key_bundle: Option<StoredKeyBundle>,
    sessions: HashMap<String, StoredSession>,
}

/// In-memory хранилище
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Заставить все операции записи возвращать `StorageError`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(WhisperError::StorageError("Storage is read-only".to_string()));
        }
        Ok(())
    }
}

impl WhisperStorage for MemoryStorage {
    fn load_key_bundle(&self) -> Result<Option<StoredKeyBundle>> {
        Ok(self.inner.lock().key_bundle.clone())
    }

    fn save_key_bundle(&self, bundle: StoredKeyBundle) -> Result<()> {
        self.check_writable()?;
        self.inner.lock().key_bundle = Some(bundle);
        Ok(())
    }

    fn load_session(&self, peer_id: &str) -> Result<Option<StoredSession>> {
        Ok(self.inner.lock().sessions.get(peer_id).cloned())
    }

    fn save_session(&self, session: StoredSession) -> Result<()> {
        self.check_writable()?;
        self.inner
            .lock()
            .sessions
            .insert(session.peer_id.clone(), session);
        Ok(())
    }

    fn delete_session(&self, peer_id: &str) -> Result<bool> {
        self.check_writable()?;
        Ok(self.inner.lock().sessions.remove(peer_id).is_some())
    }

    fn delete_all_sessions(&self) -> Result<usize> {
        self.check_writable()?;
        let mut inner = self.inner.lock();
        let count = inner.sessions.len();
        inner.sessions.clear();
        Ok(count)
    }

    fn list_sessions(&self) -> Result<Vec<String>> {
        let mut peers: Vec<String> = self.inner.lock().sessions.keys().cloned().collect();
        peers.sort();
        Ok(peers)
    }
}
