//! Контракт хранилища ключей.
//!
//! Реализации должны быть внутренне синхронизированы: все методы принимают
//! `&self`. Каждая ошибка записи возвращается как `WhisperError::StorageError`,
//! решение о фатальности принимает вызывающий код.

use crate::storage::models::{StoredKeyBundle, StoredSession};
use crate::utils::error::Result;

pub trait WhisperStorage: Send + Sync {
    /// Загрузить локальный key bundle (identity, signed prekey, one-time prekeys)
    fn load_key_bundle(&self) -> Result<Option<StoredKeyBundle>>;

    /// Сохранить локальный key bundle, заменив предыдущий
    fn save_key_bundle(&self, bundle: StoredKeyBundle) -> Result<()>;

    /// Загрузить сессию с собеседником (не более одной на peer)
    fn load_session(&self, peer_id: &str) -> Result<Option<StoredSession>>;

    /// Сохранить сессию, заменив существующую для того же peer
    fn save_session(&self, session: StoredSession) -> Result<()>;

    /// Удалить сессию. Возвращает true, если она существовала.
    fn delete_session(&self, peer_id: &str) -> Result<bool>;

    /// Удалить все сессии. Возвращает количество удалённых.
    fn delete_all_sessions(&self) -> Result<usize>;

    /// Список peer_id, для которых есть сессия
    fn list_sessions(&self) -> Result<Vec<String>>;
}

impl<T: WhisperStorage + ?Sized> WhisperStorage for std::sync::Arc<T> {
    fn load_key_bundle(&self) -> Result<Option<StoredKeyBundle>> {
        (**self).load_key_bundle()
    }

    fn save_key_bundle(&self, bundle: StoredKeyBundle) -> Result<()> {
        (**self).save_key_bundle(bundle)
    }

    fn load_session(&self, peer_id: &str) -> Result<Option<StoredSession>> {
        (**self).load_session(peer_id)
    }

    fn save_session(&self, session: StoredSession) -> Result<()> {
        (**self).save_session(session)
    }

    fn delete_session(&self, peer_id: &str) -> Result<bool> {
        (**self).delete_session(peer_id)
    }

    fn delete_all_sessions(&self) -> Result<usize> {
        (**self).delete_all_sessions()
    }

    fn list_sessions(&self) -> Result<Vec<String>> {
        (**self).list_sessions()
    }
}
