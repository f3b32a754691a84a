// Модели данных для хранилища

use serde::{Deserialize, Serialize};

/// Локальный key bundle в хранилище (СЕРИАЛИЗОВАННЫЙ)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredKeyBundle {
    pub bundle_data: Vec<u8>, // Bincode сериализация LocalKeyBundle
    pub updated_at: i64,
}

/// Сессия Double Ratchet в хранилище (СЕРИАЛИЗОВАННАЯ)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub session_id: String,
    pub peer_id: String,
    pub session_data: Vec<u8>, // Bincode сериализация SerializableSession
    pub last_used: i64,
    pub created_at: i64,
}
