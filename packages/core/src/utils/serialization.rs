// Сериализация (bincode) для данных в хранилище

use crate::utils::error::{Result, WhisperError};
use serde::{Deserialize, Serialize};

pub fn to_bytes<T: Serialize>(data: &T) -> Result<Vec<u8>> {
    bincode::serialize(data)
        .map_err(|e| WhisperError::SerializationError(format!("Serialization failed: {}", e)))
}

pub fn from_bytes<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| WhisperError::SerializationError(format!("Deserialization failed: {}", e)))
}
