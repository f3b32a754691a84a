// Base64 для ключей в сообщениях протокола

use crate::utils::error::{Result, WhisperError};
use base64::{engine::general_purpose, Engine};

pub fn encode(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(data)
}

pub fn decode(data: &str) -> Result<Vec<u8>> {
    general_purpose::STANDARD
        .decode(data)
        .map_err(|e| WhisperError::ValidationError(format!("Base64 decode failed: {}", e)))
}
