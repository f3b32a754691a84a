use crate::config::Config;
use crate::utils::error::{Result, WhisperError};

pub fn validate_public_key(key: &[u8]) -> Result<[u8; 32]> {
    let expected_size = Config::global().public_key_size;
    if key.len() != expected_size {
        return Err(WhisperError::ValidationError(format!(
            "Public key must be {} bytes, got {}",
            expected_size,
            key.len()
        )));
    }
    key.try_into()
        .map_err(|_| WhisperError::ValidationError("Public key must be 32 bytes".to_string()))
}

pub fn validate_signature(sig: &[u8]) -> Result<[u8; 64]> {
    let expected_size = Config::global().signature_size;
    if sig.len() != expected_size {
        return Err(WhisperError::ValidationError(format!(
            "Signature must be {} bytes, got {}",
            expected_size,
            sig.len()
        )));
    }
    sig.try_into()
        .map_err(|_| WhisperError::ValidationError("Signature must be 64 bytes".to_string()))
}

/// Декодировать base64 публичный ключ и проверить размер
pub fn decode_public_key(encoded: &str) -> Result<[u8; 32]> {
    let bytes = crate::utils::b64::decode(encoded)?;
    validate_public_key(&bytes)
}

/// Декодировать base64 подпись и проверить размер
pub fn decode_signature(encoded: &str) -> Result<[u8; 64]> {
    let bytes = crate::utils::b64::decode(encoded)?;
    validate_signature(&bytes)
}
