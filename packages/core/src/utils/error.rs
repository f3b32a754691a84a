// Типы ошибок

use thiserror::Error;

use crate::error::CryptoError;
use crate::protocol::request::RequestError;

#[derive(Error, Debug)]
pub enum WhisperError {
    #[error("Cryptography error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Request failed: {0}")]
    Request(#[from] RequestError),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("No local key bundle")]
    NoLocalKeyBundle,

    #[error("One-time prekey {0} not found")]
    PreKeyNotFound(u32),

    #[error("Signed prekey {requested} does not match current {current}")]
    SignedPreKeyMismatch { requested: u32, current: u32 },
}

pub type Result<T> = std::result::Result<T, WhisperError>;
