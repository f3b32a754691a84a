// Whisper Core
// Обмен ключами (X3DH), Double Ratchet и слой запросов к серверу ключей

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

// Модули
pub mod config;
pub mod crypto;
pub mod error;
pub mod key_data;
pub mod keystore;
pub mod protocol;
pub mod storage;
pub mod utils;

// Re-exports для удобства
pub use config::Config;
pub use crypto::messaging::double_ratchet::WhisperEnvelope;
pub use crypto::suites::classic::ClassicSuiteProvider;
pub use key_data::{KeyData, UnwrappedMessage, WrappedMessage};
pub use keystore::KeyStore;
pub use storage::{MemoryStorage, WhisperStorage};
pub use utils::error::{Result, WhisperError};
