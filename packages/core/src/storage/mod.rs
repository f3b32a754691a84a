// Модуль хранилища: контракт и in-memory реализация

pub mod memory;
pub mod models;
pub mod traits;

pub use memory::MemoryStorage;
pub use traits::WhisperStorage;
