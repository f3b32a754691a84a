//! Key Agreement Protocols
//!
//! Установка общего секретного ключа между двумя сторонами без предварительного
//! обмена секретами.
//!
//! ## Dataflow
//! ```text
//! Alice (инициатор)                          Bob (получатель)
//! ==================                         =================
//!
//! 1. Получает Bob's bundle от сервера
//! 2. Выполняет KeyAgreement::perform_as_initiator()
//!    → (shared_secret, InitiatorState)
//! 3. InitiatorState содержит ephemeral key
//!    (он же первый ratchet key Alice)
//!
//!                                            1. Получает первое сообщение с handshake header
//!                                            2. Выполняет KeyAgreement::perform_as_responder()
//!                                               → тот же shared_secret
//! ```

use crate::crypto::provider::CryptoProvider;
use crate::error::CryptoError;

/// Состояние инициатора после key agreement
///
/// Ephemeral key НЕ генерируется заново в ratchet: он используется в X3DH
/// (DH2, DH3, DH4) и как первый sending ratchet key.
#[derive(Debug, Clone)]
pub struct InitiatorState<P: CryptoProvider> {
    pub ephemeral_private: P::DhPrivateKey,
    pub ephemeral_public: P::DhPublicKey,
}

/// Протокол установки ключей (Key Agreement)
///
/// Не отвечает за шифрование сообщений (это делает ratchet) и хранение
/// ключей (это делает KeyStore).
pub trait KeyAgreement<P: CryptoProvider> {
    /// Публичные ключи собеседника, полученные от сервера
    type PublicKeyBundle: Clone;

    /// Общий секретный ключ (root key для ratchet)
    type SharedSecret;

    /// Выполнить handshake как инициатор (Alice)
    ///
    /// # Ошибки
    /// - подпись signed prekey не прошла проверку
    /// - неверный формат ключей
    fn perform_as_initiator(
        local_identity: &P::SignaturePrivateKey,
        remote_bundle: &Self::PublicKeyBundle,
    ) -> Result<(Self::SharedSecret, InitiatorState<P>), CryptoError>;

    /// Выполнить handshake как получатель (Bob)
    ///
    /// `local_one_time_prekey` передаётся, если инициатор использовал one-time prekey.
    fn perform_as_responder(
        local_identity: &P::SignaturePrivateKey,
        local_signed_prekey: &P::DhPrivateKey,
        local_one_time_prekey: Option<&P::DhPrivateKey>,
        remote_identity: &P::SignaturePublicKey,
        remote_ephemeral: &P::DhPublicKey,
    ) -> Result<Self::SharedSecret, CryptoError>;
}

pub mod x3dh;

pub use x3dh::{X3DHProtocol, X3DHPublicKeyBundle};
