//! Secure Messaging Protocols
//!
//! Протоколы защищённого обмена сообщениями поверх результата KeyAgreement.
//!
//! ## Dataflow
//! ```text
//! Alice (инициатор)                          Bob (получатель)
//! ==================                         =================
//!
//! 1. new_initiator_session(root_key, initiator_state, SPK_B, handshake)
//!    → sending chain = KDF_RK(SK, DH(EK_A, SPK_B))
//! 2. encrypt(msg1): header.ephemeral = EK_A, в envelope есть handshake header
//!
//!                                            1. new_responder_session(root_key, SPK_B, IK_A)
//!                                            2. decrypt(msg1): первый DH ratchet step
//!                                            3. encrypt(reply) с новым ephemeral key
//!
//! 3. decrypt(reply): DH ratchet step, handshake header больше не отправляется
//! ```
//!
//! ## Security Properties
//!
//! - Forward secrecy: message keys удаляются после использования.
//! - Break-in recovery: каждый DH ratchet step вносит свежую энтропию.
//! - Out-of-order: skipped message keys, ограниченные по количеству и возрасту.

use crate::crypto::handshake::InitiatorState;
use crate::crypto::provider::CryptoProvider;
use crate::error::CryptoError;

/// Протокол защищённого обмена сообщениями
///
/// ## Не отвечает за:
/// - Key agreement / handshake (это делает KeyAgreement)
/// - Хранение сессий (это делает KeyStore)
pub trait SecureMessaging<P: CryptoProvider>: Sized {
    /// Зашифрованное сообщение в wire format
    type EncryptedMessage;

    /// Данные handshake, которые инициатор прикладывает к сообщениям,
    /// пока собеседник не ответил
    type Handshake;

    /// Создать сессию как инициатор (Alice)
    ///
    /// Ephemeral key из `initiator_state` становится первым sending ratchet key.
    fn new_initiator_session(
        root_key: &[u8],
        initiator_state: InitiatorState<P>,
        remote_identity: &P::SignaturePublicKey,
        remote_signed_prekey: &P::DhPublicKey,
        handshake: Self::Handshake,
        peer_id: String,
    ) -> Result<Self, CryptoError>;

    /// Создать сессию как получатель (Bob)
    ///
    /// Signed prekey служит начальным ratchet key; первый DH ratchet step
    /// выполняется при расшифровке первого сообщения.
    fn new_responder_session(
        root_key: &[u8],
        local_signed_prekey: (P::DhPrivateKey, P::DhPublicKey),
        remote_identity: &P::SignaturePublicKey,
        peer_id: String,
    ) -> Result<Self, CryptoError>;

    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Self::EncryptedMessage, CryptoError>;

    /// Расшифровать сообщение. При ошибке состояние сессии не меняется.
    fn decrypt(&mut self, encrypted: &Self::EncryptedMessage) -> Result<Vec<u8>, CryptoError>;

    fn session_id(&self) -> &str;

    fn peer_id(&self) -> &str;

    /// Удалить skipped message keys старше `max_age_seconds`
    fn cleanup_old_skipped_keys(&mut self, max_age_seconds: i64);
}

pub mod double_ratchet;
