//! Double Ratchet Protocol Implementation
//!
//! ## Архитектура
//!
//! 1. **DH Ratchet**: смена ephemeral ключей при каждой смене направления диалога
//! 2. **Symmetric Ratchet**: KDF_CK на каждое сообщение
//!
//! Каждая сторона хранит две цепочки:
//! - **inbound**: ephemeral key собеседника (+ id), chain key, previous chain length, chain index
//! - **outbound**: свой ephemeral key pair (+ id), chain key, previous chain length,
//!   chain index и pending handshake, пока собеседник не ответил
//!
//! Chain index внутри цепочки только растёт. DH ratchet step обнуляет индекс
//! и записывает старый финальный индекс в `previous_chain_length`.
//!
//! ## Dataflow Example
//!
//! ```text
//! Alice                                    Bob
//! -----                                    ---
//! root, CKs = KDF_RK(SK, DH(EK_A, SPK_B))
//! encrypt(msg1) [EK_A, id 0]  →            inbound пуст → DH ratchet step:
//!                                            CKr = KDF_RK(SK, DH(SPK_B, EK_A))
//!                                            новый B1 (id 1), CKs = KDF_RK(.., DH(B1, EK_A))
//!                                          decrypt(msg1) ✅
//!                              ←           encrypt(reply) [B1, id 1]
//! DH ratchet step (новый ключ B1)
//! decrypt(reply) ✅
//! ```

use crate::config::Config;
use crate::crypto::handshake::InitiatorState;
use crate::crypto::messaging::SecureMessaging;
use crate::crypto::provider::CryptoProvider;
use crate::crypto::SuiteID;
use crate::error::CryptoError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Handshake header: прикладывается инициатором к каждому сообщению,
/// пока собеседник не ответил
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeHeader {
    /// Identity public key инициатора (Ed25519)
    #[serde(with = "serde_bytes")]
    pub identity_key: Vec<u8>,
    /// EK_A из X3DH
    pub ephemeral_public: [u8; 32],
    pub signed_prekey_id: u32,
    pub one_time_prekey_id: Option<u32>,
}

/// Ratchet header сообщения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub ephemeral_public: [u8; 32],
    pub ephemeral_id: u32,
    pub previous_chain_length: u32,
    pub chain_index: u32,
}

impl MessageHeader {
    /// Associated data для AEAD
    pub fn associated_data(&self) -> Vec<u8> {
        let mut ad = Vec::with_capacity(32 + 12);
        ad.extend_from_slice(&self.ephemeral_public);
        ad.extend_from_slice(&self.ephemeral_id.to_be_bytes());
        ad.extend_from_slice(&self.previous_chain_length.to_be_bytes());
        ad.extend_from_slice(&self.chain_index.to_be_bytes());
        ad
    }
}

/// Encrypted message in wire format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhisperEnvelope {
    pub handshake: Option<HandshakeHeader>,
    pub header: MessageHeader,
    #[serde(with = "serde_bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
}

/// Параметры сессии, которые берутся из `Config` владельца
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Сколько message keys можно пропустить за один шаг и держать в кэше
    pub max_skipped_messages: u32,
    pub nonce_length: usize,
}

impl From<&Config> for SessionLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_skipped_messages: config.max_skipped_messages,
            nonce_length: config.chacha_nonce_length,
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

struct InboundChain<P: CryptoProvider> {
    identity_key: P::SignaturePublicKey,
    ephemeral_public: Option<P::DhPublicKey>,
    ephemeral_id: u32,
    chain_key: Option<P::AeadKey>,
    previous_chain_length: u32,
    chain_index: u32,
}

impl<P: CryptoProvider> Clone for InboundChain<P> {
    fn clone(&self) -> Self {
        Self {
            identity_key: self.identity_key.clone(),
            ephemeral_public: self.ephemeral_public.clone(),
            ephemeral_id: self.ephemeral_id,
            chain_key: self.chain_key.clone(),
            previous_chain_length: self.previous_chain_length,
            chain_index: self.chain_index,
        }
    }
}

struct OutboundChain<P: CryptoProvider> {
    ephemeral_private: P::DhPrivateKey,
    ephemeral_public: P::DhPublicKey,
    ephemeral_id: u32,
    chain_key: Option<P::AeadKey>,
    previous_chain_length: u32,
    chain_index: u32,
    handshake: Option<HandshakeHeader>,
}

impl<P: CryptoProvider> Clone for OutboundChain<P> {
    fn clone(&self) -> Self {
        Self {
            ephemeral_private: self.ephemeral_private.clone(),
            ephemeral_public: self.ephemeral_public.clone(),
            ephemeral_id: self.ephemeral_id,
            chain_key: self.chain_key.clone(),
            previous_chain_length: self.previous_chain_length,
            chain_index: self.chain_index,
            handshake: self.handshake.clone(),
        }
    }
}

struct SkippedKey<P: CryptoProvider> {
    key: P::AeadKey,
    created_at: i64,
}

impl<P: CryptoProvider> Clone for SkippedKey<P> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            created_at: self.created_at,
        }
    }
}

/// Double Ratchet Session ("message key bundle") для одного собеседника
pub struct DoubleRatchetSession<P: CryptoProvider> {
    suite_id: SuiteID,
    session_id: String,
    peer_id: String,
    root_key: P::AeadKey,
    inbound: InboundChain<P>,
    outbound: OutboundChain<P>,
    /// (ephemeral public собеседника, chain index) → message key
    skipped_message_keys: HashMap<(Vec<u8>, u32), SkippedKey<P>>,
    limits: SessionLimits,
}

impl<P: CryptoProvider> Clone for DoubleRatchetSession<P> {
    fn clone(&self) -> Self {
        Self {
            suite_id: self.suite_id,
            session_id: self.session_id.clone(),
            peer_id: self.peer_id.clone(),
            root_key: self.root_key.clone(),
            inbound: self.inbound.clone(),
            outbound: self.outbound.clone(),
            skipped_message_keys: self.skipped_message_keys.clone(),
            limits: self.limits,
        }
    }
}

fn to_array32(bytes: &[u8]) -> Result<[u8; 32], CryptoError> {
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidInputError("Invalid public key length".to_string()))
}

impl<P: CryptoProvider> SecureMessaging<P> for DoubleRatchetSession<P> {
    type EncryptedMessage = WhisperEnvelope;
    type Handshake = HandshakeHeader;

    fn new_initiator_session(
        root_key: &[u8],
        initiator_state: InitiatorState<P>,
        remote_identity: &P::SignaturePublicKey,
        remote_signed_prekey: &P::DhPublicKey,
        handshake: HandshakeHeader,
        peer_id: String,
    ) -> Result<Self, CryptoError> {
        use tracing::debug;

        debug!(
            target: "crypto::double_ratchet",
            peer_id = %peer_id,
            signed_prekey_id = handshake.signed_prekey_id,
            one_time_prekey_id = ?handshake.one_time_prekey_id,
            "Creating initiator session"
        );

        let root_key = P::aead_key_from_bytes(root_key.to_vec());
        let dh_output = P::dh(&initiator_state.ephemeral_private, remote_signed_prekey)?;
        let (root_key, sending_chain) = P::kdf_rk(&root_key, &dh_output)?;

        Ok(Self {
            suite_id: P::suite_id(),
            session_id: crate::utils::uuid::generate_v4(),
            peer_id,
            root_key,
            inbound: InboundChain {
                identity_key: remote_identity.clone(),
                ephemeral_public: Some(remote_signed_prekey.clone()),
                ephemeral_id: 0,
                chain_key: None,
                previous_chain_length: 0,
                chain_index: 0,
            },
            outbound: OutboundChain {
                ephemeral_private: initiator_state.ephemeral_private,
                ephemeral_public: initiator_state.ephemeral_public,
                ephemeral_id: 0,
                chain_key: Some(sending_chain),
                previous_chain_length: 0,
                chain_index: 0,
                handshake: Some(handshake),
            },
            skipped_message_keys: HashMap::new(),
            limits: SessionLimits::default(),
        })
    }

    fn new_responder_session(
        root_key: &[u8],
        local_signed_prekey: (P::DhPrivateKey, P::DhPublicKey),
        remote_identity: &P::SignaturePublicKey,
        peer_id: String,
    ) -> Result<Self, CryptoError> {
        use tracing::debug;

        debug!(
            target: "crypto::double_ratchet",
            peer_id = %peer_id,
            "Creating responder session"
        );

        let (ephemeral_private, ephemeral_public) = local_signed_prekey;

        Ok(Self {
            suite_id: P::suite_id(),
            session_id: crate::utils::uuid::generate_v4(),
            peer_id,
            root_key: P::aead_key_from_bytes(root_key.to_vec()),
            inbound: InboundChain {
                identity_key: remote_identity.clone(),
                ephemeral_public: None,
                ephemeral_id: 0,
                chain_key: None,
                previous_chain_length: 0,
                chain_index: 0,
            },
            outbound: OutboundChain {
                ephemeral_private,
                ephemeral_public,
                ephemeral_id: 0,
                chain_key: None,
                previous_chain_length: 0,
                chain_index: 0,
                handshake: None,
            },
            skipped_message_keys: HashMap::new(),
            limits: SessionLimits::default(),
        })
    }

    fn encrypt(&mut self, plaintext: &[u8]) -> Result<WhisperEnvelope, CryptoError> {
        use tracing::trace;

        let (chain_index, message_key) = self.advance_outbound()?;
        let header = MessageHeader {
            ephemeral_public: to_array32(self.outbound.ephemeral_public.as_ref())?,
            ephemeral_id: self.outbound.ephemeral_id,
            previous_chain_length: self.outbound.previous_chain_length,
            chain_index,
        };

        let nonce = P::generate_nonce(self.limits.nonce_length)?;
        let ciphertext = P::aead_encrypt(&message_key, &nonce, plaintext, Some(&header.associated_data()))?;

        trace!(
            target: "crypto::double_ratchet",
            peer_id = %self.peer_id,
            ephemeral_id = header.ephemeral_id,
            chain_index,
            ciphertext_len = ciphertext.len(),
            "Message encrypted"
        );

        Ok(WhisperEnvelope {
            handshake: self.outbound.handshake.clone(),
            header,
            nonce,
            ciphertext,
        })
    }

    fn decrypt(&mut self, encrypted: &WhisperEnvelope) -> Result<Vec<u8>, CryptoError> {
        use tracing::debug;

        debug!(
            target: "crypto::double_ratchet",
            peer_id = %self.peer_id,
            ephemeral_id = encrypted.header.ephemeral_id,
            chain_index = encrypted.header.chain_index,
            current_chain_index = self.inbound.chain_index,
            skipped_keys_count = self.skipped_message_keys.len(),
            "Decrypting message"
        );

        // Работаем на копии: состояние меняется только при успехе
        let mut next = self.clone();
        let plaintext = next.decrypt_in_place(encrypted).map_err(|e| {
            debug!(target: "crypto::double_ratchet", error = %e, "Decryption failed");
            e
        })?;
        *self = next;
        Ok(plaintext)
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn peer_id(&self) -> &str {
        &self.peer_id
    }

    fn cleanup_old_skipped_keys(&mut self, max_age_seconds: i64) {
        use tracing::debug;

        let now = crate::utils::time::current_timestamp();
        let initial_count = self.skipped_message_keys.len();
        self.skipped_message_keys
            .retain(|_, skipped| now - skipped.created_at < max_age_seconds);

        let removed_count = initial_count - self.skipped_message_keys.len();
        if removed_count > 0 {
            debug!(
                target: "crypto::double_ratchet",
                removed = removed_count,
                remaining = self.skipped_message_keys.len(),
                "Cleaned up old skipped message keys"
            );
        }
    }
}

// Internal implementation details
impl<P: CryptoProvider> DoubleRatchetSession<P> {
    /// Применить лимиты из конфигурации владельца (не сериализуются)
    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Identity key собеседника
    pub fn remote_identity(&self) -> &P::SignaturePublicKey {
        &self.inbound.identity_key
    }

    /// Handshake ещё не подтверждён ответом собеседника
    pub fn pending_handshake(&self) -> Option<&HandshakeHeader> {
        self.outbound.handshake.as_ref()
    }

    pub fn sending_chain_index(&self) -> u32 {
        self.outbound.chain_index
    }

    pub fn receiving_chain_index(&self) -> u32 {
        self.inbound.chain_index
    }

    pub fn skipped_keys_count(&self) -> usize {
        self.skipped_message_keys.len()
    }

    /// Получить следующий message key из sending chain
    fn advance_outbound(&mut self) -> Result<(u32, P::AeadKey), CryptoError> {
        let chain_key = self
            .outbound
            .chain_key
            .as_ref()
            .ok_or_else(|| CryptoError::SessionError("No sending chain yet".to_string()))?;
        let next_index = self
            .outbound
            .chain_index
            .checked_add(1)
            .ok_or_else(|| CryptoError::SessionError("Sending chain exhausted".to_string()))?;

        let (message_key, next_chain_key) = P::kdf_ck(chain_key)?;
        let index = self.outbound.chain_index;
        self.outbound.chain_key = Some(next_chain_key);
        self.outbound.chain_index = next_index;
        Ok((index, message_key))
    }

    fn decrypt_in_place(&mut self, encrypted: &WhisperEnvelope) -> Result<Vec<u8>, CryptoError> {
        let header = &encrypted.header;

        let skipped_id = (header.ephemeral_public.to_vec(), header.chain_index);
        if let Some(skipped) = self.skipped_message_keys.remove(&skipped_id) {
            tracing::trace!(
                target: "crypto::double_ratchet",
                chain_index = header.chain_index,
                "Found skipped message key"
            );
            let plaintext = Self::open(&skipped.key, encrypted)?;
            self.outbound.handshake = None;
            return Ok(plaintext);
        }

        let is_current_chain = self
            .inbound
            .ephemeral_public
            .as_ref()
            .map_or(false, |current| current.as_ref() == header.ephemeral_public.as_slice());

        if !is_current_chain {
            self.skip_inbound_until(header.previous_chain_length)?;
            let remote = P::dh_public_key_from_bytes(header.ephemeral_public.to_vec());
            self.dh_ratchet(remote, header.ephemeral_id)?;
        }

        if header.chain_index < self.inbound.chain_index {
            return Err(CryptoError::SessionError(format!(
                "Message key {} already used or expired",
                header.chain_index
            )));
        }

        self.skip_inbound_until(header.chain_index)?;

        let chain_key = self
            .inbound
            .chain_key
            .as_ref()
            .ok_or_else(|| CryptoError::SessionError("No receiving chain".to_string()))?;
        let (message_key, next_chain_key) = P::kdf_ck(chain_key)?;
        self.inbound.chain_key = Some(next_chain_key);
        self.inbound.chain_index = header.chain_index.saturating_add(1);

        let plaintext = Self::open(&message_key, encrypted)?;
        self.outbound.handshake = None;
        Ok(plaintext)
    }

    /// Сохранить message keys текущей inbound цепочки до индекса `until` (не включая)
    fn skip_inbound_until(&mut self, until: u32) -> Result<(), CryptoError> {
        let Some(mut chain_key) = self.inbound.chain_key.clone() else {
            return Ok(());
        };
        if until <= self.inbound.chain_index {
            return Ok(());
        }

        let to_skip = until - self.inbound.chain_index;
        let limit = self.limits.max_skipped_messages;
        if to_skip > limit {
            return Err(CryptoError::TooManySkippedMessages {
                requested: to_skip,
                limit,
            });
        }

        let overflow = (self.skipped_message_keys.len() + to_skip as usize).saturating_sub(limit as usize);
        if overflow > 0 {
            self.evict_oldest_skipped_keys(overflow);
        }

        let ephemeral = self
            .inbound
            .ephemeral_public
            .as_ref()
            .map(|k| k.as_ref().to_vec())
            .ok_or_else(|| CryptoError::SessionError("Receiving chain without ephemeral key".to_string()))?;
        let now = crate::utils::time::current_timestamp();

        while self.inbound.chain_index < until {
            let (message_key, next_chain_key) = P::kdf_ck(&chain_key)?;
            self.skipped_message_keys.insert(
                (ephemeral.clone(), self.inbound.chain_index),
                SkippedKey {
                    key: message_key,
                    created_at: now,
                },
            );
            chain_key = next_chain_key;
            self.inbound.chain_index += 1;
        }
        self.inbound.chain_key = Some(chain_key);
        Ok(())
    }

    /// Удалить `count` самых старых skipped message keys
    fn evict_oldest_skipped_keys(&mut self, count: usize) {
        let mut by_age: Vec<(i64, u32, Vec<u8>)> = self
            .skipped_message_keys
            .iter()
            .map(|((ephemeral, index), skipped)| (skipped.created_at, *index, ephemeral.clone()))
            .collect();
        by_age.sort_unstable();

        for (_, index, ephemeral) in by_age.into_iter().take(count) {
            self.skipped_message_keys.remove(&(ephemeral, index));
        }

        tracing::debug!(
            target: "crypto::double_ratchet",
            peer_id = %self.peer_id,
            evicted = count,
            remaining = self.skipped_message_keys.len(),
            "Evicted oldest skipped message keys"
        );
    }

    /// Выполнить DH ratchet step для нового ephemeral key собеседника
    fn dh_ratchet(&mut self, remote: P::DhPublicKey, remote_id: u32) -> Result<(), CryptoError> {
        use tracing::debug;

        // 1. Receiving chain: DH(текущий свой ephemeral, новый ephemeral собеседника)
        let dh_receive = P::dh(&self.outbound.ephemeral_private, &remote)?;
        let (root_key, receiving_chain) = P::kdf_rk(&self.root_key, &dh_receive)?;

        // 2. Новый свой ephemeral и sending chain
        let (ephemeral_private, ephemeral_public) = P::generate_dh_keys()?;
        let dh_send = P::dh(&ephemeral_private, &remote)?;
        let (root_key, sending_chain) = P::kdf_rk(&root_key, &dh_send)?;

        self.root_key = root_key;

        self.inbound.previous_chain_length = self.inbound.chain_index;
        self.inbound.ephemeral_public = Some(remote);
        self.inbound.ephemeral_id = remote_id;
        self.inbound.chain_key = Some(receiving_chain);
        self.inbound.chain_index = 0;

        self.outbound.previous_chain_length = self.outbound.chain_index;
        self.outbound.ephemeral_private = ephemeral_private;
        self.outbound.ephemeral_public = ephemeral_public;
        self.outbound.ephemeral_id = self.outbound.ephemeral_id.wrapping_add(1);
        self.outbound.chain_key = Some(sending_chain);
        self.outbound.chain_index = 0;

        debug!(
            target: "crypto::double_ratchet",
            peer_id = %self.peer_id,
            remote_ephemeral_id = remote_id,
            local_ephemeral_id = self.outbound.ephemeral_id,
            previous_sending_length = self.outbound.previous_chain_length,
            "DH ratchet step completed"
        );
        Ok(())
    }

    fn open(message_key: &P::AeadKey, encrypted: &WhisperEnvelope) -> Result<Vec<u8>, CryptoError> {
        P::aead_decrypt(
            message_key,
            &encrypted.nonce,
            &encrypted.ciphertext,
            Some(&encrypted.header.associated_data()),
        )
    }

    /// Сериализовать сессию для сохранения
    pub fn to_serializable(&self) -> SerializableSession {
        SerializableSession {
            suite_id: self.suite_id,
            session_id: self.session_id.clone(),
            peer_id: self.peer_id.clone(),
            root_key: self.root_key.as_ref().to_vec(),
            inbound_identity_key: self.inbound.identity_key.as_ref().to_vec(),
            inbound_ephemeral_public: self.inbound.ephemeral_public.as_ref().map(|k| k.as_ref().to_vec()),
            inbound_ephemeral_id: self.inbound.ephemeral_id,
            inbound_chain_key: self.inbound.chain_key.as_ref().map(|k| k.as_ref().to_vec()),
            inbound_previous_chain_length: self.inbound.previous_chain_length,
            inbound_chain_index: self.inbound.chain_index,
            outbound_ephemeral_private: self.outbound.ephemeral_private.as_ref().to_vec(),
            outbound_ephemeral_public: self.outbound.ephemeral_public.as_ref().to_vec(),
            outbound_ephemeral_id: self.outbound.ephemeral_id,
            outbound_chain_key: self.outbound.chain_key.as_ref().map(|k| k.as_ref().to_vec()),
            outbound_previous_chain_length: self.outbound.previous_chain_length,
            outbound_chain_index: self.outbound.chain_index,
            handshake: self.outbound.handshake.clone(),
            skipped_message_keys: self
                .skipped_message_keys
                .iter()
                .map(|((ephemeral, index), skipped)| SerializableSkippedKey {
                    ephemeral_public: ephemeral.clone(),
                    chain_index: *index,
                    message_key: skipped.key.as_ref().to_vec(),
                    created_at: skipped.created_at,
                })
                .collect(),
        }
    }

    /// Десериализовать сессию
    pub fn from_serializable(data: SerializableSession) -> Result<Self, CryptoError> {
        if data.suite_id != P::suite_id() {
            return Err(CryptoError::DeserializationError(format!(
                "Session suite {} does not match provider suite {}",
                data.suite_id,
                P::suite_id()
            )));
        }

        Ok(Self {
            suite_id: data.suite_id,
            session_id: data.session_id,
            peer_id: data.peer_id,
            root_key: P::aead_key_from_bytes(data.root_key),
            inbound: InboundChain {
                identity_key: P::signature_public_key_from_bytes(data.inbound_identity_key),
                ephemeral_public: data.inbound_ephemeral_public.map(P::dh_public_key_from_bytes),
                ephemeral_id: data.inbound_ephemeral_id,
                chain_key: data.inbound_chain_key.map(P::aead_key_from_bytes),
                previous_chain_length: data.inbound_previous_chain_length,
                chain_index: data.inbound_chain_index,
            },
            outbound: OutboundChain {
                ephemeral_private: P::dh_private_key_from_bytes(data.outbound_ephemeral_private),
                ephemeral_public: P::dh_public_key_from_bytes(data.outbound_ephemeral_public),
                ephemeral_id: data.outbound_ephemeral_id,
                chain_key: data.outbound_chain_key.map(P::aead_key_from_bytes),
                previous_chain_length: data.outbound_previous_chain_length,
                chain_index: data.outbound_chain_index,
                handshake: data.handshake,
            },
            skipped_message_keys: data
                .skipped_message_keys
                .into_iter()
                .map(|entry| {
                    (
                        (entry.ephemeral_public, entry.chain_index),
                        SkippedKey {
                            key: P::aead_key_from_bytes(entry.message_key),
                            created_at: entry.created_at,
                        },
                    )
                })
                .collect(),
            limits: SessionLimits::default(),
        })
    }
}

/// Serializable session format for storage
#[derive(Clone, Serialize, Deserialize)]
pub struct SerializableSession {
    suite_id: u16,
    session_id: String,
    peer_id: String,
    #[serde(with = "serde_bytes")]
    root_key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    inbound_identity_key: Vec<u8>,
    inbound_ephemeral_public: Option<Vec<u8>>,
    inbound_ephemeral_id: u32,
    inbound_chain_key: Option<Vec<u8>>,
    inbound_previous_chain_length: u32,
    inbound_chain_index: u32,
    #[serde(with = "serde_bytes")]
    outbound_ephemeral_private: Vec<u8>,
    #[serde(with = "serde_bytes")]
    outbound_ephemeral_public: Vec<u8>,
    outbound_ephemeral_id: u32,
    outbound_chain_key: Option<Vec<u8>>,
    outbound_previous_chain_length: u32,
    outbound_chain_index: u32,
    handshake: Option<HandshakeHeader>,
    skipped_message_keys: Vec<SerializableSkippedKey>,
}

#[derive(Clone, Serialize, Deserialize)]
struct SerializableSkippedKey {
    #[serde(with = "serde_bytes")]
    ephemeral_public: Vec<u8>,
    chain_index: u32,
    #[serde(with = "serde_bytes")]
    message_key: Vec<u8>,
    created_at: i64,
}
