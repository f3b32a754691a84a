//! KeyStore: операции над локальным key bundle и сессиями поверх `WhisperStorage`.
//!
//! Все изменяющие операции вызываются последовательно (KeyData держит KeyStore
//! за одним async mutex). Сессии хранятся как bincode `SerializableSession`.

use crate::config::Config;
use crate::crypto::handshake::{KeyAgreement, X3DHProtocol, X3DHPublicKeyBundle};
use crate::crypto::keys::{LocalKeyBundle, OneTimePreKey};
use crate::crypto::messaging::double_ratchet::{
    DoubleRatchetSession, HandshakeHeader, SerializableSession, SessionLimits, WhisperEnvelope,
};
use crate::crypto::messaging::SecureMessaging;
use crate::crypto::provider::CryptoProvider;
use crate::crypto::suites::classic::ClassicSuiteProvider;
use crate::storage::models::{StoredKeyBundle, StoredSession};
use crate::storage::traits::WhisperStorage;
use crate::utils::error::{Result, WhisperError};
use crate::utils::serialization;
use crate::utils::time::current_timestamp;
use std::marker::PhantomData;
use tracing::{debug, info, warn};

pub type RatchetSession<P = ClassicSuiteProvider> = DoubleRatchetSession<P>;

pub struct KeyStore<S: WhisperStorage, P: CryptoProvider = ClassicSuiteProvider> {
    storage: S,
    config: Config,
    _phantom: PhantomData<P>,
}

impl<S: WhisperStorage, P: CryptoProvider> KeyStore<S, P> {
    pub fn new(storage: S, config: Config) -> Self {
        Self {
            storage,
            config,
            _phantom: PhantomData,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // === Local key bundle ===

    /// Локальный key bundle, если он уже создан
    pub fn key_bundle(&self) -> Result<Option<LocalKeyBundle>> {
        self.storage
            .load_key_bundle()?
            .map(|stored| serialization::from_bytes(&stored.bundle_data))
            .transpose()
    }

    fn require_key_bundle(&self) -> Result<LocalKeyBundle> {
        self.key_bundle()?.ok_or(WhisperError::NoLocalKeyBundle)
    }

    fn save_key_bundle(&self, bundle: &LocalKeyBundle) -> Result<()> {
        self.storage.save_key_bundle(StoredKeyBundle {
            bundle_data: serialization::to_bytes(bundle)?,
            updated_at: current_timestamp(),
        })
    }

    /// Создать новый key bundle (полная перерегистрация ключей).
    ///
    /// Identity переиспользуется, signed prekey и one-time prekeys создаются
    /// заново. Старые one-time prekeys и все сессии удаляются.
    pub fn create_local_key_bundle(&self) -> Result<LocalKeyBundle> {
        let previous = self.key_bundle()?;
        let bundle = LocalKeyBundle::generate::<P>(previous.as_ref(), self.config.one_time_prekeys_to_upload)?;

        self.save_key_bundle(&bundle)?;
        let dropped_sessions = self.delete_all_message_key_bundles()?;

        info!(
            target: "keystore",
            signed_prekey_id = bundle.signed_prekey.id,
            one_time_prekeys = bundle.one_time_prekeys.len(),
            next_one_time_prekey_id = bundle.next_one_time_prekey_id,
            replaced_existing = previous.is_some(),
            dropped_sessions,
            "Created local key bundle"
        );
        Ok(bundle)
    }

    /// Отметить bundle как загруженный на сервер.
    ///
    /// Ничего не делает, если за время загрузки bundle был заменён.
    pub fn mark_key_bundle_uploaded(&self, signed_prekey_id: u32) -> Result<bool> {
        let mut bundle = self.require_key_bundle()?;
        if bundle.signed_prekey.id != signed_prekey_id {
            warn!(
                target: "keystore",
                uploaded = signed_prekey_id,
                current = bundle.signed_prekey.id,
                "Uploaded key bundle was superseded"
            );
            return Ok(false);
        }
        bundle.uploaded = true;
        self.save_key_bundle(&bundle)?;
        Ok(true)
    }

    /// Сгенерировать и добавить в пул ещё `count` one-time prekeys
    pub fn append_one_time_prekeys(&self, count: usize) -> Result<Vec<OneTimePreKey>> {
        let mut bundle = self.require_key_bundle()?;
        let added = bundle.append_one_time_prekeys::<P>(count)?;
        self.save_key_bundle(&bundle)?;

        debug!(
            target: "keystore",
            added = added.len(),
            pool_size = bundle.one_time_prekeys.len(),
            next_one_time_prekey_id = bundle.next_one_time_prekey_id,
            "Appended one-time prekeys"
        );
        Ok(added)
    }

    // === Sessions ===

    /// Сессия с собеседником, если есть
    pub fn message_key_bundle(&self, peer_id: &str) -> Result<Option<RatchetSession<P>>> {
        let Some(stored) = self.storage.load_session(peer_id)? else {
            return Ok(None);
        };
        let data: SerializableSession = serialization::from_bytes(&stored.session_data)?;
        let mut session = DoubleRatchetSession::<P>::from_serializable(data)?
            .with_limits(SessionLimits::from(&self.config));
        session.cleanup_old_skipped_keys(self.config.max_skipped_message_age_seconds);
        Ok(Some(session))
    }

    fn save_message_key_bundle(&self, session: &RatchetSession<P>) -> Result<()> {
        let now = current_timestamp();
        let created_at = self
            .storage
            .load_session(session.peer_id())?
            .filter(|existing| existing.session_id == session.session_id())
            .map_or(now, |existing| existing.created_at);

        self.storage.save_session(StoredSession {
            session_id: session.session_id().to_string(),
            peer_id: session.peer_id().to_string(),
            session_data: serialization::to_bytes(&session.to_serializable())?,
            last_used: now,
            created_at,
        })
    }

    /// Создать исходящую сессию из опубликованного bundle собеседника и сохранить её
    pub fn initiate_session_setup(
        &self,
        peer_id: &str,
        remote_bundle: &X3DHPublicKeyBundle,
    ) -> Result<RatchetSession<P>> {
        let local = self.require_key_bundle()?;

        let (root_key, initiator_state) =
            X3DHProtocol::<P>::perform_as_initiator(&local.identity.signing_key::<P>(), remote_bundle)?;

        let handshake = HandshakeHeader {
            identity_key: local.identity.public().to_vec(),
            ephemeral_public: initiator_state
                .ephemeral_public
                .as_ref()
                .try_into()
                .map_err(|_| WhisperError::ValidationError("Ephemeral key must be 32 bytes".to_string()))?,
            signed_prekey_id: remote_bundle.signed_prekey_id,
            one_time_prekey_id: remote_bundle.one_time_prekey.as_ref().map(|(id, _)| *id),
        };

        let remote_identity = P::signature_public_key_from_bytes(remote_bundle.identity_public.clone());
        let remote_signed_prekey = P::dh_public_key_from_bytes(remote_bundle.signed_prekey_public.clone());
        let session = DoubleRatchetSession::<P>::new_initiator_session(
            &root_key,
            initiator_state,
            &remote_identity,
            &remote_signed_prekey,
            handshake,
            peer_id.to_string(),
        )?
        .with_limits(SessionLimits::from(&self.config));

        self.save_message_key_bundle(&session)?;
        info!(
            target: "keystore",
            peer_id,
            session_id = session.session_id(),
            signed_prekey_id = remote_bundle.signed_prekey_id,
            one_time_prekey_id = ?remote_bundle.one_time_prekey.as_ref().map(|(id, _)| *id),
            "Initiated session setup"
        );
        Ok(session)
    }

    /// Создать входящую сессию из handshake header.
    ///
    /// Сессия НЕ сохраняется: её сохраняет `accept_session_setup` после
    /// успешной расшифровки первого сообщения.
    pub fn receive_session_setup(
        &self,
        peer_id: &str,
        handshake: &HandshakeHeader,
    ) -> Result<RatchetSession<P>> {
        let local = self.require_key_bundle()?;

        if handshake.signed_prekey_id != local.signed_prekey.id {
            return Err(WhisperError::SignedPreKeyMismatch {
                requested: handshake.signed_prekey_id,
                current: local.signed_prekey.id,
            });
        }

        let one_time_private = match handshake.one_time_prekey_id {
            Some(id) => Some(
                local
                    .one_time_prekeys
                    .get(&id)
                    .ok_or(WhisperError::PreKeyNotFound(id))?
                    .private_key::<P>(),
            ),
            None => None,
        };

        let remote_identity = P::signature_public_key_from_bytes(handshake.identity_key.clone());
        let remote_ephemeral = P::dh_public_key_from_bytes(handshake.ephemeral_public.to_vec());

        let root_key = X3DHProtocol::<P>::perform_as_responder(
            &local.identity.signing_key::<P>(),
            &local.signed_prekey.private_key::<P>(),
            one_time_private.as_ref(),
            &remote_identity,
            &remote_ephemeral,
        )?;

        let session = DoubleRatchetSession::<P>::new_responder_session(
            &root_key,
            (
                local.signed_prekey.private_key::<P>(),
                local.signed_prekey.public_key::<P>(),
            ),
            &remote_identity,
            peer_id.to_string(),
        )?
        .with_limits(SessionLimits::from(&self.config));

        debug!(
            target: "keystore",
            peer_id,
            signed_prekey_id = handshake.signed_prekey_id,
            one_time_prekey_id = ?handshake.one_time_prekey_id,
            "Received session setup"
        );
        Ok(session)
    }

    /// Расшифровать первое сообщение входящей сессии, затем сохранить сессию
    /// и удалить использованный one-time prekey.
    ///
    /// Сессия сохраняется первой: если сохранение не удалось, one-time
    /// prekey остаётся в пуле и handshake можно принять повторно.
    pub fn accept_session_setup(
        &self,
        session: &mut RatchetSession<P>,
        envelope: &WhisperEnvelope,
    ) -> Result<Vec<u8>> {
        let plaintext = session.decrypt(envelope)?;

        self.save_message_key_bundle(session)?;

        if let Some(id) = envelope.handshake.as_ref().and_then(|h| h.one_time_prekey_id) {
            let mut bundle = self.require_key_bundle()?;
            if bundle.one_time_prekeys.remove(&id).is_some() {
                self.save_key_bundle(&bundle)?;
                debug!(target: "keystore", one_time_prekey_id = id, "Consumed one-time prekey");
            }
        }

        info!(
            target: "keystore",
            peer_id = session.peer_id(),
            session_id = session.session_id(),
            "Accepted session setup"
        );
        Ok(plaintext)
    }

    /// Зашифровать сообщение и сохранить обновлённую сессию
    pub fn encrypt_message(&self, session: &mut RatchetSession<P>, plaintext: &[u8]) -> Result<WhisperEnvelope> {
        let envelope = session.encrypt(plaintext)?;
        self.save_message_key_bundle(session)?;
        Ok(envelope)
    }

    /// Расшифровать сообщение и сохранить обновлённую сессию
    pub fn decrypt_message(&self, session: &mut RatchetSession<P>, envelope: &WhisperEnvelope) -> Result<Vec<u8>> {
        let plaintext = session.decrypt(envelope)?;
        self.save_message_key_bundle(session)?;
        Ok(plaintext)
    }

    /// Удалить сессию с собеседником
    pub fn delete_message_key_bundles(&self, peer_id: &str) -> Result<bool> {
        let deleted = self.storage.delete_session(peer_id)?;
        debug!(target: "keystore", peer_id, deleted, "Deleted message key bundle");
        Ok(deleted)
    }

    /// Удалить все сессии
    pub fn delete_all_message_key_bundles(&self) -> Result<usize> {
        let deleted = self.storage.delete_all_sessions()?;
        debug!(target: "keystore", deleted, "Deleted all message key bundles");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use std::sync::Arc;

    type Store = KeyStore<Arc<MemoryStorage>>;

    fn store() -> Store {
        KeyStore::new(Arc::new(MemoryStorage::new()), Config::default())
    }

    /// Публичный bundle так, как его выдал бы сервер
    fn published(bundle: &LocalKeyBundle, one_time: Option<u32>) -> X3DHPublicKeyBundle {
        X3DHPublicKeyBundle {
            identity_public: bundle.identity.public().to_vec(),
            signed_prekey_id: bundle.signed_prekey.id,
            signed_prekey_public: bundle.signed_prekey.public.clone(),
            signature: bundle.signed_prekey.signature.clone(),
            one_time_prekey: one_time.map(|id| (id, bundle.one_time_prekeys[&id].public.clone())),
            suite_id: ClassicSuiteProvider::suite_id(),
        }
    }

    #[test]
    fn test_session_setup_roundtrip_consumes_one_time_prekey() {
        let alice = store();
        let bob = store();
        alice.create_local_key_bundle().unwrap();
        let bob_bundle = bob.create_local_key_bundle().unwrap();
        let otk_id = *bob_bundle.one_time_prekeys.keys().next().unwrap();

        let mut outbound = alice
            .initiate_session_setup("bob", &published(&bob_bundle, Some(otk_id)))
            .unwrap();
        assert!(alice.message_key_bundle("bob").unwrap().is_some());

        let envelope = alice.encrypt_message(&mut outbound, b"hi bob").unwrap();
        let handshake = envelope.handshake.clone().unwrap();
        assert_eq!(handshake.one_time_prekey_id, Some(otk_id));

        let mut inbound = bob.receive_session_setup("alice", &handshake).unwrap();
        // Не сохраняется до успешной расшифровки
        assert!(bob.message_key_bundle("alice").unwrap().is_none());

        let plaintext = bob.accept_session_setup(&mut inbound, &envelope).unwrap();
        assert_eq!(plaintext, b"hi bob");
        assert!(bob.message_key_bundle("alice").unwrap().is_some());

        // Повторное использование того же one-time prekey отклоняется
        let replay = bob.receive_session_setup("mallory", &handshake);
        assert!(matches!(replay, Err(WhisperError::PreKeyNotFound(id)) if id == otk_id));
    }

    #[test]
    fn test_failed_session_save_keeps_one_time_prekey() {
        let alice = store();
        let bob = store();
        alice.create_local_key_bundle().unwrap();
        let bob_bundle = bob.create_local_key_bundle().unwrap();
        let otk_id = *bob_bundle.one_time_prekeys.keys().next().unwrap();

        let mut outbound = alice
            .initiate_session_setup("bob", &published(&bob_bundle, Some(otk_id)))
            .unwrap();
        let envelope = alice.encrypt_message(&mut outbound, b"hi bob").unwrap();
        let handshake = envelope.handshake.clone().unwrap();

        bob.storage().set_fail_writes(true);
        let mut inbound = bob.receive_session_setup("alice", &handshake).unwrap();
        assert!(matches!(
            bob.accept_session_setup(&mut inbound, &envelope),
            Err(WhisperError::StorageError(_))
        ));
        assert!(bob.key_bundle().unwrap().unwrap().one_time_prekeys.contains_key(&otk_id));

        // После восстановления хранилища тот же handshake принимается
        bob.storage().set_fail_writes(false);
        let mut inbound = bob.receive_session_setup("alice", &handshake).unwrap();
        assert_eq!(bob.accept_session_setup(&mut inbound, &envelope).unwrap(), b"hi bob");
        assert!(!bob.key_bundle().unwrap().unwrap().one_time_prekeys.contains_key(&otk_id));
    }

    #[test]
    fn test_sessions_use_injected_limits() {
        let config = Config {
            max_skipped_messages: 7,
            ..Config::default()
        };
        let alice: Store = KeyStore::new(Arc::new(MemoryStorage::new()), config.clone());
        let bob = store();
        alice.create_local_key_bundle().unwrap();
        let bob_bundle = bob.create_local_key_bundle().unwrap();

        let session = alice.initiate_session_setup("bob", &published(&bob_bundle, None)).unwrap();
        assert_eq!(session.limits(), SessionLimits::from(&config));
        let loaded = alice.message_key_bundle("bob").unwrap().unwrap();
        assert_eq!(loaded.limits().max_skipped_messages, 7);
    }

    #[test]
    fn test_signed_prekey_mismatch_rejected() {
        let alice = store();
        let bob = store();
        alice.create_local_key_bundle().unwrap();
        let old = bob.create_local_key_bundle().unwrap();

        let mut outbound = alice.initiate_session_setup("bob", &published(&old, None)).unwrap();
        let envelope = alice.encrypt_message(&mut outbound, b"stale").unwrap();

        bob.create_local_key_bundle().unwrap();
        let result = bob.receive_session_setup("alice", envelope.handshake.as_ref().unwrap());
        assert!(matches!(result, Err(WhisperError::SignedPreKeyMismatch { .. })));
    }

    #[test]
    fn test_recreate_keeps_identity_and_drops_sessions() {
        let alice = store();
        let bob = store();
        let first = alice.create_local_key_bundle().unwrap();
        let bob_bundle = bob.create_local_key_bundle().unwrap();
        alice.initiate_session_setup("bob", &published(&bob_bundle, None)).unwrap();

        let second = alice.create_local_key_bundle().unwrap();
        assert_eq!(first.identity.public(), second.identity.public());
        assert!(alice.storage().list_sessions().unwrap().is_empty());
        assert!(second
            .one_time_prekeys
            .keys()
            .all(|id| !first.one_time_prekeys.contains_key(id)));
    }

    #[test]
    fn test_mark_uploaded_ignores_superseded_bundle() {
        let alice = store();
        let first = alice.create_local_key_bundle().unwrap();
        alice.create_local_key_bundle().unwrap();

        assert!(!alice.mark_key_bundle_uploaded(first.signed_prekey.id).unwrap());
        assert!(!alice.key_bundle().unwrap().unwrap().uploaded);
    }

    #[test]
    fn test_storage_failure_is_returned() {
        let alice = store();
        alice.storage().set_fail_writes(true);
        assert!(matches!(
            alice.create_local_key_bundle(),
            Err(WhisperError::StorageError(_))
        ));
    }

    #[test]
    fn test_missing_local_bundle() {
        let alice = store();
        assert!(matches!(
            alice.append_one_time_prekeys(5),
            Err(WhisperError::NoLocalKeyBundle)
        ));
    }
}
