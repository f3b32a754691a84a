//! KeyData: оркестратор обмена ключами.
//!
//! Связывает KeyStore (локальные ключи и сессии) с сервером через
//! `RequestSender`:
//!
//! - при подключении загружает key bundle или проверяет, сколько one-time
//!   keys осталось на сервере, и пополняет пул;
//! - реагирует на push-уведомления (`update` / `normal`);
//! - шифрует и расшифровывает сообщения, при необходимости устанавливая
//!   сессию.
//!
//! KeyStore лежит за одним async mutex: все операции над ключами и
//! сессиями выполняются последовательно. Mutex никогда не удерживается во
//! время сетевого запроса.

use crate::config::Config;
use crate::crypto::handshake::X3DHPublicKeyBundle;
use crate::crypto::keys::LocalKeyBundle;
use crate::crypto::messaging::double_ratchet::WhisperEnvelope;
use crate::crypto::provider::CryptoProvider;
use crate::crypto::suites::classic::ClassicSuiteProvider;
use crate::keystore::{KeyStore, RatchetSession};
use crate::protocol::dispatcher::RequestSender;
use crate::protocol::messages::{
    AddOneTimeKeysData, ClientRequest, GetPeerBundleData, KeyBundleUpload, OneTimeKeyData,
    ResultPayload, ServerPush,
};
use crate::protocol::request::RequestError;
use crate::protocol::wire;
use crate::storage::traits::WhisperStorage;
use crate::utils::error::{Result, WhisperError};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Результат шифрования
#[derive(Debug, Clone)]
pub struct WrappedMessage {
    pub envelope: WhisperEnvelope,
    /// Наш identity key, пока собеседник не ответил на handshake
    pub identity_key: Option<Vec<u8>>,
    /// One-time prekey собеседника, использованный при установке сессии
    pub one_time_prekey_id: Option<u32>,
}

impl WrappedMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        wire::pack_envelope(&self.envelope)
    }
}

/// Результат расшифровки
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwrappedMessage {
    pub plaintext: Vec<u8>,
    /// Сессия создана этим сообщением
    pub new_session: bool,
}

pub struct KeyData<S: WhisperStorage, P: CryptoProvider = ClassicSuiteProvider> {
    key_store: Arc<Mutex<KeyStore<S, P>>>,
    sender: Arc<dyn RequestSender>,
    config: Config,
    replenish: Mutex<()>,
}

impl<S: WhisperStorage, P: CryptoProvider> KeyData<S, P> {
    pub fn new(key_store: KeyStore<S, P>, sender: Arc<dyn RequestSender>) -> Self {
        let config = key_store.config().clone();
        Self {
            key_store: Arc::new(Mutex::new(key_store)),
            sender,
            config,
            replenish: Mutex::new(()),
        }
    }

    pub fn key_store(&self) -> Arc<Mutex<KeyStore<S, P>>> {
        Arc::clone(&self.key_store)
    }

    // === Connection lifecycle ===

    /// Транспорт подключился
    pub async fn on_connected(&self) -> Result<()> {
        let existing = self.key_store.lock().await.key_bundle()?;

        match existing {
            None => {
                info!(target: "key_data", "No local key bundle, bootstrapping");
                self.upload_whisper_key_bundle().await?;
            }
            Some(bundle) if !bundle.uploaded => {
                info!(
                    target: "key_data",
                    signed_prekey_id = bundle.signed_prekey.id,
                    "Key bundle was never acknowledged, uploading again"
                );
                self.upload_bundle(&bundle).await?;
            }
            Some(_) => {
                let count = self.get_whisper_count_of_one_time_keys().await?;
                self.handle_one_time_key_count(count).await?;
            }
        }
        Ok(())
    }

    /// Полная (пере)регистрация ключей: новый signed prekey и новый пул
    /// one-time prekeys. Старые one-time prekeys и все сессии удаляются.
    pub async fn upload_whisper_key_bundle(&self) -> Result<LocalKeyBundle> {
        let bundle = self.key_store.lock().await.create_local_key_bundle()?;
        self.upload_bundle(&bundle).await?;
        Ok(bundle)
    }

    async fn upload_bundle(&self, bundle: &LocalKeyBundle) -> Result<()> {
        let upload = KeyBundleUpload::from_local(bundle, P::suite_id());
        let one_time_keys = upload.one_time_keys.len();

        match self.sender.request(ClientRequest::UploadKeyBundle(upload)).await? {
            ResultPayload::Ack => {}
            other => return Err(unexpected(&other).into()),
        }

        self.key_store
            .lock()
            .await
            .mark_key_bundle_uploaded(bundle.signed_prekey.id)?;

        info!(
            target: "key_data",
            signed_prekey_id = bundle.signed_prekey.id,
            one_time_keys,
            "Uploaded key bundle"
        );
        Ok(())
    }

    /// Спросить у сервера, сколько one-time keys осталось
    pub async fn get_whisper_count_of_one_time_keys(&self) -> Result<u32> {
        match self.sender.request(ClientRequest::GetOneTimeKeyCount).await? {
            ResultPayload::OneTimeKeyCount(data) => {
                debug!(target: "key_data", count = data.count, "Server one-time key count");
                Ok(data.count)
            }
            other => Err(unexpected(&other).into()),
        }
    }

    /// Пополнить пул, если на сервере осталось меньше порога.
    ///
    /// Возвращает id загруженных ключей (пусто, если пополнение не нужно
    /// или уже выполняется).
    pub async fn handle_one_time_key_count(&self, count: u32) -> Result<Vec<u32>> {
        if count >= self.config.one_time_prekey_threshold {
            debug!(
                target: "key_data",
                count,
                threshold = self.config.one_time_prekey_threshold,
                "One-time key pool is sufficient"
            );
            return Ok(Vec::new());
        }

        let Ok(_guard) = self.replenish.try_lock() else {
            debug!(target: "key_data", count, "Replenishment already in flight");
            return Ok(Vec::new());
        };

        let keys = self
            .key_store
            .lock()
            .await
            .append_one_time_prekeys(self.config.one_time_prekeys_to_upload)?;
        let ids: Vec<u32> = keys.iter().map(|k| k.id).collect();

        let request = ClientRequest::AddOneTimeKeys(AddOneTimeKeysData {
            one_time_keys: keys.iter().map(OneTimeKeyData::from).collect(),
        });
        match self.sender.request(request).await? {
            ResultPayload::Ack => {}
            other => return Err(unexpected(&other).into()),
        }

        info!(
            target: "key_data",
            count,
            uploaded = ids.len(),
            first_id = ?ids.first(),
            "Replenished one-time keys"
        );
        Ok(ids)
    }

    // === Server pushes ===

    pub async fn handle_push(&self, push: ServerPush) -> Result<()> {
        match push {
            ServerPush::Update { peer_id } => {
                let deleted = self.key_store.lock().await.delete_message_key_bundles(&peer_id)?;
                info!(target: "key_data", peer_id = %peer_id, deleted, "Peer replaced key bundle");
                Ok(())
            }
            ServerPush::Normal { count } => self.handle_one_time_key_count(count).await.map(|_| ()),
        }
    }

    /// Декодировать push, пришедший отдельным фреймом, и обработать его
    pub async fn handle_push_frame(&self, data: &[u8]) -> Result<()> {
        let push: ServerPush = wire::unpack_raw(data)?;
        self.handle_push(push).await
    }

    // === Messages ===

    /// Зашифровать сообщение для собеседника.
    ///
    /// Если сессии нет, запрашивает bundle собеседника и устанавливает её.
    /// Ошибка запроса возвращается вызывающему.
    pub async fn wrap_message(&self, peer_id: &str, plaintext: &[u8]) -> Result<WrappedMessage> {
        {
            let store = self.key_store.lock().await;
            if let Some(mut session) = store.message_key_bundle(peer_id)? {
                return Self::encrypt_with(&store, &mut session, plaintext);
            }
        }

        let remote_bundle = self.fetch_peer_bundle(peer_id).await?;

        let store = self.key_store.lock().await;
        let mut session = match store.message_key_bundle(peer_id)? {
            Some(session) => {
                // Сессия появилась, пока шёл запрос
                debug!(target: "key_data", peer_id, "Session appeared during bundle fetch");
                session
            }
            None => store.initiate_session_setup(peer_id, &remote_bundle)?,
        };
        Self::encrypt_with(&store, &mut session, plaintext)
    }

    fn encrypt_with(
        store: &KeyStore<S, P>,
        session: &mut RatchetSession<P>,
        plaintext: &[u8],
    ) -> Result<WrappedMessage> {
        let envelope = store.encrypt_message(session, plaintext)?;
        let (identity_key, one_time_prekey_id) = match &envelope.handshake {
            Some(handshake) => (Some(handshake.identity_key.clone()), handshake.one_time_prekey_id),
            None => (None, None),
        };
        Ok(WrappedMessage {
            envelope,
            identity_key,
            one_time_prekey_id,
        })
    }

    async fn fetch_peer_bundle(&self, peer_id: &str) -> Result<X3DHPublicKeyBundle> {
        let request = ClientRequest::GetPeerBundle(GetPeerBundleData {
            user_id: peer_id.to_string(),
        });

        let data = match self.sender.request(request).await {
            Ok(ResultPayload::PeerBundle(data)) => data,
            Ok(other) => return Err(unexpected(&other).into()),
            Err(e) => {
                warn!(target: "key_data", peer_id, error = %e, "Failed to fetch peer bundle");
                return Err(e.into());
            }
        };

        if data.user_id != peer_id {
            return Err(RequestError::MalformedResponse(format!(
                "bundle for {} requested, got {}",
                peer_id, data.user_id
            ))
            .into());
        }

        debug!(
            target: "key_data",
            peer_id,
            signed_prekey_id = data.signed_prekey_id,
            one_time_key = ?data.one_time_key.as_ref().map(|k| k.id),
            "Fetched peer bundle"
        );
        data.to_x3dh_bundle()
    }

    /// Расшифровать сообщение собеседника.
    ///
    /// Если сессии нет, сообщение должно содержать handshake header.
    /// Новая сессия сохраняется только после успешной расшифровки.
    pub async fn unwrap_message(&self, peer_id: &str, envelope: &WhisperEnvelope) -> Result<UnwrappedMessage> {
        let store = self.key_store.lock().await;

        if let Some(mut session) = store.message_key_bundle(peer_id)? {
            let plaintext = store.decrypt_message(&mut session, envelope)?;
            return Ok(UnwrappedMessage {
                plaintext,
                new_session: false,
            });
        }

        let handshake = envelope.handshake.as_ref().ok_or_else(|| {
            WhisperError::MalformedEnvelope(format!("no session with {} and no handshake header", peer_id))
        })?;

        let mut session = store.receive_session_setup(peer_id, handshake)?;
        let plaintext = store.accept_session_setup(&mut session, envelope)?;
        Ok(UnwrappedMessage {
            plaintext,
            new_session: true,
        })
    }

    /// Расшифровать сообщение в wire format
    pub async fn unwrap_message_bytes(&self, peer_id: &str, data: &[u8]) -> Result<UnwrappedMessage> {
        let envelope = wire::unpack_envelope(data)?;
        self.unwrap_message(peer_id, &envelope).await
    }
}

fn unexpected(payload: &ResultPayload) -> RequestError {
    let kind = match payload {
        ResultPayload::Ack => "Ack",
        ResultPayload::OneTimeKeyCount(_) => "OneTimeKeyCount",
        ResultPayload::PeerBundle(_) => "PeerBundle",
    };
    RequestError::UnexpectedResponse(kind.to_string())
}
