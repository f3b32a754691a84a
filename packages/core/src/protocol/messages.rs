// Типы сообщений протокола обмена ключами
// Ключи передаются в base64, поля в camelCase

use crate::crypto::handshake::X3DHPublicKeyBundle;
use crate::crypto::keys::{LocalKeyBundle, OneTimePreKey};
use crate::crypto::SuiteID;
use crate::utils::b64;
use crate::utils::error::Result;
use crate::utils::validation::{decode_public_key, decode_signature};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Публичная часть one-time prekey
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneTimeKeyData {
    pub id: u32,
    /// Base64 X25519 public key
    pub public_key: String,
}

impl From<&OneTimePreKey> for OneTimeKeyData {
    fn from(key: &OneTimePreKey) -> Self {
        Self {
            id: key.id,
            public_key: b64::encode(&key.public),
        }
    }
}

/// Полная загрузка key bundle (bootstrap или перерегистрация)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyBundleUpload {
    /// Base64 Ed25519 identity public key
    pub identity_public: String,
    pub signed_prekey_id: u32,
    /// Base64 X25519 signed prekey public
    pub signed_prekey_public: String,
    /// Base64 Ed25519 signature over signed prekey
    pub signature: String,
    pub one_time_keys: Vec<OneTimeKeyData>,
    pub suite_id: SuiteID,
}

impl KeyBundleUpload {
    pub fn from_local(bundle: &LocalKeyBundle, suite_id: SuiteID) -> Self {
        Self {
            identity_public: b64::encode(bundle.identity.public()),
            signed_prekey_id: bundle.signed_prekey.id,
            signed_prekey_public: b64::encode(&bundle.signed_prekey.public),
            signature: b64::encode(&bundle.signed_prekey.signature),
            one_time_keys: bundle.one_time_prekeys.values().map(OneTimeKeyData::from).collect(),
            suite_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOneTimeKeysData {
    pub one_time_keys: Vec<OneTimeKeyData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPeerBundleData {
    pub user_id: String,
}

/// Опубликованный bundle собеседника (ответ на GetPeerBundle)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerBundleData {
    pub user_id: String,
    pub identity_public: String,
    pub signed_prekey_id: u32,
    pub signed_prekey_public: String,
    pub signature: String,
    /// Отсутствует, если пул one-time keys собеседника исчерпан
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_time_key: Option<OneTimeKeyData>,
    pub suite_id: SuiteID,
}

impl PeerBundleData {
    /// Декодировать и проверить размеры ключей
    pub fn to_x3dh_bundle(&self) -> Result<X3DHPublicKeyBundle> {
        let one_time_prekey = match &self.one_time_key {
            Some(key) => Some((key.id, decode_public_key(&key.public_key)?.to_vec())),
            None => None,
        };

        Ok(X3DHPublicKeyBundle {
            identity_public: decode_public_key(&self.identity_public)?.to_vec(),
            signed_prekey_id: self.signed_prekey_id,
            signed_prekey_public: decode_public_key(&self.signed_prekey_public)?.to_vec(),
            signature: decode_signature(&self.signature)?.to_vec(),
            one_time_prekey,
            suite_id: self.suite_id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneTimeKeyCountData {
    pub count: u32,
}

/// Ошибка от сервера; code и text могут отсутствовать
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

// ============================================================================
// Клиент -> Сервер
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientRequest {
    UploadKeyBundle(KeyBundleUpload),
    AddOneTimeKeys(AddOneTimeKeysData),
    GetOneTimeKeyCount,
    GetPeerBundle(GetPeerBundleData),
}

impl ClientRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientRequest::UploadKeyBundle(_) => "UploadKeyBundle",
            ClientRequest::AddOneTimeKeys(_) => "AddOneTimeKeys",
            ClientRequest::GetOneTimeKeyCount => "GetOneTimeKeyCount",
            ClientRequest::GetPeerBundle(_) => "GetPeerBundle",
        }
    }
}

// ============================================================================
// Сервер -> Клиент
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ResultPayload {
    Ack,
    OneTimeKeyCount(OneTimeKeyCountData),
    PeerBundle(PeerBundleData),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerResponse {
    Result(ResultPayload),
    Error(ErrorData),
}

/// Уведомления, которые сервер присылает без запроса
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerPush {
    /// Собеседник заменил свой key bundle
    Update {
        #[serde(rename = "peerID")]
        peer_id: String,
    },
    /// Текущее число one-time keys на сервере
    Normal { count: u32 },
}

// ============================================================================
// Framing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Correlation ID
    pub id: Uuid,
    pub request: ClientRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frame", content = "body", rename_all = "lowercase")]
pub enum ServerFrame {
    Response { id: Uuid, response: ServerResponse },
    Push(ServerPush),
}
