// Управление ключами
// Локальный key bundle: identity, signed prekey и пул one-time prekeys

use crate::crypto::CryptoProvider;
use crate::error::CryptoError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Identity ключ (Ed25519). X25519-форма выводится через провайдер.
///
/// Создаётся один раз при первой регистрации и не меняется при повторной
/// загрузке key bundle.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct IdentityKeyPair {
    #[serde(with = "serde_bytes")]
    secret: Vec<u8>,
    #[serde(with = "serde_bytes")]
    #[zeroize(skip)]
    public: Vec<u8>,
}

impl IdentityKeyPair {
    pub fn generate<P: CryptoProvider>() -> Result<Self, CryptoError> {
        let (secret, public) = P::generate_signature_keys()?;
        Ok(Self {
            secret: secret.as_ref().to_vec(),
            public: public.as_ref().to_vec(),
        })
    }

    pub fn public(&self) -> &[u8] {
        &self.public
    }

    pub fn signing_key<P: CryptoProvider>(&self) -> P::SignaturePrivateKey {
        P::signature_private_key_from_bytes(self.secret.clone())
    }

    pub fn verifying_key<P: CryptoProvider>(&self) -> P::SignaturePublicKey {
        P::signature_public_key_from_bytes(self.public.clone())
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public", &hex::encode(&self.public))
            .finish_non_exhaustive()
    }
}

/// Signed prekey: X25519 ключ, подписанный identity ключом
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SignedPreKey {
    #[zeroize(skip)]
    pub id: u32,
    #[serde(with = "serde_bytes")]
    secret: Vec<u8>,
    #[serde(with = "serde_bytes")]
    #[zeroize(skip)]
    pub public: Vec<u8>,
    #[serde(with = "serde_bytes")]
    #[zeroize(skip)]
    pub signature: Vec<u8>,
}

impl SignedPreKey {
    pub fn generate<P: CryptoProvider>(identity: &IdentityKeyPair, id: u32) -> Result<Self, CryptoError> {
        let (secret, public) = P::generate_dh_keys()?;
        let signature = P::sign(&identity.signing_key::<P>(), public.as_ref())?;
        Ok(Self {
            id,
            secret: secret.as_ref().to_vec(),
            public: public.as_ref().to_vec(),
            signature,
        })
    }

    pub fn private_key<P: CryptoProvider>(&self) -> P::DhPrivateKey {
        P::dh_private_key_from_bytes(self.secret.clone())
    }

    pub fn public_key<P: CryptoProvider>(&self) -> P::DhPublicKey {
        P::dh_public_key_from_bytes(self.public.clone())
    }
}

impl fmt::Debug for SignedPreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedPreKey")
            .field("id", &self.id)
            .field("public", &hex::encode(&self.public))
            .finish_non_exhaustive()
    }
}

/// One-time prekey. Используется не более одного раза.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct OneTimePreKey {
    #[zeroize(skip)]
    pub id: u32,
    #[serde(with = "serde_bytes")]
    secret: Vec<u8>,
    #[serde(with = "serde_bytes")]
    #[zeroize(skip)]
    pub public: Vec<u8>,
}

impl OneTimePreKey {
    pub fn private_key<P: CryptoProvider>(&self) -> P::DhPrivateKey {
        P::dh_private_key_from_bytes(self.secret.clone())
    }
}

impl fmt::Debug for OneTimePreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneTimePreKey")
            .field("id", &self.id)
            .field("public", &hex::encode(&self.public))
            .finish_non_exhaustive()
    }
}

/// Сгенерировать `count` one-time prekeys, начиная с id `starting_at`.
///
/// Id идут подряд с переходом через `u32::MAX` в 0; id, для которых
/// `is_taken` возвращает true (ключ ещё лежит в пуле), пропускаются.
/// Возвращает ключи и следующее значение счётчика.
///
/// Ошибка генерации любого ключа проваливает весь батч.
pub fn generate_one_time_prekeys<P: CryptoProvider>(
    starting_at: u32,
    count: usize,
    is_taken: impl Fn(u32) -> bool,
) -> Result<(Vec<OneTimePreKey>, u32), CryptoError> {
    let mut keys = Vec::with_capacity(count);
    let mut next_id = starting_at;
    let mut probed: u64 = 0;

    while keys.len() < count {
        if probed > u64::from(u32::MAX) {
            return Err(CryptoError::KeyGenerationError(
                "One-time prekey id space exhausted".to_string(),
            ));
        }
        probed += 1;

        let id = next_id;
        next_id = next_id.wrapping_add(1);
        if is_taken(id) {
            continue;
        }

        let (secret, public) = P::generate_dh_keys()?;
        keys.push(OneTimePreKey {
            id,
            secret: secret.as_ref().to_vec(),
            public: public.as_ref().to_vec(),
        });
    }

    Ok((keys, next_id))
}

/// Локальный key bundle пользователя
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalKeyBundle {
    pub identity: IdentityKeyPair,
    pub signed_prekey: SignedPreKey,
    pub one_time_prekeys: BTreeMap<u32, OneTimePreKey>,
    /// Следующий id для one-time prekey (персистентный счётчик)
    pub next_one_time_prekey_id: u32,
    /// Сервер подтвердил загрузку этого bundle
    pub uploaded: bool,
    pub created_at: i64,
}

impl LocalKeyBundle {
    /// Создать новый bundle. Identity переиспользуется, если передан.
    ///
    /// Новый signed prekey получает id на единицу больше предыдущего;
    /// нумерация one-time prekeys продолжается с `next_one_time_prekey_id`.
    pub fn generate<P: CryptoProvider>(
        previous: Option<&LocalKeyBundle>,
        one_time_prekey_count: usize,
    ) -> Result<Self, CryptoError> {
        let identity = match previous {
            Some(bundle) => bundle.identity.clone(),
            None => IdentityKeyPair::generate::<P>()?,
        };
        let signed_prekey_id = previous
            .map(|b| b.signed_prekey.id.wrapping_add(1))
            .unwrap_or(1);
        let start = previous.map(|b| b.next_one_time_prekey_id).unwrap_or(1);

        let signed_prekey = SignedPreKey::generate::<P>(&identity, signed_prekey_id)?;
        // Старый пул удаляется целиком, коллизий быть не может
        let (keys, next_one_time_prekey_id) =
            generate_one_time_prekeys::<P>(start, one_time_prekey_count, |_| false)?;

        Ok(Self {
            identity,
            signed_prekey,
            one_time_prekeys: keys.into_iter().map(|k| (k.id, k)).collect(),
            next_one_time_prekey_id,
            uploaded: false,
            created_at: crate::utils::time::current_timestamp(),
        })
    }

    /// Сгенерировать ещё `count` one-time prekeys и добавить их в пул.
    /// Возвращает только что созданные ключи.
    pub fn append_one_time_prekeys<P: CryptoProvider>(
        &mut self,
        count: usize,
    ) -> Result<Vec<OneTimePreKey>, CryptoError> {
        let pool = &self.one_time_prekeys;
        let (keys, next) = generate_one_time_prekeys::<P>(
            self.next_one_time_prekey_id,
            count,
            |id| pool.contains_key(&id),
        )?;

        self.next_one_time_prekey_id = next;
        for key in &keys {
            self.one_time_prekeys.insert(key.id, key.clone());
        }
        Ok(keys)
    }
}
