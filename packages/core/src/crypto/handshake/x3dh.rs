//! X3DH (Extended Triple Diffie-Hellman) Protocol
//!
//! ## Ключи
//!
//! ### Alice (инициатор)
//! - **IK_A**: Identity Key (Ed25519, в DH используется X25519-форма)
//! - **EK_A**: Ephemeral Key (генерируется для каждой сессии)
//!
//! ### Bob (получатель)
//! - **IK_B**: Identity Key
//! - **SPK_B**: Signed Prekey, подписан IK_B
//! - **OPK_B**: One-time Prekey (опционально, если пул на сервере не пуст)
//!
//! ## Протокол
//!
//! ```text
//! DH1 = DH(IK_A, SPK_B)
//! DH2 = DH(EK_A, IK_B)
//! DH3 = DH(EK_A, SPK_B)
//! DH4 = DH(EK_A, OPK_B)      // только с one-time prekey
//! SK  = HKDF(F || DH1 || DH2 || DH3 [|| DH4]),  F = 0xFF * 32
//! ```
//!
//! Bob вычисляет те же DH в обратном порядке; DH(a, B) = DH(b, A).

use crate::crypto::handshake::{InitiatorState, KeyAgreement};
use crate::crypto::provider::CryptoProvider;
use crate::crypto::SuiteID;
use crate::error::CryptoError;
use std::marker::PhantomData;
use zeroize::Zeroize;

const KDF_INFO: &[u8] = b"Whisper X3DH Root Key";

/// Публичные ключи для инициации сессии
///
/// Alice получает этот bundle от сервера перед началом handshake с Bob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X3DHPublicKeyBundle {
    /// Bob's Identity Public Key (Ed25519, IK_B_pub)
    pub identity_public: Vec<u8>,

    pub signed_prekey_id: u32,

    /// Bob's Signed Prekey Public Key (SPK_B_pub)
    pub signed_prekey_public: Vec<u8>,

    /// Signature over signed_prekey_public (Sig(SPK_B))
    pub signature: Vec<u8>,

    /// One-time prekey, выданный сервером (id, public)
    pub one_time_prekey: Option<(u32, Vec<u8>)>,

    /// Crypto suite ID
    pub suite_id: SuiteID,
}

/// X3DH Protocol Implementation
///
/// Stateless struct - все данные передаются через параметры методов.
pub struct X3DHProtocol<P: CryptoProvider> {
    _phantom: PhantomData<P>,
}

fn derive_root_key<P: CryptoProvider>(dh_outputs: &[Vec<u8>]) -> Result<Vec<u8>, CryptoError> {
    let mut ikm = Vec::with_capacity(32 + dh_outputs.iter().map(Vec::len).sum::<usize>());
    ikm.extend_from_slice(&[0xFF; 32]);
    for dh in dh_outputs {
        ikm.extend_from_slice(dh);
    }

    let root_key = P::hkdf_derive_key(&[0u8; 32], &ikm, KDF_INFO, 32);
    ikm.zeroize();
    root_key
}

impl<P: CryptoProvider> KeyAgreement<P> for X3DHProtocol<P> {
    type PublicKeyBundle = X3DHPublicKeyBundle;
    type SharedSecret = Vec<u8>; // 32 bytes root key

    fn perform_as_initiator(
        local_identity: &P::SignaturePrivateKey,
        remote_bundle: &Self::PublicKeyBundle,
    ) -> Result<(Self::SharedSecret, InitiatorState<P>), CryptoError> {
        use tracing::{debug, trace};

        debug!(
            target: "crypto::x3dh",
            signed_prekey_id = remote_bundle.signed_prekey_id,
            one_time_prekey_id = ?remote_bundle.one_time_prekey.as_ref().map(|(id, _)| *id),
            "Starting X3DH as initiator"
        );

        if remote_bundle.suite_id != P::suite_id() {
            return Err(CryptoError::InvalidInputError(format!(
                "Unsupported suite id {}",
                remote_bundle.suite_id
            )));
        }

        let remote_identity = P::signature_public_key_from_bytes(remote_bundle.identity_public.clone());
        let remote_signed_prekey = P::dh_public_key_from_bytes(remote_bundle.signed_prekey_public.clone());

        // 1. Verify signature on signed prekey
        P::verify(
            &remote_identity,
            remote_signed_prekey.as_ref(),
            &remote_bundle.signature,
        )
        .map_err(|e| {
            debug!(target: "crypto::x3dh", error = %e, "Signature verification failed");
            e
        })?;

        let (ephemeral_private, ephemeral_public) = P::generate_dh_keys()?;
        let local_identity_dh = P::signature_private_to_dh_private(local_identity)?;
        let remote_identity_dh = P::signature_public_to_dh_public(&remote_identity)?;

        // 2. DH operations
        trace!(target: "crypto::x3dh", "Computing DH1 = DH(IK_A, SPK_B)");
        let dh1 = P::dh(&local_identity_dh, &remote_signed_prekey)?;
        trace!(target: "crypto::x3dh", "Computing DH2 = DH(EK_A, IK_B)");
        let dh2 = P::dh(&ephemeral_private, &remote_identity_dh)?;
        trace!(target: "crypto::x3dh", "Computing DH3 = DH(EK_A, SPK_B)");
        let dh3 = P::dh(&ephemeral_private, &remote_signed_prekey)?;

        let mut dh_outputs = vec![dh1, dh2, dh3];
        if let Some((_, one_time_public)) = &remote_bundle.one_time_prekey {
            trace!(target: "crypto::x3dh", "Computing DH4 = DH(EK_A, OPK_B)");
            let one_time_public = P::dh_public_key_from_bytes(one_time_public.clone());
            dh_outputs.push(P::dh(&ephemeral_private, &one_time_public)?);
        }

        // 3. Derive root key
        let root_key = derive_root_key::<P>(&dh_outputs);
        dh_outputs.iter_mut().for_each(Zeroize::zeroize);
        let root_key = root_key?;

        debug!(
            target: "crypto::x3dh",
            dh_count = dh_outputs.len(),
            "X3DH completed successfully as initiator"
        );

        Ok((
            root_key,
            InitiatorState {
                ephemeral_private,
                ephemeral_public,
            },
        ))
    }

    fn perform_as_responder(
        local_identity: &P::SignaturePrivateKey,
        local_signed_prekey: &P::DhPrivateKey,
        local_one_time_prekey: Option<&P::DhPrivateKey>,
        remote_identity: &P::SignaturePublicKey,
        remote_ephemeral: &P::DhPublicKey,
    ) -> Result<Self::SharedSecret, CryptoError> {
        use tracing::{debug, trace};

        debug!(
            target: "crypto::x3dh",
            with_one_time_prekey = local_one_time_prekey.is_some(),
            "Starting X3DH as responder"
        );

        let local_identity_dh = P::signature_private_to_dh_private(local_identity)?;
        let remote_identity_dh = P::signature_public_to_dh_public(remote_identity)?;

        trace!(target: "crypto::x3dh", "Computing DH1 = DH(SPK_B, IK_A)");
        let dh1 = P::dh(local_signed_prekey, &remote_identity_dh)?;
        trace!(target: "crypto::x3dh", "Computing DH2 = DH(IK_B, EK_A)");
        let dh2 = P::dh(&local_identity_dh, remote_ephemeral)?;
        trace!(target: "crypto::x3dh", "Computing DH3 = DH(SPK_B, EK_A)");
        let dh3 = P::dh(local_signed_prekey, remote_ephemeral)?;

        let mut dh_outputs = vec![dh1, dh2, dh3];
        if let Some(one_time_private) = local_one_time_prekey {
            trace!(target: "crypto::x3dh", "Computing DH4 = DH(OPK_B, EK_A)");
            dh_outputs.push(P::dh(one_time_private, remote_ephemeral)?);
        }

        let root_key = derive_root_key::<P>(&dh_outputs);
        dh_outputs.iter_mut().for_each(Zeroize::zeroize);

        debug!(target: "crypto::x3dh", "X3DH completed successfully (responder)");
        root_key
    }
}
