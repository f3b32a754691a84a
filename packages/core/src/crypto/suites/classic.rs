use crate::crypto::provider::CryptoProvider;
use crate::error::CryptoError;
use chacha20poly1305::{
    aead::{Aead, Payload},
    ChaCha20Poly1305, Key as AeadKeyChacha, KeyInit, Nonce,
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand_core::RngCore;
use sha2::Sha256;
use x25519_dalek::{PublicKey as DhPublicKeyDalek, StaticSecret};
use zeroize::Zeroize;

/// Concrete implementation of `CryptoProvider` for the classic suite.
pub struct ClassicSuiteProvider;

fn to_array32(bytes: &[u8], what: &str) -> Result<[u8; 32], CryptoError> {
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidInputError(format!("Invalid {} length: {}", what, bytes.len())))
}

fn random_32() -> Result<[u8; 32], CryptoError> {
    let mut bytes = [0u8; 32];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(bytes)
}

impl CryptoProvider for ClassicSuiteProvider {
    type DhPublicKey = Vec<u8>;
    type DhPrivateKey = Vec<u8>;
    type SignaturePublicKey = Vec<u8>;
    type SignaturePrivateKey = Vec<u8>;
    type AeadKey = Vec<u8>;

    fn generate_dh_keys() -> Result<(Self::DhPrivateKey, Self::DhPublicKey), CryptoError> {
        let mut seed = random_32()?;
        let private_key = StaticSecret::from(seed);
        seed.zeroize();
        let public_key = DhPublicKeyDalek::from(&private_key);
        Ok((private_key.to_bytes().to_vec(), public_key.to_bytes().to_vec()))
    }

    fn dh_public_from_private(
        private_key: &Self::DhPrivateKey,
    ) -> Result<Self::DhPublicKey, CryptoError> {
        let static_secret = StaticSecret::from(to_array32(private_key, "DH private key")?);
        let public_key = DhPublicKeyDalek::from(&static_secret);
        Ok(public_key.to_bytes().to_vec())
    }

    fn dh(
        private_key: &Self::DhPrivateKey,
        public_key: &Self::DhPublicKey,
    ) -> Result<Vec<u8>, CryptoError> {
        let static_secret = StaticSecret::from(to_array32(private_key, "DH private key")?);
        let peer_public = DhPublicKeyDalek::from(to_array32(public_key, "DH public key")?);
        let shared_secret = static_secret.diffie_hellman(&peer_public);
        if !shared_secret.was_contributory() {
            return Err(CryptoError::KeyAgreementError(
                "Non-contributory DH public key".to_string(),
            ));
        }
        Ok(shared_secret.to_bytes().to_vec())
    }

    fn dh_public_key_from_bytes(bytes: Vec<u8>) -> Self::DhPublicKey {
        bytes
    }

    fn dh_private_key_from_bytes(bytes: Vec<u8>) -> Self::DhPrivateKey {
        bytes
    }

    fn aead_key_from_bytes(bytes: Vec<u8>) -> Self::AeadKey {
        bytes
    }

    fn signature_public_key_from_bytes(bytes: Vec<u8>) -> Self::SignaturePublicKey {
        bytes
    }

    fn signature_private_key_from_bytes(bytes: Vec<u8>) -> Self::SignaturePrivateKey {
        bytes
    }

    fn generate_signature_keys(
    ) -> Result<(Self::SignaturePrivateKey, Self::SignaturePublicKey), CryptoError> {
        let mut seed = random_32()?;
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        let verifying_key = signing_key.verifying_key();
        Ok((
            signing_key.to_bytes().to_vec(),
            verifying_key.to_bytes().to_vec(),
        ))
    }

    fn from_signature_private_to_public(
        private_key: &Self::SignaturePrivateKey,
    ) -> Result<Self::SignaturePublicKey, CryptoError> {
        let signing_key = SigningKey::from_bytes(&to_array32(private_key, "signing key")?);
        Ok(signing_key.verifying_key().to_bytes().to_vec())
    }

    fn signature_private_to_dh_private(
        private_key: &Self::SignaturePrivateKey,
    ) -> Result<Self::DhPrivateKey, CryptoError> {
        // SHA-512 expanded scalar, clamped by StaticSecret on use
        let signing_key = SigningKey::from_bytes(&to_array32(private_key, "signing key")?);
        Ok(signing_key.to_scalar_bytes().to_vec())
    }

    fn signature_public_to_dh_public(
        public_key: &Self::SignaturePublicKey,
    ) -> Result<Self::DhPublicKey, CryptoError> {
        let verifying_key = VerifyingKey::from_bytes(&to_array32(public_key, "verifying key")?)
            .map_err(|e| CryptoError::InvalidInputError(format!("Invalid verifying key: {}", e)))?;
        Ok(verifying_key.to_montgomery().to_bytes().to_vec())
    }

    fn sign(private_key: &Self::SignaturePrivateKey, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let signing_key = SigningKey::from_bytes(&to_array32(private_key, "signing key")?);
        let signature = signing_key
            .try_sign(message)
            .map_err(|e| CryptoError::SigningError(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }

    fn verify(
        public_key: &Self::SignaturePublicKey,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        let verifying_key = VerifyingKey::from_bytes(&to_array32(public_key, "verifying key")?)
            .map_err(|e| CryptoError::InvalidInputError(format!("Invalid verifying key: {}", e)))?;

        let sig_bytes: &[u8; 64] = signature
            .try_into()
            .map_err(|_| CryptoError::InvalidInputError("Invalid signature length".to_string()))?;
        let signature_obj = Signature::from_bytes(sig_bytes);

        verifying_key
            .verify(message, &signature_obj)
            .map_err(|e| CryptoError::SignatureVerificationError(e.to_string()))
    }

    fn aead_encrypt(
        key: &Self::AeadKey,
        nonce: &[u8],
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError> {
        if key.len() != 32 || nonce.len() != 12 {
            return Err(CryptoError::InvalidInputError(
                "AEAD key must be 32 bytes and nonce 12 bytes".to_string(),
            ));
        }
        let cipher = ChaCha20Poly1305::new(AeadKeyChacha::from_slice(key));
        let payload = Payload {
            msg: plaintext,
            aad: associated_data.unwrap_or(b""),
        };

        cipher
            .encrypt(Nonce::from_slice(nonce), payload)
            .map_err(|e| CryptoError::AeadEncryptionError(e.to_string()))
    }

    fn aead_decrypt(
        key: &Self::AeadKey,
        nonce: &[u8],
        ciphertext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError> {
        if key.len() != 32 || nonce.len() != 12 {
            return Err(CryptoError::InvalidInputError(
                "AEAD key must be 32 bytes and nonce 12 bytes".to_string(),
            ));
        }
        let cipher = ChaCha20Poly1305::new(AeadKeyChacha::from_slice(key));
        let payload = Payload {
            msg: ciphertext,
            aad: associated_data.unwrap_or(b""),
        };

        cipher
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|e| CryptoError::AeadDecryptionError(e.to_string()))
    }

    fn hkdf_derive_key(
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<Vec<u8>, CryptoError> {
        let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
        let mut okm = vec![0u8; len];
        hkdf.expand(info, &mut okm)
            .map_err(|e| CryptoError::KeyDerivationError(e.to_string()))?;
        Ok(okm)
    }

    fn kdf_rk(
        root_key: &Self::AeadKey,
        dh_output: &[u8],
    ) -> Result<(Self::AeadKey, Self::AeadKey), CryptoError> {
        let hkdf = Hkdf::<Sha256>::new(Some(root_key.as_ref()), dh_output);
        let mut output = vec![0u8; 64];
        hkdf.expand(b"Whisper-Root-Key-Expansion", &mut output)
            .map_err(|e| CryptoError::KeyDerivationError(e.to_string()))?;

        let chain_key = output.split_off(32);
        Ok((output, chain_key))
    }

    fn kdf_ck(chain_key: &Self::AeadKey) -> Result<(Self::AeadKey, Self::AeadKey), CryptoError> {
        let hkdf = Hkdf::<Sha256>::new(Some(chain_key.as_ref()), b"");
        let mut output = vec![0u8; 64];
        hkdf.expand(b"Whisper-Chain-Key-Expansion", &mut output)
            .map_err(|e| CryptoError::KeyDerivationError(e.to_string()))?;

        let next_chain = output.split_off(32);
        Ok((output, next_chain))
    }

    fn generate_nonce(len: usize) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = vec![0u8; len];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| CryptoError::NonceGenerationError(e.to_string()))?;
        Ok(nonce_bytes)
    }

    fn suite_id() -> u16 {
        crate::config::Config::global().classic_suite_id
    }
}
