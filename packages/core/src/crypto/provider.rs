//! Defines the CryptoProvider trait for crypto-agility.

use crate::error::CryptoError;
use core::fmt::Debug;

/// Trait that formalizes all cryptographic operations for a specific cipher suite.
/// X3DH, the ratchet and prekey generation only talk to primitives through it.
pub trait CryptoProvider: Send + Sync + 'static {
    // Associated types for key representation
    type DhPublicKey: AsRef<[u8]> + Debug + Clone + PartialEq + Send + Sync + 'static;
    type DhPrivateKey: AsRef<[u8]> + Debug + Clone + Send + Sync + 'static;
    type SignaturePublicKey: AsRef<[u8]> + Debug + Clone + PartialEq + Send + Sync + 'static;
    type SignaturePrivateKey: AsRef<[u8]> + Debug + Clone + Send + Sync + 'static;
    type AeadKey: AsRef<[u8]> + Debug + Clone + Default + Send + Sync + 'static;

    /// Generates a new Diffie-Hellman key pair.
    ///
    /// Fails instead of silently producing fewer keys when the system RNG is unavailable.
    fn generate_dh_keys() -> Result<(Self::DhPrivateKey, Self::DhPublicKey), CryptoError>;

    /// Derives a DH public key from a DH private key.
    fn dh_public_from_private(private_key: &Self::DhPrivateKey) -> Result<Self::DhPublicKey, CryptoError>;

    /// Computes a shared secret. Non-contributory (low-order) peer keys are rejected.
    fn dh(private_key: &Self::DhPrivateKey, public_key: &Self::DhPublicKey) -> Result<Vec<u8>, CryptoError>;

    /// Creates a DH public key from raw bytes
    fn dh_public_key_from_bytes(bytes: Vec<u8>) -> Self::DhPublicKey;

    /// Creates a DH private key from raw bytes
    fn dh_private_key_from_bytes(bytes: Vec<u8>) -> Self::DhPrivateKey;

    /// Creates an AEAD key from raw bytes
    fn aead_key_from_bytes(bytes: Vec<u8>) -> Self::AeadKey;

    /// Creates a Signature public key from raw bytes
    fn signature_public_key_from_bytes(bytes: Vec<u8>) -> Self::SignaturePublicKey;

    /// Creates a Signature private key from raw bytes
    fn signature_private_key_from_bytes(bytes: Vec<u8>) -> Self::SignaturePrivateKey;

    /// Generates a new Signature key pair.
    fn generate_signature_keys() -> Result<(Self::SignaturePrivateKey, Self::SignaturePublicKey), CryptoError>;

    /// Derives a Signature public key from a Signature private key.
    fn from_signature_private_to_public(private_key: &Self::SignaturePrivateKey) -> Result<Self::SignaturePublicKey, CryptoError>;

    /// Agreement form of an identity private key.
    fn signature_private_to_dh_private(private_key: &Self::SignaturePrivateKey) -> Result<Self::DhPrivateKey, CryptoError>;

    /// Agreement form of an identity public key.
    fn signature_public_to_dh_public(public_key: &Self::SignaturePublicKey) -> Result<Self::DhPublicKey, CryptoError>;

    /// Signs a message with the given private key.
    fn sign(private_key: &Self::SignaturePrivateKey, message: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Verifies a signature with the given public key.
    fn verify(public_key: &Self::SignaturePublicKey, message: &[u8], signature: &[u8]) -> Result<(), CryptoError>;

    /// Performs AEAD encryption.
    /// `associated_data` is authenticated but not encrypted.
    fn aead_encrypt(
        key: &Self::AeadKey,
        nonce: &[u8],
        plaintext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Performs AEAD decryption.
    fn aead_decrypt(
        key: &Self::AeadKey,
        nonce: &[u8],
        ciphertext: &[u8],
        associated_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Derives a key from input key material using HKDF.
    fn hkdf_derive_key(
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Derives a root key and a chain key from the current root key and DH output.
    fn kdf_rk(root_key: &Self::AeadKey, dh_output: &[u8]) -> Result<(Self::AeadKey, Self::AeadKey), CryptoError>;

    /// Derives a message key and the next chain key from the current chain key.
    fn kdf_ck(chain_key: &Self::AeadKey) -> Result<(Self::AeadKey, Self::AeadKey), CryptoError>;

    /// Generates a cryptographically secure random nonce of a specified length.
    fn generate_nonce(len: usize) -> Result<Vec<u8>, CryptoError>;

    /// Returns the SuiteID associated with this CryptoProvider.
    fn suite_id() -> u16;
}
