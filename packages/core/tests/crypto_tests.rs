//! Tests for cryptographic functions
//!
//! This test suite covers:
//! - Classic Suite Provider (X25519, Ed25519, ChaCha20-Poly1305, HKDF)
//! - X3DH Key Agreement through the key bundle types
//! - Double Ratchet sessions driven through the public API

use whisper_core::crypto::handshake::{KeyAgreement, X3DHProtocol, X3DHPublicKeyBundle};
use whisper_core::crypto::keys::LocalKeyBundle;
use whisper_core::crypto::messaging::double_ratchet::{DoubleRatchetSession, HandshakeHeader};
use whisper_core::crypto::messaging::SecureMessaging;
use whisper_core::crypto::suites::classic::ClassicSuiteProvider;
use whisper_core::crypto::CryptoProvider;
use whisper_core::error::CryptoError;

type P = ClassicSuiteProvider;
type Session = DoubleRatchetSession<P>;

/// Test that ClassicSuiteProvider can generate X25519 keys
#[test]
fn test_classic_suite_generate_dh_keys() {
    let result = P::generate_dh_keys();
    assert!(result.is_ok(), "Failed to generate DH keys");

    let (private_key, public_key) = result.unwrap();

    // X25519 keys should be 32 bytes
    assert_eq!(private_key.len(), 32, "Private key should be 32 bytes");
    assert_eq!(public_key.len(), 32, "Public key should be 32 bytes");
    assert_eq!(P::dh_public_from_private(&private_key).unwrap(), public_key);
}

/// Test signature creation and verification
#[test]
fn test_classic_suite_sign_verify() {
    let (signing_key, verifying_key) = P::generate_signature_keys().unwrap();
    let message = b"Hello, Whisper!";

    let signature = P::sign(&signing_key, message).unwrap();
    assert_eq!(signature.len(), 64, "Signature should be 64 bytes");
    assert!(P::verify(&verifying_key, message, &signature).is_ok());

    // Verification should fail with wrong message
    assert!(P::verify(&verifying_key, b"Modified message", &signature).is_err());
}

/// Identity key (Ed25519) and its X25519 form agree from both sides
#[test]
fn test_identity_key_agreement_form() {
    let (alice_sign, alice_verify) = P::generate_signature_keys().unwrap();
    let (bob_dh_private, bob_dh_public) = P::generate_dh_keys().unwrap();

    let alice_dh_private = P::signature_private_to_dh_private(&alice_sign).unwrap();
    let alice_dh_public = P::signature_public_to_dh_public(&alice_verify).unwrap();

    assert_eq!(
        P::dh(&alice_dh_private, &bob_dh_public).unwrap(),
        P::dh(&bob_dh_private, &alice_dh_public).unwrap()
    );
}

/// Test AEAD encryption and decryption
#[test]
fn test_classic_suite_aead_encrypt_decrypt() {
    let key = vec![0u8; 32];
    let nonce = P::generate_nonce(12).unwrap();
    let plaintext = b"Secret message for encryption test";
    let aad = b"associated data";

    let ciphertext = P::aead_encrypt(&key, &nonce, plaintext, Some(aad)).unwrap();

    // Ciphertext should be plaintext + 16-byte tag
    assert_eq!(ciphertext.len(), plaintext.len() + 16, "Ciphertext length incorrect");

    let decrypted = P::aead_decrypt(&key, &nonce, &ciphertext, Some(aad)).unwrap();
    assert_eq!(decrypted, plaintext, "Decrypted plaintext doesn't match");
}

/// Test that AEAD decryption fails with wrong key, nonce or associated data
#[test]
fn test_classic_suite_aead_decrypt_failures() {
    let key = vec![0u8; 32];
    let nonce = P::generate_nonce(12).unwrap();
    let plaintext = b"Secret message";

    let ciphertext = P::aead_encrypt(&key, &nonce, plaintext, Some(b"ad")).unwrap();

    assert!(P::aead_decrypt(&vec![1u8; 32], &nonce, &ciphertext, Some(b"ad")).is_err());
    assert!(P::aead_decrypt(&key, &P::generate_nonce(12).unwrap(), &ciphertext, Some(b"ad")).is_err());
    assert!(P::aead_decrypt(&key, &nonce, &ciphertext, Some(b"other")).is_err());
}

/// Test HKDF key derivation
#[test]
fn test_classic_suite_hkdf() {
    let derived = P::hkdf_derive_key(b"test_salt", b"input_key_material", b"context_info", 32).unwrap();
    assert_eq!(derived.len(), 32, "Derived key length incorrect");

    // Same inputs give same output
    let again = P::hkdf_derive_key(b"test_salt", b"input_key_material", b"context_info", 32).unwrap();
    assert_eq!(derived, again, "HKDF should be deterministic");
}

/// Test KDF_RK and KDF_CK
#[test]
fn test_classic_suite_ratchet_kdfs() {
    let root_key = vec![0u8; 32];
    let (new_root_key, chain_key) = P::kdf_rk(&root_key, &[1u8; 32]).unwrap();
    assert_eq!(new_root_key.len(), 32);
    assert_eq!(chain_key.len(), 32);
    assert_ne!(new_root_key, root_key, "New root key should differ");

    let (message_key, next_chain_key) = P::kdf_ck(&chain_key).unwrap();
    assert_ne!(message_key, next_chain_key);
    assert_ne!(next_chain_key, chain_key);
}

/// Test random number generation quality (entropy check)
#[test]
fn test_random_number_quality() {
    let mut seen = std::collections::HashSet::new();
    for _ in 0..100 {
        let nonce = P::generate_nonce(12).unwrap();
        assert!(seen.insert(hex::encode(&nonce)), "Duplicate nonce generated");
    }
}

// ============================================================================
// X3DH + Double Ratchet
// ============================================================================

fn public_bundle(bundle: &LocalKeyBundle, with_one_time: bool) -> X3DHPublicKeyBundle {
    let one_time_prekey = if with_one_time {
        bundle
            .one_time_prekeys
            .values()
            .next()
            .map(|key| (key.id, key.public.clone()))
    } else {
        None
    };

    X3DHPublicKeyBundle {
        identity_public: bundle.identity.public().to_vec(),
        signed_prekey_id: bundle.signed_prekey.id,
        signed_prekey_public: bundle.signed_prekey.public.clone(),
        signature: bundle.signed_prekey.signature.clone(),
        one_time_prekey,
        suite_id: P::suite_id(),
    }
}

/// Alice initiates from Bob's published bundle, Bob answers from the handshake header
fn establish(with_one_time: bool) -> (Session, Session) {
    let alice = LocalKeyBundle::generate::<P>(None, 5).unwrap();
    let bob = LocalKeyBundle::generate::<P>(None, 5).unwrap();
    let published = public_bundle(&bob, with_one_time);

    let (root_key, initiator_state) =
        X3DHProtocol::<P>::perform_as_initiator(&alice.identity.signing_key::<P>(), &published).unwrap();
    let handshake = HandshakeHeader {
        identity_key: alice.identity.public().to_vec(),
        ephemeral_public: initiator_state.ephemeral_public.clone().try_into().unwrap(),
        signed_prekey_id: published.signed_prekey_id,
        one_time_prekey_id: published.one_time_prekey.as_ref().map(|(id, _)| *id),
    };
    let alice_session = Session::new_initiator_session(
        &root_key,
        initiator_state,
        &bob.identity.verifying_key::<P>(),
        &bob.signed_prekey.public_key::<P>(),
        handshake.clone(),
        "bob".to_string(),
    )
    .unwrap();

    let one_time_private = handshake
        .one_time_prekey_id
        .map(|id| bob.one_time_prekeys[&id].private_key::<P>());
    let bob_root = X3DHProtocol::<P>::perform_as_responder(
        &bob.identity.signing_key::<P>(),
        &bob.signed_prekey.private_key::<P>(),
        one_time_private.as_ref(),
        &alice.identity.verifying_key::<P>(),
        &handshake.ephemeral_public.to_vec(),
    )
    .unwrap();
    assert_eq!(root_key, bob_root, "Both sides must derive the same root key");

    let bob_session = Session::new_responder_session(
        &bob_root,
        (bob.signed_prekey.private_key::<P>(), bob.signed_prekey.public_key::<P>()),
        &alice.identity.verifying_key::<P>(),
        "alice".to_string(),
    )
    .unwrap();

    (alice_session, bob_session)
}

#[test]
fn test_conversation_with_and_without_one_time_prekey() {
    for with_one_time in [true, false] {
        let (mut alice, mut bob) = establish(with_one_time);

        let first = alice.encrypt(b"hello bob").unwrap();
        assert!(first.handshake.is_some(), "First message carries the handshake");
        assert_eq!(bob.decrypt(&first).unwrap(), b"hello bob");

        let reply = bob.encrypt(b"hello alice").unwrap();
        assert!(reply.handshake.is_none());
        assert_eq!(alice.decrypt(&reply).unwrap(), b"hello alice");

        // Handshake is dropped once the peer answered
        let next = alice.encrypt(b"how are you").unwrap();
        assert!(next.handshake.is_none());
        assert_eq!(bob.decrypt(&next).unwrap(), b"how are you");
    }
}

#[test]
fn test_sending_index_grows_by_one_without_dh_step() {
    let (mut alice, _bob) = establish(true);

    for expected in 0..10u32 {
        let envelope = alice.encrypt(b"tick").unwrap();
        assert_eq!(envelope.header.chain_index, expected);
    }
    assert_eq!(alice.sending_chain_index(), 10);
}

#[test]
fn test_out_of_order_across_dh_steps() {
    let (mut alice, mut bob) = establish(true);

    let a1 = alice.encrypt(b"a1").unwrap();
    let a2 = alice.encrypt(b"a2").unwrap();
    assert_eq!(bob.decrypt(&a2).unwrap(), b"a2");

    let b1 = bob.encrypt(b"b1").unwrap();
    assert_eq!(alice.decrypt(&b1).unwrap(), b"b1");
    let a3 = alice.encrypt(b"a3").unwrap();
    assert_eq!(a3.header.previous_chain_length, 2);

    assert_eq!(bob.decrypt(&a3).unwrap(), b"a3");
    assert_eq!(bob.decrypt(&a1).unwrap(), b"a1");
    assert_eq!(bob.skipped_keys_count(), 0);

    // Replay of a consumed message is rejected
    assert!(bob.decrypt(&a1).is_err());
}

#[test]
fn test_tampered_ciphertext_is_rejected() {
    let (mut alice, mut bob) = establish(false);

    let mut envelope = alice.encrypt(b"integrity").unwrap();
    let last = envelope.ciphertext.len() - 1;
    envelope.ciphertext[last] ^= 0x01;

    assert!(matches!(
        bob.decrypt(&envelope),
        Err(CryptoError::AeadDecryptionError(_))
    ));
}

#[test]
fn test_forged_signed_prekey_is_rejected() {
    let alice = LocalKeyBundle::generate::<P>(None, 1).unwrap();
    let bob = LocalKeyBundle::generate::<P>(None, 1).unwrap();
    let mallory = LocalKeyBundle::generate::<P>(None, 1).unwrap();

    let mut published = public_bundle(&bob, true);
    published.signed_prekey_public = mallory.signed_prekey.public.clone();

    let result = X3DHProtocol::<P>::perform_as_initiator(&alice.identity.signing_key::<P>(), &published);
    assert!(matches!(result, Err(CryptoError::SignatureVerificationError(_))));
}
