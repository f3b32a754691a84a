//! Криптографические наборы (Crypto Suites)
//!
//! Этот модуль содержит реализации CryptoProvider trait.
//!
//! ### Classic Suite
//! - **DH**: X25519 (ECDH на Curve25519)
//! - **Signatures**: Ed25519 (identity key, X25519-форма через Edwards→Montgomery)
//! - **AEAD**: ChaCha20-Poly1305
//! - **KDF**: HKDF-SHA256
//! - **Suite ID**: 1
//!
//! ```rust
//! use whisper_core::crypto::suites::classic::ClassicSuiteProvider;
//! use whisper_core::crypto::provider::CryptoProvider;
//!
//! type MySuite = ClassicSuiteProvider;
//!
//! let (private_key, public_key) = MySuite::generate_dh_keys().unwrap();
//! assert_eq!(public_key.len(), 32);
//! # let _ = private_key;
//! ```

pub mod classic;
