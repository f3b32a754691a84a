//! Криптографический модуль
//!
//! # Архитектура
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 KeyData / KeyStore                          │
//! │  - Хранит key bundle и сессии по собеседникам               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                ┌─────────────┴─────────────┐
//!                ▼                           ▼
//! ┌───────────────────────────┐  ┌──────────────────────────┐
//! │   KeyAgreement (X3DH)     │  │  SecureMessaging (DR)    │
//! │  - Signed prekey check    │  │  - Double Ratchet        │
//! │  - One-time prekey (DH4)  │  │  - Skipped message keys  │
//! └───────────────────────────┘  └──────────────────────────┘
//!                │                           │
//!                └─────────────┬─────────────┘
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              CryptoProvider (Crypto-Agility)                │
//! │  - DH (X25519), Signatures (Ed25519)                        │
//! │  - AEAD (ChaCha20-Poly1305), KDF (HKDF-SHA256)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

/// CryptoProvider trait для crypto-agility
pub mod provider;

/// Key Agreement protocols (X3DH)
pub mod handshake;

/// Secure Messaging protocols (Double Ratchet)
pub mod messaging;

/// Криптографические наборы
pub mod suites;

/// Identity, signed prekey, one-time prekeys
pub mod keys;

pub use provider::CryptoProvider;

pub type SuiteID = u16;

/// Suite ID for the classic suite
pub const CLASSIC_SUITE_ID: SuiteID = 1;
