//! Cryptographic utilities for the vault
//!
//! This module provides:
//! - SHA-256 hashing and Base58Check address encoding
//! - ECDSA key management with recoverable signatures (secp256k1)
//! - Signer recovery behind the [`SignatureRecovery`] trait

pub mod hash;
pub mod keys;
pub mod recovery;

pub use hash::{base58check, double_sha256, hash160, sha256, sha256_hex};
pub use keys::{
    derive_vault_address, public_key_to_address, sign_recoverable,
    KeyError, KeyPair, RECOVERABLE_SIGNATURE_LEN,
};
pub use recovery::{RecoveryError, Secp256k1Recovery, SignatureRecovery};
