//! ECDSA key management
//!
//! Key pair generation, recoverable signing and address derivation on the
//! secp256k1 curve. Signatures are 65 bytes: the 64-byte compact `r || s`
//! followed by the recovery id, so the signer's public key can be recovered
//! from the signature and the digest alone.

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::{base58check, hash160};
use crate::address::Address;

/// Version byte for key-derived (P2PKH style) addresses
pub const P2PKH_VERSION: u8 = 0x00;

/// Version byte for vault (P2SH style) addresses
pub const P2SH_VERSION: u8 = 0x05;

/// Length of a recoverable signature in bytes
pub const RECOVERABLE_SIGNATURE_LEN: usize = 65;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim_start_matches("0x"))
            .map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// The address this key signs as
    pub fn address(&self) -> Address {
        public_key_to_address(&self.public_key)
    }

    /// Sign a 32-byte digest, producing a 65-byte `r || s || v` signature
    pub fn sign_recoverable(&self, digest: &[u8; 32]) -> Result<Vec<u8>, KeyError> {
        sign_recoverable(&self.secret_key, digest)
    }
}

/// Convert a public key to an address: Base58Check(0x00 || HASH160(pubkey))
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    Address::new(base58check(P2PKH_VERSION, &hash160(&public_key.serialize())))
}

/// Sign a 32-byte digest with a secret key, appending the recovery id
pub fn sign_recoverable(secret_key: &SecretKey, digest: &[u8; 32]) -> Result<Vec<u8>, KeyError> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest_slice(digest)?;
    let (recovery_id, compact) = secp
        .sign_ecdsa_recoverable(&message, secret_key)
        .serialize_compact();

    let mut signature = Vec::with_capacity(RECOVERABLE_SIGNATURE_LEN);
    signature.extend_from_slice(&compact);
    // Recovery ids are always 0..=3
    signature.push(recovery_id.to_i32() as u8);
    Ok(signature)
}

/// Derive the custody address of a vault from its founding configuration
///
/// Address = Base58Check(0x05 || HASH160(threshold || sorted signers)), so the
/// same founding configuration always yields the same vault address.
pub fn derive_vault_address(signers: &[Address], threshold: u32) -> Address {
    let mut sorted: Vec<&Address> = signers.iter().collect();
    sorted.sort();

    let mut script_data = threshold.to_be_bytes().to_vec();
    for signer in sorted {
        script_data.extend_from_slice(&(signer.as_bytes().len() as u32).to_be_bytes());
        script_data.extend_from_slice(signer.as_bytes());
    }

    Address::new(base58check(P2SH_VERSION, &hash160(&script_data)))
}
