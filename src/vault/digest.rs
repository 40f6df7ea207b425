//! Canonical action digests
//!
//! The digest is what signers actually sign. It is SHA-256 over a fixed,
//! length-prefixed big-endian encoding of the action, bound to the vault
//! address and the action id so a signature can never be replayed against a
//! different action or a different vault.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::address::Address;
use crate::crypto::sha256;
use crate::vault::action::{ActionPayload, Expiration};

/// Domain separation tag, bumped if the encoding ever changes
pub const DIGEST_DOMAIN: &[u8] = b"threshold-vault/action/v1";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestParseError {
    #[error("digest must be 64 hex characters, got {0}")]
    InvalidLength(usize),
    #[error("digest is not valid hex")]
    InvalidHex,
}

/// A 32-byte action digest
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ActionDigest([u8; 32]);

impl ActionDigest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ActionDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ActionDigest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_start_matches("0x");
        if s.len() != 64 {
            return Err(DigestParseError::InvalidLength(s.len()));
        }
        let bytes = hex::decode(s).map_err(|_| DigestParseError::InvalidHex)?;
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes);
        Ok(Self(digest))
    }
}

/// Append-only canonical encoder
struct Encoder(Vec<u8>);

impl Encoder {
    fn new() -> Self {
        Self(Vec::with_capacity(256))
    }

    fn u8(&mut self, value: u8) -> &mut Self {
        self.0.push(value);
        self
    }

    fn u32(&mut self, value: u32) -> &mut Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn u64(&mut self, value: u64) -> &mut Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn i64(&mut self, value: i64) -> &mut Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn u128(&mut self, value: u128) -> &mut Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Length-prefixed bytes; the prefix keeps adjacent fields unambiguous
    fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.u32(value.len() as u32);
        self.0.extend_from_slice(value);
        self
    }

    fn finish(&self) -> ActionDigest {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&sha256(&self.0));
        ActionDigest(digest)
    }
}

/// Compute the digest signers sign for an action
pub fn action_digest(
    vault: &Address,
    id: u64,
    payload: &ActionPayload,
    expiration: Option<&Expiration>,
) -> ActionDigest {
    let mut enc = Encoder::new();
    enc.bytes(DIGEST_DOMAIN)
        .bytes(vault.as_bytes())
        .u64(id)
        .u8(payload.kind().code() as u8);

    match payload {
        ActionPayload::NativeTransfer { amount, recipient } => {
            enc.u128(*amount).bytes(recipient.as_bytes());
        }
        ActionPayload::TokenTransfer {
            token,
            amount,
            recipient,
        } => {
            enc.u128(*amount)
                .bytes(recipient.as_bytes())
                .bytes(token.as_bytes());
        }
        ActionPayload::ConfigChange { signers, threshold } => {
            enc.u32(*threshold).u32(signers.len() as u32);
            for signer in signers {
                enc.bytes(signer.as_bytes());
            }
        }
    }

    match expiration {
        None => {
            enc.u8(0);
        }
        Some(Expiration::AtHeight(height)) => {
            enc.u8(1).u64(*height);
        }
        Some(Expiration::AtTime(deadline)) => {
            enc.u8(2)
                .i64(deadline.timestamp())
                .u32(deadline.timestamp_subsec_nanos());
        }
    }

    enc.finish()
}
