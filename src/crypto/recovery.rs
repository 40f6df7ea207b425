//! Signer recovery from recoverable ECDSA signatures
//!
//! Recovery only proves that *some* key produced the signature over the
//! digest. Whether that key belongs to an authorized signer is decided by the
//! quorum counter, never here.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, Secp256k1, VerifyOnly};
use thiserror::Error;

use super::keys::{public_key_to_address, RECOVERABLE_SIGNATURE_LEN};
use crate::address::Address;

/// Recovery failures. Every variant means the signature is malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("malformed signature: expected {RECOVERABLE_SIGNATURE_LEN} bytes, got {0}")]
    InvalidLength(usize),
    #[error("malformed signature: invalid recovery id {0}")]
    InvalidRecoveryId(u8),
    #[error("malformed signature: {0}")]
    Unrecoverable(String),
}

/// Recovers the signing principal of a digest
///
/// Implementations must be pure: same inputs, same output, no side effects.
pub trait SignatureRecovery: Send + Sync {
    fn recover(&self, digest: &[u8; 32], signature: &[u8]) -> Result<Address, RecoveryError>;
}

/// secp256k1 public-key recovery over 65-byte `r || s || v` signatures
pub struct Secp256k1Recovery {
    secp: Secp256k1<VerifyOnly>,
}

impl Secp256k1Recovery {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::verification_only(),
        }
    }
}

impl Default for Secp256k1Recovery {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureRecovery for Secp256k1Recovery {
    fn recover(&self, digest: &[u8; 32], signature: &[u8]) -> Result<Address, RecoveryError> {
        if signature.len() != RECOVERABLE_SIGNATURE_LEN {
            return Err(RecoveryError::InvalidLength(signature.len()));
        }

        // Accept both raw (0..=3) and Ethereum-style (27/28) recovery bytes
        let raw_id = signature[64];
        let normalized = match raw_id {
            0..=3 => raw_id,
            27 | 28 => raw_id - 27,
            _ => return Err(RecoveryError::InvalidRecoveryId(raw_id)),
        };

        let recovery_id = RecoveryId::from_i32(i32::from(normalized))
            .map_err(|_| RecoveryError::InvalidRecoveryId(raw_id))?;
        let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)
            .map_err(|e| RecoveryError::Unrecoverable(e.to_string()))?;
        let message = Message::from_digest_slice(digest)
            .map_err(|e| RecoveryError::Unrecoverable(e.to_string()))?;
        let public_key = self
            .secp
            .recover_ecdsa(&message, &recoverable)
            .map_err(|e| RecoveryError::Unrecoverable(e.to_string()))?;

        Ok(public_key_to_address(&public_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KeyPair;

    const DIGEST: [u8; 32] = [7u8; 32];

    #[test]
    fn test_recover_signer() {
        let kp = KeyPair::generate();
        let sig = kp.sign_recoverable(&DIGEST).unwrap();

        let recovered = Secp256k1Recovery::new().recover(&DIGEST, &sig).unwrap();
        assert_eq!(recovered, kp.address());
    }

    #[test]
    fn test_recover_ethereum_style_recovery_byte() {
        let kp = KeyPair::generate();
        let mut sig = kp.sign_recoverable(&DIGEST).unwrap();
        if sig[64] > 1 {
            // High recovery ids have no 27/28 form
            return;
        }
        sig[64] += 27;

        let recovered = Secp256k1Recovery::new().recover(&DIGEST, &sig).unwrap();
        assert_eq!(recovered, kp.address());
    }

    #[test]
    fn test_recover_other_digest_yields_other_principal() {
        let kp = KeyPair::generate();
        let sig = kp.sign_recoverable(&DIGEST).unwrap();

        // Recovery still succeeds, just not to the signer
        match Secp256k1Recovery::new().recover(&[9u8; 32], &sig) {
            Ok(addr) => assert_ne!(addr, kp.address()),
            Err(e) => assert!(matches!(e, RecoveryError::Unrecoverable(_))),
        }
    }

    #[test]
    fn test_zeroed_signature_is_malformed() {
        let result = Secp256k1Recovery::new().recover(&DIGEST, &[0u8; 65]);
        assert!(matches!(result, Err(RecoveryError::Unrecoverable(_))));
    }

    #[test]
    fn test_wrong_length_is_malformed() {
        let result = Secp256k1Recovery::new().recover(&DIGEST, &[1u8; 64]);
        assert_eq!(result, Err(RecoveryError::InvalidLength(64)));
    }

    #[test]
    fn test_bad_recovery_id_is_malformed() {
        let kp = KeyPair::generate();
        let mut sig = kp.sign_recoverable(&DIGEST).unwrap();
        sig[64] = 9;

        let result = Secp256k1Recovery::new().recover(&DIGEST, &sig);
        assert_eq!(result, Err(RecoveryError::InvalidRecoveryId(9)));
    }
}
