//! Error taxonomy of the authorization engine
//!
//! Every failure is local and synchronous; none of them leaves the registry,
//! the ledger or custodied balances mutated.

use thiserror::Error;

use crate::address::Address;
use crate::crypto::RecoveryError;
use crate::custody::TransferError;
use crate::vault::action::ActionKind;

/// Convenience alias for engine results
pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Vault is not initialized")]
    NotInitialized,
    #[error("Vault is already initialized")]
    AlreadyInitialized,
    #[error("Invalid threshold {threshold} for {signers} signer(s)")]
    InvalidThreshold { threshold: u32, signers: usize },
    #[error("Duplicate signer: {0}")]
    DuplicateSigner(Address),
    #[error("Not a signer: {0}")]
    NotSigner(Address),
    #[error("Invalid amount {amount} for {kind} action")]
    InvalidAmount { kind: ActionKind, amount: u128 },
    #[error("Invalid action type: {0}")]
    InvalidTxnType(String),
    #[error("Invalid token reference: {0}")]
    InvalidToken(String),
    #[error("Action not found: {0}")]
    NotFound(u64),
    #[error("Action {0} already executed")]
    AlreadyExecuted(u64),
    #[error("Action {0} already cancelled")]
    AlreadyCancelled(u64),
    #[error("Action {id} is a {found} action, expected {expected}")]
    WrongKind {
        id: u64,
        expected: &'static str,
        found: ActionKind,
    },
    #[error("Insufficient signatures: have {have}, need {need}")]
    InsufficientSignatures { have: usize, need: u32 },
    #[error("Malformed signature: {0}")]
    MalformedSignature(#[from] RecoveryError),
    #[error("Action {0} has expired")]
    Expired(u64),
    #[error("Transfer failed: {0}")]
    TransferFailed(#[from] TransferError),
}

impl VaultError {
    /// Stable numeric code for callers that report errors over a wire
    pub fn code(&self) -> u32 {
        match self {
            VaultError::AlreadyInitialized => 1,
            VaultError::InvalidThreshold { .. } => 2,
            VaultError::DuplicateSigner(_) => 3,
            VaultError::NotInitialized => 5,
            VaultError::NotSigner(_) => 6,
            VaultError::InvalidAmount { .. } => 7,
            VaultError::InvalidTxnType(_) => 8,
            VaultError::NotFound(_) => 9,
            VaultError::AlreadyExecuted(_) => 10,
            VaultError::InsufficientSignatures { .. } => 11,
            VaultError::MalformedSignature(_) => 12,
            VaultError::InvalidToken(_) => 13,
            VaultError::TransferFailed(_) => 14,
            VaultError::AlreadyCancelled(_) => 15,
            VaultError::WrongKind { .. } => 16,
            VaultError::Expired(_) => 17,
        }
    }
}
