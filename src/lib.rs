//! Threshold Vault: an M-of-N signature authorization engine in Rust
//!
//! This crate provides a vault controlled by a set of signers, featuring:
//! - Proposals for native coin transfers, token transfers and signer rotation
//! - Canonical SHA-256 action digests bound to the vault and action id
//! - Recoverable ECDSA signatures (secp256k1) with signer recovery
//! - Deduplicated quorum counting over registry members
//! - Gated, exactly-once execution against a custody layer
//! - JSON persistence with atomic writes and backups
//!
//! # Example
//!
//! ```rust
//! use threshold_vault::crypto::{derive_vault_address, KeyPair};
//! use threshold_vault::custody::Treasury;
//! use threshold_vault::vault::{ProposalRequest, Vault};
//! use threshold_vault::Address;
//!
//! let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
//! let signers: Vec<Address> = keys.iter().map(KeyPair::address).collect();
//! let address = derive_vault_address(&signers, 2);
//!
//! // Fund and initialize a 2-of-3 vault
//! let mut treasury = Treasury::new();
//! treasury.deposit(&address, 5000).unwrap();
//! let mut vault = Vault::new(address, treasury);
//! vault.initialize(signers.clone(), 2).unwrap();
//!
//! // Propose, collect two signatures, execute
//! let id = vault
//!     .propose(&signers[0], ProposalRequest::native(1000, Address::new("bob")))
//!     .unwrap();
//! let digest = vault.digest(id).unwrap();
//! let sigs: Vec<Vec<u8>> = keys[..2]
//!     .iter()
//!     .map(|k| k.sign_recoverable(digest.as_bytes()).unwrap())
//!     .collect();
//! vault.execute_transfer(&signers[0], id, &sigs).unwrap();
//!
//! assert_eq!(vault.balance(), 4000);
//! ```

pub mod address;
pub mod cli;
pub mod crypto;
pub mod custody;
pub mod storage;
pub mod token;
pub mod vault;

// Re-export commonly used types
pub use address::{Address, TokenRef};
pub use crypto::{KeyPair, Secp256k1Recovery, SignatureRecovery};
pub use custody::{CustodyLayer, Treasury};
pub use storage::{Storage, StorageConfig, VaultSnapshot};
pub use token::{Token, TokenManager, TokenMetadata};
pub use vault::{
    ActionDigest, ActionKind, ProposalRequest, SharedVault, Vault, VaultError, VaultResult,
};
