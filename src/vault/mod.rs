//! Threshold-signature authorization engine
//!
//! A vault holds a set of N signers and a threshold M. Any signer may propose
//! an action (a native transfer, a token transfer, or a change to the signer
//! set). Signers sign the action's digest off-band, and the action executes
//! once signatures from at least M distinct current signers are presented.
//!
//! # Example
//!
//! ```ignore
//! use threshold_vault::custody::Treasury;
//! use threshold_vault::vault::{ProposalRequest, Vault};
//!
//! let mut vault = Vault::new(vault_address, Treasury::new());
//! vault.initialize(vec![alice.address(), bob.address(), carol.address()], 2)?;
//!
//! let id = vault.propose(&alice.address(), ProposalRequest::native(1000, recipient))?;
//! let digest = vault.digest(id)?;
//!
//! let sigs = vec![
//!     alice.sign_recoverable(digest.as_bytes())?,
//!     carol.sign_recoverable(digest.as_bytes())?,
//! ];
//! vault.execute_transfer(&alice.address(), id, &sigs)?;
//! ```

pub mod action;
pub mod digest;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod quorum;
pub mod registry;
pub mod shared;

pub use action::{
    Action, ActionKind, ActionPayload, ActionStatus, Expiration, ProposalRequest, ProposalTarget,
};
pub use digest::{action_digest, ActionDigest, DigestParseError};
pub use engine::{Vault, VaultState};
pub use error::{VaultError, VaultResult};
pub use ledger::ActionLedger;
pub use quorum::{QuorumCounter, QuorumSnapshot, QuorumTally};
pub use registry::{validate_signer_config, SignerRegistry};
pub use shared::SharedVault;
