//! Signer registry
//!
//! Holds the authorized signer set and the M-of-N threshold. The registry is
//! initialized exactly once; afterwards the only way to change it is an
//! executed config-change action, which replaces signers and threshold as one
//! unit.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::address::Address;
use crate::vault::error::{VaultError, VaultResult};

/// Check a signer set and threshold
///
/// The threshold must satisfy `1 <= threshold <= signers.len()` (which also
/// rules out an empty set) and no signer may appear twice.
pub fn validate_signer_config(signers: &[Address], threshold: u32) -> VaultResult<()> {
    if threshold == 0 || threshold as usize > signers.len() {
        return Err(VaultError::InvalidThreshold {
            threshold,
            signers: signers.len(),
        });
    }

    let mut seen = HashSet::with_capacity(signers.len());
    for signer in signers {
        if !seen.insert(signer) {
            return Err(VaultError::DuplicateSigner(signer.clone()));
        }
    }

    Ok(())
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignerRegistry {
    initialized: bool,
    signers: Vec<Address>,
    threshold: u32,
    /// Bumped on initialization and on every config change
    version: u64,
}

impl SignerRegistry {
    /// Create an uninitialized registry (no signers, threshold 0)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn signers(&self) -> &[Address] {
        &self.signers
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Membership query; always false before initialization
    pub fn is_member(&self, principal: &Address) -> bool {
        self.initialized && self.signers.contains(principal)
    }

    /// Get description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.threshold, self.signers.len())
    }

    /// One-time initialization with the founding signer set
    pub fn initialize(&mut self, signers: Vec<Address>, threshold: u32) -> VaultResult<()> {
        if self.initialized {
            return Err(VaultError::AlreadyInitialized);
        }
        validate_signer_config(&signers, threshold)?;

        self.replace(signers, threshold);
        self.initialized = true;
        log::info!("Signer registry initialized: {}", self.description());
        Ok(())
    }

    /// Swap in a new signer set; called only after a config-change action
    /// reached quorum
    pub(crate) fn apply_config_change(
        &mut self,
        signers: Vec<Address>,
        threshold: u32,
    ) -> VaultResult<()> {
        if !self.initialized {
            return Err(VaultError::NotInitialized);
        }
        validate_signer_config(&signers, threshold)?;

        let previous = self.description();
        self.replace(signers, threshold);
        log::info!(
            "Signer registry rotated: {} -> {} (version {})",
            previous,
            self.description(),
            self.version
        );
        Ok(())
    }

    fn replace(&mut self, signers: Vec<Address>, threshold: u32) {
        self.signers = signers;
        self.threshold = threshold;
        self.version += 1;
    }
}
