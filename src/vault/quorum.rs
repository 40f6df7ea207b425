//! Quorum counting
//!
//! Candidate signatures are recovered against an action digest, and the
//! distinct recovered principals that are current registry members are
//! counted. Malformed signatures and non-members contribute nothing and never
//! surface as errors here.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::address::Address;
use crate::crypto::SignatureRecovery;
use crate::vault::digest::ActionDigest;
use crate::vault::registry::SignerRegistry;

/// Outcome of counting a signature list
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuorumTally {
    pub digest: ActionDigest,
    /// Distinct members that signed, sorted
    pub signers: BTreeSet<Address>,
    pub skipped_malformed: usize,
    pub skipped_non_members: usize,
}

impl QuorumTally {
    fn new(digest: ActionDigest) -> Self {
        Self {
            digest,
            signers: BTreeSet::new(),
            skipped_malformed: 0,
            skipped_non_members: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.signers.len()
    }

    pub fn meets(&self, threshold: u32) -> bool {
        self.count() >= threshold as usize
    }
}

/// Read-only view over a registry and a recovery backend
pub struct QuorumCounter<'a, R: SignatureRecovery + ?Sized> {
    registry: &'a SignerRegistry,
    recovery: &'a R,
}

impl<'a, R: SignatureRecovery + ?Sized> QuorumCounter<'a, R> {
    pub fn new(registry: &'a SignerRegistry, recovery: &'a R) -> Self {
        Self { registry, recovery }
    }

    pub fn tally<S: AsRef<[u8]>>(&self, digest: &ActionDigest, signatures: &[S]) -> QuorumTally {
        let mut tally = QuorumTally::new(*digest);

        for signature in signatures {
            match self.recovery.recover(digest.as_bytes(), signature.as_ref()) {
                Ok(principal) if self.registry.is_member(&principal) => {
                    tally.signers.insert(principal);
                }
                Ok(principal) => {
                    log::debug!("Skipping signature from non-member {}", principal);
                    tally.skipped_non_members += 1;
                }
                Err(e) => {
                    log::debug!("Skipping signature: {}", e);
                    tally.skipped_malformed += 1;
                }
            }
        }

        tally
    }

    pub fn count_valid<S: AsRef<[u8]>>(&self, digest: &ActionDigest, signatures: &[S]) -> usize {
        self.tally(digest, signatures).count()
    }
}

/// Everything needed to count signatures for one action, detached from the
/// vault that produced it
pub struct QuorumSnapshot<R: SignatureRecovery> {
    digest: ActionDigest,
    registry: SignerRegistry,
    recovery: Arc<R>,
}

impl<R: SignatureRecovery> QuorumSnapshot<R> {
    pub fn new(digest: ActionDigest, registry: SignerRegistry, recovery: Arc<R>) -> Self {
        Self {
            digest,
            registry,
            recovery,
        }
    }

    pub fn digest(&self) -> &ActionDigest {
        &self.digest
    }

    pub fn tally<S: AsRef<[u8]>>(&self, signatures: &[S]) -> QuorumTally {
        QuorumCounter::new(&self.registry, &*self.recovery).tally(&self.digest, signatures)
    }
}
