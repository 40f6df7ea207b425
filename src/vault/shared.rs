//! Thread-safe vault handle
//!
//! Mutations take the write lock for their whole duration, so no other thread
//! observes a half-applied call. Reads share the lock and see a consistent
//! snapshot. Signature counting only holds the lock long enough to copy the
//! digest and registry; recovery itself runs unlocked. A poisoned lock is
//! recovered: a vault call commits nothing until all of its fallible steps
//! have passed.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::address::Address;
use crate::crypto::{Secp256k1Recovery, SignatureRecovery};
use crate::custody::CustodyLayer;
use crate::vault::action::{Action, ProposalRequest};
use crate::vault::digest::ActionDigest;
use crate::vault::engine::Vault;
use crate::vault::error::VaultResult;
use crate::vault::quorum::QuorumTally;

pub struct SharedVault<C: CustodyLayer, R: SignatureRecovery = Secp256k1Recovery> {
    inner: Arc<RwLock<Vault<C, R>>>,
}

impl<C: CustodyLayer, R: SignatureRecovery> Clone for SharedVault<C, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: CustodyLayer, R: SignatureRecovery> SharedVault<C, R> {
    pub fn new(vault: Vault<C, R>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(vault)),
        }
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Vault<C, R>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Vault<C, R>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against a consistent read-only view
    pub fn read<T>(&self, f: impl FnOnce(&Vault<C, R>) -> T) -> T {
        f(&*self.read_guard())
    }

    /// Run `f` with exclusive access
    pub fn write<T>(&self, f: impl FnOnce(&mut Vault<C, R>) -> T) -> T {
        f(&mut *self.write_guard())
    }

    pub fn initialize(&self, signers: Vec<Address>, threshold: u32) -> VaultResult<()> {
        self.write(|vault| vault.initialize(signers, threshold))
    }

    pub fn propose(&self, caller: &Address, request: ProposalRequest) -> VaultResult<u64> {
        self.write(|vault| vault.propose(caller, request))
    }

    /// Owned copy of action `id`
    pub fn get(&self, id: u64) -> VaultResult<Action> {
        self.read(|vault| vault.get(id).cloned())
    }

    pub fn digest(&self, id: u64) -> VaultResult<ActionDigest> {
        self.read(|vault| vault.digest(id))
    }

    pub fn recover(&self, digest: &ActionDigest, signature: &[u8]) -> VaultResult<Address> {
        self.read(|vault| vault.recover(digest, signature))
    }

    pub fn count_valid<S: AsRef<[u8]>>(&self, id: u64, signatures: &[S]) -> VaultResult<usize> {
        Ok(self.tally(id, signatures)?.count())
    }

    /// Count against the registry as of the call; writers are not held up
    pub fn tally<S: AsRef<[u8]>>(&self, id: u64, signatures: &[S]) -> VaultResult<QuorumTally> {
        let snapshot = self.read(|vault| vault.quorum_snapshot(id))?;
        Ok(snapshot.tally(signatures))
    }

    pub fn cancel(&self, caller: &Address, id: u64) -> VaultResult<()> {
        self.write(|vault| vault.cancel(caller, id))
    }

    pub fn execute_transfer<S: AsRef<[u8]>>(
        &self,
        caller: &Address,
        id: u64,
        signatures: &[S],
    ) -> VaultResult<()> {
        self.write(|vault| vault.execute_transfer(caller, id, signatures))
    }

    pub fn execute_config_change<S: AsRef<[u8]>>(
        &self,
        caller: &Address,
        id: u64,
        signatures: &[S],
    ) -> VaultResult<()> {
        self.write(|vault| vault.execute_config_change(caller, id, signatures))
    }

    pub fn execute<S: AsRef<[u8]>>(
        &self,
        caller: &Address,
        id: u64,
        signatures: &[S],
    ) -> VaultResult<()> {
        self.write(|vault| vault.execute(caller, id, signatures))
    }

    pub fn is_member(&self, principal: &Address) -> bool {
        self.read(|vault| vault.is_member(principal))
    }

    pub fn signers(&self) -> Vec<Address> {
        self.read(|vault| vault.signers().to_vec())
    }

    pub fn threshold(&self) -> u32 {
        self.read(Vault::threshold)
    }

    pub fn next_id(&self) -> u64 {
        self.read(Vault::next_id)
    }

    pub fn observe_height(&self, height: u64) {
        self.write(|vault| vault.observe_height(height))
    }
}
