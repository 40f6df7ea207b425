//! The vault: proposal intake and gated execution
//!
//! [`Vault`] owns the registry and the action ledger, and drives a
//! [`CustodyLayer`] for balance movement. Every mutating method takes
//! `&mut self`, so all checks and the resulting effect of one call form a
//! single step; [`crate::vault::SharedVault`] extends that to many threads.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::crypto::{Secp256k1Recovery, SignatureRecovery};
use crate::custody::CustodyLayer;
use crate::vault::action::{Action, ActionKind, ActionPayload, ProposalRequest};
use crate::vault::digest::{action_digest, ActionDigest};
use crate::vault::error::{VaultError, VaultResult};
use crate::vault::ledger::ActionLedger;
use crate::vault::quorum::{QuorumCounter, QuorumSnapshot, QuorumTally};
use crate::vault::registry::SignerRegistry;

/// Everything the vault persists about itself
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultState {
    /// Custody account the vault spends from
    pub address: Address,
    /// Last ledger height reported by the host
    height: u64,
    registry: SignerRegistry,
    ledger: ActionLedger,
}

impl VaultState {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            height: 0,
            registry: SignerRegistry::new(),
            ledger: ActionLedger::new(),
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn registry(&self) -> &SignerRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &ActionLedger {
        &self.ledger
    }
}

/// Threshold-signature vault over a custody layer
pub struct Vault<C: CustodyLayer, R: SignatureRecovery = Secp256k1Recovery> {
    state: VaultState,
    custody: C,
    recovery: Arc<R>,
}

impl<C: CustodyLayer> Vault<C> {
    /// Create an uninitialized vault spending from `address`
    pub fn new(address: Address, custody: C) -> Self {
        Self::from_state(VaultState::new(address), custody)
    }

    /// Resume a vault from persisted state
    pub fn from_state(state: VaultState, custody: C) -> Self {
        Self::from_parts(state, custody, Secp256k1Recovery::new())
    }
}

impl<C: CustodyLayer, R: SignatureRecovery> Vault<C, R> {
    pub fn with_recovery(address: Address, custody: C, recovery: R) -> Self {
        Self::from_parts(VaultState::new(address), custody, recovery)
    }

    pub fn from_parts(state: VaultState, custody: C, recovery: R) -> Self {
        Self {
            state,
            custody,
            recovery: Arc::new(recovery),
        }
    }

    pub fn into_parts(self) -> (VaultState, C, Arc<R>) {
        (self.state, self.custody, self.recovery)
    }

    pub fn address(&self) -> &Address {
        &self.state.address
    }

    pub fn state(&self) -> &VaultState {
        &self.state
    }

    pub fn registry(&self) -> &SignerRegistry {
        &self.state.registry
    }

    pub fn ledger(&self) -> &ActionLedger {
        &self.state.ledger
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    /// Direct custody access, for deposits made outside the vault
    pub fn custody_mut(&mut self) -> &mut C {
        &mut self.custody
    }

    /// Native coin held by the vault
    pub fn balance(&self) -> u128 {
        self.custody.native_balance(&self.state.address)
    }

    pub fn initialize(&mut self, signers: Vec<Address>, threshold: u32) -> VaultResult<()> {
        self.state.registry.initialize(signers, threshold)?;
        log::info!(
            "Vault {} initialized as {}",
            self.state.address,
            self.state.registry.description()
        );
        Ok(())
    }

    pub fn is_member(&self, principal: &Address) -> bool {
        self.state.registry.is_member(principal)
    }

    pub fn signers(&self) -> &[Address] {
        self.state.registry.signers()
    }

    pub fn threshold(&self) -> u32 {
        self.state.registry.threshold()
    }

    pub fn next_id(&self) -> u64 {
        self.state.ledger.next_id()
    }

    pub fn height(&self) -> u64 {
        self.state.height
    }

    /// Record the current ledger height; heights never move backwards
    pub fn observe_height(&mut self, height: u64) {
        if height > self.state.height {
            log::debug!("Observed height {} -> {}", self.state.height, height);
            self.state.height = height;
        }
    }

    pub fn propose(&mut self, caller: &Address, request: ProposalRequest) -> VaultResult<u64> {
        let state = &mut self.state;
        state.ledger.propose(&state.registry, caller, request)
    }

    pub fn get(&self, id: u64) -> VaultResult<&Action> {
        self.state.ledger.get(id)
    }

    /// The digest signers must sign to approve action `id`
    pub fn digest(&self, id: u64) -> VaultResult<ActionDigest> {
        let action = self.get(id)?;
        Ok(self.digest_of(action))
    }

    fn digest_of(&self, action: &Action) -> ActionDigest {
        action_digest(
            &self.state.address,
            action.id,
            &action.payload,
            action.expiration.as_ref(),
        )
    }

    /// Recover the principal behind a signature, without membership checks
    pub fn recover(&self, digest: &ActionDigest, signature: &[u8]) -> VaultResult<Address> {
        Ok(self.recovery.recover(digest.as_bytes(), signature)?)
    }

    pub fn tally<S: AsRef<[u8]>>(&self, id: u64, signatures: &[S]) -> VaultResult<QuorumTally> {
        let digest = self.digest(id)?;
        let counter = QuorumCounter::new(&self.state.registry, &*self.recovery);
        Ok(counter.tally(&digest, signatures))
    }

    /// Owned digest, registry and recovery handle for counting `id` elsewhere
    pub fn quorum_snapshot(&self, id: u64) -> VaultResult<QuorumSnapshot<R>> {
        Ok(QuorumSnapshot::new(
            self.digest(id)?,
            self.state.registry.clone(),
            Arc::clone(&self.recovery),
        ))
    }

    /// Number of distinct current signers among `signatures`
    pub fn count_valid<S: AsRef<[u8]>>(&self, id: u64, signatures: &[S]) -> VaultResult<usize> {
        Ok(self.tally(id, signatures)?.count())
    }

    pub fn cancel(&mut self, caller: &Address, id: u64) -> VaultResult<()> {
        let state = &mut self.state;
        state.ledger.cancel(&state.registry, caller, id)
    }

    /// Run every execution precondition and hand back the payload to apply
    ///
    /// Checks run in a fixed order: existence, terminal state, kind, expiry,
    /// then quorum. Nothing is mutated.
    fn authorize<S: AsRef<[u8]>>(
        &self,
        id: u64,
        expected: &'static str,
        accepts: fn(ActionKind) -> bool,
        signatures: &[S],
    ) -> VaultResult<ActionPayload> {
        let action = self.get(id)?;
        action.ensure_pending()?;

        if !accepts(action.kind()) {
            return Err(VaultError::WrongKind {
                id,
                expected,
                found: action.kind(),
            });
        }

        if action.is_expired(self.state.height, Utc::now()) {
            return Err(VaultError::Expired(id));
        }

        let digest = self.digest_of(action);
        let tally = QuorumCounter::new(&self.state.registry, &*self.recovery).tally(&digest, signatures);
        let threshold = self.state.registry.threshold();
        if !tally.meets(threshold) {
            return Err(VaultError::InsufficientSignatures {
                have: tally.count(),
                need: threshold,
            });
        }

        Ok(action.payload.clone())
    }

    /// Execute an approved native or token transfer
    ///
    /// A refused custody transfer leaves the action pending, so it can be
    /// retried once the vault is funded, or cancelled.
    pub fn execute_transfer<S: AsRef<[u8]>>(
        &mut self,
        caller: &Address,
        id: u64,
        signatures: &[S],
    ) -> VaultResult<()> {
        let payload = self.authorize(id, "transfer", ActionKind::is_transfer, signatures)?;

        let from = self.state.address.clone();
        let result = match &payload {
            ActionPayload::NativeTransfer { amount, recipient } => {
                self.custody.transfer_native(&from, recipient, *amount)
            }
            ActionPayload::TokenTransfer {
                token,
                amount,
                recipient,
            } => self.custody.transfer_token(token, &from, recipient, *amount),
            ActionPayload::ConfigChange { .. } => {
                return Err(VaultError::WrongKind {
                    id,
                    expected: "transfer",
                    found: payload.kind(),
                });
            }
        };

        if let Err(e) = result {
            log::warn!("Action {} transfer refused by custody: {}", id, e);
            return Err(VaultError::TransferFailed(e));
        }

        self.state.ledger.get_mut(id)?.mark_executed(caller);
        log::info!("Action {} executed by {}: {}", id, caller, payload.kind());
        Ok(())
    }

    /// Execute an approved signer-set rotation
    pub fn execute_config_change<S: AsRef<[u8]>>(
        &mut self,
        caller: &Address,
        id: u64,
        signatures: &[S],
    ) -> VaultResult<()> {
        let payload = self.authorize(
            id,
            "config-change",
            |kind| kind == ActionKind::ConfigChange,
            signatures,
        )?;

        match payload {
            ActionPayload::ConfigChange { signers, threshold } => {
                self.state.registry.apply_config_change(signers, threshold)?;
            }
            other => {
                return Err(VaultError::WrongKind {
                    id,
                    expected: "config-change",
                    found: other.kind(),
                });
            }
        }

        self.state.ledger.get_mut(id)?.mark_executed(caller);
        log::info!("Action {} executed by {}: config-change", id, caller);
        Ok(())
    }

    /// Execute action `id` with the executor matching its kind
    pub fn execute<S: AsRef<[u8]>>(
        &mut self,
        caller: &Address,
        id: u64,
        signatures: &[S],
    ) -> VaultResult<()> {
        match self.get(id)?.kind() {
            ActionKind::NativeTransfer | ActionKind::TokenTransfer => {
                self.execute_transfer(caller, id, signatures)
            }
            ActionKind::ConfigChange => self.execute_config_change(caller, id, signatures),
        }
    }
}
