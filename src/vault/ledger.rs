//! Action ledger
//!
//! Actions are stored densely: the action with id `n` lives at index `n`,
//! ids start at zero and are never reused. A failed proposal never consumes
//! an id, and actions are never removed.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::address::Address;
use crate::vault::action::{Action, ProposalRequest};
use crate::vault::error::{VaultError, VaultResult};
use crate::vault::registry::SignerRegistry;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActionLedger {
    actions: Vec<Action>,
}

impl ActionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next successful proposal will receive
    pub fn next_id(&self) -> u64 {
        self.actions.len() as u64
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Record a new action proposed by `caller`
    pub fn propose(
        &mut self,
        registry: &SignerRegistry,
        caller: &Address,
        request: ProposalRequest,
    ) -> VaultResult<u64> {
        if !registry.is_initialized() {
            return Err(VaultError::NotInitialized);
        }
        if !registry.is_member(caller) {
            return Err(VaultError::NotSigner(caller.clone()));
        }

        let (payload, expiration) = request.into_payload()?;

        let id = self.next_id();
        let action = Action::new(id, payload, caller.clone(), expiration);
        log::info!(
            "Action {} proposed by {}: {}{}",
            id,
            caller,
            action.kind(),
            action
                .amount()
                .map(|amount| format!(" of {amount}"))
                .unwrap_or_default()
        );
        self.actions.push(action);

        Ok(id)
    }

    pub fn get(&self, id: u64) -> VaultResult<&Action> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.actions.get(index))
            .ok_or(VaultError::NotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> VaultResult<&mut Action> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.actions.get_mut(index))
            .ok_or(VaultError::NotFound(id))
    }

    /// Cancel a pending action
    ///
    /// Cancelling twice is an error (`AlreadyCancelled`), matching the
    /// terminal-state checks of execution.
    pub fn cancel(
        &mut self,
        registry: &SignerRegistry,
        caller: &Address,
        id: u64,
    ) -> VaultResult<()> {
        if !registry.is_member(caller) {
            return Err(VaultError::NotSigner(caller.clone()));
        }

        let action = self.get_mut(id)?;
        action.ensure_pending()?;
        action.mark_cancelled();
        log::info!("Action {} cancelled by {}", id, caller);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    /// Actions whose ids fall in `range`, clamped to the ids that exist
    pub fn list(&self, range: Range<u64>) -> &[Action] {
        let end = range.end.min(self.next_id()) as usize;
        let start = (range.start as usize).min(end);
        &self.actions[start..end]
    }

    pub fn pending(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(|action| action.is_pending())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::TokenRef;
    use crate::vault::action::ActionStatus;

    fn alice() -> Address {
        Address::new("alice")
    }

    fn bob() -> Address {
        Address::new("bob")
    }

    fn registry() -> SignerRegistry {
        let mut registry = SignerRegistry::new();
        registry.initialize(vec![alice(), bob()], 2).unwrap();
        registry
    }

    #[test]
    fn test_propose_requires_initialized_registry() {
        let mut ledger = ActionLedger::new();
        let err = ledger
            .propose(&SignerRegistry::new(), &alice(), ProposalRequest::native(10, bob()))
            .unwrap_err();
        assert_eq!(err, VaultError::NotInitialized);
        assert_eq!(ledger.next_id(), 0);
    }

    #[test]
    fn test_propose_requires_signer() {
        let mut ledger = ActionLedger::new();
        let outsider = Address::new("mallory");
        let err = ledger
            .propose(&registry(), &outsider, ProposalRequest::native(10, bob()))
            .unwrap_err();
        assert_eq!(err, VaultError::NotSigner(outsider));
    }

    #[test]
    fn test_sequential_ids() {
        let mut ledger = ActionLedger::new();
        let registry = registry();

        for expected in 0..5u64 {
            let id = ledger
                .propose(&registry, &alice(), ProposalRequest::native(100 + expected as u128, bob()))
                .unwrap();
            assert_eq!(id, expected);
        }
        assert_eq!(ledger.next_id(), 5);
        assert_eq!(ledger.get(3).unwrap().amount(), Some(103));
    }

    #[test]
    fn test_failed_proposal_consumes_no_id() {
        let mut ledger = ActionLedger::new();
        let registry = registry();

        ledger
            .propose(&registry, &alice(), ProposalRequest::native(1, bob()))
            .unwrap();

        let missing_token = ProposalRequest {
            token: None,
            ..ProposalRequest::token(TokenRef::new("0xtok"), 5, bob())
        };
        let err = ledger.propose(&registry, &alice(), missing_token).unwrap_err();
        assert!(matches!(err, VaultError::InvalidToken(_)));
        assert!(ledger
            .propose(&registry, &alice(), ProposalRequest::native(0, bob()))
            .is_err());

        let id = ledger
            .propose(&registry, &bob(), ProposalRequest::native(2, alice()))
            .unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn test_stored_fields() {
        let mut ledger = ActionLedger::new();
        let token = TokenRef::new("0xtok");
        let id = ledger
            .propose(&registry(), &alice(), ProposalRequest::token(token.clone(), 500, bob()))
            .unwrap();

        let action = ledger.get(id).unwrap();
        assert_eq!(action.proposer, alice());
        assert_eq!(action.token(), Some(&token));
        assert_eq!(action.recipient(), Some(&bob()));
        assert_eq!(action.status(), ActionStatus::Proposed);
        assert!(!action.is_executed());
    }

    #[test]
    fn test_get_unknown_id() {
        let ledger = ActionLedger::new();
        assert_eq!(ledger.get(999).unwrap_err(), VaultError::NotFound(999));
    }

    #[test]
    fn test_cancel() {
        let mut ledger = ActionLedger::new();
        let registry = registry();
        let id = ledger
            .propose(&registry, &alice(), ProposalRequest::native(10, bob()))
            .unwrap();

        // Outsiders cannot cancel
        assert!(matches!(
            ledger.cancel(&registry, &Address::new("mallory"), id),
            Err(VaultError::NotSigner(_))
        ));

        ledger.cancel(&registry, &bob(), id).unwrap();
        assert!(ledger.get(id).unwrap().is_cancelled());

        assert_eq!(
            ledger.cancel(&registry, &alice(), id),
            Err(VaultError::AlreadyCancelled(id))
        );
        assert_eq!(ledger.cancel(&registry, &alice(), 42), Err(VaultError::NotFound(42)));
    }

    #[test]
    fn test_cancel_executed_action_fails() {
        let mut ledger = ActionLedger::new();
        let registry = registry();
        let id = ledger
            .propose(&registry, &alice(), ProposalRequest::native(10, bob()))
            .unwrap();
        ledger.get_mut(id).unwrap().mark_executed(&alice());

        assert_eq!(
            ledger.cancel(&registry, &alice(), id),
            Err(VaultError::AlreadyExecuted(id))
        );
        assert!(ledger.get(id).unwrap().is_executed());
    }

    #[test]
    fn test_list_and_pending() {
        let mut ledger = ActionLedger::new();
        let registry = registry();
        for amount in 1..=4u128 {
            ledger
                .propose(&registry, &alice(), ProposalRequest::native(amount, bob()))
                .unwrap();
        }
        ledger.cancel(&registry, &alice(), 1).unwrap();

        assert_eq!(ledger.list(1..3).len(), 2);
        assert_eq!(ledger.list(2..100).len(), 2);
        assert!(ledger.list(10..20).is_empty());
        assert_eq!(ledger.pending().count(), 3);
    }
}
