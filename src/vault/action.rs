//! Proposed actions and their lifecycle
//!
//! An action is created by a signer's proposal and then moves exactly once
//! from `Proposed` to one of the terminal states `Executed` or `Cancelled`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::{Address, TokenRef};
use crate::vault::error::{VaultError, VaultResult};
use crate::vault::registry::validate_signer_config;

/// Kind tag of an action, with its wire code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    NativeTransfer,
    TokenTransfer,
    ConfigChange,
}

impl ActionKind {
    pub fn code(self) -> u32 {
        match self {
            ActionKind::NativeTransfer => 0,
            ActionKind::TokenTransfer => 1,
            ActionKind::ConfigChange => 2,
        }
    }

    pub fn from_code(code: u32) -> VaultResult<Self> {
        match code {
            0 => Ok(ActionKind::NativeTransfer),
            1 => Ok(ActionKind::TokenTransfer),
            2 => Ok(ActionKind::ConfigChange),
            other => Err(VaultError::InvalidTxnType(format!("unknown kind code {other}"))),
        }
    }

    pub fn is_transfer(self) -> bool {
        matches!(self, ActionKind::NativeTransfer | ActionKind::TokenTransfer)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::NativeTransfer => "native-transfer",
            ActionKind::TokenTransfer => "token-transfer",
            ActionKind::ConfigChange => "config-change",
        };
        f.write_str(name)
    }
}

/// The effect an action performs once approved
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPayload {
    NativeTransfer {
        amount: u128,
        recipient: Address,
    },
    TokenTransfer {
        token: TokenRef,
        amount: u128,
        recipient: Address,
    },
    ConfigChange {
        signers: Vec<Address>,
        threshold: u32,
    },
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::NativeTransfer { .. } => ActionKind::NativeTransfer,
            ActionPayload::TokenTransfer { .. } => ActionKind::TokenTransfer,
            ActionPayload::ConfigChange { .. } => ActionKind::ConfigChange,
        }
    }
}

/// Deadline after which an action can no longer execute
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiration {
    /// Expired once the observed ledger height reaches this value
    AtHeight(u64),
    /// Expired once the wall clock reaches this instant
    AtTime(DateTime<Utc>),
}

impl Expiration {
    pub fn is_reached(&self, height: u64, now: DateTime<Utc>) -> bool {
        match self {
            Expiration::AtHeight(bound) => height >= *bound,
            Expiration::AtTime(deadline) => now >= *deadline,
        }
    }
}

impl fmt::Display for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiration::AtHeight(height) => write!(f, "height {height}"),
            Expiration::AtTime(deadline) => write!(f, "{}", deadline.to_rfc3339()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    Proposed,
    Executed,
    Cancelled,
}

/// A stored action
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Action {
    pub id: u64,
    pub payload: ActionPayload,
    pub proposer: Address,
    pub expiration: Option<Expiration>,
    status: ActionStatus,
    pub proposed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Caller that drove the successful execution
    pub executed_by: Option<Address>,
}

impl Action {
    pub(crate) fn new(
        id: u64,
        payload: ActionPayload,
        proposer: Address,
        expiration: Option<Expiration>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            payload,
            proposer,
            expiration,
            status: ActionStatus::Proposed,
            proposed_at: now,
            updated_at: now,
            executed_by: None,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }

    pub fn status(&self) -> ActionStatus {
        self.status
    }

    pub fn is_executed(&self) -> bool {
        self.status == ActionStatus::Executed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == ActionStatus::Cancelled
    }

    pub fn is_pending(&self) -> bool {
        self.status == ActionStatus::Proposed
    }

    /// Transfer amount, `None` for config changes
    pub fn amount(&self) -> Option<u128> {
        match &self.payload {
            ActionPayload::NativeTransfer { amount, .. }
            | ActionPayload::TokenTransfer { amount, .. } => Some(*amount),
            ActionPayload::ConfigChange { .. } => None,
        }
    }

    pub fn recipient(&self) -> Option<&Address> {
        match &self.payload {
            ActionPayload::NativeTransfer { recipient, .. }
            | ActionPayload::TokenTransfer { recipient, .. } => Some(recipient),
            ActionPayload::ConfigChange { .. } => None,
        }
    }

    pub fn token(&self) -> Option<&TokenRef> {
        match &self.payload {
            ActionPayload::TokenTransfer { token, .. } => Some(token),
            _ => None,
        }
    }

    pub fn is_expired(&self, height: u64, now: DateTime<Utc>) -> bool {
        self.expiration
            .as_ref()
            .is_some_and(|expiration| expiration.is_reached(height, now))
    }

    /// Fail unless the action can still move to a terminal state
    pub(crate) fn ensure_pending(&self) -> VaultResult<()> {
        match self.status {
            ActionStatus::Proposed => Ok(()),
            ActionStatus::Executed => Err(VaultError::AlreadyExecuted(self.id)),
            ActionStatus::Cancelled => Err(VaultError::AlreadyCancelled(self.id)),
        }
    }

    pub(crate) fn mark_executed(&mut self, by: &Address) {
        self.status = ActionStatus::Executed;
        self.executed_by = Some(by.clone());
        self.updated_at = Utc::now();
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.status = ActionStatus::Cancelled;
        self.updated_at = Utc::now();
    }
}

/// What a proposal points at: a recipient, or a replacement signer set
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProposalTarget {
    Recipient(Address),
    Signers { signers: Vec<Address>, threshold: u32 },
}

/// Unvalidated proposal input, as received from a caller
///
/// The kind arrives as a raw wire code so that unknown kinds can be rejected
/// with `InvalidTxnType` instead of being unrepresentable at the boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposalRequest {
    pub kind: u32,
    pub amount: u128,
    pub target: ProposalTarget,
    pub token: Option<TokenRef>,
    pub expiration: Option<Expiration>,
}

impl ProposalRequest {
    pub fn native(amount: u128, recipient: Address) -> Self {
        Self {
            kind: ActionKind::NativeTransfer.code(),
            amount,
            target: ProposalTarget::Recipient(recipient),
            token: None,
            expiration: None,
        }
    }

    pub fn token(token: TokenRef, amount: u128, recipient: Address) -> Self {
        Self {
            kind: ActionKind::TokenTransfer.code(),
            amount,
            target: ProposalTarget::Recipient(recipient),
            token: Some(token),
            expiration: None,
        }
    }

    pub fn config_change(signers: Vec<Address>, threshold: u32) -> Self {
        Self {
            kind: ActionKind::ConfigChange.code(),
            amount: 0,
            target: ProposalTarget::Signers { signers, threshold },
            token: None,
            expiration: None,
        }
    }

    pub fn expires(mut self, expiration: Expiration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Validate the request into a typed payload
    pub(crate) fn into_payload(self) -> VaultResult<(ActionPayload, Option<Expiration>)> {
        let kind = ActionKind::from_code(self.kind)?;

        if kind.is_transfer() && self.amount == 0 {
            return Err(VaultError::InvalidAmount {
                kind,
                amount: self.amount,
            });
        }
        if !kind.is_transfer() && self.amount != 0 {
            return Err(VaultError::InvalidAmount {
                kind,
                amount: self.amount,
            });
        }

        let payload = match (kind, self.target, self.token) {
            (ActionKind::NativeTransfer, ProposalTarget::Recipient(recipient), None) => {
                ActionPayload::NativeTransfer {
                    amount: self.amount,
                    recipient,
                }
            }
            (ActionKind::TokenTransfer, ProposalTarget::Recipient(recipient), Some(token)) => {
                ActionPayload::TokenTransfer {
                    token,
                    amount: self.amount,
                    recipient,
                }
            }
            (ActionKind::ConfigChange, ProposalTarget::Signers { signers, threshold }, None) => {
                validate_signer_config(&signers, threshold)?;
                ActionPayload::ConfigChange { signers, threshold }
            }
            (ActionKind::TokenTransfer, ProposalTarget::Recipient(_), None) => {
                return Err(VaultError::InvalidToken(
                    "token transfer requires a token reference".to_string(),
                ));
            }
            (kind, ProposalTarget::Recipient(_), Some(token))
            | (kind @ ActionKind::ConfigChange, ProposalTarget::Signers { .. }, Some(token)) => {
                return Err(VaultError::InvalidToken(format!(
                    "{kind} action must not reference token {token}"
                )));
            }
            (kind, ProposalTarget::Signers { .. }, _) => {
                return Err(VaultError::InvalidTxnType(format!(
                    "{kind} action requires a recipient"
                )));
            }
            (kind, ProposalTarget::Recipient(_), None) => {
                return Err(VaultError::InvalidTxnType(format!(
                    "{kind} action requires a signer set"
                )));
            }
        };

        Ok((payload, self.expiration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn bob() -> Address {
        Address::new("bob")
    }

    #[test]
    fn test_kind_codes() {
        for kind in [
            ActionKind::NativeTransfer,
            ActionKind::TokenTransfer,
            ActionKind::ConfigChange,
        ] {
            assert_eq!(ActionKind::from_code(kind.code()).unwrap(), kind);
        }
        assert!(matches!(
            ActionKind::from_code(3),
            Err(VaultError::InvalidTxnType(_))
        ));
    }

    #[test]
    fn test_native_request_validation() {
        let (payload, expiration) = ProposalRequest::native(1000, bob()).into_payload().unwrap();
        assert_eq!(
            payload,
            ActionPayload::NativeTransfer {
                amount: 1000,
                recipient: bob()
            }
        );
        assert!(expiration.is_none());

        let err = ProposalRequest::native(0, bob()).into_payload().unwrap_err();
        assert!(matches!(err, VaultError::InvalidAmount { .. }));
    }

    #[test]
    fn test_token_reference_must_match_kind() {
        let missing = ProposalRequest {
            token: None,
            ..ProposalRequest::token(TokenRef::new("0xtok"), 5, bob())
        };
        assert!(matches!(
            missing.into_payload(),
            Err(VaultError::InvalidToken(_))
        ));

        let stray = ProposalRequest {
            token: Some(TokenRef::new("0xtok")),
            ..ProposalRequest::native(5, bob())
        };
        assert!(matches!(
            stray.into_payload(),
            Err(VaultError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_unknown_kind_code() {
        let request = ProposalRequest {
            kind: 7,
            ..ProposalRequest::native(5, bob())
        };
        assert!(matches!(
            request.into_payload(),
            Err(VaultError::InvalidTxnType(_))
        ));
    }

    #[test]
    fn test_target_must_match_kind() {
        let request = ProposalRequest {
            kind: ActionKind::ConfigChange.code(),
            amount: 0,
            ..ProposalRequest::native(5, bob())
        };
        assert!(matches!(
            request.into_payload(),
            Err(VaultError::InvalidTxnType(_))
        ));
    }

    #[test]
    fn test_config_request_validation() {
        let err = ProposalRequest::config_change(vec![bob(), bob()], 1)
            .into_payload()
            .unwrap_err();
        assert_eq!(err, VaultError::DuplicateSigner(bob()));

        let err = ProposalRequest::config_change(vec![bob()], 2)
            .into_payload()
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidThreshold { .. }));

        let with_amount = ProposalRequest {
            amount: 1,
            ..ProposalRequest::config_change(vec![bob()], 1)
        };
        assert!(matches!(
            with_amount.into_payload(),
            Err(VaultError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_expiration() {
        let now = Utc::now();
        assert!(Expiration::AtHeight(10).is_reached(10, now));
        assert!(!Expiration::AtHeight(10).is_reached(9, now));
        assert!(Expiration::AtTime(now - Duration::seconds(1)).is_reached(0, now));
        assert!(!Expiration::AtTime(now + Duration::hours(1)).is_reached(0, now));
    }

    #[test]
    fn test_lifecycle_flags_are_exclusive() {
        let mut action = Action::new(0, ProposalRequest::native(1, bob()).into_payload().unwrap().0, bob(), None);
        assert!(action.is_pending());
        action.mark_executed(&bob());
        assert!(action.is_executed());
        assert!(!action.is_cancelled());
        assert_eq!(action.ensure_pending(), Err(VaultError::AlreadyExecuted(0)));
    }
}
