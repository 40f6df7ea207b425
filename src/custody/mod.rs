//! Balance movement consumed by the vault
//!
//! The vault never touches balances directly. It asks a [`CustodyLayer`] to
//! move native coin or tokens out of the custody account and only marks an
//! action executed once the layer reports success.

pub mod treasury;

use thiserror::Error;

use crate::address::{Address, TokenRef};
use crate::token::TokenError;

pub use treasury::Treasury;

/// Why a custody transfer was refused
///
/// A refused transfer must leave every balance untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("insufficient custodied balance: have {have}, need {need}")]
    InsufficientBalance { have: u128, need: u128 },
    #[error("unknown token: {0}")]
    UnknownToken(TokenRef),
    #[error("balance overflow crediting {0}")]
    Overflow(Address),
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

impl From<TokenError> for TransferError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InsufficientBalance { have, need } => {
                TransferError::InsufficientBalance { have, need }
            }
            TokenError::TokenNotFound(token) => TransferError::UnknownToken(token),
            TokenError::BalanceOverflow(holder) => TransferError::Overflow(holder),
            other => TransferError::Rejected(other.to_string()),
        }
    }
}

/// The balance-transfer primitive for native coin and fungible tokens
pub trait CustodyLayer {
    /// Move native coin; all-or-nothing
    fn transfer_native(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TransferError>;

    /// Move a fungible token; all-or-nothing
    fn transfer_token(
        &mut self,
        token: &TokenRef,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TransferError>;

    fn native_balance(&self, holder: &Address) -> u128;

    /// Token balance of `holder`, zero for unknown tokens
    fn token_balance(&self, token: &TokenRef, holder: &Address) -> u128;
}
