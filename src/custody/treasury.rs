//! In-memory custody ledger
//!
//! Native coin balances plus a [`TokenManager`]; serializable so a vault
//! snapshot can carry its balances to disk.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{CustodyLayer, TransferError};
use crate::address::{Address, TokenRef};
use crate::token::TokenManager;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Treasury {
    native: HashMap<Address, u128>,
    pub tokens: TokenManager,
}

impl Treasury {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit native coin to a holder (deposits from outside the vault)
    pub fn deposit(&mut self, holder: &Address, amount: u128) -> Result<u128, TransferError> {
        let balance = self
            .native_balance(holder)
            .checked_add(amount)
            .ok_or_else(|| TransferError::Overflow(holder.clone()))?;
        self.native.insert(holder.clone(), balance);
        log::debug!("Deposited {} to {} (balance {})", amount, holder, balance);
        Ok(balance)
    }
}

impl CustodyLayer for Treasury {
    fn transfer_native(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TransferError> {
        if amount == 0 {
            return Err(TransferError::Rejected("amount must be greater than 0".to_string()));
        }

        let from_balance = self.native_balance(from);
        if from_balance < amount {
            return Err(TransferError::InsufficientBalance {
                have: from_balance,
                need: amount,
            });
        }

        if from == to {
            return Ok(());
        }

        let to_balance = self
            .native_balance(to)
            .checked_add(amount)
            .ok_or_else(|| TransferError::Overflow(to.clone()))?;

        self.native.insert(from.clone(), from_balance - amount);
        self.native.insert(to.clone(), to_balance);
        Ok(())
    }

    fn transfer_token(
        &mut self,
        token: &TokenRef,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TransferError> {
        self.tokens.transfer(token, from, to, amount)?;
        Ok(())
    }

    fn native_balance(&self, holder: &Address) -> u128 {
        self.native.get(holder).copied().unwrap_or(0)
    }

    fn token_balance(&self, token: &TokenRef, holder: &Address) -> u128 {
        self.tokens.balance_of(token, holder).unwrap_or(0)
    }
}
