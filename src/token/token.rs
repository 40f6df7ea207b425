//! Fungible token ledger
//!
//! A token keeps one balance per holder. The vault only ever moves tokens out
//! of its own balance, so there is no allowance machinery here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::address::{Address, TokenRef};

/// Number of transfer events retained per token
pub const MAX_TRANSFER_HISTORY: usize = 100;

/// Token-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u128, need: u128 },
    #[error("Invalid amount: amount must be greater than 0")]
    InvalidAmount,
    #[error("Token not found: {0}")]
    TokenNotFound(TokenRef),
    #[error("Token already exists: {0}")]
    TokenAlreadyExists(TokenRef),
    #[error("Invalid symbol: must be 1-10 characters")]
    InvalidSymbol,
    #[error("Invalid name: must be 1-50 characters")]
    InvalidName,
    #[error("Invalid decimals: must be 0-18")]
    InvalidDecimals,
    #[error("Invalid supply: must be greater than 0")]
    InvalidSupply,
    #[error("Balance overflow for holder {0}")]
    BalanceOverflow(Address),
}

/// Token metadata (immutable after creation)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Total supply (fixed at creation)
    pub total_supply: u128,
    /// Holder that received the initial supply
    pub issuer: Address,
    pub created_at: DateTime<Utc>,
}

impl TokenMetadata {
    /// Create new token metadata with validation
    pub fn new(
        name: String,
        symbol: String,
        decimals: u8,
        total_supply: u128,
        issuer: Address,
    ) -> Result<Self, TokenError> {
        if name.is_empty() || name.len() > 50 {
            return Err(TokenError::InvalidName);
        }

        if symbol.is_empty() || symbol.len() > 10 {
            return Err(TokenError::InvalidSymbol);
        }

        if decimals > 18 {
            return Err(TokenError::InvalidDecimals);
        }

        if total_supply == 0 {
            return Err(TokenError::InvalidSupply);
        }

        Ok(Self {
            name,
            symbol,
            decimals,
            total_supply,
            issuer,
            created_at: Utc::now(),
        })
    }
}

/// Transfer event (recorded when tokens move)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferEvent {
    pub token: TokenRef,
    pub from: Address,
    pub to: Address,
    pub amount: u128,
    pub timestamp: DateTime<Utc>,
}

/// A fungible token with per-holder balances
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    pub address: TokenRef,
    pub metadata: TokenMetadata,
    balances: HashMap<Address, u128>,
    /// Most recent transfers, oldest first
    pub transfer_history: Vec<TransferEvent>,
}

impl Token {
    /// Create a new token with all supply allocated to the issuer
    pub fn new(address: TokenRef, metadata: TokenMetadata) -> Self {
        let mut balances = HashMap::new();
        balances.insert(metadata.issuer.clone(), metadata.total_supply);

        Self {
            address,
            metadata,
            balances,
            transfer_history: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn total_supply(&self) -> u128 {
        self.metadata.total_supply
    }

    /// Get balance of an address
    pub fn balance_of(&self, holder: &Address) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    /// Get holder count
    pub fn holder_count(&self) -> usize {
        self.balances.values().filter(|&&b| b > 0).count()
    }

    /// Transfer tokens from one holder to another
    ///
    /// Either both balances change or neither does.
    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<TransferEvent, TokenError> {
        if amount == 0 {
            return Err(TokenError::InvalidAmount);
        }

        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance {
                have: from_balance,
                need: amount,
            });
        }

        if from != to {
            let to_balance = self
                .balance_of(to)
                .checked_add(amount)
                .ok_or_else(|| TokenError::BalanceOverflow(to.clone()))?;
            self.balances.insert(from.clone(), from_balance - amount);
            self.balances.insert(to.clone(), to_balance);
        }

        let event = TransferEvent {
            token: self.address.clone(),
            from: from.clone(),
            to: to.clone(),
            amount,
            timestamp: Utc::now(),
        };

        self.transfer_history.push(event.clone());
        if self.transfer_history.len() > MAX_TRANSFER_HISTORY {
            self.transfer_history.remove(0);
        }

        Ok(event)
    }
}
