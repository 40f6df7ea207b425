//! Token manager for creating and looking up tokens
//!
//! Handles token deployment and routes transfers to the right token.

use crate::address::{Address, TokenRef};
use crate::crypto::sha256;
use crate::token::token::{Token, TokenError, TokenMetadata, TransferEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Manages all tokens known to a treasury
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TokenManager {
    tokens: HashMap<TokenRef, Token>,
    /// Deployment counter for address generation
    nonce: u64,
}

impl TokenManager {
    /// Create a new token manager
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
            nonce: 0,
        }
    }

    /// Create a new token
    ///
    /// The whole supply is initially allocated to `issuer`.
    pub fn create_token(
        &mut self,
        name: String,
        symbol: String,
        decimals: u8,
        total_supply: u128,
        issuer: &Address,
    ) -> Result<Token, TokenError> {
        let metadata = TokenMetadata::new(name, symbol, decimals, total_supply, issuer.clone())?;

        let address = self.generate_address(issuer, &metadata.symbol);
        self.nonce += 1;

        if self.tokens.contains_key(&address) {
            return Err(TokenError::TokenAlreadyExists(address));
        }

        let token = Token::new(address.clone(), metadata);
        self.tokens.insert(address.clone(), token.clone());

        log::info!(
            "Token created: {} ({}) at {}",
            token.name(),
            token.symbol(),
            address
        );

        Ok(token)
    }

    /// Generate token address from issuer, symbol and deployment nonce
    fn generate_address(&self, issuer: &Address, symbol: &str) -> TokenRef {
        let input = format!("{}:{}:{}", issuer, symbol, self.nonce);
        let hash = sha256(input.as_bytes());
        TokenRef::new(format!("0x{}", &hex::encode(hash)[..40]))
    }

    /// Get a token by address
    pub fn get(&self, address: &TokenRef) -> Option<&Token> {
        self.tokens.get(address)
    }

    /// Get token count
    pub fn count(&self) -> usize {
        self.tokens.len()
    }

    /// Transfer tokens
    pub fn transfer(
        &mut self,
        token_address: &TokenRef,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<TransferEvent, TokenError> {
        let token = self
            .tokens
            .get_mut(token_address)
            .ok_or_else(|| TokenError::TokenNotFound(token_address.clone()))?;

        token.transfer(from, to, amount)
    }

    /// Get balance for a holder of a specific token
    pub fn balance_of(&self, token_address: &TokenRef, holder: &Address) -> Result<u128, TokenError> {
        let token = self
            .tokens
            .get(token_address)
            .ok_or_else(|| TokenError::TokenNotFound(token_address.clone()))?;

        Ok(token.balance_of(holder))
    }

    /// Get all tokens held by an address
    pub fn tokens_for_holder(&self, holder: &Address) -> Vec<(&Token, u128)> {
        self.tokens
            .values()
            .filter_map(|token| {
                let balance = token.balance_of(holder);
                if balance > 0 {
                    Some((token, balance))
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::new("alice")
    }

    fn bob() -> Address {
        Address::new("bob")
    }

    fn create(manager: &mut TokenManager, symbol: &str, supply: u128) -> Token {
        manager
            .create_token(format!("{symbol} Token"), symbol.to_string(), 6, supply, &alice())
            .unwrap()
    }

    #[test]
    fn test_manager_creation() {
        let manager = TokenManager::new();
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn test_token_creation() {
        let mut manager = TokenManager::new();
        let token = create(&mut manager, "TST", 1_000_000);

        assert!(token.address.as_str().starts_with("0x"));
        assert_eq!(token.address.as_str().len(), 42);
        assert_eq!(token.balance_of(&alice()), 1_000_000);
        assert_eq!(manager.count(), 1);
    }

    #[test]
    fn test_same_symbol_gets_distinct_address() {
        let mut manager = TokenManager::new();
        let first = create(&mut manager, "TST", 10);
        let second = create(&mut manager, "TST", 10);
        assert_ne!(first.address, second.address);
    }

    #[test]
    fn test_transfer_via_manager() {
        let mut manager = TokenManager::new();
        let address = create(&mut manager, "TST", 1_000_000).address;

        manager.transfer(&address, &alice(), &bob(), 1000).unwrap();

        assert_eq!(manager.balance_of(&address, &alice()).unwrap(), 999_000);
        assert_eq!(manager.balance_of(&address, &bob()).unwrap(), 1000);
    }

    #[test]
    fn test_tokens_for_holder() {
        let mut manager = TokenManager::new();
        let token1 = create(&mut manager, "TK1", 1000);
        create(&mut manager, "TK2", 2000);

        assert_eq!(manager.tokens_for_holder(&alice()).len(), 2);
        assert!(manager.tokens_for_holder(&bob()).is_empty());

        manager.transfer(&token1.address, &alice(), &bob(), 500).unwrap();

        let bob_tokens = manager.tokens_for_holder(&bob());
        assert_eq!(bob_tokens.len(), 1);
        assert_eq!(bob_tokens[0].1, 500);
    }

    #[test]
    fn test_transfer_nonexistent_token() {
        let mut manager = TokenManager::new();

        let result = manager.transfer(&TokenRef::new("0xNONEXISTENT"), &alice(), &bob(), 100);
        assert!(matches!(result, Err(TokenError::TokenNotFound(_))));
    }
}
