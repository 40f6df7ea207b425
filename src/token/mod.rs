//! Fungible tokens held in custody
//!
//! Provides the token balances a vault can move through a token-transfer
//! action:
//! - Balances per holder
//! - Transfers with bounded history
//! - Deterministic token addresses
//!
//! # Example
//!
//! ```ignore
//! use threshold_vault::token::TokenManager;
//!
//! let mut manager = TokenManager::new();
//! let token = manager.create_token(
//!     "Vault Dollar".to_string(),
//!     "VUSD".to_string(),
//!     6,
//!     1_000_000,
//!     &vault_address,
//! )?;
//!
//! manager.transfer(&token.address, &vault_address, &recipient, 1000)?;
//! ```

pub mod manager;
pub mod token;

pub use manager::TokenManager;
pub use token::{Token, TokenError, TokenMetadata, TransferEvent};
