//! Principal and asset identifiers
//!
//! Signers, recipients and the vault itself are all identified by an
//! [`Address`]. Fungible tokens are identified by a [`TokenRef`], the address
//! of the token contract that holds their balances.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing identifiers from text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseIdError {
    #[error("identifier must not be empty")]
    Empty,
    #[error("identifier contains whitespace: {0:?}")]
    Whitespace(String),
}

fn validate(raw: &str) -> Result<(), ParseIdError> {
    if raw.is_empty() {
        return Err(ParseIdError::Empty);
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(ParseIdError::Whitespace(raw.to_string()));
    }
    Ok(())
}

/// A principal: signer, recipient or custody account.
///
/// Key-derived addresses are Base58Check encoded (see
/// [`crate::crypto::public_key_to_address`]), but the engine treats addresses
/// as opaque strings so hosts can plug in other identity schemes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate(s)?;
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Reference to a fungible token contract
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenRef(String);

impl TokenRef {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for TokenRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TokenRef {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate(s)?;
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for TokenRef {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
