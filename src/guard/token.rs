//! Ownership tokens.
//!
//! A token is the value written under the lock key. Release compares it
//! store-side, so it only needs to be unique among concurrent holders; it does
//! not need to be secret.

use crate::constants::TOKEN_LENGTH;
use crate::core::TokenError;
use rand::TryRngCore;
use rand::rngs::OsRng;
use std::fmt;

/// Opaque value proving which attempt owns a lock key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Wrap an existing value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The value written to the store.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only a prefix: enough to correlate log lines
        let prefix = self.0.get(..8).unwrap_or(&self.0);
        write!(f, "Token({prefix}..)")
    }
}

/// Produces a fresh token for every acquisition attempt.
pub trait TokenSource: Send + Sync {
    /// Generate a new token. A failure abandons the current attempt.
    fn generate(&self) -> Result<Token, TokenError>;
}

/// Tokens of [`TOKEN_LENGTH`] bytes from the operating system RNG, hex encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRngTokenSource;

impl TokenSource for OsRngTokenSource {
    fn generate(&self) -> Result<Token, TokenError> {
        let mut bytes = [0u8; TOKEN_LENGTH];
        OsRng.try_fill_bytes(&mut bytes).map_err(|e| TokenError(e.to_string()))?;
        Ok(Token(hex::encode(bytes)))
    }
}
