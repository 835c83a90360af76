// Contract symbols and the wallet-address -> player-symbol mapping

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// Longest symbol the contract runtime accepts
pub const MAX_SYMBOL_LEN: usize = 32;

/// Prefix of every address-derived player symbol
pub const PLAYER_SYMBOL_PREFIX: &str = "p_";

/// Trailing address characters kept in a player symbol. Two addresses that
/// share these characters map to the same player.
pub const ADDRESS_SUFFIX_LEN: usize = 8;

/// Seat sentinel used by the contract for an unfilled player O
pub const WAITING: &str = "waiting";

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A validated contract symbol: 1 to 32 characters of `[A-Za-z0-9_]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        if value.is_empty() {
            return Err(CoreError::Validation("Symbol must not be empty".to_string()));
        }
        if value.len() > MAX_SYMBOL_LEN {
            return Err(CoreError::Validation(format!(
                "Symbol '{}' is longer than {} characters",
                value, MAX_SYMBOL_LEN
            )));
        }
        if let Some(bad) = value.chars().find(|c| !is_symbol_char(*c)) {
            return Err(CoreError::Validation(format!(
                "Symbol '{}' contains invalid character '{}'",
                value, bad
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Symbol::new(value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

/// Turn a free-form player name into a valid symbol: drop invalid
/// characters, keep at most 32, lowercase the rest.
pub fn sanitize_player_name(input: &str) -> Result<Symbol, CoreError> {
    let cleaned: String = input
        .chars()
        .filter(|c| is_symbol_char(*c))
        .take(MAX_SYMBOL_LEN)
        .collect::<String>()
        .to_lowercase();

    if cleaned.is_empty() {
        return Err(CoreError::Validation(
            "Player name must contain at least one alphanumeric character".to_string(),
        ));
    }
    Symbol::new(cleaned)
}

/// Short contract identity of a wallet address
pub fn player_symbol_of(address: &str) -> Result<Symbol, CoreError> {
    let chars: Vec<char> = address.trim().chars().collect();
    let start = chars.len().saturating_sub(ADDRESS_SUFFIX_LEN);
    let suffix: String = chars[start..].iter().collect();
    if suffix.is_empty() {
        return Err(CoreError::AccountResolution("Wallet returned an empty address".to_string()));
    }
    Symbol::new(format!("{}{}", PLAYER_SYMBOL_PREFIX, suffix))
        .map_err(|e| CoreError::AccountResolution(format!("Cannot derive player symbol: {}", e)))
}

/// In-memory symbol -> address table, for display only. Append-only and
/// reset with the process.
#[derive(Debug, Default)]
pub struct SymbolRegistry {
    entries: RwLock<HashMap<Symbol, String>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the symbol for `address` and remember the reverse mapping
    pub fn register(&self, address: &str) -> Result<Symbol, CoreError> {
        let symbol = player_symbol_of(address)?;
        if let Ok(mut entries) = self.entries.write() {
            entries.entry(symbol.clone()).or_insert_with(|| address.trim().to_string());
        }
        Ok(symbol)
    }

    pub fn address_of(&self, symbol: &Symbol) -> Option<String> {
        self.entries.read().ok()?.get(symbol).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Human-readable label for a player symbol
pub fn display_name(symbol: &str) -> String {
    if symbol == WAITING {
        return "Waiting for player...".to_string();
    }
    match symbol.strip_prefix(PLAYER_SYMBOL_PREFIX) {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => symbol.to_string(),
    }
}
