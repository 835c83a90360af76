// Wallet capability abstraction
// The core only talks to this trait; browser extensions implement it in wasm/

use crate::error::CoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type SignerResult<T> = Result<T, CoreError>;

/// A signing identity supplied by a wallet extension
#[async_trait(?Send)]
pub trait WalletSigner {
    /// Provider name for logs and UI
    fn name(&self) -> &'static str;

    /// Whether the extension is installed and has granted access
    async fn is_available(&self) -> bool;

    /// Public ledger address of the connected account
    async fn address(&self) -> SignerResult<String>;

    /// Sign an envelope blob for `network_passphrase` and return the signed blob.
    /// Fails when the user declines or the provider errors.
    async fn sign_transaction(&self, envelope: &str, network_passphrase: &str) -> SignerResult<String>;
}

#[async_trait(?Send)]
impl<T: WalletSigner + ?Sized> WalletSigner for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn is_available(&self) -> bool {
        (**self).is_available().await
    }

    async fn address(&self) -> SignerResult<String> {
        (**self).address().await
    }

    async fn sign_transaction(&self, envelope: &str, network_passphrase: &str) -> SignerResult<String> {
        (**self).sign_transaction(envelope, network_passphrase).await
    }
}

/// Wallet providers the browser build can select at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    Freighter,
    Lobstr,
}

impl std::str::FromStr for WalletKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "freighter" => Ok(WalletKind::Freighter),
            "lobstr" => Ok(WalletKind::Lobstr),
            other => Err(CoreError::Validation(format!("Unknown wallet provider '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_kind_from_str() {
        assert_eq!("Freighter".parse::<WalletKind>().unwrap(), WalletKind::Freighter);
        assert_eq!("lobstr".parse::<WalletKind>().unwrap(), WalletKind::Lobstr);
        assert!("phantom".parse::<WalletKind>().is_err());
    }
}
