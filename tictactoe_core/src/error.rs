use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[cfg(feature = "native")]
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[cfg(feature = "native")]
    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(String),

    #[error("Wallet unavailable: {0}")]
    WalletUnavailable(String),

    #[error("Account resolution failed: {0}")]
    AccountResolution(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Signing rejected: {0}")]
    SigningRejected(String),

    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Transaction {hash} did not finalize before the polling limit")]
    TransactionTimeout { hash: String },

    #[error("Stopped watching transaction {hash}")]
    PollingAbandoned { hash: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("XDR error: {0}")]
    Xdr(String),

    #[error("Action already in progress: {0}")]
    ActionInFlight(String),

    #[error("RPC error: {0}")]
    Rpc(String),
}

impl CoreError {
    /// True when the transaction may still land on-ledger after the client
    /// stopped watching it. Callers must re-fetch rather than assume failure.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            CoreError::TransactionTimeout { .. } | CoreError::PollingAbandoned { .. }
        )
    }

    /// Text shown to the player.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::TransactionTimeout { .. } | CoreError::PollingAbandoned { .. } => {
                "Unknown outcome: the transaction was submitted but not yet confirmed. Re-check the game state.".to_string()
            }
            CoreError::Simulation(detail) => detail.clone(),
            CoreError::Validation(detail) => detail.clone(),
            CoreError::SigningRejected(_) => "Transaction was not signed by the wallet".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(feature = "native")]
impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Io(err.to_string())
    }
}

#[cfg(feature = "native")]
impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

impl From<stellar_xdr::curr::Error> for CoreError {
    fn from(err: stellar_xdr::curr::Error) -> Self {
        CoreError::Xdr(err.to_string())
    }
}

impl From<toml::ser::Error> for CoreError {
    fn from(err: toml::ser::Error) -> Self {
        CoreError::TomlSerialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_ambiguous_not_failure() {
        let timeout = CoreError::TransactionTimeout { hash: "abc".to_string() };
        assert!(timeout.is_ambiguous());
        assert!(timeout.user_message().contains("Unknown outcome"));

        let failed = CoreError::TransactionFailed("abc".to_string());
        assert!(!failed.is_ambiguous());
    }

    #[test]
    fn test_simulation_detail_kept_verbatim() {
        let err = CoreError::Simulation("Position already taken".to_string());
        assert_eq!(err.user_message(), "Position already taken");
    }
}
