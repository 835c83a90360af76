use crate::error::CoreError;
use crate::refresh::RefreshSchedule;
use crate::transaction_service::LifecycleConfig;
use crate::tx_builder::FeeBudget;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const TESTNET_RPC_URL: &str = "https://soroban-testnet.stellar.org";
pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";
pub const TESTNET_CONTRACT_ID: &str = "CAFAPH7VQYLJZ3B4SGAJ47AD3ZOSM63CTQOUXT5XDQH3HWAKEONUO3GU";

pub const STANDALONE_RPC_URL: &str = "http://localhost:8000/soroban/rpc";
pub const STANDALONE_PASSPHRASE: &str = "Standalone Network ; February 2017";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_network_passphrase")]
    pub network_passphrase: String,
    #[serde(default = "default_contract_id")]
    pub contract_id: String,
    #[serde(default = "default_query_fee")]
    pub query_fee: u32,
    #[serde(default = "default_invoke_fee")]
    pub invoke_fee: u32,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    #[serde(default = "default_invoke_timeout_secs")]
    pub invoke_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    #[serde(default = "default_lobby_refresh_secs")]
    pub lobby_refresh_secs: u64,
    #[serde(default = "default_game_refresh_secs")]
    pub game_refresh_secs: u64,
}

impl Settings {
    pub fn testnet() -> Self {
        Self::default()
    }

    pub fn standalone(contract_id: &str) -> Self {
        Self {
            rpc_url: STANDALONE_RPC_URL.to_string(),
            network_passphrase: STANDALONE_PASSPHRASE.to_string(),
            contract_id: contract_id.to_string(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    #[cfg(feature = "native")]
    pub fn from_file(path: &str) -> Result<Self, CoreError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path));
        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    #[cfg(feature = "native")]
    pub fn save_to_file(&self, path: &str) -> Result<(), CoreError> {
        let toml_string = toml::to_string(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let url = url::Url::parse(&self.rpc_url)
            .map_err(|e| CoreError::Validation(format!("Invalid rpc_url '{}': {}", self.rpc_url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(CoreError::Validation(format!(
                "rpc_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.network_passphrase.trim().is_empty() {
            return Err(CoreError::Validation("network_passphrase must not be empty".to_string()));
        }
        if self.contract_id.trim().is_empty() {
            return Err(CoreError::Validation("contract_id must not be empty".to_string()));
        }
        if self.max_poll_attempts == 0 {
            return Err(CoreError::Validation("max_poll_attempts must be at least 1".to_string()));
        }
        if self.lobby_refresh_secs == 0 || self.game_refresh_secs == 0 {
            return Err(CoreError::Validation("refresh intervals must be at least 1 second".to_string()));
        }
        Ok(())
    }

    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            network_passphrase: self.network_passphrase.clone(),
            contract_id: self.contract_id.clone(),
            query_budget: FeeBudget { fee: self.query_fee, timeout_secs: self.query_timeout_secs },
            invoke_budget: FeeBudget { fee: self.invoke_fee, timeout_secs: self.invoke_timeout_secs },
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_poll_attempts: self.max_poll_attempts,
        }
    }

    pub fn refresh_schedule(&self) -> RefreshSchedule {
        RefreshSchedule {
            lobby: Duration::from_secs(self.lobby_refresh_secs),
            game: Duration::from_secs(self.game_refresh_secs),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            network_passphrase: default_network_passphrase(),
            contract_id: default_contract_id(),
            query_fee: default_query_fee(),
            invoke_fee: default_invoke_fee(),
            query_timeout_secs: default_query_timeout_secs(),
            invoke_timeout_secs: default_invoke_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            lobby_refresh_secs: default_lobby_refresh_secs(),
            game_refresh_secs: default_game_refresh_secs(),
        }
    }
}

fn default_rpc_url() -> String {
    TESTNET_RPC_URL.to_string()
}

fn default_network_passphrase() -> String {
    TESTNET_PASSPHRASE.to_string()
}

fn default_contract_id() -> String {
    TESTNET_CONTRACT_ID.to_string()
}

fn default_query_fee() -> u32 {
    FeeBudget::QUERY.fee
}

fn default_invoke_fee() -> u32 {
    FeeBudget::INVOKE.fee
}

fn default_query_timeout_secs() -> u64 {
    FeeBudget::QUERY.timeout_secs
}

fn default_invoke_timeout_secs() -> u64 {
    FeeBudget::INVOKE.timeout_secs
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_poll_attempts() -> u32 {
    10
}

fn default_lobby_refresh_secs() -> u64 {
    10
}

fn default_game_refresh_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_behavior() {
        let s = Settings::default();
        assert_eq!(s.query_fee, 100);
        assert_eq!(s.invoke_fee, 1_000_000);
        assert_eq!(s.poll_interval_ms, 1000);
        assert_eq!(s.max_poll_attempts, 10);
        assert_eq!(s.refresh_schedule().lobby, Duration::from_secs(10));
        assert_eq!(s.refresh_schedule().game, Duration::from_secs(5));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let s = Settings::from_json(r#"{"contract_id": "CXYZ", "max_poll_attempts": 3}"#).unwrap();
        assert_eq!(s.contract_id, "CXYZ");
        assert_eq!(s.max_poll_attempts, 3);
        assert_eq!(s.rpc_url, TESTNET_RPC_URL);
        assert_eq!(s.lifecycle().max_poll_attempts, 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Settings::from_json(r#"{"rpc_url": "ftp://example.com"}"#).is_err());
        assert!(Settings::from_json(r#"{"rpc_url": "not a url"}"#).is_err());
        assert!(Settings::from_json(r#"{"contract_id": " "}"#).is_err());
        assert!(Settings::from_json(r#"{"max_poll_attempts": 0}"#).is_err());
        assert!(Settings::from_json(r#"{"game_refresh_secs": 0}"#).is_err());
    }

    #[test]
    fn test_standalone_preset() {
        let s = Settings::standalone("CLOCAL");
        assert_eq!(s.network_passphrase, STANDALONE_PASSPHRASE);
        assert!(s.validate().is_ok());
    }

    #[cfg(feature = "native")]
    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        let path_str = path.to_str().unwrap();

        let mut original = Settings::standalone("CLOCAL");
        original.poll_interval_ms = 250;
        original.save_to_file(path_str).unwrap();

        let loaded = Settings::from_file(path_str).unwrap();
        assert_eq!(loaded, original);
    }
}
