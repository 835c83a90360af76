// Browser wallet providers
// Both extensions are reached through globals the host page exposes; the
// core only sees them through `WalletSigner`.

use super::utils::js_error_text;
use crate::error::CoreError;
use crate::transaction_signer::{SignerResult, WalletKind, WalletSigner};
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = freighterApi, js_name = isConnected)]
    async fn freighter_is_connected() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = freighterApi, js_name = isAllowed)]
    async fn freighter_is_allowed() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = freighterApi, js_name = setAllowed)]
    async fn freighter_set_allowed() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = freighterApi, js_name = getPublicKey)]
    async fn freighter_get_public_key() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = freighterApi, js_name = signTransaction)]
    async fn freighter_sign_transaction(xdr: &str, opts: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = lobstrSignerExtensionApi, js_name = isConnected)]
    async fn lobstr_is_connected() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = lobstrSignerExtensionApi, js_name = getPublicKey)]
    async fn lobstr_get_public_key() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = lobstrSignerExtensionApi, js_name = signTransaction)]
    async fn lobstr_sign_transaction(xdr: &str) -> Result<JsValue, JsValue>;
}

/// Extension APIs answer either with a bare value or with an object
/// wrapping it; accept both.
fn unwrap_field(value: &JsValue, field: &str) -> JsValue {
    if value.is_object() {
        if let Ok(inner) = js_sys::Reflect::get(value, &JsValue::from_str(field)) {
            if !inner.is_undefined() {
                return inner;
            }
        }
    }
    value.clone()
}

fn as_flag(value: &JsValue, field: &str) -> bool {
    unwrap_field(value, field).as_bool().unwrap_or(false)
}

fn as_text(value: &JsValue, field: &str, what: &str) -> SignerResult<String> {
    if let Ok(error) = js_sys::Reflect::get(value, &JsValue::from_str("error")) {
        if value.is_object() && !error.is_undefined() && !error.is_null() {
            return Err(CoreError::SigningRejected(js_error_text(&error)));
        }
    }
    unwrap_field(value, field)
        .as_string()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CoreError::WalletUnavailable(format!("Wallet returned no {}", what)))
}

/// Freighter extension (`@stellar/freighter-api`)
#[derive(Debug, Default)]
pub struct FreighterWallet;

#[async_trait(?Send)]
impl WalletSigner for FreighterWallet {
    fn name(&self) -> &'static str {
        "Freighter"
    }

    async fn is_available(&self) -> bool {
        let connected = match freighter_is_connected().await {
            Ok(v) => as_flag(&v, "isConnected"),
            Err(e) => {
                debug!("Freighter not reachable: {}", js_error_text(&e));
                false
            }
        };
        if !connected {
            return false;
        }
        let allowed = freighter_is_allowed()
            .await
            .map(|v| as_flag(&v, "isAllowed"))
            .unwrap_or(false);
        if allowed {
            return true;
        }
        match freighter_set_allowed().await {
            Ok(v) => as_flag(&v, "isAllowed"),
            Err(e) => {
                warn!("Freighter permission request failed: {}", js_error_text(&e));
                false
            }
        }
    }

    async fn address(&self) -> SignerResult<String> {
        let value = freighter_get_public_key()
            .await
            .map_err(|e| CoreError::WalletUnavailable(js_error_text(&e)))?;
        as_text(&value, "address", "public key")
    }

    async fn sign_transaction(&self, envelope: &str, network_passphrase: &str) -> SignerResult<String> {
        let opts = js_sys::Object::new();
        js_sys::Reflect::set(
            &opts,
            &JsValue::from_str("networkPassphrase"),
            &JsValue::from_str(network_passphrase),
        )
        .map_err(|e| CoreError::SigningRejected(js_error_text(&e)))?;

        let value = freighter_sign_transaction(envelope, opts.into())
            .await
            .map_err(|e| CoreError::SigningRejected(js_error_text(&e)))?;
        as_text(&value, "signedTxXdr", "signed transaction")
    }
}

/// LOBSTR signer extension (`@lobstrco/signer-extension-api`)
#[derive(Debug, Default)]
pub struct LobstrWallet;

#[async_trait(?Send)]
impl WalletSigner for LobstrWallet {
    fn name(&self) -> &'static str {
        "LOBSTR"
    }

    async fn is_available(&self) -> bool {
        match lobstr_is_connected().await {
            Ok(v) => as_flag(&v, "isConnected"),
            Err(e) => {
                debug!("LOBSTR not reachable: {}", js_error_text(&e));
                false
            }
        }
    }

    async fn address(&self) -> SignerResult<String> {
        let value = lobstr_get_public_key()
            .await
            .map_err(|e| CoreError::WalletUnavailable(js_error_text(&e)))?;
        as_text(&value, "publicKey", "public key")
    }

    /// LOBSTR signs for the network selected inside the extension
    async fn sign_transaction(&self, envelope: &str, _network_passphrase: &str) -> SignerResult<String> {
        let value = lobstr_sign_transaction(envelope)
            .await
            .map_err(|e| CoreError::SigningRejected(js_error_text(&e)))?;
        as_text(&value, "signedTxXdr", "signed transaction")
    }
}

pub fn wallet_for(kind: WalletKind) -> Arc<dyn WalletSigner> {
    match kind {
        WalletKind::Freighter => Arc::new(FreighterWallet),
        WalletKind::Lobstr => Arc::new(LobstrWallet),
    }
}
