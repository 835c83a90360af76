// WASM ledger RPC client using the browser fetch API
use super::utils::js_error_text;
use crate::error::CoreError;
use crate::rpc_client::{
    methods, GetLedgerEntriesResponse, GetTransactionResponse, JsonRpcRequest, JsonRpcResponse, RpcClient, RpcResult,
    SendResponse, SimulateResponse,
};
use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::cell::Cell;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

pub struct WasmRpcClient {
    http_endpoint: String,
    request_id: Cell<u64>,
}

impl WasmRpcClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            http_endpoint: endpoint,
            request_id: Cell::new(0),
        }
    }

    fn next_id(&self) -> u64 {
        let id = self.request_id.get() + 1;
        self.request_id.set(id);
        id
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> RpcResult<JsonRpcResponse<T>> {
        let request = JsonRpcRequest::new(self.next_id(), method, params);
        debug!("WASM RPC: {} #{}", method, request.id);
        self.try_http_call(&request)
            .await
            .map_err(|e| CoreError::Rpc(format!("{} failed: {}", method, js_error_text(&e))))?
            .map_err(CoreError::from)
    }

    async fn try_http_call<T: DeserializeOwned>(
        &self,
        request: &JsonRpcRequest,
    ) -> Result<Result<JsonRpcResponse<T>, serde_json::Error>, JsValue> {
        let body = serde_json::to_string(request)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))?;

        let opts = RequestInit::new();
        opts.set_method("POST");
        opts.set_mode(RequestMode::Cors);
        opts.set_body(&JsValue::from_str(&body));

        let req = Request::new_with_str_and_init(&self.http_endpoint, &opts)?;
        req.headers().set("Content-Type", "application/json")?;

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
        let resp_value = JsFuture::from(window.fetch_with_request(&req)).await?;
        let resp: Response = resp_value.dyn_into()?;
        if !resp.ok() {
            return Err(JsValue::from_str(&format!("HTTP {}", resp.status())));
        }

        let text = JsFuture::from(resp.text()?).await?;
        let text = text.as_string().unwrap_or_default();
        Ok(serde_json::from_str(&text))
    }
}

#[async_trait(?Send)]
impl RpcClient for WasmRpcClient {
    async fn get_ledger_entries(&self, keys: &[String]) -> RpcResult<GetLedgerEntriesResponse> {
        self.call(methods::GET_LEDGER_ENTRIES, json!({ "keys": keys }))
            .await?
            .into_required(methods::GET_LEDGER_ENTRIES)
    }

    async fn simulate_transaction(&self, envelope: &str) -> RpcResult<SimulateResponse> {
        self.call(methods::SIMULATE_TRANSACTION, json!({ "transaction": envelope }))
            .await?
            .into_required(methods::SIMULATE_TRANSACTION)
    }

    async fn send_transaction(&self, envelope: &str) -> RpcResult<SendResponse> {
        self.call(methods::SEND_TRANSACTION, json!({ "transaction": envelope }))
            .await?
            .into_required(methods::SEND_TRANSACTION)
    }

    async fn get_transaction(&self, hash: &str) -> RpcResult<GetTransactionResponse> {
        self.call(methods::GET_TRANSACTION, json!({ "hash": hash }))
            .await?
            .into_required(methods::GET_TRANSACTION)
    }
}
