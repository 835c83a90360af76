// Native ledger RPC client: JSON-RPC 2.0 over reqwest

use crate::error::CoreError;
use crate::rpc_client::{
    methods, GetLedgerEntriesResponse, GetTransactionResponse, JsonRpcRequest, JsonRpcResponse, RpcClient, RpcResult,
    SendResponse, SimulateResponse,
};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::cell::Cell;

pub struct NativeRpcClient {
    client: Client,
    endpoint: String,
    request_id: Cell<u64>,
}

impl NativeRpcClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            request_id: Cell::new(0),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn next_id(&self) -> u64 {
        let id = self.request_id.get() + 1;
        self.request_id.set(id);
        id
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> RpcResult<JsonRpcResponse<T>> {
        let request = JsonRpcRequest::new(self.next_id(), method, params);
        debug!("Native RPC: {} #{}", method, request.id);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::Rpc(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CoreError::Rpc(format!("Failed to read {} response body: {}", method, e)))?;
        if !status.is_success() {
            return Err(CoreError::Rpc(format!("{} returned HTTP {}: {}", method, status, text)));
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait(?Send)]
impl RpcClient for NativeRpcClient {
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
