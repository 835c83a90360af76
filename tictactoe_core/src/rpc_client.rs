// Ledger RPC abstraction - allows both native and WASM implementations

use crate::codec::ScVal;
use crate::error::CoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use stellar_xdr::curr::{
    AccountId, LedgerEntryData, LedgerKey, LedgerKeyAccount, Limits, OperationResult, OperationResultTr, ReadXdr,
    SorobanAuthorizationEntry, SorobanTransactionData, TransactionMeta, TransactionResult, TransactionResultResult,
    WriteXdr,
};

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, CoreError>;

/// The account fields a transaction source needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub account_id: AccountId,
    /// Last consumed sequence number; the next transaction uses this plus one
    pub sequence: i64,
}

impl AccountInfo {
    /// Ledger key under which `address`'s account entry is stored, as XDR base64
    pub fn ledger_key(address: &str) -> RpcResult<String> {
        let account_id = AccountId::from_str(address.trim())
            .map_err(|e| CoreError::Validation(format!("Invalid account address '{}': {}", address, e)))?;
        let key = LedgerKey::Account(LedgerKeyAccount { account_id });
        Ok(key.to_xdr_base64(Limits::none())?)
    }

    pub fn from_entry(entry: &LedgerEntryResult) -> RpcResult<Self> {
        match LedgerEntryData::from_xdr_base64(&entry.xdr, Limits::none())? {
            LedgerEntryData::Account(account) => Ok(Self {
                account_id: account.account_id,
                sequence: account.seq_num.0,
            }),
            other => Err(CoreError::Decode(format!("expected an account entry, got {}", other.name()))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryResult {
    pub key: String,
    /// `LedgerEntryData` XDR
    pub xdr: String,
    #[serde(default)]
    pub last_modified_ledger_seq: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLedgerEntriesResponse {
    #[serde(default)]
    pub entries: Option<Vec<LedgerEntryResult>>,
    #[serde(default)]
    pub latest_ledger: u32,
}

/// Servers have sent the resource fee both as a JSON number and as a string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceFee {
    Number(u64),
    Text(String),
}

impl ResourceFee {
    pub fn value(&self) -> RpcResult<u64> {
        match self {
            ResourceFee::Number(n) => Ok(*n),
            ResourceFee::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| CoreError::Decode(format!("Invalid minResourceFee '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateHostFunctionResult {
    /// `SorobanAuthorizationEntry` XDR for each required authorization
    #[serde(default)]
    pub auth: Vec<String>,
    /// `ScVal` XDR of the return value
    pub xdr: String,
}

/// Dry-run outcome. `error` carries the contract's rejection detail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    #[serde(default)]
    pub error: Option<String>,
    /// `SorobanTransactionData` XDR: footprint and resource limits
    #[serde(default)]
    pub transaction_data: Option<String>,
    #[serde(default)]
    pub min_resource_fee: Option<ResourceFee>,
    #[serde(default)]
    pub results: Vec<SimulateHostFunctionResult>,
    #[serde(default)]
    pub latest_ledger: u32,
}

impl SimulateResponse {
    /// Return value of the simulated call; `Void` when the server sent none
    pub fn retval(&self) -> RpcResult<ScVal> {
        match self.results.first() {
            Some(result) if !result.xdr.is_empty() => Ok(ScVal::from_xdr_base64(&result.xdr, Limits::none())?),
            _ => Ok(ScVal::Void),
        }
    }

    pub fn auth_entries(&self) -> RpcResult<Vec<SorobanAuthorizationEntry>> {
        let Some(result) = self.results.first() else {
            return Ok(Vec::new());
        };
        result
            .auth
            .iter()
            .map(|entry| SorobanAuthorizationEntry::from_xdr_base64(entry, Limits::none()).map_err(CoreError::from))
            .collect()
    }

    pub fn soroban_data(&self) -> RpcResult<Option<SorobanTransactionData>> {
        match self.transaction_data.as_deref() {
            Some(data) if !data.is_empty() => {
                Ok(Some(SorobanTransactionData::from_xdr_base64(data, Limits::none())?))
            }
            _ => Ok(None),
        }
    }

    pub fn resource_fee(&self) -> RpcResult<u64> {
        self.min_resource_fee.as_ref().map(ResourceFee::value).unwrap_or(Ok(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendStatus {
    Pending,
    Duplicate,
    TryAgainLater,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub status: SendStatus,
    pub hash: String,
    /// `TransactionResult` XDR, present when status is `ERROR`
    #[serde(default)]
    pub error_result_xdr: Option<String>,
}

impl SendResponse {
    /// Result code of a rejected submission, e.g. `txBadSeq`
    pub fn error_detail(&self) -> Option<String> {
        result_detail(self.error_result_xdr.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Failed,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTransactionResponse {
    pub status: TransactionStatus,
    /// `TransactionResult` XDR
    #[serde(default)]
    pub result_xdr: Option<String>,
    /// `TransactionMeta` XDR; carries the contract's return value
    #[serde(default)]
    pub result_meta_xdr: Option<String>,
}

impl GetTransactionResponse {
    /// Contract return value of a successful transaction
    pub fn return_value(&self) -> RpcResult<ScVal> {
        let Some(meta) = self.result_meta_xdr.as_deref() else {
            return Ok(ScVal::Void);
        };
        match TransactionMeta::from_xdr_base64(meta, Limits::none())? {
            TransactionMeta::V3(v3) => Ok(v3.soroban_meta.map(|m| m.return_value).unwrap_or(ScVal::Void)),
            _ => Ok(ScVal::Void),
        }
    }

    pub fn failure_detail(&self) -> Option<String> {
        result_detail(self.result_xdr.as_deref())
    }
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn operation_code(result: &OperationResult) -> String {
    match result {
        OperationResult::OpInner(OperationResultTr::InvokeHostFunction(inner)) => {
            format!("invokeHostFunction{}", inner.name())
        }
        OperationResult::OpInner(inner) => lower_first(inner.name()),
        other => lower_first(other.name()),
    }
}

/// Ledger result code in the network's own spelling
pub fn result_code(result: &TransactionResult) -> String {
    match &result.result {
        TransactionResultResult::TxFailed(ops) => match ops.first() {
            Some(op) => format!("txFailed: {}", operation_code(op)),
            None => "txFailed".to_string(),
        },
        other => lower_first(other.name()),
    }
}

fn result_detail(xdr: Option<&str>) -> Option<String> {
    let xdr = xdr?;
    match TransactionResult::from_xdr_base64(xdr, Limits::none()) {
        Ok(result) => Some(result_code(&result)),
        Err(e) => Some(format!("unreadable result ({})", e)),
    }
}

/// JSON-RPC method names served by the ledger RPC
pub mod methods {
    pub const GET_LEDGER_ENTRIES: &str = "getLedgerEntries";
    pub const SIMULATE_TRANSACTION: &str = "simulateTransaction";
    pub const SEND_TRANSACTION: &str = "sendTransaction";
    pub const GET_TRANSACTION: &str = "getTransaction";
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: serde_json::Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: serde_json::Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, method: method.to_string(), params }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse<T> {
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl<T> JsonRpcResponse<T> {
    /// `Ok(None)` when the server answered with a null result
    pub fn into_result(self) -> RpcResult<Option<T>> {
        if let Some(error) = self.error {
            return Err(CoreError::Rpc(format!("RPC error {}: {}", error.code, error.message)));
        }
        Ok(self.result)
    }

    pub fn into_required(self, method: &str) -> RpcResult<T> {
        self.into_result()?
            .ok_or_else(|| CoreError::Rpc(format!("No result in {} response", method)))
    }
}

/// Abstract ledger RPC client trait that can be implemented for both native and WASM
#[async_trait(?Send)]
pub trait RpcClient {
    /// Fetch ledger entries by XDR key
    async fn get_ledger_entries(&self, keys: &[String]) -> RpcResult<GetLedgerEntriesResponse>;

    /// Dry-run a transaction envelope (XDR base64)
    async fn simulate_transaction(&self, envelope: &str) -> RpcResult<SimulateResponse>;

    /// Submit a signed transaction envelope (XDR base64)
    async fn send_transaction(&self, envelope: &str) -> RpcResult<SendResponse>;

    /// Query the status of a submitted transaction
    async fn get_transaction(&self, hash: &str) -> RpcResult<GetTransactionResponse>;

    /// Look up the account that will source a transaction. `Ok(None)` when
    /// the ledger has no entry for it.
    async fn get_account(&self, address: &str) -> RpcResult<Option<AccountInfo>> {
        let key = AccountInfo::ledger_key(address)?;
        let response = self.get_ledger_entries(&[key]).await?;
        match response.entries.unwrap_or_default().first() {
            Some(entry) => AccountInfo::from_entry(entry).map(Some),
            None => Ok(None),
        }
    }
}
