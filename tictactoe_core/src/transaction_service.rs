// Contract call lifecycle: build -> simulate -> sign -> submit -> poll -> decode
// Platform-agnostic; the RPC, wallet and timer are injected.

use crate::codec::{ContractCall, FromScVal, ScVal};
use crate::error::CoreError;
use crate::rpc_client::{RpcClient, SendStatus, SimulateResponse, TransactionStatus};
use crate::settings::{TESTNET_CONTRACT_ID, TESTNET_PASSPHRASE};
use crate::timer::{CancelToken, Sleeper};
use crate::transaction_signer::WalletSigner;
use crate::tx_builder::{assemble, from_blob, to_blob, verify_signed, FeeBudget, TransactionBuilder};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::fmt;
use std::time::Duration;
use stellar_xdr::curr::Transaction;

/// Result type for lifecycle operations
pub type TxServiceResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub network_passphrase: String,
    pub contract_id: String,
    pub query_budget: FeeBudget,
    pub invoke_budget: FeeBudget,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            network_passphrase: TESTNET_PASSPHRASE.to_string(),
            contract_id: TESTNET_CONTRACT_ID.to_string(),
            query_budget: FeeBudget::QUERY,
            invoke_budget: FeeBudget::INVOKE,
            poll_interval: Duration::from_secs(1),
            max_poll_attempts: 10,
        }
    }
}

impl LifecycleConfig {
    pub fn budget(&self, kind: CallKind) -> FeeBudget {
        match kind {
            CallKind::Query => self.query_budget,
            CallKind::Invoke => self.invoke_budget,
        }
    }
}

/// Read-only calls finish at simulation; invocations go through signing and polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Query,
    Invoke,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallKind::Query => write!(f, "query"),
            CallKind::Invoke => write!(f, "invoke"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Method name or arguments could not form a call envelope
    InvalidCall,
    AccountResolutionFailed,
    SimulationError,
    SigningRejected,
    SubmissionRejected,
    Timeout,
    DecodeError,
    /// Caller stopped watching; the submitted transaction may still land
    Abandoned,
}

impl AbortReason {
    pub fn as_str(self) -> &'static str {
        match self {
            AbortReason::InvalidCall => "invalid-call",
            AbortReason::AccountResolutionFailed => "account-resolution-failed",
            AbortReason::SimulationError => "simulation-error",
            AbortReason::SigningRejected => "signing-rejected",
            AbortReason::SubmissionRejected => "submission-rejected",
            AbortReason::Timeout => "timeout",
            AbortReason::DecodeError => "decode-error",
            AbortReason::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Building,
    Simulated,
    Signed,
    Submitted,
    Polling { attempt: u32 },
    Finalized(Outcome),
    Aborted(AbortReason),
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Finalized(_) | Phase::Aborted(_))
    }
}

/// Everything needed to start one contract call
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub source: String,
    pub method: String,
    pub args: Vec<ScVal>,
    pub kind: CallKind,
    pub cancel: Option<CancelToken>,
}

impl CallRequest {
    pub fn query(source: &str, method: &str, args: Vec<ScVal>) -> Self {
        Self::new(source, method, args, CallKind::Query)
    }

    pub fn invoke(source: &str, method: &str, args: Vec<ScVal>) -> Self {
        Self::new(source, method, args, CallKind::Invoke)
    }

    fn new(source: &str, method: &str, args: Vec<ScVal>, kind: CallKind) -> Self {
        Self {
            source: source.to_string(),
            method: method.to_string(),
            args,
            kind,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// One in-flight call. Owned by the call site and dropped when it resolves.
#[derive(Debug)]
pub struct PendingCall {
    pub method: String,
    pub args: Vec<ScVal>,
    pub kind: CallKind,
    source: String,
    cancel: Option<CancelToken>,
    phase: Phase,
    history: Vec<Phase>,
    poll_attempts: u32,
    last_error: Option<String>,
    hash: Option<String>,
}

impl PendingCall {
    pub fn new(request: CallRequest) -> Self {
        Self {
            method: request.method,
            args: request.args,
            kind: request.kind,
            source: request.source,
            cancel: request.cancel,
            phase: Phase::Building,
            history: vec![Phase::Building],
            poll_attempts: 0,
            last_error: None,
            hash: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase visited, in order, starting with `Building`
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn poll_attempts(&self) -> u32 {
        self.poll_attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn visited(&self, phase: Phase) -> bool {
        self.history.contains(&phase)
    }

    fn advance(&mut self, next: Phase) {
        debug!("{} {}: {:?} -> {:?}", self.kind, self.method, self.phase, next);
        self.phase = next;
        self.history.push(next);
    }

    fn abort(&mut self, reason: AbortReason, error: CoreError) -> CoreError {
        warn!("{} {} aborted ({}): {}", self.kind, self.method, reason.as_str(), error);
        self.last_error = Some(error.to_string());
        self.advance(Phase::Aborted(reason));
        error
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().map(CancelToken::is_cancelled).unwrap_or(false)
    }
}

/// The seam between the typed game façade and the lifecycle engine
#[async_trait(?Send)]
pub trait ContractInvoker {
    async fn invoke<T: FromScVal>(&self, request: CallRequest) -> TxServiceResult<T>;
}

pub struct TransactionService<R, W, S> {
    rpc: R,
    wallet: W,
    sleeper: S,
    config: LifecycleConfig,
}

impl<R: RpcClient, W: WalletSigner, S: Sleeper> TransactionService<R, W, S> {
    pub fn new(rpc: R, wallet: W, sleeper: S, config: LifecycleConfig) -> Self {
        Self { rpc, wallet, sleeper, config }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    /// Drive `call` to a terminal phase and decode its result as `T`
    pub async fn run<T: FromScVal>(&self, call: &mut PendingCall) -> TxServiceResult<T> {
        info!("Starting {} {} from {}", call.kind, call.method, call.source);

        let operation = match ContractCall::new(&self.config.contract_id, &call.method, call.args.clone()) {
            Ok(op) => op,
            Err(e) => return Err(call.abort(AbortReason::InvalidCall, e)),
        };

        let account = match self.rpc.get_account(&call.source).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                let err = CoreError::AccountResolution(format!("Account {} not found on ledger", call.source));
                return Err(call.abort(AbortReason::AccountResolutionFailed, err));
            }
            Err(e) => {
                let err = CoreError::AccountResolution(e.to_string());
                return Err(call.abort(AbortReason::AccountResolutionFailed, err));
            }
        };

        let budget = self.config.budget(call.kind);
        let tx = match TransactionBuilder::new(&account, budget).build(operation) {
            Ok(tx) => tx,
            Err(e) => return Err(call.abort(AbortReason::InvalidCall, e)),
        };
        let blob = match to_blob(&tx.clone().into()) {
            Ok(blob) => blob,
            Err(e) => return Err(call.abort(AbortReason::InvalidCall, e)),
        };

        let simulation = match self.rpc.simulate_transaction(&blob).await {
            Ok(sim) => sim,
            Err(e) => return Err(call.abort(AbortReason::SimulationError, e)),
        };
        if let Some(detail) = simulation.error.clone() {
            return Err(call.abort(AbortReason::SimulationError, CoreError::Simulation(detail)));
        }
        call.advance(Phase::Simulated);

        if call.kind == CallKind::Query {
            return match simulation.retval() {
                Ok(retval) => self.finalize(call, &retval),
                Err(e) => Err(call.abort(AbortReason::DecodeError, CoreError::Decode(e.to_string()))),
            };
        }

        let tx = match Self::prepare(tx, &simulation) {
            Ok(tx) => tx,
            Err(e) => return Err(call.abort(AbortReason::SimulationError, e)),
        };
        let signed = match self.sign(&tx).await {
            Ok(signed) => signed,
            Err(e) => return Err(call.abort(AbortReason::SigningRejected, e)),
        };
        call.advance(Phase::Signed);

        let hash = match self.submit(&signed).await {
            Ok(hash) => hash,
            Err(e) => return Err(call.abort(AbortReason::SubmissionRejected, e)),
        };
        info!("Submitted {} as {}", call.method, hash);
        call.hash = Some(hash.clone());
        call.advance(Phase::Submitted);

        self.poll(call, &hash).await
    }

    /// Fold the simulation's footprint, authorizations and resource fee into `tx`
    fn prepare(tx: Transaction, simulation: &SimulateResponse) -> TxServiceResult<Transaction> {
        let unreadable = |e: CoreError| CoreError::Simulation(format!("Unreadable simulation result: {}", e));
        let data = simulation
            .soroban_data()
            .map_err(unreadable)?
            .ok_or_else(|| CoreError::Simulation("Simulation returned no resource footprint".to_string()))?;
        let auth = simulation.auth_entries().map_err(unreadable)?;
        let resource_fee = simulation.resource_fee().map_err(unreadable)?;
        assemble(tx, data, auth, resource_fee)
    }

    async fn sign(&self, tx: &Transaction) -> TxServiceResult<String> {
        let blob = to_blob(&tx.clone().into())?;
        let signed_blob = self
            .wallet
            .sign_transaction(&blob, &self.config.network_passphrase)
            .await
            .map_err(|e| match e {
                CoreError::SigningRejected(_) => e,
                other => CoreError::SigningRejected(other.to_string()),
            })?;

        let signed = from_blob(&signed_blob)
            .map_err(|e| CoreError::SigningRejected(format!("{} returned an unreadable envelope: {}", self.wallet.name(), e)))?;
        // The network passphrase is part of the signed payload, so a signature
        // for another network only shows up as txBadAuth on submission.
        verify_signed(tx, &signed)
            .map_err(|reason| CoreError::SigningRejected(format!("{} {}", self.wallet.name(), reason)))?;
        Ok(signed_blob)
    }

    async fn submit(&self, signed_blob: &str) -> TxServiceResult<String> {
        let response = self
            .rpc
            .send_transaction(signed_blob)
            .await
            .map_err(|e| CoreError::SubmissionRejected(e.to_string()))?;
        match response.status {
            SendStatus::Pending | SendStatus::Duplicate => Ok(response.hash),
            SendStatus::TryAgainLater => Err(CoreError::SubmissionRejected(
                response.error_detail().unwrap_or_else(|| "Network busy, try again later".to_string()),
            )),
            SendStatus::Error => Err(CoreError::SubmissionRejected(
                response.error_detail().unwrap_or_else(|| "Network rejected the transaction".to_string()),
            )),
        }
    }

    async fn poll<T: FromScVal>(&self, call: &mut PendingCall, hash: &str) -> TxServiceResult<T> {
        for attempt in 1..=self.config.max_poll_attempts {
            self.sleeper.sleep(self.config.poll_interval).await;
            if call.cancelled() {
                let err = CoreError::PollingAbandoned { hash: hash.to_string() };
                return Err(call.abort(AbortReason::Abandoned, err));
            }

            call.poll_attempts = attempt;
            call.advance(Phase::Polling { attempt });

            let status = match self.rpc.get_transaction(hash).await {
                Ok(status) => status,
                Err(e) => {
                    // The transaction is already on its way; a failed status query says nothing about it
                    warn!("Status query {} for {} failed: {}", attempt, hash, e);
                    call.last_error = Some(e.to_string());
                    continue;
                }
            };

            match status.status {
                TransactionStatus::Success => {
                    return match status.return_value() {
                        Ok(retval) => self.finalize(call, &retval),
                        Err(e) => Err(call.abort(AbortReason::DecodeError, CoreError::Decode(e.to_string()))),
                    };
                }
                TransactionStatus::Failed => {
                    let detail = status
                        .failure_detail()
                        .unwrap_or_else(|| "Transaction failed on network".to_string());
                    warn!("{} {} failed on-chain: {}", call.kind, call.method, detail);
                    call.last_error = Some(detail.clone());
                    call.advance(Phase::Finalized(Outcome::Failure));
                    return Err(CoreError::TransactionFailed(detail));
                }
                TransactionStatus::NotFound => {
                    debug!("Transaction {} not final after attempt {}", hash, attempt);
                }
            }
        }

        let err = CoreError::TransactionTimeout { hash: hash.to_string() };
        Err(call.abort(AbortReason::Timeout, err))
    }

    fn finalize<T: FromScVal>(&self, call: &mut PendingCall, retval: &ScVal) -> TxServiceResult<T> {
        match T::from_sc_val(retval) {
            Ok(value) => {
                call.advance(Phase::Finalized(Outcome::Success));
                info!("Finished {} {}", call.kind, call.method);
                Ok(value)
            }
            Err(e) => Err(call.abort(AbortReason::DecodeError, e)),
        }
    }
}

#[async_trait(?Send)]
impl<R: RpcClient, W: WalletSigner, S: Sleeper> ContractInvoker for TransactionService<R, W, S> {
    async fn invoke<T: FromScVal>(&self, request: CallRequest) -> TxServiceResult<T> {
        let mut call = PendingCall::new(request);
        self.run(&mut call).await
    }
}
