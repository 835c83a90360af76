// In-memory ledger and wallet fakes shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tictactoe_core::tx_builder::{from_blob, signer_hint, to_blob};
use tictactoe_core::xdr::{
    AccountEntry, AccountEntryExt, AccountId, DecoratedSignature, ExtensionPoint, Hash, HostFunction,
    InvokeHostFunctionResult, LedgerEntryData, LedgerFootprint, LedgerKey, Limits, MuxedAccount, OperationBody,
    OperationResult, OperationResultTr, ReadXdr, SequenceNumber, Signature, SignatureHint, SorobanResources,
    SorobanTransactionData, SorobanTransactionMeta, SorobanTransactionMetaExt, Thresholds, TransactionEnvelope,
    TransactionExt, TransactionMeta, TransactionMetaV3, TransactionResult, TransactionResultExt,
    TransactionResultResult, VecM, WriteXdr,
};
use tictactoe_core::{
    decode, Board, CoreError, FromScVal, Game, GameBet, GameClient, GameInfo, GameStatus, GetLedgerEntriesResponse,
    GetTransactionResponse, LedgerEntryResult, LifecycleConfig, Player, ResourceFee, RpcClient, RpcResult, ScVal,
    Seat, SendResponse, SendStatus, SimulateHostFunctionResult, SimulateResponse, Sleeper, Symbol, ToScVal,
    TokenType, TransactionService, TransactionStatus, UserBalance, WalletSigner, BOARD_CELLS,
};

pub const ALICE_ADDRESS: &str = "GBZXN7PIRZGNMHGA7MUUUF4GWPY5AYPV6LY4UV2GL6VJGIQRXFDNMADI";
pub const BOB_ADDRESS: &str = "GCA3MN6Y7TJMNWTDLHTJMMITUELQ3Z4V4S3SLOCNDYFUZ7M6YWGOTE64";

/// Sequence number every account starts from
const INITIAL_SEQUENCE: i64 = 100;
/// Resource fee the fake network quotes for every invocation
const RESOURCE_FEE: i64 = 1000;

pub fn sym(s: &str) -> Symbol {
    Symbol::new(s).unwrap()
}

/// Knobs for how the fake network behaves
#[derive(Debug, Clone, Default)]
pub struct LedgerBehavior {
    /// NOT_FOUND answers before a submitted transaction turns final
    pub pending_polls: u32,
    /// Never finalize anything
    pub always_pending: bool,
    /// Reject every submission at the network level
    pub reject_submission: bool,
    /// Report every transaction as failed on-chain
    pub fail_on_chain: bool,
    /// Answer list_games with a transport error
    pub list_unavailable: bool,
}

#[derive(Debug, Default)]
pub struct Counters {
    pub simulations: u32,
    pub sends: u32,
    pub polls: u32,
}

#[derive(Debug, Clone, Default)]
struct ContractState {
    games: Vec<Game>,
    bets: HashMap<u32, GameBet>,
    balances: HashMap<Symbol, UserBalance>,
}

struct Submitted {
    remaining: u32,
    outcome: Result<ScVal, String>,
}

#[derive(Default)]
struct LedgerInner {
    behavior: LedgerBehavior,
    contract: ContractState,
    sequences: HashMap<String, i64>,
    submitted: HashMap<String, Submitted>,
    counters: Counters,
    methods_sent: Vec<String>,
}

/// A tiny tic-tac-toe contract behind the `RpcClient` interface. Clones
/// share state, so several players can talk to one ledger.
#[derive(Clone, Default)]
pub struct MockLedger {
    inner: Rc<RefCell<LedgerInner>>,
}

impl MockLedger {
    pub fn new(behavior: LedgerBehavior) -> Self {
        let ledger = Self::default();
        ledger.inner.borrow_mut().behavior = behavior;
        ledger
    }

    pub fn set_behavior(&self, behavior: LedgerBehavior) {
        self.inner.borrow_mut().behavior = behavior;
    }

    pub fn sends(&self) -> u32 {
        self.inner.borrow().counters.sends
    }

    pub fn polls(&self) -> u32 {
        self.inner.borrow().counters.polls
    }

    pub fn simulations(&self) -> u32 {
        self.inner.borrow().counters.simulations
    }

    pub fn methods_sent(&self) -> Vec<String> {
        self.inner.borrow().methods_sent.clone()
    }
}

fn arg<T: FromScVal>(args: &[ScVal], index: usize) -> Result<T, String> {
    let val = args.get(index).ok_or_else(|| format!("missing argument {}", index))?;
    decode(val).map_err(|e| e.to_string())
}

impl ContractState {
    fn balance(&self, user: &Symbol) -> UserBalance {
        self.balances.get(user).cloned().unwrap_or_default()
    }

    fn adjust(&mut self, user: &Symbol, token: &TokenType, delta: i128) -> Result<(), String> {
        let mut balance = self.balance(user);
        match token {
            TokenType::Native => {
                if balance.native + delta < 0 {
                    return Err("Insufficient balance".to_string());
                }
                balance.native += delta;
            }
            TokenType::Stellar(symbol) => {
                match balance.tokens.iter_mut().find(|(s, _)| s == symbol) {
                    Some((_, amount)) => {
                        if *amount + delta < 0 {
                            return Err("Insufficient token balance".to_string());
                        }
                        *amount += delta;
                    }
                    None if delta >= 0 => balance.tokens.push((symbol.clone(), delta)),
                    None => return Err("Token not found in balance".to_string()),
                }
            }
        }
        self.balances.insert(user.clone(), balance);
        Ok(())
    }

    fn game_mut(&mut self, id: u32) -> Result<&mut Game, String> {
        id.checked_sub(1)
            .and_then(|i| self.games.get_mut(i as usize))
            .ok_or_else(|| "Game not found".to_string())
    }

    fn game(&self, id: u32) -> Result<&Game, String> {
        id.checked_sub(1)
            .and_then(|i| self.games.get(i as usize))
            .ok_or_else(|| "Game not found".to_string())
    }

    fn new_game(&mut self, player_x: Symbol, has_bet: bool) -> u32 {
        self.games.push(Game {
            board: Board::default(),
            current_player: Player::X,
            player_x,
            player_o: Seat::Waiting,
            status: GameStatus::InProgress,
            has_bet,
        });
        self.games.len() as u32
    }

    fn execute(&mut self, method: &str, args: &[ScVal]) -> Result<ScVal, String> {
        match method {
            "create_game" => Ok(self.new_game(arg(args, 0)?, false).to_sc_val()),
            "create_game_with_bet" => {
                let player_x: Symbol = arg(args, 0)?;
                let amount: i128 = arg(args, 1)?;
                let token: TokenType = arg(args, 2)?;
                if amount <= 0 {
                    return Err("Bet amount must be positive".to_string());
                }
                self.adjust(&player_x, &token, -amount)?;
                let id = self.new_game(player_x, true);
                self.bets.insert(
                    id,
                    GameBet {
                        amount,
                        token_type: token,
                        player_x_paid: true,
                        player_o_paid: false,
                        rewards_claimed: false,
                        player_x_claimed: false,
                        player_o_claimed: false,
                    },
                );
                Ok(id.to_sc_val())
            }
            "join_game" => {
                let id: u32 = arg(args, 0)?;
                let player_o: Symbol = arg(args, 1)?;
                let game = self.game(id)?.clone();
                if !game.player_o.is_waiting() {
                    return Err("Game already has two players".to_string());
                }
                if game.player_x == player_o {
                    return Err("Cannot join your own game".to_string());
                }
                if let Some(bet) = self.bets.get(&id).cloned() {
                    self.adjust(&player_o, &bet.token_type, -bet.amount)?;
                    if let Some(b) = self.bets.get_mut(&id) {
                        b.player_o_paid = true;
                    }
                }
                let game = self.game_mut(id)?;
                game.player_o = Seat::Taken(player_o);
                Ok(game.to_sc_val())
            }
            "make_move" => {
                let id: u32 = arg(args, 0)?;
                let player: Symbol = arg(args, 1)?;
                let position: u32 = arg(args, 2)?;
                if position >= 9 {
                    return Err("Invalid position: must be 0-8".to_string());
                }
                let game = self.game_mut(id)?;
                if game.status != GameStatus::InProgress {
                    return Err("Game is already finished".to_string());
                }
                if game.player_o.is_waiting() {
                    return Err("Game needs a second player".to_string());
                }
                if game.player_for(game.current_player) != Some(&player) {
                    return Err("Not your turn".to_string());
                }
                if !game.board.is_empty(position as usize) {
                    return Err("Position already taken".to_string());
                }
                let mut cells = *game.board.cells();
                cells[position as usize] = Some(game.current_player);
                game.board = Board::from_cells(cells);
                game.status = check_winner(&cells);
                if game.status == GameStatus::InProgress {
                    game.current_player = game.current_player.other();
                }
                Ok(game.to_sc_val())
            }
            "get_game" => Ok(self.game(arg(args, 0)?)?.to_sc_val()),
            "get_board" => Ok(self.game(arg(args, 0)?)?.board.to_sc_val()),
            "get_game_bet" => Ok(self.bets.get(&arg::<u32>(args, 0)?).cloned().to_sc_val()),
            "list_games" => {
                let infos: Vec<GameInfo> = self
                    .games
                    .iter()
                    .enumerate()
                    .map(|(i, game)| {
                        let id = i as u32 + 1;
                        let bet = self.bets.get(&id);
                        let (native, symbol) = match bet.map(|b| &b.token_type) {
                            Some(TokenType::Stellar(s)) => (false, s.clone()),
                            _ => (true, sym("XLM")),
                        };
                        GameInfo {
                            id,
                            player_x: game.player_x.clone(),
                            player_o: game.player_o.clone(),
                            status: game.status,
                            has_bet: bet.is_some(),
                            bet_amount: bet.map(|b| b.amount).unwrap_or(0),
                            bet_token_native: native,
                            bet_token_symbol: symbol,
                        }
                    })
                    .collect();
                Ok(infos.to_sc_val())
            }
            "get_balance" => Ok(self.balance(&arg(args, 0)?).to_sc_val()),
            "deposit_native" | "withdraw_native" => {
                let user: Symbol = arg(args, 0)?;
                let amount: i128 = arg(args, 1)?;
                if amount <= 0 {
                    return Err("Amount must be positive".to_string());
                }
                let delta = if method == "deposit_native" { amount } else { -amount };
                self.adjust(&user, &TokenType::Native, delta)?;
                Ok(ScVal::Void)
            }
            "deposit_token" | "withdraw_token" => {
                let user: Symbol = arg(args, 0)?;
                let token: Symbol = arg(args, 1)?;
                let amount: i128 = arg(args, 2)?;
                if amount <= 0 {
                    return Err("Amount must be positive".to_string());
                }
                let delta = if method == "deposit_token" { amount } else { -amount };
                self.adjust(&user, &TokenType::Stellar(token), delta)?;
                Ok(ScVal::Void)
            }
            "claim_rewards" => {
                let id: u32 = arg(args, 0)?;
                let player: Symbol = arg(args, 1)?;
                let game = self.game(id)?.clone();
                let mut bet = self.bets.get(&id).cloned().ok_or_else(|| "Game has no betting".to_string())?;
                if !bet.can_claim(&game, &player) {
                    return Err("Player cannot claim rewards".to_string());
                }
                let payout = bet.payout(game.status);
                self.adjust(&player, &bet.token_type, payout)?;
                match game.role_of(&player) {
                    Some(Player::X) => bet.player_x_claimed = true,
                    _ => bet.player_o_claimed = true,
                }
                bet.rewards_claimed = game.status != GameStatus::Draw || (bet.player_x_claimed && bet.player_o_claimed);
                self.bets.insert(id, bet);
                Ok(ScVal::Void)
            }
            other => Err(format!("Unknown method {}", other)),
        }
    }
}

fn check_winner(cells: &[Option<Player>; BOARD_CELLS]) -> GameStatus {
    const LINES: [[usize; 3]; 8] = [
        [0, 1, 2],
        [3, 4, 5],
        [6, 7, 8],
        [0, 3, 6],
        [1, 4, 7],
        [2, 5, 8],
        [0, 4, 8],
        [2, 4, 6],
    ];
    for [a, b, c] in LINES {
        if let (Some(p), Some(q), Some(r)) = (cells[a], cells[b], cells[c]) {
            if p == q && q == r {
                return match p {
                    Player::X => GameStatus::XWins,
                    Player::O => GameStatus::OWins,
                };
            }
        }
    }
    if cells.iter().all(Option::is_some) {
        GameStatus::Draw
    } else {
        GameStatus::InProgress
    }
}

fn b64<T: WriteXdr>(value: &T) -> String {
    value.to_xdr_base64(Limits::none()).unwrap()
}

fn tx_result(result: TransactionResultResult) -> String {
    b64(&TransactionResult { fee_charged: 100, result, ext: TransactionResultExt::V0 })
}

fn invoke_result(result: InvokeHostFunctionResult) -> TransactionResultResult {
    let succeeded = matches!(result, InvokeHostFunctionResult::Success(_));
    let ops = vec![OperationResult::OpInner(OperationResultTr::InvokeHostFunction(result))].try_into().unwrap();
    if succeeded {
        TransactionResultResult::TxSuccess(ops)
    } else {
        TransactionResultResult::TxFailed(ops)
    }
}

fn meta_returning(value: ScVal) -> String {
    b64(&TransactionMeta::V3(TransactionMetaV3 {
        ext: ExtensionPoint::V0,
        tx_changes_before: Default::default(),
        operations: VecM::default(),
        tx_changes_after: Default::default(),
        soroban_meta: Some(SorobanTransactionMeta {
            ext: SorobanTransactionMetaExt::V0,
            events: VecM::default(),
            return_value: value,
            diagnostic_events: VecM::default(),
        }),
    }))
}

fn footprint() -> SorobanTransactionData {
    SorobanTransactionData {
        ext: ExtensionPoint::V0,
        resources: SorobanResources {
            footprint: LedgerFootprint { read_only: VecM::default(), read_write: VecM::default() },
            instructions: 100_000,
            read_bytes: 1024,
            write_bytes: 512,
        },
        resource_fee: RESOURCE_FEE,
    }
}

/// The parts of a submitted envelope the fake contract cares about
struct Invocation {
    source: String,
    sequence: i64,
    method: String,
    args: Vec<ScVal>,
    signed_by_source: bool,
    assembled: bool,
}

fn invocation(blob: &str) -> RpcResult<Invocation> {
    let TransactionEnvelope::Tx(env) = from_blob(blob)? else {
        return Err(CoreError::Decode("expected a v1 envelope".to_string()));
    };
    let call = match env.tx.operations.first().map(|op| &op.body) {
        Some(OperationBody::InvokeHostFunction(op)) => match &op.host_function {
            HostFunction::InvokeContract(call) => call.clone(),
            other => return Err(CoreError::Decode(format!("unexpected host function {}", other.name()))),
        },
        _ => return Err(CoreError::Decode("expected one contract invocation".to_string())),
    };
    let hint = signer_hint(&env.tx.source_account);
    Ok(Invocation {
        source: env.tx.source_account.to_string(),
        sequence: env.tx.seq_num.0,
        method: call.function_name.to_utf8_string_lossy(),
        args: call.args.to_vec(),
        signed_by_source: env.signatures.iter().any(|sig| sig.hint.0 == hint),
        assembled: matches!(env.tx.ext, TransactionExt::V1(_)),
    })
}

#[async_trait(?Send)]
impl RpcClient for MockLedger {
    async fn get_ledger_entries(&self, keys: &[String]) -> RpcResult<GetLedgerEntriesResponse> {
        let inner = self.inner.borrow();
        let mut entries = Vec::new();
        for key in keys {
            let LedgerKey::Account(account) = LedgerKey::from_xdr_base64(key, Limits::none())? else {
                continue;
            };
            let address = account.account_id.to_string();
            let sequence = inner.sequences.get(&address).copied().unwrap_or(INITIAL_SEQUENCE);
            let entry = LedgerEntryData::Account(AccountEntry {
                account_id: account.account_id,
                balance: 10_000_000_000,
                seq_num: SequenceNumber(sequence),
                num_sub_entries: 0,
                inflation_dest: None,
                flags: 0,
                home_domain: Default::default(),
                thresholds: Thresholds([1, 0, 0, 0]),
                signers: VecM::default(),
                ext: AccountEntryExt::V0,
            });
            entries.push(LedgerEntryResult { key: key.clone(), xdr: b64(&entry), last_modified_ledger_seq: Some(1) });
        }
        Ok(GetLedgerEntriesResponse { entries: Some(entries), latest_ledger: 1 })
    }

    async fn simulate_transaction(&self, envelope: &str) -> RpcResult<SimulateResponse> {
        let call = invocation(envelope)?;
        let mut inner = self.inner.borrow_mut();
        inner.counters.simulations += 1;
        if call.method == "list_games" && inner.behavior.list_unavailable {
            return Err(CoreError::Rpc("list_games request failed: connection reset".to_string()));
        }
        let mut dry_run = inner.contract.clone();
        Ok(match dry_run.execute(&call.method, &call.args) {
            Ok(retval) => SimulateResponse {
                error: None,
                transaction_data: Some(b64(&footprint())),
                min_resource_fee: Some(ResourceFee::Text(RESOURCE_FEE.to_string())),
                results: vec![SimulateHostFunctionResult { auth: vec![], xdr: b64(&retval) }],
                latest_ledger: 1,
            },
            Err(detail) => SimulateResponse { error: Some(detail), latest_ledger: 1, ..Default::default() },
        })
    }

    async fn send_transaction(&self, envelope: &str) -> RpcResult<SendResponse> {
        let call = invocation(envelope)?;
        let mut inner = self.inner.borrow_mut();
        inner.counters.sends += 1;
        let hash = format!("tx{:04}", inner.counters.sends);

        let expected = inner.sequences.get(&call.source).copied().unwrap_or(INITIAL_SEQUENCE) + 1;
        let rejection = if !call.signed_by_source {
            Some(TransactionResultResult::TxBadAuth)
        } else if !call.assembled {
            Some(TransactionResultResult::TxSorobanInvalid)
        } else if inner.behavior.reject_submission || call.sequence != expected {
            Some(TransactionResultResult::TxBadSeq)
        } else {
            None
        };
        if let Some(result) = rejection {
            return Ok(SendResponse { status: SendStatus::Error, hash, error_result_xdr: Some(tx_result(result)) });
        }
        inner.sequences.insert(call.source.clone(), call.sequence);
        inner.methods_sent.push(call.method.clone());

        let outcome = if inner.behavior.fail_on_chain {
            Err("contract trapped".to_string())
        } else {
            inner.contract.execute(&call.method, &call.args)
        };
        let remaining = if inner.behavior.always_pending { u32::MAX } else { inner.behavior.pending_polls };
        inner.submitted.insert(hash.clone(), Submitted { remaining, outcome });

        Ok(SendResponse { status: SendStatus::Pending, hash, error_result_xdr: None })
    }

    async fn get_transaction(&self, hash: &str) -> RpcResult<GetTransactionResponse> {
        let not_found = GetTransactionResponse { status: TransactionStatus::NotFound, result_xdr: None, result_meta_xdr: None };
        let mut inner = self.inner.borrow_mut();
        inner.counters.polls += 1;
        let submitted = match inner.submitted.get_mut(hash) {
            Some(s) => s,
            None => return Ok(not_found),
        };
        if submitted.remaining > 0 {
            if submitted.remaining != u32::MAX {
                submitted.remaining -= 1;
            }
            return Ok(not_found);
        }
        Ok(match &submitted.outcome {
            Ok(value) => GetTransactionResponse {
                status: TransactionStatus::Success,
                result_xdr: Some(tx_result(invoke_result(InvokeHostFunctionResult::Success(Hash([0; 32]))))),
                result_meta_xdr: Some(meta_returning(value.clone())),
            },
            Err(_) => GetTransactionResponse {
                status: TransactionStatus::Failed,
                result_xdr: Some(tx_result(invoke_result(InvokeHostFunctionResult::Trapped))),
                result_meta_xdr: None,
            },
        })
    }
}

/// Wallet that signs whatever it is handed with the connected account's key
pub struct FakeWallet {
    pub address: String,
    pub decline: bool,
}

impl FakeWallet {
    pub fn new(address: &str) -> Self {
        Self { address: address.to_string(), decline: false }
    }
}

#[async_trait(?Send)]
impl WalletSigner for FakeWallet {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn address(&self) -> Result<String, CoreError> {
        Ok(self.address.clone())
    }

    async fn sign_transaction(&self, envelope: &str, _network_passphrase: &str) -> Result<String, CoreError> {
        if self.decline {
            return Err(CoreError::SigningRejected("User declined".to_string()));
        }
        let TransactionEnvelope::Tx(mut env) = from_blob(envelope)? else {
            return Err(CoreError::SigningRejected("unsupported envelope".to_string()));
        };
        let key: MuxedAccount = AccountId::from_str(&self.address)
            .map_err(|e| CoreError::SigningRejected(e.to_string()))?
            .into();
        let mut signatures = env.signatures.to_vec();
        signatures.push(DecoratedSignature {
            hint: SignatureHint(signer_hint(&key)),
            signature: Signature(vec![0xab; 64].try_into()?),
        });
        env.signatures = signatures.try_into()?;
        to_blob(&TransactionEnvelope::Tx(env))
    }
}

/// Yields to the executor instead of waiting, so polling stays fast but
/// still suspends
pub struct YieldSleeper;

#[async_trait(?Send)]
impl Sleeper for YieldSleeper {
    async fn sleep(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }
}

pub type TestService = TransactionService<MockLedger, Arc<dyn WalletSigner>, YieldSleeper>;

pub fn player(ledger: &MockLedger, address: &str) -> TestClient {
    let wallet: Arc<dyn WalletSigner> = Arc::new(FakeWallet::new(address));
    let service = TransactionService::new(ledger.clone(), Arc::clone(&wallet), YieldSleeper, LifecycleConfig::default());
    GameClient::new(service, wallet)
}

pub type TestClient = GameClient<TestService>;
