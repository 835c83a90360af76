// Typed façade over the contract entry points
//
// Reads are simulated only; writes go through the full sign/submit/poll
// lifecycle. Cheap local checks run before any network round-trip.

use crate::codec::{ScVal, ToScVal};
use crate::error::CoreError;
use crate::models::{Board, Game, GameBet, GameId, GameInfo, GameStatus, TokenType, UserBalance, BOARD_CELLS};
use crate::single_flight::{InFlightGuard, InFlightRegistry};
use crate::symbol::{Symbol, SymbolRegistry};
use crate::timer::CancelToken;
use crate::transaction_service::{CallRequest, ContractInvoker};
use crate::transaction_signer::WalletSigner;
use log::{debug, info};
use std::sync::{Arc, Mutex};

pub type ClientResult<T> = Result<T, CoreError>;

pub struct GameClient<E> {
    invoker: E,
    wallet: Arc<dyn WalletSigner>,
    symbols: SymbolRegistry,
    in_flight: InFlightRegistry,
    /// Attached to every call; cancelled when the session ends
    session: Mutex<CancelToken>,
}

impl<E: ContractInvoker> GameClient<E> {
    pub fn new(invoker: E, wallet: Arc<dyn WalletSigner>) -> Self {
        Self {
            invoker,
            wallet,
            symbols: SymbolRegistry::new(),
            in_flight: InFlightRegistry::new(),
            session: Mutex::new(CancelToken::new()),
        }
    }

    pub fn invoker(&self) -> &E {
        &self.invoker
    }

    pub fn symbols(&self) -> &SymbolRegistry {
        &self.symbols
    }

    pub fn wallet_name(&self) -> &'static str {
        self.wallet.name()
    }

    /// Check the wallet is usable and resolve the caller's symbol
    pub async fn connect(&self) -> ClientResult<Symbol> {
        if !self.wallet.is_available().await {
            return Err(CoreError::WalletUnavailable(format!(
                "{} is not installed or has not granted access",
                self.wallet.name()
            )));
        }
        let symbol = self.player_symbol().await?;
        info!("Connected {} as {}", self.wallet.name(), symbol);
        Ok(symbol)
    }

    /// The caller's contract identity, derived from the wallet address
    pub async fn player_symbol(&self) -> ClientResult<Symbol> {
        let address = self.source().await?;
        self.symbols.register(&address)
    }

    async fn source(&self) -> ClientResult<String> {
        self.wallet.address().await.map_err(|e| match e {
            CoreError::WalletUnavailable(_) | CoreError::AccountResolution(_) => e,
            other => CoreError::AccountResolution(other.to_string()),
        })
    }

    fn guard(&self, key: String) -> ClientResult<InFlightGuard> {
        self.in_flight.acquire(&key)
    }

    fn session_token(&self) -> CancelToken {
        match self.session.lock() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Abandon every call still in flight: they stop polling and resolve
    /// with `PollingAbandoned`. Calls started afterwards run normally.
    pub fn end_session(&self) {
        let mut token = match self.session.lock() {
            Ok(token) => token,
            Err(poisoned) => poisoned.into_inner(),
        };
        token.cancel();
        *token = CancelToken::new();
        debug!("Session ended, in-flight calls abandoned");
    }

    async fn query<T: crate::codec::FromScVal>(&self, method: &str, args: Vec<ScVal>) -> ClientResult<T> {
        let source = self.source().await?;
        let request = CallRequest::query(&source, method, args).with_cancel(self.session_token());
        self.invoker.invoke(request).await
    }

    async fn invoke<T: crate::codec::FromScVal>(&self, method: &str, args: Vec<ScVal>) -> ClientResult<T> {
        let source = self.source().await?;
        let request = CallRequest::invoke(&source, method, args).with_cancel(self.session_token());
        self.invoker.invoke(request).await
    }

    // === GAMES ===

    pub async fn create_game(&self, player_x: &Symbol) -> ClientResult<GameId> {
        let _guard = self.guard("create_game".to_string())?;
        let id: GameId = self.invoke("create_game", vec![player_x.to_sc_val()]).await?;
        info!("Created game {} for {}", id, player_x);
        Ok(id)
    }

    pub async fn create_game_with_bet(
        &self,
        player_x: &Symbol,
        amount: i128,
        token: &TokenType,
    ) -> ClientResult<GameId> {
        ensure_positive(amount, "Bet amount")?;
        let _guard = self.guard("create_game".to_string())?;
        let id: GameId = self
            .invoke(
                "create_game_with_bet",
                vec![player_x.to_sc_val(), amount.to_sc_val(), token.to_sc_val()],
            )
            .await?;
        info!("Created bet game {} for {} ({} stroops)", id, player_x, amount);
        Ok(id)
    }

    pub async fn join_game(&self, game_id: GameId, player_o: &Symbol) -> ClientResult<Game> {
        let _guard = self.guard(format!("join_game:{}", game_id))?;
        self.invoke("join_game", vec![game_id.to_sc_val(), player_o.to_sc_val()]).await
    }

    /// Place `player`'s mark at `position` on the last fetched `game`.
    /// Moves the contract would certainly reject are refused here.
    pub async fn make_move(&self, game_id: GameId, game: &Game, player: &Symbol, position: u32) -> ClientResult<Game> {
        validate_move(game, player, position)?;
        let _guard = self.guard(format!("make_move:{}", game_id))?;
        debug!("Game {}: {} plays {}", game_id, player, position);
        self.invoke(
            "make_move",
            vec![game_id.to_sc_val(), player.to_sc_val(), position.to_sc_val()],
        )
        .await
    }

    pub async fn get_game(&self, game_id: GameId) -> ClientResult<Game> {
        self.query("get_game", vec![game_id.to_sc_val()]).await
    }

    pub async fn get_board(&self, game_id: GameId) -> ClientResult<Board> {
        self.query("get_board", vec![game_id.to_sc_val()]).await
    }

    pub async fn list_games(&self) -> ClientResult<Vec<GameInfo>> {
        self.query("list_games", vec![]).await
    }

    pub async fn get_game_bet(&self, game_id: GameId) -> ClientResult<Option<GameBet>> {
        self.query("get_game_bet", vec![game_id.to_sc_val()]).await
    }

    pub async fn claim_rewards(&self, game_id: GameId, game: &Game, player: &Symbol) -> ClientResult<()> {
        if !game.has_bet {
            return Err(CoreError::Validation("Game has no bet to claim".to_string()));
        }
        if game.status == GameStatus::InProgress {
            return Err(CoreError::Validation("Game is still in progress".to_string()));
        }
        if game.role_of(player).is_none() {
            return Err(CoreError::Validation("Not a player in this game".to_string()));
        }
        let _guard = self.guard(format!("claim_rewards:{}", game_id))?;
        self.invoke("claim_rewards", vec![game_id.to_sc_val(), player.to_sc_val()]).await
    }

    // === ESCROW ===

    /// Escrow balance of the connected player
    pub async fn get_balance(&self) -> ClientResult<UserBalance> {
        let symbol = self.player_symbol().await?;
        self.get_balance_of(&symbol).await
    }

    pub async fn get_balance_of(&self, user: &Symbol) -> ClientResult<UserBalance> {
        self.query("get_balance", vec![user.to_sc_val()]).await
    }

    pub async fn deposit_native(&self, user: &Symbol, amount: i128) -> ClientResult<()> {
        ensure_positive(amount, "Deposit amount")?;
        let _guard = self.guard("balance:deposit_native".to_string())?;
        self.invoke("deposit_native", vec![user.to_sc_val(), amount.to_sc_val()]).await
    }

    pub async fn deposit_token(&self, user: &Symbol, token: &Symbol, amount: i128) -> ClientResult<()> {
        ensure_positive(amount, "Deposit amount")?;
        let _guard = self.guard("balance:deposit_token".to_string())?;
        self.invoke(
            "deposit_token",
            vec![user.to_sc_val(), token.to_sc_val(), amount.to_sc_val()],
        )
        .await
    }

    pub async fn withdraw_native(&self, user: &Symbol, amount: i128) -> ClientResult<()> {
        ensure_positive(amount, "Withdrawal amount")?;
        let _guard = self.guard("balance:withdraw_native".to_string())?;
        self.invoke("withdraw_native", vec![user.to_sc_val(), amount.to_sc_val()]).await
    }

    pub async fn withdraw_token(&self, user: &Symbol, token: &Symbol, amount: i128) -> ClientResult<()> {
        ensure_positive(amount, "Withdrawal amount")?;
        let _guard = self.guard("balance:withdraw_token".to_string())?;
        self.invoke(
            "withdraw_token",
            vec![user.to_sc_val(), token.to_sc_val(), amount.to_sc_val()],
        )
        .await
    }
}

fn ensure_positive(amount: i128, what: &str) -> ClientResult<()> {
    if amount <= 0 {
        return Err(CoreError::Validation(format!("{} must be positive", what)));
    }
    Ok(())
}

/// Local pre-check for `make_move`; the contract re-validates regardless
pub fn validate_move(game: &Game, player: &Symbol, position: u32) -> ClientResult<()> {
    if position as usize >= BOARD_CELLS {
        return Err(CoreError::Validation(format!("Invalid position {}: must be 0-8", position)));
    }
    if game.status != GameStatus::InProgress {
        return Err(CoreError::Validation("Game is already finished".to_string()));
    }
    if game.player_o.is_waiting() {
        return Err(CoreError::Validation("Game needs a second player".to_string()));
    }
    if !game.board.is_empty(position as usize) {
        return Err(CoreError::Validation(format!("Position {} already taken", position)));
    }
    match game.role_of(player) {
        Some(side) if side == game.current_player => Ok(()),
        Some(_) => Err(CoreError::Validation("Not your turn".to_string())),
        None => Err(CoreError::Validation("Not a player in this game".to_string())),
    }
}
