// In-memory view state for the lobby and the open game
//
// Snapshots are replaced wholesale by re-fetching after every write; they
// are never patched locally.

use crate::error::CoreError;
use crate::game_client::{validate_move, ClientResult, GameClient};
use crate::models::{Game, GameBet, GameId, GameInfo, GameStatus, Player, TokenType, UserBalance};
use crate::symbol::{display_name, Symbol};
use crate::transaction_service::ContractInvoker;
use chrono::{DateTime, Utc};
use futures_util::future::join;
use log::{debug, warn};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Who asked for a fetch. Only user-triggered fetches show a spinner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    User,
    Background,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Loadable<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for Loadable<T> {
    fn default() -> Self {
        Self { data: None, loading: false, error: None, updated_at: None }
    }
}

impl<T> Loadable<T> {
    pub fn begin(&mut self, trigger: RefreshTrigger) {
        if trigger == RefreshTrigger::User {
            self.loading = true;
            self.error = None;
        }
    }

    pub fn succeed(&mut self, value: T) {
        self.data = Some(value);
        self.loading = false;
        self.error = None;
        self.updated_at = Some(Utc::now());
    }

    /// Keeps the last good data so the view does not blank out
    pub fn fail(&mut self, error: &CoreError) {
        self.loading = false;
        self.error = Some(error.user_message());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    X,
    O,
    Visitor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameView {
    pub id: GameId,
    pub me: Option<Symbol>,
    pub game: Loadable<Game>,
    pub bet: Loadable<Option<GameBet>>,
}

impl GameView {
    pub fn new(id: GameId, me: Option<Symbol>) -> Self {
        Self { id, me, game: Loadable::default(), bet: Loadable::default() }
    }

    pub fn role(&self) -> Role {
        let (game, me) = match (self.game.data.as_ref(), self.me.as_ref()) {
            (Some(game), Some(me)) => (game, me),
            _ => return Role::Visitor,
        };
        match game.role_of(me) {
            Some(Player::X) => Role::X,
            Some(Player::O) => Role::O,
            None => Role::Visitor,
        }
    }

    pub fn is_my_turn(&self) -> bool {
        let game = match self.game.data.as_ref() {
            Some(game) => game,
            None => return false,
        };
        match self.role() {
            Role::X => game.current_player == Player::X,
            Role::O => game.current_player == Player::O,
            Role::Visitor => false,
        }
    }

    pub fn can_make_move(&self, position: u32) -> bool {
        match (self.game.data.as_ref(), self.me.as_ref()) {
            (Some(game), Some(me)) => validate_move(game, me, position).is_ok(),
            _ => false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.game.data.as_ref().map(|g| g.status.is_finished()).unwrap_or(false)
    }

    pub fn waiting_for_opponent(&self) -> bool {
        self.game.data.as_ref().map(|g| g.player_o.is_waiting()).unwrap_or(false)
    }

    pub fn can_claim(&self) -> bool {
        match (self.game.data.as_ref(), self.bet.data.as_ref(), self.me.as_ref()) {
            (Some(game), Some(Some(bet)), Some(me)) => bet.can_claim(game, me),
            _ => false,
        }
    }

    pub fn status_message(&self) -> String {
        let game = match self.game.data.as_ref() {
            Some(game) => game,
            None => return String::new(),
        };
        let role = self.role();

        if game.player_o.is_waiting() {
            return if role == Role::X {
                "Waiting for another player to join...".to_string()
            } else {
                "Waiting for Player O to join...".to_string()
            };
        }

        match game.status {
            GameStatus::XWins => return format!("{} (X) wins!", display_name(game.player_x.as_str())),
            GameStatus::OWins => return format!("{} (O) wins!", display_name(game.player_o.as_str())),
            GameStatus::Draw => return "It's a draw!".to_string(),
            GameStatus::Claimed => return "Rewards claimed".to_string(),
            GameStatus::InProgress => {}
        }

        let current = game
            .player_for(game.current_player)
            .map(|s| display_name(s.as_str()))
            .unwrap_or_default();
        match role {
            Role::Visitor => format!("Watching - {}'s turn", current),
            _ if self.is_my_turn() => "Your turn".to_string(),
            _ => format!("Waiting for {}", current),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LobbyView {
    pub games: Loadable<Vec<GameInfo>>,
    pub balance: Loadable<UserBalance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub me: Option<Symbol>,
    pub lobby: LobbyView,
    pub game: Option<GameView>,
    /// Status of each write action, keyed by action name. Entries persist
    /// after completion so the last outcome stays visible.
    pub actions: BTreeMap<String, Loadable<()>>,
}

impl ViewState {
    pub fn action(&self, name: &str) -> Option<&Loadable<()>> {
        self.actions.get(name)
    }

    pub fn is_action_pending(&self, name: &str) -> bool {
        self.action(name).map(|a| a.loading).unwrap_or(false)
    }

    pub fn any_action_pending(&self) -> bool {
        self.actions.values().any(|a| a.loading)
    }

    pub fn action_error(&self, name: &str) -> Option<&str> {
        self.action(name).and_then(|a| a.error.as_deref())
    }
}

pub struct ViewStore<E> {
    client: GameClient<E>,
    state: RefCell<ViewState>,
}

impl<E: ContractInvoker> ViewStore<E> {
    pub fn new(client: GameClient<E>) -> Self {
        Self { client, state: RefCell::new(ViewState::default()) }
    }

    pub fn client(&self) -> &GameClient<E> {
        &self.client
    }

    /// Abandon in-flight calls. Their actions resolve with a polling error.
    pub fn teardown(&self) {
        self.client.end_session();
    }

    pub fn snapshot(&self) -> ViewState {
        self.state.borrow().clone()
    }

    fn update<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    fn me(&self) -> ClientResult<Symbol> {
        self.state
            .borrow()
            .me
            .clone()
            .ok_or_else(|| CoreError::WalletUnavailable("Connect a wallet first".to_string()))
    }

    fn open_game_id(&self) -> Option<GameId> {
        self.state.borrow().game.as_ref().map(|g| g.id)
    }

    pub async fn connect(&self) -> ClientResult<Symbol> {
        let symbol = self.client.connect().await?;
        self.update(|s| {
            s.me = Some(symbol.clone());
            if let Some(view) = s.game.as_mut() {
                view.me = Some(symbol.clone());
            }
        });
        Ok(symbol)
    }

    // === READS ===

    pub async fn load_lobby(&self, trigger: RefreshTrigger) -> ClientResult<()> {
        self.update(|s| s.lobby.games.begin(trigger));
        let result = self.client.list_games().await;
        self.update(|s| match &result {
            Ok(games) => s.lobby.games.succeed(games.clone()),
            Err(e) => s.lobby.games.fail(e),
        });
        result.map(|games| debug!("Lobby refreshed: {} games", games.len()))
    }

    pub async fn load_balance(&self, trigger: RefreshTrigger) -> ClientResult<()> {
        let me = self.me()?;
        self.update(|s| s.lobby.balance.begin(trigger));
        let result = self.client.get_balance_of(&me).await;
        self.update(|s| match &result {
            Ok(balance) => s.lobby.balance.succeed(balance.clone()),
            Err(e) => s.lobby.balance.fail(e),
        });
        result.map(|_| ())
    }

    /// Lobby list and balance, fetched concurrently
    pub async fn refresh_lobby(&self, trigger: RefreshTrigger) -> ClientResult<()> {
        let (games, balance) = join(self.load_lobby(trigger), self.load_balance(trigger)).await;
        games.and(balance)
    }

    pub async fn open_game(&self, id: GameId) -> ClientResult<()> {
        let me = self.state.borrow().me.clone();
        self.update(|s| s.game = Some(GameView::new(id, me)));
        self.refresh_game(RefreshTrigger::User).await
    }

    pub fn close_game(&self) {
        self.update(|s| s.game = None);
    }

    pub async fn refresh_game(&self, trigger: RefreshTrigger) -> ClientResult<()> {
        let id = match self.open_game_id() {
            Some(id) => id,
            None => return Ok(()),
        };
        self.update(|s| {
            if let Some(view) = s.game.as_mut() {
                view.game.begin(trigger);
                view.bet.begin(trigger);
            }
        });

        let (game, bet) = join(self.client.get_game(id), self.client.get_game_bet(id)).await;

        // The user may have navigated to another game while this was in flight
        if self.open_game_id() != Some(id) {
            debug!("Dropping stale refresh of game {}", id);
            return Ok(());
        }
        self.update(|s| {
            if let Some(view) = s.game.as_mut() {
                match &game {
                    Ok(g) => view.game.succeed(g.clone()),
                    Err(e) => view.game.fail(e),
                }
                match &bet {
                    Ok(b) => view.bet.succeed(b.clone()),
                    Err(e) => view.bet.fail(e),
                }
            }
        });
        game.and(bet).map(|_| ())
    }

    // === WRITES ===

    fn begin_action(&self, name: &str) {
        self.update(|s| s.actions.entry(name.to_string()).or_default().begin(RefreshTrigger::User));
    }

    fn end_action<T>(&self, name: &str, result: &ClientResult<T>) {
        self.update(|s| {
            let action = s.actions.entry(name.to_string()).or_default();
            match result {
                Ok(_) => action.succeed(()),
                Err(e) => action.fail(e),
            }
        });
        if let Err(e) = result {
            warn!("{} failed: {}", name, e);
        }
    }

    pub async fn create_game(&self) -> ClientResult<GameId> {
        let me = self.me()?;
        self.begin_action("create_game");
        let result = self.client.create_game(&me).await;
        self.end_action("create_game", &result);
        let id = result?;
        self.refresh_lobby(RefreshTrigger::User).await?;
        Ok(id)
    }

    pub async fn create_game_with_bet(&self, amount: i128, token: &TokenType) -> ClientResult<GameId> {
        let me = self.me()?;
        self.begin_action("create_game_with_bet");
        let result = self.client.create_game_with_bet(&me, amount, token).await;
        self.end_action("create_game_with_bet", &result);
        let id = result?;
        self.refresh_lobby(RefreshTrigger::User).await?;
        Ok(id)
    }

    pub async fn join_game(&self, id: GameId) -> ClientResult<()> {
        let me = self.me()?;
        self.begin_action("join_game");
        let result = self.client.join_game(id, &me).await;
        self.end_action("join_game", &result);
        result?;
        let (lobby, game) = join(self.refresh_lobby(RefreshTrigger::User), self.refresh_game(RefreshTrigger::User)).await;
        lobby.and(game)
    }

    pub async fn make_move(&self, position: u32) -> ClientResult<()> {
        let me = self.me()?;
        let (id, game) = {
            let state = self.state.borrow();
            let view = state
                .game
                .as_ref()
                .ok_or_else(|| CoreError::Validation("No game is open".to_string()))?;
            let game = view
                .game
                .data
                .clone()
                .ok_or_else(|| CoreError::Validation("Game has not loaded yet".to_string()))?;
            (view.id, game)
        };
        self.begin_action("make_move");
        let result = self.client.make_move(id, &game, &me, position).await;
        self.end_action("make_move", &result);
        result?;
        self.refresh_game(RefreshTrigger::User).await
    }

    pub async fn deposit(&self, token: &TokenType, amount: i128) -> ClientResult<()> {
        let me = self.me()?;
        self.begin_action("deposit");
        let result = match token {
            TokenType::Native => self.client.deposit_native(&me, amount).await,
            TokenType::Stellar(symbol) => self.client.deposit_token(&me, symbol, amount).await,
        };
        self.end_action("deposit", &result);
        result?;
        self.load_balance(RefreshTrigger::User).await
    }

    pub async fn withdraw(&self, token: &TokenType, amount: i128) -> ClientResult<()> {
        let me = self.me()?;
        self.begin_action("withdraw");
        let result = match token {
            TokenType::Native => self.client.withdraw_native(&me, amount).await,
            TokenType::Stellar(symbol) => self.client.withdraw_token(&me, symbol, amount).await,
        };
        self.end_action("withdraw", &result);
        result?;
        self.load_balance(RefreshTrigger::User).await
    }

    pub async fn claim_rewards(&self) -> ClientResult<()> {
        let me = self.me()?;
        let (id, game) = {
            let state = self.state.borrow();
            let view = state
                .game
                .as_ref()
                .ok_or_else(|| CoreError::Validation("No game is open".to_string()))?;
            let game = view
                .game
                .data
                .clone()
                .ok_or_else(|| CoreError::Validation("Game has not loaded yet".to_string()))?;
            (view.id, game)
        };
        self.begin_action("claim_rewards");
        let result = self.client.claim_rewards(id, &game, &me).await;
        self.end_action("claim_rewards", &result);
        result?;
        let (game, balance) = join(self.refresh_game(RefreshTrigger::User), self.load_balance(RefreshTrigger::User)).await;
        game.and(balance)
    }
}
