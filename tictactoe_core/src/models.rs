use crate::codec::{
    record, split_variant, symbol_val, variant, DecodeResult, FromScVal, RecordFields, ScVal, ToScVal,
};
use crate::error::CoreError;
use crate::symbol::{Symbol, WAITING};
use serde::{Deserialize, Serialize};

/// Contract-assigned game identifier
pub type GameId = u32;

pub const BOARD_CELLS: usize = 9;

/// Smallest unit of the native asset; 10^7 per whole unit
pub const STROOPS_PER_UNIT: i128 = 10_000_000;
const STROOP_DECIMALS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    X,
    O,
}

impl Player {
    pub fn other(self) -> Self {
        match self {
            Player::X => Player::O,
            Player::O => Player::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Player::X => "X",
            Player::O => "O",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    InProgress,
    XWins,
    OWins,
    Draw,
    /// Bet payout has been taken
    Claimed,
}

impl GameStatus {
    pub fn is_finished(self) -> bool {
        !matches!(self, GameStatus::InProgress)
    }

    pub fn winner(self) -> Option<Player> {
        match self {
            GameStatus::XWins => Some(Player::X),
            GameStatus::OWins => Some(Player::O),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    /// Native ledger asset (XLM)
    Native,
    /// Named token, identified by its asset contract symbol
    Stellar(Symbol),
}

/// Player O seat: either still open or taken by a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Seat {
    Waiting,
    Taken(Symbol),
}

impl Seat {
    pub fn symbol(&self) -> Option<&Symbol> {
        match self {
            Seat::Waiting => None,
            Seat::Taken(s) => Some(s),
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, Seat::Waiting)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Seat::Waiting => WAITING,
            Seat::Taken(s) => s.as_str(),
        }
    }
}

/// 3x3 board, cells indexed 0..9 row by row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [Option<Player>; BOARD_CELLS],
}

impl Default for Board {
    fn default() -> Self {
        Self { cells: [None; BOARD_CELLS] }
    }
}

impl Board {
    pub fn from_cells(cells: [Option<Player>; BOARD_CELLS]) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[Option<Player>; BOARD_CELLS] {
        &self.cells
    }

    pub fn cell(&self, position: usize) -> Option<Player> {
        self.cells.get(position).copied().flatten()
    }

    pub fn is_empty(&self, position: usize) -> bool {
        position < BOARD_CELLS && self.cells[position].is_none()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub board: Board,
    pub current_player: Player,
    pub player_x: Symbol,
    pub player_o: Seat,
    pub status: GameStatus,
    pub has_bet: bool,
}

impl Game {
    /// Which side `symbol` plays, if any
    pub fn role_of(&self, symbol: &Symbol) -> Option<Player> {
        if &self.player_x == symbol {
            Some(Player::X)
        } else if self.player_o.symbol() == Some(symbol) {
            Some(Player::O)
        } else {
            None
        }
    }

    pub fn player_for(&self, side: Player) -> Option<&Symbol> {
        match side {
            Player::X => Some(&self.player_x),
            Player::O => self.player_o.symbol(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameBet {
    pub amount: i128,
    pub token_type: TokenType,
    pub player_x_paid: bool,
    pub player_o_paid: bool,
    pub rewards_claimed: bool,
    pub player_x_claimed: bool,
    pub player_o_claimed: bool,
}

impl GameBet {
    /// Mirrors the contract payout rule: the winner claims on a win, both
    /// players claim on a draw, nobody claims twice.
    pub fn can_claim(&self, game: &Game, symbol: &Symbol) -> bool {
        let side = match game.role_of(symbol) {
            Some(side) => side,
            None => return false,
        };
        let already = match side {
            Player::X => self.player_x_claimed,
            Player::O => self.player_o_claimed,
        };
        if already {
            return false;
        }
        match game.status {
            GameStatus::XWins => side == Player::X,
            GameStatus::OWins => side == Player::O,
            GameStatus::Draw => true,
            GameStatus::InProgress | GameStatus::Claimed => false,
        }
    }

    /// Amount paid out to a claiming player
    pub fn payout(&self, status: GameStatus) -> i128 {
        match status {
            GameStatus::XWins | GameStatus::OWins => self.amount * 2,
            GameStatus::Draw => self.amount,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobbyState {
    Waiting,
    Active,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetSummary {
    pub amount: i128,
    pub token: TokenType,
}

/// Lobby projection of a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    pub id: GameId,
    pub player_x: Symbol,
    pub player_o: Seat,
    pub status: GameStatus,
    pub has_bet: bool,
    pub bet_amount: i128,
    pub bet_token_native: bool,
    pub bet_token_symbol: Symbol,
}

impl GameInfo {
    pub fn bet_summary(&self) -> Option<BetSummary> {
        if !self.has_bet {
            return None;
        }
        let token = if self.bet_token_native {
            TokenType::Native
        } else {
            TokenType::Stellar(self.bet_token_symbol.clone())
        };
        Some(BetSummary { amount: self.bet_amount, token })
    }

    pub fn lobby_state(&self) -> LobbyState {
        if self.status.is_finished() {
            LobbyState::Finished
        } else if self.player_o.is_waiting() {
            LobbyState::Waiting
        } else {
            LobbyState::Active
        }
    }
}

/// Escrow balance of one player
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalance {
    pub native: i128,
    pub tokens: Vec<(Symbol, i128)>,
}

impl UserBalance {
    pub fn token_balance(&self, token: &Symbol) -> i128 {
        self.tokens
            .iter()
            .find(|(symbol, _)| symbol == token)
            .map(|(_, amount)| *amount)
            .unwrap_or(0)
    }

    pub fn available(&self, token: &TokenType) -> i128 {
        match token {
            TokenType::Native => self.native,
            TokenType::Stellar(symbol) => self.token_balance(symbol),
        }
    }
}

/// Render stroops as a whole-unit decimal with seven places
pub fn format_stroops(amount: i128) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    let unit = STROOPS_PER_UNIT as u128;
    format!(
        "{}{}.{:0width$}",
        sign,
        abs / unit,
        abs % unit,
        width = STROOP_DECIMALS
    )
}

/// Parse a whole-unit decimal into stroops. Digits past the seventh
/// decimal place are truncated.
pub fn parse_amount(input: &str) -> Result<i128, CoreError> {
    let trimmed = input.trim();
    let invalid = || CoreError::Validation(format!("Invalid amount '{}'", input));

    if trimmed.is_empty() || trimmed.starts_with('-') || trimmed.starts_with('+') {
        return Err(invalid());
    }

    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if (whole.is_empty() && frac.is_empty())
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !frac.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole_value: i128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let mut frac_digits: String = frac.chars().take(STROOP_DECIMALS).collect();
    while frac_digits.len() < STROOP_DECIMALS {
        frac_digits.push('0');
    }
    let frac_value: i128 = frac_digits.parse().map_err(|_| invalid())?;

    whole_value
        .checked_mul(STROOPS_PER_UNIT)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(invalid)
}

// Wire codecs for the contract schema

fn unit_tag<'a>(val: &'a ScVal, type_name: &str) -> DecodeResult<&'a str> {
    let (tag, payload) = split_variant(val)?;
    if !payload.is_empty() {
        return Err(CoreError::Decode(format!(
            "{} variant '{}' carries an unexpected payload",
            type_name, tag
        )));
    }
    Ok(tag)
}

impl ToScVal for Player {
    fn to_sc_val(&self) -> ScVal {
        variant(self.as_str(), vec![])
    }
}

impl FromScVal for Player {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        match unit_tag(val, "Player")? {
            "X" => Ok(Player::X),
            "O" => Ok(Player::O),
            other => Err(CoreError::Decode(format!("unknown Player tag '{}'", other))),
        }
    }
}

impl ToScVal for GameStatus {
    fn to_sc_val(&self) -> ScVal {
        let tag = match self {
            GameStatus::InProgress => "InProgress",
            GameStatus::XWins => "XWins",
            GameStatus::OWins => "OWins",
            GameStatus::Draw => "Draw",
            GameStatus::Claimed => "Claimed",
        };
        variant(tag, vec![])
    }
}

impl FromScVal for GameStatus {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        match unit_tag(val, "GameStatus")? {
            "InProgress" => Ok(GameStatus::InProgress),
            "XWins" => Ok(GameStatus::XWins),
            "OWins" => Ok(GameStatus::OWins),
            "Draw" => Ok(GameStatus::Draw),
            "Claimed" => Ok(GameStatus::Claimed),
            other => Err(CoreError::Decode(format!("unknown GameStatus tag '{}'", other))),
        }
    }
}

impl ToScVal for TokenType {
    fn to_sc_val(&self) -> ScVal {
        match self {
            TokenType::Native => variant("Native", vec![]),
            TokenType::Stellar(symbol) => variant("Stellar", vec![symbol.to_sc_val()]),
        }
    }
}

impl FromScVal for TokenType {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        match split_variant(val)? {
            ("Native", []) => Ok(TokenType::Native),
            ("Stellar", [symbol]) => Ok(TokenType::Stellar(Symbol::from_sc_val(symbol)?)),
            (tag, payload) => Err(CoreError::Decode(format!(
                "unknown TokenType variant '{}' with {} payload values",
                tag,
                payload.len()
            ))),
        }
    }
}

impl ToScVal for Seat {
    fn to_sc_val(&self) -> ScVal {
        symbol_val(self.as_str())
    }
}

impl FromScVal for Seat {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        let symbol = Symbol::from_sc_val(val)?;
        if symbol.as_str() == WAITING {
            Ok(Seat::Waiting)
        } else {
            Ok(Seat::Taken(symbol))
        }
    }
}

impl ToScVal for Board {
    fn to_sc_val(&self) -> ScVal {
        self.cells.to_vec().to_sc_val()
    }
}

impl FromScVal for Board {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        let cells: Vec<Option<Player>> = Vec::from_sc_val(val)?;
        let cells: [Option<Player>; BOARD_CELLS] = cells.try_into().map_err(|v: Vec<Option<Player>>| {
            CoreError::Decode(format!("board must have {} cells, got {}", BOARD_CELLS, v.len()))
        })?;
        Ok(Board { cells })
    }
}

const GAME_FIELDS: &[&str] = &["board", "current_player", "has_bet", "player_o", "player_x", "status"];

impl ToScVal for Game {
    fn to_sc_val(&self) -> ScVal {
        record(vec![
            ("board", self.board.to_sc_val()),
            ("current_player", self.current_player.to_sc_val()),
            ("has_bet", self.has_bet.to_sc_val()),
            ("player_o", self.player_o.to_sc_val()),
            ("player_x", self.player_x.to_sc_val()),
            ("status", self.status.to_sc_val()),
        ])
    }
}

impl FromScVal for Game {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        let f = RecordFields::parse("Game", val, GAME_FIELDS)?;
        Ok(Game {
            board: f.get("board")?,
            current_player: f.get("current_player")?,
            player_x: f.get("player_x")?,
            player_o: f.get("player_o")?,
            status: f.get("status")?,
            has_bet: f.get("has_bet")?,
        })
    }
}

const GAME_BET_FIELDS: &[&str] = &[
    "amount",
    "player_o_claimed",
    "player_o_paid",
    "player_x_claimed",
    "player_x_paid",
    "rewards_claimed",
    "token_type",
];

impl ToScVal for GameBet {
    fn to_sc_val(&self) -> ScVal {
        record(vec![
            ("amount", self.amount.to_sc_val()),
            ("player_o_claimed", self.player_o_claimed.to_sc_val()),
            ("player_o_paid", self.player_o_paid.to_sc_val()),
            ("player_x_claimed", self.player_x_claimed.to_sc_val()),
            ("player_x_paid", self.player_x_paid.to_sc_val()),
            ("rewards_claimed", self.rewards_claimed.to_sc_val()),
            ("token_type", self.token_type.to_sc_val()),
        ])
    }
}

impl FromScVal for GameBet {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        let f = RecordFields::parse("GameBet", val, GAME_BET_FIELDS)?;
        Ok(GameBet {
            amount: f.get("amount")?,
            token_type: f.get("token_type")?,
            player_x_paid: f.get("player_x_paid")?,
            player_o_paid: f.get("player_o_paid")?,
            rewards_claimed: f.get("rewards_claimed")?,
            player_x_claimed: f.get("player_x_claimed")?,
            player_o_claimed: f.get("player_o_claimed")?,
        })
    }
}

const GAME_INFO_FIELDS: &[&str] = &[
    "bet_amount",
    "bet_token_native",
    "bet_token_symbol",
    "has_bet",
    "id",
    "player_o",
    "player_x",
    "status",
];

impl ToScVal for GameInfo {
    fn to_sc_val(&self) -> ScVal {
        record(vec![
            ("bet_amount", self.bet_amount.to_sc_val()),
            ("bet_token_native", self.bet_token_native.to_sc_val()),
            ("bet_token_symbol", self.bet_token_symbol.to_sc_val()),
            ("has_bet", self.has_bet.to_sc_val()),
            ("id", self.id.to_sc_val()),
            ("player_o", self.player_o.to_sc_val()),
            ("player_x", self.player_x.to_sc_val()),
            ("status", self.status.to_sc_val()),
        ])
    }
}

impl FromScVal for GameInfo {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        let f = RecordFields::parse("GameInfo", val, GAME_INFO_FIELDS)?;
        Ok(GameInfo {
            id: f.get("id")?,
            player_x: f.get("player_x")?,
            player_o: f.get("player_o")?,
            status: f.get("status")?,
            has_bet: f.get("has_bet")?,
            bet_amount: f.get("bet_amount")?,
            bet_token_native: f.get("bet_token_native")?,
            bet_token_symbol: f.get("bet_token_symbol")?,
        })
    }
}

impl ToScVal for UserBalance {
    fn to_sc_val(&self) -> ScVal {
        record(vec![
            ("native", self.native.to_sc_val()),
            ("tokens", self.tokens.to_sc_val()),
        ])
    }
}

impl FromScVal for UserBalance {
    fn from_sc_val(val: &ScVal) -> DecodeResult<Self> {
        let f = RecordFields::parse("UserBalance", val, &["native", "tokens"])?;
        Ok(UserBalance {
            native: f.get("native")?,
            tokens: f.get("tokens")?,
        })
    }
}
