// Conversions between the JS-facing strings and core types

use serde::Serialize;
use tictactoe_core::{parse_amount, CoreError, GameView, Role, Symbol, TokenType};

/// "native" (or "XLM") selects the ledger asset; anything else names a
/// deposited token.
pub fn parse_token(input: &str) -> Result<TokenType, CoreError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("native") || trimmed.eq_ignore_ascii_case("xlm") {
        return Ok(TokenType::Native);
    }
    Ok(TokenType::Stellar(Symbol::new(trimmed)?))
}

/// Amounts arrive as whole-unit decimals and must be positive
pub fn parse_stake(input: &str) -> Result<i128, CoreError> {
    let amount = parse_amount(input)?;
    if amount <= 0 {
        return Err(CoreError::Validation("Amount must be greater than zero".to_string()));
    }
    Ok(amount)
}

/// Position on the board, 0..=8
pub fn parse_position(position: u32) -> Result<u32, CoreError> {
    if position > 8 {
        return Err(CoreError::Validation(format!("Invalid position {}", position)));
    }
    Ok(position)
}

/// Game view plus the predicates the page renders from
#[derive(Debug, Serialize)]
pub struct GameSnapshot<'a> {
    #[serde(flatten)]
    pub view: &'a GameView,
    pub role: Role,
    pub is_my_turn: bool,
    pub is_finished: bool,
    pub waiting_for_opponent: bool,
    pub can_claim: bool,
    pub playable_cells: Vec<u32>,
    pub status_message: String,
}

impl<'a> GameSnapshot<'a> {
    pub fn of(view: &'a GameView) -> Self {
        Self {
            view,
            role: view.role(),
            is_my_turn: view.is_my_turn(),
            is_finished: view.is_finished(),
            waiting_for_opponent: view.waiting_for_opponent(),
            can_claim: view.can_claim(),
            playable_cells: (0..9).filter(|&p| view.can_make_move(p)).collect(),
            status_message: view.status_message(),
        }
    }
}
