// Tic-tac-toe client core
// Platform-agnostic contract call lifecycle, game façade and view state

pub mod codec;
pub mod error;
pub mod game_client;
pub mod models;
pub mod refresh;
pub mod rpc_client;
pub mod settings;
pub mod single_flight;
pub mod symbol;
pub mod timer;
pub mod transaction_service;
pub mod transaction_signer;
pub mod tx_builder;
pub mod view_state;

#[cfg(feature = "native")]
pub mod native;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub mod wasm;

// Re-exports
pub use codec::{decode, symbol_val, vec_val, ContractCall, FromScVal, ScVal, ToScVal};
pub use stellar_xdr::curr as xdr;
pub use error::CoreError;
pub use game_client::GameClient;
pub use models::*;
pub use refresh::{run_periodic, RefreshHandle, RefreshSchedule};
pub use rpc_client::*;
pub use settings::Settings;
pub use single_flight::{InFlightGuard, InFlightRegistry};
pub use symbol::{display_name, player_symbol_of, sanitize_player_name, Symbol, SymbolRegistry};
pub use timer::{CancelToken, Sleeper};
pub use transaction_service::*;
pub use transaction_signer::*;
pub use view_state::*;
