// WASM bindings for the tic-tac-toe front end
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
mod convert;
#[cfg(target_arch = "wasm32")]
mod refresh;

use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
pub use app::TicTacToeApp;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

#[cfg(target_arch = "wasm32")]
mod app {
    use crate::convert::{parse_position, parse_stake, parse_token, GameSnapshot};
    use crate::refresh::{spawn_game_refresh, spawn_lobby_refresh};
    use log::info;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;
    use tictactoe_core::wasm::{wallet_for, BrowserSleeper, WasmRpcClient};
    use tictactoe_core::{
        CoreError, GameClient, RefreshHandle, RefreshTrigger, Settings, TransactionService, ViewStore, WalletKind,
        WalletSigner,
    };
    use wasm_bindgen::prelude::*;

    type BrowserService = TransactionService<WasmRpcClient, Arc<dyn WalletSigner>, BrowserSleeper>;
    type BrowserStore = ViewStore<BrowserService>;

    fn to_js(err: CoreError) -> JsValue {
        JsValue::from_str(&err.user_message())
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
        serde_json::to_string(value).map_err(|e| JsValue::from_str(&format!("Failed to serialize state: {}", e)))
    }

    /// One page session: a wallet, a view store and its refresh loops
    #[wasm_bindgen]
    pub struct TicTacToeApp {
        store: Rc<BrowserStore>,
        settings: Settings,
        lobby_refresh: RefCell<Option<RefreshHandle>>,
        game_refresh: RefCell<Option<RefreshHandle>>,
    }

    #[wasm_bindgen]
    impl TicTacToeApp {
        /// `settings_json` may be empty for testnet defaults. `wallet` is
        /// "freighter" or "lobstr".
        #[wasm_bindgen(constructor)]
        pub fn new(settings_json: &str, wallet: &str) -> Result<TicTacToeApp, JsValue> {
            let settings = if settings_json.trim().is_empty() {
                Settings::testnet()
            } else {
                Settings::from_json(settings_json).map_err(to_js)?
            };
            let kind: WalletKind = wallet.parse().map_err(to_js)?;

            let service = TransactionService::new(
                WasmRpcClient::new(settings.rpc_url.clone()),
                wallet_for(kind),
                BrowserSleeper,
                settings.lifecycle(),
            );
            let client = GameClient::new(service, wallet_for(kind));
            info!("Tic-tac-toe app created for contract {} using {}", settings.contract_id, client.wallet_name());

            Ok(Self {
                store: Rc::new(ViewStore::new(client)),
                settings,
                lobby_refresh: RefCell::new(None),
                game_refresh: RefCell::new(None),
            })
        }

        /// Connect the wallet and return the player's on-chain symbol
        #[wasm_bindgen]
        pub async fn connect(&self) -> Result<String, JsValue> {
            let store = Rc::clone(&self.store);
            let symbol = store.connect().await.map_err(to_js)?;
            Ok(symbol.as_str().to_string())
        }

        /// Symbol of the wallet's current account, without changing the view
        #[wasm_bindgen]
        pub async fn player_symbol(&self) -> Result<String, JsValue> {
            let store = Rc::clone(&self.store);
            let symbol = store.client().player_symbol().await.map_err(to_js)?;
            Ok(symbol.as_str().to_string())
        }

        #[wasm_bindgen]
        pub fn wallet_name(&self) -> String {
            self.store.client().wallet_name().to_string()
        }

        /// Load the lobby now and keep it fresh in the background
        #[wasm_bindgen]
        pub async fn start_lobby_refresh(&self) -> Result<(), JsValue> {
            let store = Rc::clone(&self.store);
            let result = store.refresh_lobby(RefreshTrigger::User).await;

            let handle = spawn_lobby_refresh(Rc::clone(&store), self.settings.refresh_schedule().lobby);
            if let Some(old) = self.lobby_refresh.borrow_mut().replace(handle) {
                old.cancel();
            }
            result.map_err(to_js)
        }

        #[wasm_bindgen]
        pub async fn refresh_lobby(&self) -> Result<(), JsValue> {
            let store = Rc::clone(&self.store);
            store.refresh_lobby(RefreshTrigger::User).await.map_err(to_js)
        }

        /// Open a game view and refresh it in the background until closed
        #[wasm_bindgen]
        pub async fn open_game(&self, id: u32) -> Result<(), JsValue> {
            if let Some(old) = self.game_refresh.borrow_mut().take() {
                old.cancel();
            }
            let store = Rc::clone(&self.store);
            let result = store.open_game(id).await;

            let handle = spawn_game_refresh(Rc::clone(&store), self.settings.refresh_schedule().game);
            *self.game_refresh.borrow_mut() = Some(handle);
            result.map_err(to_js)
        }

        #[wasm_bindgen]
        pub fn close_game(&self) {
            if let Some(handle) = self.game_refresh.borrow_mut().take() {
                handle.cancel();
            }
            self.store.close_game();
        }

        #[wasm_bindgen]
        pub async fn refresh_game(&self) -> Result<(), JsValue> {
            let store = Rc::clone(&self.store);
            store.refresh_game(RefreshTrigger::User).await.map_err(to_js)
        }

        /// Stop every background loop and abandon writes still polling.
        /// Submitted transactions still land; only the watching stops.
        #[wasm_bindgen]
        pub fn stop(&self) {
            for slot in [&self.lobby_refresh, &self.game_refresh] {
                if let Some(handle) = slot.borrow_mut().take() {
                    handle.cancel();
                }
            }
            self.store.teardown();
            info!("Background refresh stopped");
        }

        #[wasm_bindgen]
        pub async fn create_game(&self) -> Result<u32, JsValue> {
            let store = Rc::clone(&self.store);
            store.create_game().await.map_err(to_js)
        }

        /// `amount` is a whole-unit decimal such as "1.5"
        #[wasm_bindgen]
        pub async fn create_game_with_bet(&self, amount: &str, token: &str) -> Result<u32, JsValue> {
            let amount = parse_stake(amount).map_err(to_js)?;
            let token = parse_token(token).map_err(to_js)?;
            let store = Rc::clone(&self.store);
            store.create_game_with_bet(amount, &token).await.map_err(to_js)
        }

        #[wasm_bindgen]
        pub async fn join_game(&self, id: u32) -> Result<(), JsValue> {
            let store = Rc::clone(&self.store);
            store.join_game(id).await.map_err(to_js)
        }

        #[wasm_bindgen]
        pub async fn make_move(&self, position: u32) -> Result<(), JsValue> {
            let position = parse_position(position).map_err(to_js)?;
            let store = Rc::clone(&self.store);
            store.make_move(position).await.map_err(to_js)
        }

        #[wasm_bindgen]
        pub async fn claim_rewards(&self) -> Result<(), JsValue> {
            let store = Rc::clone(&self.store);
            store.claim_rewards().await.map_err(to_js)
        }

        #[wasm_bindgen]
        pub async fn deposit(&self, amount: &str, token: &str) -> Result<(), JsValue> {
            let amount = parse_stake(amount).map_err(to_js)?;
            let token = parse_token(token).map_err(to_js)?;
            let store = Rc::clone(&self.store);
            store.deposit(&token, amount).await.map_err(to_js)
        }

        #[wasm_bindgen]
        pub async fn withdraw(&self, amount: &str, token: &str) -> Result<(), JsValue> {
            let amount = parse_stake(amount).map_err(to_js)?;
            let token = parse_token(token).map_err(to_js)?;
            let store = Rc::clone(&self.store);
            store.withdraw(&token, amount).await.map_err(to_js)
        }

        /// Whole view state (lobby, open game, per-action status) as JSON
        #[wasm_bindgen]
        pub fn state_json(&self) -> Result<String, JsValue> {
            to_json(&self.store.snapshot())
        }

        #[wasm_bindgen]
        pub fn lobby_json(&self) -> Result<String, JsValue> {
            to_json(&self.store.snapshot().lobby)
        }

        /// Open game with its derived predicates, or "null"
        #[wasm_bindgen]
        pub fn game_json(&self) -> Result<String, JsValue> {
            let state = self.store.snapshot();
            match state.game.as_ref() {
                Some(view) => to_json(&GameSnapshot::of(view)),
                None => Ok("null".to_string()),
            }
        }

        #[wasm_bindgen]
        pub fn get_settings(&self) -> Result<String, JsValue> {
            to_json(&self.settings)
        }
    }

    impl Drop for TicTacToeApp {
        fn drop(&mut self) {
            self.stop();
        }
    }
}
