// Background refresh loops for the lobby and the open game
use log::{debug, info};
use std::rc::Rc;
use std::time::Duration;
use tictactoe_core::wasm::BrowserSleeper;
use tictactoe_core::{run_periodic, ContractInvoker, RefreshHandle, RefreshTrigger, ViewStore};
use wasm_bindgen_futures::spawn_local;

/// Re-fetch the game list and balance every `interval` until the handle
/// is cancelled or dropped
pub fn spawn_lobby_refresh<E: ContractInvoker + 'static>(store: Rc<ViewStore<E>>, interval: Duration) -> RefreshHandle {
    let handle = RefreshHandle::new();
    let token = handle.token();
    info!("Starting lobby refresh every {:?}", interval);

    spawn_local(async move {
        let ticks = run_periodic(interval, &BrowserSleeper, &token, || {
            let store = Rc::clone(&store);
            async move {
                if let Err(e) = store.refresh_lobby(RefreshTrigger::Background).await {
                    debug!("Lobby refresh failed: {}", e);
                }
            }
        })
        .await;
        info!("Lobby refresh stopped after {} ticks", ticks);
    });
    handle
}

/// Re-fetch the open game and its bet every `interval`
pub fn spawn_game_refresh<E: ContractInvoker + 'static>(store: Rc<ViewStore<E>>, interval: Duration) -> RefreshHandle {
    let handle = RefreshHandle::new();
    let token = handle.token();
    info!("Starting game refresh every {:?}", interval);

    spawn_local(async move {
        let ticks = run_periodic(interval, &BrowserSleeper, &token, || {
            let store = Rc::clone(&store);
            async move {
                if let Err(e) = store.refresh_game(RefreshTrigger::Background).await {
                    debug!("Game refresh failed: {}", e);
                }
            }
        })
        .await;
        info!("Game refresh stopped after {} ticks", ticks);
    });
    handle
}
