// Background refresh timers

use crate::timer::{CancelToken, Sleeper};
use log::debug;
use std::future::Future;
use std::time::Duration;

/// How often each view re-fetches without user action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    pub lobby: Duration,
    pub game: Duration,
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self {
            lobby: Duration::from_secs(10),
            game: Duration::from_secs(5),
        }
    }
}

/// Run `tick` every `interval` until `cancel` fires. Returns the number of
/// ticks performed.
pub async fn run_periodic<S, F, Fut>(interval: Duration, sleeper: &S, cancel: &CancelToken, mut tick: F) -> u64
where
    S: Sleeper + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticks = 0;
    loop {
        sleeper.sleep(interval).await;
        if cancel.is_cancelled() {
            debug!("Refresh loop stopped after {} ticks", ticks);
            return ticks;
        }
        tick().await;
        ticks += 1;
    }
}

/// Owns a refresh loop's cancel token; dropping the handle stops the loop
#[derive(Debug, Default)]
pub struct RefreshHandle {
    token: CancelToken,
}

impl RefreshHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
