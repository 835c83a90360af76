// At most one in-flight call per logical action

use crate::error::CoreError;
use log::debug;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, or `None` if a call for it is already running
    pub fn try_acquire(&self, key: &str) -> Option<InFlightGuard> {
        let mut keys = match self.keys.lock() {
            Ok(keys) => keys,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !keys.insert(key.to_string()) {
            debug!("Action {} already in flight", key);
            return None;
        }
        Some(InFlightGuard { key: key.to_string(), keys: Arc::clone(&self.keys) })
    }

    /// Like `try_acquire` but reports a held key as `ActionInFlight`
    pub fn acquire(&self, key: &str) -> Result<InFlightGuard, CoreError> {
        self.try_acquire(key)
            .ok_or_else(|| CoreError::ActionInFlight(key.to_string()))
    }

    pub fn is_held(&self, key: &str) -> bool {
        match self.keys.lock() {
            Ok(keys) => keys.contains(key),
            Err(poisoned) => poisoned.into_inner().contains(key),
        }
    }
}

/// Releases its key when dropped
#[derive(Debug)]
pub struct InFlightGuard {
    key: String,
    keys: Arc<Mutex<HashSet<String>>>,
}

impl InFlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut keys = match self.keys.lock() {
            Ok(keys) => keys,
            Err(poisoned) => poisoned.into_inner(),
        };
        keys.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_rejected_until_drop() {
        let registry = InFlightRegistry::new();
        let guard = registry.try_acquire("make_move:1").unwrap();
        assert_eq!(guard.key(), "make_move:1");
        assert!(registry.try_acquire("make_move:1").is_none());
        assert!(matches!(registry.acquire("make_move:1"), Err(CoreError::ActionInFlight(_))));

        // unrelated actions run independently
        assert!(registry.try_acquire("make_move:2").is_some());

        drop(guard);
        assert!(!registry.is_held("make_move:1"));
        assert!(registry.try_acquire("make_move:1").is_some());
    }
}
