//! Action key type and process-wide action registry.
//!
//! Action keys are plain strings at the storage boundary but wrapped in a
//! dedicated type at the API boundary so they cannot be confused with page
//! ids. The registry is an explicitly-owned service (held by `AppState`,
//! passed by reference) rather than ambient global state: every check call
//! site registers the key it is about to evaluate, so the admin screen can
//! enumerate every action that exists in the running code without a static
//! manifest. Keys are never unregistered.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use super::WILDCARD;

/// A guarded operation's name, e.g. `"schedule.edit"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionKey(String);

impl ActionKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD
    }
}

impl std::fmt::Display for ActionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionKey {
    fn from(raw: &str) -> Self {
        ActionKey::new(raw)
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    seen: HashSet<String>,
    order: Vec<ActionKey>,
}

/// Append-only, deduplicated, insertion-ordered set of action keys.
/// Insertion is idempotent and safe under concurrent registration; only
/// deduplication matters for correctness, not ordering.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    inner: Mutex<RegistryInner>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, key: &ActionKey) {
        if key.is_empty() || key.is_wildcard() {
            return;
        }
        let mut inner = self.lock();
        if inner.seen.insert(key.as_str().to_string()) {
            inner.order.push(key.clone());
        }
    }

    pub fn keys(&self) -> Vec<ActionKey> {
        self.lock().order.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().order.is_empty()
    }

    /// Drop every registered key. Exists so tests can start from a clean
    /// slate; production code never calls this.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.seen.clear();
        inner.order.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_dedups_and_preserves_order() {
        let registry = ActionRegistry::new();
        registry.register(&ActionKey::new("schedule.edit"));
        registry.register(&ActionKey::new("people.edit"));
        registry.register(&ActionKey::new("schedule.edit"));

        let keys: Vec<String> = registry.keys().iter().map(|k| k.as_str().to_string()).collect();
        assert_eq!(keys, vec!["schedule.edit", "people.edit"]);
    }

    #[test]
    fn blank_and_wildcard_keys_are_not_registered() {
        let registry = ActionRegistry::new();
        registry.register(&ActionKey::new("   "));
        registry.register(&ActionKey::new("*"));
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_resets_between_tests() {
        let registry = ActionRegistry::new();
        registry.register(&ActionKey::new("email-lists.export"));
        assert_eq!(registry.len(), 1);
        registry.clear();
        assert!(registry.is_empty());
        registry.register(&ActionKey::new("email-lists.export"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn keys_are_trimmed_on_construction() {
        let key = ActionKey::new("  tutorials.edit  ");
        assert_eq!(key.as_str(), "tutorials.edit");
    }

    #[test]
    fn concurrent_registration_is_safe() {
        use std::sync::Arc;

        let registry = Arc::new(ActionRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                for n in 0..50 {
                    registry.register(&ActionKey::new(format!("action.{n}")));
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker thread");
        }
        assert_eq!(registry.len(), 50);
    }
}
