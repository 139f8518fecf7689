//! Storefront-side state: the session identity cache and the locally
//! persisted shopping cart. The UI shell only renders; the state machines
//! and their storage contracts live here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub mod cart;
pub mod session;

/// Browser local/session storage seam. The cart uses a durable (local)
/// store; the session uses a tab-scoped one so identity does not survive
/// browser close.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory store for tests and native shells. Clones share the same map,
/// which lets a test model a "reload" by handing the store to a fresh state
/// machine.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().expect("store poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.inner
            .lock()
            .expect("store poisoned")
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.inner.lock().expect("store poisoned").remove(key);
    }
}
