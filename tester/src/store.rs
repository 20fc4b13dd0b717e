//! In-memory entity map
//!
//! Just enough storage for tests to observe that a reset empties the
//! emulator. Keys are `(kind, name)`; values are opaque JSON.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Clone, Debug, Default)]
pub struct EntityStore {
    entities: Arc<RwLock<HashMap<(String, String), Value>>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity, returning the previous value
    pub fn put(&self, kind: &str, name: &str, value: Value) -> Option<Value> {
        self.entities
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((kind.to_string(), name.to_string()), value)
    }

    pub fn get(&self, kind: &str, name: &str) -> Option<Value> {
        self.entities
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(kind.to_string(), name.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entities
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entity, returning how many were removed
    pub fn clear(&self) -> usize {
        let mut entities = self
            .entities
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let removed = entities.len();
        entities.clear();
        removed
    }
}
