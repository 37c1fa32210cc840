//! Shared per-accessory property state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::value::PropertyValue;

/// Last known value of every property of one accessory.
///
/// Cloning is cheap and every clone sees the same map: synchronizers write
/// into it after a successful get, eval mappers and set templates read it.
#[derive(Debug, Clone, Default)]
pub struct PropertyState {
    values: Arc<RwLock<HashMap<String, PropertyValue>>>,
}

impl PropertyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, property: &str) -> Option<PropertyValue> {
        self.values.read().get(property).cloned()
    }

    pub fn set(&self, property: impl Into<String>, value: PropertyValue) {
        self.values.write().insert(property.into(), value);
    }

    pub fn contains(&self, property: &str) -> bool {
        self.values.read().contains_key(property)
    }

    /// Copy of the whole mapping, taken under a single read lock.
    pub fn snapshot(&self) -> HashMap<String, PropertyValue> {
        self.values.read().clone()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}
