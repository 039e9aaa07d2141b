//! Process-wide registry of linked units, keyed by full call-site identity.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::archive::UnitKey;
use crate::loader::{LoadedUnit, UnitValue};

/// A registered unit and its lazily created singleton instance.
pub struct RegisteredUnit<U: LoadedUnit> {
    pub unit: Arc<U>,
    pub singleton: OnceLock<UnitValue<U>>,
}

impl<U: LoadedUnit> RegisteredUnit<U> {
    pub fn new(unit: Arc<U>) -> Self {
        Self {
            unit,
            singleton: OnceLock::new(),
        }
    }
}

pub struct ProxyRegistry<U: LoadedUnit> {
    units: RwLock<HashMap<UnitKey, Arc<RegisteredUnit<U>>>>,
}

impl<U: LoadedUnit> Default for ProxyRegistry<U> {
    fn default() -> Self {
        Self {
            units: RwLock::new(HashMap::new()),
        }
    }
}

impl<U: LoadedUnit> ProxyRegistry<U> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &UnitKey) -> Option<Arc<RegisteredUnit<U>>> {
        self.units.read().get(key).cloned()
    }

    /// Register `unit` unless another thread got there first; either way,
    /// return the entry that is now registered.
    pub fn insert_if_absent(&self, key: UnitKey, unit: Arc<U>) -> Arc<RegisteredUnit<U>> {
        let mut units = self.units.write();
        units
            .entry(key)
            .or_insert_with(|| Arc::new(RegisteredUnit::new(unit)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.units.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.read().is_empty()
    }
}
