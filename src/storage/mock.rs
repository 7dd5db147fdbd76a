// src/storage/mock.rs

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::StateStore;
use crate::engine::PlanState;

/// In-memory store. Clones share the same slot, so a test can keep one
/// handle and give another to the runtime.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<PlanState>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PlanState) -> Self {
        let store = Self::new();
        *store.slot.lock().unwrap() = Some(state);
        store
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }

    pub fn latest(&self) -> Option<PlanState> {
        self.slot.lock().unwrap().clone()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<PlanState>> {
        let slot = self.slot.lock().map_err(|e| anyhow!("state lock poisoned: {e}"))?;
        Ok(slot.clone())
    }

    fn save(&self, state: &PlanState) -> Result<()> {
        *self.slot.lock().map_err(|e| anyhow!("state lock poisoned: {e}"))? = Some(state.clone());
        *self.saves.lock().map_err(|e| anyhow!("state lock poisoned: {e}"))? += 1;
        Ok(())
    }
}
