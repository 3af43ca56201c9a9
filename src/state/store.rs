use std::collections::HashMap;

use super::{PersistedState, TargetState};

/// In-memory map of target name to [`TargetState`].
///
/// The run loop holds the store by `&mut` and runs one cycle at a time, so no
/// locking happens here.
#[derive(Debug, Default, Clone)]
pub struct StateStore {
    states: HashMap<String, TargetState>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&TargetState> {
        self.states.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, state: TargetState) {
        self.states.insert(name.into(), state);
    }

    pub fn all(&self) -> &HashMap<String, TargetState> {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Seeds the store from a snapshot. Restored entries replace existing ones.
    pub fn load_from(&mut self, persisted: PersistedState) {
        self.states.extend(persisted.into_records());
    }

    pub fn snapshot(&self) -> PersistedState {
        self.states
            .iter()
            .map(|(name, state)| (name.clone(), *state))
            .collect()
    }
}
