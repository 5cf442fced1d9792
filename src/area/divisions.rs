//! State → census division index.

use super::types::StateDivision;
use std::collections::HashMap;
use tracing::warn;

/// Immutable two-letter state code → census division mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDivisionIndex {
    by_state: HashMap<String, StateDivision>,
}

impl StateDivisionIndex {
    pub fn build(entries: impl IntoIterator<Item = StateDivision>) -> Self {
        let mut by_state = HashMap::new();
        for entry in entries {
            let key = entry.state_code.trim().to_uppercase();
            let entry = StateDivision {
                state_code: key.clone(),
                division_name: entry.division_name.trim().to_string(),
            };
            if let Some(prev) = by_state.insert(key, entry) {
                warn!(
                    "State {} listed twice; '{}' replaced by a later row",
                    prev.state_code, prev.division_name
                );
            }
        }
        Self { by_state }
    }

    /// Division name for a state code (case-insensitive).
    pub fn division_of(&self, state: &str) -> Option<&str> {
        self.by_state
            .get(&state.trim().to_uppercase())
            .map(|e| e.division_name.as_str())
    }

    /// Distinct division names referenced by any state.
    pub fn division_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_state.values().map(|e| e.division_name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.by_state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_state.is_empty()
    }
}
