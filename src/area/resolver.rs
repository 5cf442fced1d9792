//! Area resolver — orchestrates the two-tier lookup.
//!
//! Flow:  exact (city, state) match → state's census division → UnknownState

use super::directory::AreaDirectory;
use super::divisions::StateDivisionIndex;
use super::types::{AreaError, MatchPolicy, ResolutionResult};
use std::sync::Arc;
use tracing::debug;

/// Resolves user queries against the shared, immutable reference tables.
#[derive(Debug, Clone)]
pub struct AreaResolver {
    directory: Arc<AreaDirectory>,
    divisions: Arc<StateDivisionIndex>,
    policy: MatchPolicy,
}

impl AreaResolver {
    /// Create a resolver, checking that every division named by the state
    /// index has a division-level area code.
    pub fn new(
        directory: Arc<AreaDirectory>,
        divisions: Arc<StateDivisionIndex>,
    ) -> Result<Self, AreaError> {
        if let Some(missing) = divisions
            .division_names()
            .into_iter()
            .find(|name| directory.division_code(name).is_none())
        {
            return Err(AreaError::UnmappedDivision(missing.to_string()));
        }
        Ok(Self {
            directory,
            divisions,
            policy: MatchPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn directory(&self) -> &AreaDirectory {
        &self.directory
    }

    /// Resolve a (city, state) pair to the best-available area code.
    pub fn resolve(&self, city: &str, state: &str) -> Result<ResolutionResult, AreaError> {
        // 1. City-level series
        if let Some(record) = self.directory.lookup(city, state, self.policy)? {
            debug!("{}, {} → {} (city)", city, state, record.area_code);
            return Ok(ResolutionResult::city(record.area_code.clone()));
        }

        // 2. Census division of the state
        let resolved = self.resolve_division(state)?;
        debug!("{}, {} → {} (division fallback)", city, state, resolved.area_code);
        Ok(resolved)
    }

    /// Resolve straight to the division code of `state`, skipping the city tier.
    pub fn resolve_division(&self, state: &str) -> Result<ResolutionResult, AreaError> {
        let division = self
            .divisions
            .division_of(state)
            .ok_or_else(|| AreaError::UnknownState(state.trim().to_uppercase()))?;
        let code = self
            .directory
            .division_code(division)
            .ok_or_else(|| AreaError::UnmappedDivision(division.to_string()))?;
        Ok(ResolutionResult::division(code.area_code.clone()))
    }
}
