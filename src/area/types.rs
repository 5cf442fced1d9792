//! Core types for the area subsystem.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One city-level (or division-level) row of the BLS area table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaRecord {
    pub area_code: String,
    /// Uppercase, trimmed city aliases sharing this area code.
    pub canonical_city_names: BTreeSet<String>,
    pub state: String,
    pub is_division_level: bool,
}

/// Area code for one census division (the fallback granularity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DivisionAreaCode {
    pub division_name: String,
    pub area_code: String,
}

/// Census division membership for a single state or territory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDivision {
    pub state_code: String,
    pub division_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Granularity {
    City,
    Division,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::City => write!(f, "city"),
            Self::Division => write!(f, "division"),
        }
    }
}

/// How an area code was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolvedVia {
    ExactCityMatch,
    StateFallback,
}

/// Best-available area code for one (city, state) query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    pub area_code: String,
    pub granularity: Granularity,
    pub resolved_via: ResolvedVia,
}

impl ResolutionResult {
    pub fn city(area_code: impl Into<String>) -> Self {
        Self {
            area_code: area_code.into(),
            granularity: Granularity::City,
            resolved_via: ResolvedVia::ExactCityMatch,
        }
    }

    pub fn division(area_code: impl Into<String>) -> Self {
        Self {
            area_code: area_code.into(),
            granularity: Granularity::Division,
            resolved_via: ResolvedVia::StateFallback,
        }
    }
}

/// How duplicated (city, state) keys are treated on lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// The last-loaded matching record wins.
    #[default]
    LastWins,
    /// A key that maps to more than one distinct area code is an error.
    /// Repeated rows carrying the same code still resolve, since every
    /// match would yield the same answer.
    Strict,
}

/// Area resolution and reference-data errors.
#[derive(Debug, thiserror::Error)]
pub enum AreaError {
    #[error("Malformed reference row {line} in {table}: {reason}")]
    MalformedReferenceRow {
        table: &'static str,
        line: usize,
        reason: String,
    },

    #[error("Ambiguous area record for {city}, {state}: codes {}", .area_codes.join(", "))]
    AmbiguousAreaRecord {
        city: String,
        state: String,
        area_codes: Vec<String>,
    },

    #[error("Could not find state '{0}' in the census division data")]
    UnknownState(String),

    #[error("Division '{0}' has no area code in the area table")]
    UnmappedDivision(String),

    #[error("Failed to read {table}: {source}")]
    Read {
        table: &'static str,
        #[source]
        source: csv::Error,
    },
}

impl AreaError {
    pub(crate) fn malformed(table: &'static str, line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedReferenceRow {
            table,
            line,
            reason: reason.into(),
        }
    }
}
