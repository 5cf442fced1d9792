//! Area resolution subsystem.
//!
//! Loads the BLS area table and the census state → division table once,
//! then resolves (city, state) queries to CPI area codes with a
//! division-level fallback.

pub mod directory;
pub mod divisions;
pub mod resolver;
pub mod tables;
pub mod types;

pub use directory::{AreaDirectory, CityArea, RawAreaRow, RowLevel};
pub use divisions::StateDivisionIndex;
pub use resolver::AreaResolver;
pub use tables::{load_area_directory, load_state_divisions};
pub use types::{
    AreaError, AreaRecord, DivisionAreaCode, Granularity, MatchPolicy, ResolutionResult,
    ResolvedVia, StateDivision,
};
