//! CPI Compass — cost-of-living comparison between U.S. locations.
//!
//! Resolves (city, state) pairs to BLS CPI area codes, fetches the trailing
//! three years of the all-items index for both, and reports the percentage
//! difference. Cities without their own series fall back to their census
//! division, both at resolution time and when a fetched series comes back empty.

pub mod area;
pub mod compare;
pub mod config;
pub mod series;
pub mod server;

pub use compare::{ComparisonCoordinator, ComparisonOutcome, ComparisonRequest};
pub use config::Settings;
