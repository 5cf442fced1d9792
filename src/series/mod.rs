//! CPI index series: the BLS client, its wire format, and a local cache.

pub mod cache;
pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CachedSource, SeriesCache};
pub use client::{BlsClient, SeriesSource, BLS_V1_ENDPOINT, BLS_V2_ENDPOINT};
pub use types::{series_id, Observation, SeriesError, SeriesPair, YearWindow};
