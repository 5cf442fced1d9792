//! Core types for CPI index series.

use serde::{Deserialize, Serialize};
use std::fmt;

/// CPI-U, not seasonally adjusted, monthly, all items.
pub fn series_id(area_code: &str) -> String {
    format!("CUUR{}SA0", area_code)
}

/// One observed index value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub year: i32,
    /// BLS period code, e.g. "M08".
    pub period: String,
    pub value: f64,
}

/// The two series of one batched request, in request order.
/// Each series is ordered most recent first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesPair {
    pub a: Vec<Observation>,
    pub b: Vec<Observation>,
}

impl SeriesPair {
    pub fn latest_a(&self) -> Option<&Observation> {
        self.a.first()
    }

    pub fn latest_b(&self) -> Option<&Observation> {
        self.b.first()
    }
}

/// Inclusive year range of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearWindow {
    pub start: i32,
    pub end: i32,
}

impl YearWindow {
    /// Number of years looked back from the current year.
    pub const TRAILING_YEARS: i32 = 3;

    /// `[year - 3, year]`.
    pub fn trailing(year: i32) -> Self {
        Self {
            start: year - Self::TRAILING_YEARS,
            end: year,
        }
    }
}

impl fmt::Display for YearWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Remote series fetch errors.
#[derive(Debug, thiserror::Error)]
pub enum SeriesError {
    #[error("Index data service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Invalid response from index data service: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_id_pattern() {
        assert_eq!(series_id("S49D"), "CUURS49DSA0");
        assert_eq!(series_id("0120"), "CUUR0120SA0");
    }

    #[test]
    fn test_trailing_window() {
        let w = YearWindow::trailing(2026);
        assert_eq!(w, YearWindow { start: 2023, end: 2026 });
        assert_eq!(w.to_string(), "2023-2026");
    }
}
