//! The area directory: BLS area codes keyed by (city, state), plus the
//! division-level codes used as the fallback tier.
//!
//! A city-level row such as `"Dallas-Fort Worth-Arlington,  TX"` registers
//! one index entry per hyphen-separated city, all pointing at the same record.

use super::types::{AreaError, AreaRecord, DivisionAreaCode, MatchPolicy};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

const TABLE: &str = "area table";

/// Whether a raw row describes a census division or a city cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLevel {
    Division,
    City,
}

/// An unvalidated row of the area table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAreaRow {
    /// 1-based line in the source table (for error reporting).
    pub line: usize,
    pub level: RowLevel,
    pub area_code: Option<String>,
    pub area_name: Option<String>,
}

impl RawAreaRow {
    pub fn city(line: usize, area_code: &str, area_name: &str) -> Self {
        Self {
            line,
            level: RowLevel::City,
            area_code: Some(area_code.to_string()),
            area_name: Some(area_name.to_string()),
        }
    }

    pub fn division(line: usize, area_code: &str, area_name: &str) -> Self {
        Self {
            line,
            level: RowLevel::Division,
            area_code: Some(area_code.to_string()),
            area_name: Some(area_name.to_string()),
        }
    }
}

/// A city entry for the public area listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityArea {
    pub city: String,
    pub state: String,
    pub area_code: String,
}

/// Immutable lookup structure built once from the area table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaDirectory {
    records: Vec<AreaRecord>,
    /// (CITY, STATE) → record indices in load order.
    index: HashMap<(String, String), Vec<usize>>,
    /// Uppercased division name → division code.
    divisions: HashMap<String, DivisionAreaCode>,
}

impl AreaDirectory {
    /// Build the directory from raw rows, failing on the first malformed row.
    pub fn build(rows: &[RawAreaRow]) -> Result<Self, AreaError> {
        let mut dir = Self::default();

        for row in rows {
            let area_code = required(row.area_code.as_deref(), row.line, "area_code")?;
            let area_name = required(row.area_name.as_deref(), row.line, "area_name")?;

            match row.level {
                RowLevel::Division => dir.insert_division(area_code, area_name),
                RowLevel::City => {
                    let (names, state) = split_location(area_name, row.line)?;
                    dir.insert_city(area_code, names, state);
                }
            }
        }

        let duplicated = dir.index.values().filter(|hits| hits.len() > 1).count();
        if duplicated > 0 {
            warn!("{} (city, state) keys appear in more than one area row", duplicated);
        }
        debug!(
            "Area directory: {} city keys, {} divisions",
            dir.index.len(),
            dir.divisions.len()
        );

        Ok(dir)
    }

    fn insert_division(&mut self, area_code: &str, name: &str) {
        let key = name.to_uppercase();
        if self.divisions.contains_key(&key) {
            warn!("Division '{}' listed twice; keeping area code {}", name, area_code);
        }
        self.records.push(AreaRecord {
            area_code: area_code.to_string(),
            canonical_city_names: BTreeSet::from([key.clone()]),
            state: String::new(),
            is_division_level: true,
        });
        self.divisions.insert(
            key,
            DivisionAreaCode {
                division_name: name.to_string(),
                area_code: area_code.to_string(),
            },
        );
    }

    fn insert_city(&mut self, area_code: &str, names: BTreeSet<String>, state: String) {
        let idx = self.records.len();
        for name in &names {
            self.index
                .entry((name.clone(), state.clone()))
                .or_default()
                .push(idx);
        }
        self.records.push(AreaRecord {
            area_code: area_code.to_string(),
            canonical_city_names: names,
            state,
            is_division_level: false,
        });
    }

    /// Exact (city, state) lookup. Inputs are case-folded before matching.
    pub fn lookup(
        &self,
        city: &str,
        state: &str,
        policy: MatchPolicy,
    ) -> Result<Option<&AreaRecord>, AreaError> {
        let key = (city.trim().to_uppercase(), state.trim().to_uppercase());
        let Some(hits) = self.index.get(&key) else {
            return Ok(None);
        };

        if policy == MatchPolicy::Strict {
            let codes: BTreeSet<&str> = hits
                .iter()
                .map(|&i| self.records[i].area_code.as_str())
                .collect();
            if codes.len() > 1 {
                return Err(AreaError::AmbiguousAreaRecord {
                    city: key.0,
                    state: key.1,
                    area_codes: codes.into_iter().map(String::from).collect(),
                });
            }
        }

        Ok(hits.last().map(|&i| &self.records[i]))
    }

    /// Area code of a census division, by display name (case-insensitive).
    pub fn division_code(&self, division_name: &str) -> Option<&DivisionAreaCode> {
        self.divisions.get(&division_name.trim().to_uppercase())
    }

    pub fn divisions(&self) -> impl Iterator<Item = &DivisionAreaCode> {
        self.divisions.values()
    }

    /// Every (city, state, code) entry, sorted by state then city.
    pub fn cities(&self) -> Vec<CityArea> {
        let mut out: Vec<CityArea> = self
            .records
            .iter()
            .filter(|r| !r.is_division_level)
            .flat_map(|r| {
                r.canonical_city_names.iter().map(move |name| CityArea {
                    city: name.clone(),
                    state: r.state.clone(),
                    area_code: r.area_code.clone(),
                })
            })
            .collect();
        out.sort_by(|a, b| (&a.state, &a.city).cmp(&(&b.state, &b.city)));
        out
    }

    /// Number of distinct (city, state) keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

fn required<'a>(value: Option<&'a str>, line: usize, field: &str) -> Result<&'a str, AreaError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AreaError::malformed(TABLE, line, format!("missing {}", field))),
    }
}

/// Split `"City1-City2,  ST"` into ({CITY1, CITY2}, "ST").
fn split_location(area_name: &str, line: usize) -> Result<(BTreeSet<String>, String), AreaError> {
    let (cluster, state) = area_name.split_once(',').ok_or_else(|| {
        AreaError::malformed(TABLE, line, format!("'{}' has no ', ST' suffix", area_name))
    })?;

    let state = state.trim().to_uppercase();
    if state.is_empty() {
        return Err(AreaError::malformed(TABLE, line, format!("'{}' has an empty state", area_name)));
    }

    let names: BTreeSet<String> = cluster
        .split('-')
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect();
    if names.is_empty() {
        return Err(AreaError::malformed(TABLE, line, format!("'{}' names no city", area_name)));
    }

    Ok((names, state))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<RawAreaRow> {
        vec![
            RawAreaRow::division(2, "0120", "Middle Atlantic"),
            RawAreaRow::division(3, "0370", "West South Central"),
            RawAreaRow::city(4, "A104", "Pittsburgh,  PA"),
            RawAreaRow::city(5, "S37A", "Dallas-Fort Worth-Arlington,  TX"),
        ]
    }

    #[test]
    fn test_build_splits_city_cluster() {
        let dir = AreaDirectory::build(&sample_rows()).unwrap();
        for city in ["Dallas", "FORT WORTH", "arlington"] {
            let rec = dir.lookup(city, "tx", MatchPolicy::Strict).unwrap().unwrap();
            assert_eq!(rec.area_code, "S37A");
            assert_eq!(rec.state, "TX");
            assert_eq!(rec.canonical_city_names.len(), 3);
        }
        assert_eq!(dir.len(), 4);
    }

    #[test]
    fn test_lookup_requires_state_match() {
        let dir = AreaDirectory::build(&sample_rows()).unwrap();
        assert!(dir.lookup("Pittsburgh", "PA", MatchPolicy::LastWins).unwrap().is_some());
        assert!(dir.lookup("Pittsburgh", "KS", MatchPolicy::LastWins).unwrap().is_none());
        assert!(dir.lookup("Pitt", "PA", MatchPolicy::LastWins).unwrap().is_none());
    }

    #[test]
    fn test_division_codes() {
        let dir = AreaDirectory::build(&sample_rows()).unwrap();
        assert_eq!(dir.division_code("Middle Atlantic").unwrap().area_code, "0120");
        assert_eq!(dir.division_code("west south central").unwrap().area_code, "0370");
        assert!(dir.division_code("Pacific").is_none());
        // Division rows are not reachable through the city index.
        assert!(dir.lookup("Middle Atlantic", "", MatchPolicy::LastWins).unwrap().is_none());
    }

    #[test]
    fn test_missing_area_code_is_malformed() {
        let mut rows = sample_rows();
        rows.push(RawAreaRow {
            line: 9,
            level: RowLevel::City,
            area_code: Some("  ".into()),
            area_name: Some("Denver,  CO".into()),
        });
        match AreaDirectory::build(&rows) {
            Err(AreaError::MalformedReferenceRow { line, reason, .. }) => {
                assert_eq!(line, 9);
                assert!(reason.contains("area_code"));
            }
            other => panic!("expected malformed row, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_location_is_malformed() {
        let rows = vec![RawAreaRow {
            line: 2,
            level: RowLevel::City,
            area_code: Some("S48B".into()),
            area_name: None,
        }];
        assert!(matches!(
            AreaDirectory::build(&rows),
            Err(AreaError::MalformedReferenceRow { line: 2, .. })
        ));
    }

    #[test]
    fn test_location_without_state_is_malformed() {
        let rows = vec![RawAreaRow::city(7, "S48B", "Denver-Aurora")];
        assert!(matches!(
            AreaDirectory::build(&rows),
            Err(AreaError::MalformedReferenceRow { line: 7, .. })
        ));

        let rows = vec![RawAreaRow::city(8, "S48B", "Denver,   ")];
        assert!(matches!(
            AreaDirectory::build(&rows),
            Err(AreaError::MalformedReferenceRow { line: 8, .. })
        ));
    }

    #[test]
    fn test_empty_city_cluster_is_malformed() {
        let rows = vec![RawAreaRow::city(3, "S48B", " - ,  CO")];
        match AreaDirectory::build(&rows) {
            Err(AreaError::MalformedReferenceRow { reason, .. }) => {
                assert!(reason.contains("names no city"));
            }
            other => panic!("expected malformed row, got {:?}", other),
        }
    }

    // Duplicate keys resolve to the last loaded row unless strict.
    #[test]
    fn test_duplicate_key_last_wins() {
        let mut rows = sample_rows();
        rows.push(RawAreaRow::city(6, "X999", "Arlington,  TX"));
        let dir = AreaDirectory::build(&rows).unwrap();
        let rec = dir.lookup("Arlington", "TX", MatchPolicy::LastWins).unwrap().unwrap();
        assert_eq!(rec.area_code, "X999");
        // Other aliases of the first row are untouched.
        let rec = dir.lookup("Dallas", "TX", MatchPolicy::LastWins).unwrap().unwrap();
        assert_eq!(rec.area_code, "S37A");
    }

    #[test]
    fn test_duplicate_key_strict_fails() {
        let mut rows = sample_rows();
        rows.push(RawAreaRow::city(6, "X999", "Arlington,  TX"));
        let dir = AreaDirectory::build(&rows).unwrap();
        match dir.lookup("arlington", "tx", MatchPolicy::Strict) {
            Err(AreaError::AmbiguousAreaRecord { city, state, area_codes }) => {
                assert_eq!(city, "ARLINGTON");
                assert_eq!(state, "TX");
                assert_eq!(area_codes, vec!["S37A".to_string(), "X999".to_string()]);
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_key_same_code_is_not_ambiguous() {
        let mut rows = sample_rows();
        rows.push(RawAreaRow::city(6, "A104", "Pittsburgh,  PA"));
        let dir = AreaDirectory::build(&rows).unwrap();
        let rec = dir.lookup("Pittsburgh", "PA", MatchPolicy::Strict).unwrap().unwrap();
        assert_eq!(rec.area_code, "A104");
    }

    #[test]
    fn test_build_is_idempotent() {
        let rows = sample_rows();
        let a = AreaDirectory::build(&rows).unwrap();
        let b = AreaDirectory::build(&rows).unwrap();
        assert_eq!(a, b);
        for (city, state) in [("Dallas", "TX"), ("Pittsburgh", "PA"), ("Nowhere", "ZZ")] {
            assert_eq!(
                a.lookup(city, state, MatchPolicy::Strict).unwrap(),
                b.lookup(city, state, MatchPolicy::Strict).unwrap()
            );
        }
    }

    #[test]
    fn test_cities_listing() {
        let dir = AreaDirectory::build(&sample_rows()).unwrap();
        let cities = dir.cities();
        assert_eq!(cities.len(), 4);
        assert_eq!(cities[0].state, "PA");
        assert_eq!(cities[1].city, "ARLINGTON");
        assert!(cities.iter().all(|c| c.area_code != "0120"));
    }
}
