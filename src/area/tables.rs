//! Readers for the two static reference tables, plus bundled copies.
//!
//! Area table (tab-separated, BLS `cu.area` cleaned so every city row reads
//! `"City1-City2,  ST"`):
//!
//! ```text
//! area_code   area_name                         display_level  selectable  sort_sequence
//! 0110        New England                       1              T           3
//! ...
//! S37A        Dallas-Fort Worth-Arlington,  TX  2              T           60
//! ```
//!
//! The first nine data rows are the census divisions; everything after is a
//! city cluster.

use super::directory::{AreaDirectory, RawAreaRow, RowLevel};
use super::divisions::StateDivisionIndex;
use super::types::{AreaError, StateDivision};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Number of leading division-level rows in the area table.
pub const DIVISION_ROW_COUNT: usize = 9;

const AREA_TABLE: &str = "area table";
const CENSUS_TABLE: &str = "census division table";

const BUNDLED_AREAS: &str = include_str!("../../data/cu_area.tsv");
const BUNDLED_CENSUS: &str = include_str!("../../data/census_divisions.csv");

/// Parse the tab-separated area table into raw rows.
pub fn read_area_rows<R: Read>(reader: R) -> Result<Vec<RawAreaRow>, AreaError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|source| AreaError::Read { table: AREA_TABLE, source })?
        .clone();
    let code_idx = column(&headers, "area_code", AREA_TABLE)?;
    let name_idx = column(&headers, "area_name", AREA_TABLE)?;

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result.map_err(|source| AreaError::Read { table: AREA_TABLE, source })?;
        let level = if i < DIVISION_ROW_COUNT { RowLevel::Division } else { RowLevel::City };
        rows.push(RawAreaRow {
            line: line_of(&record, i),
            level,
            area_code: field(&record, code_idx),
            area_name: field(&record, name_idx),
        });
    }
    Ok(rows)
}

/// Parse the comma-separated state → division table.
pub fn read_state_divisions<R: Read>(reader: R) -> Result<Vec<StateDivision>, AreaError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|source| AreaError::Read { table: CENSUS_TABLE, source })?
        .clone();
    let state_idx = column(&headers, "State Code", CENSUS_TABLE)?;
    let division_idx = column(&headers, "Division", CENSUS_TABLE)?;

    let mut out = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result.map_err(|source| AreaError::Read { table: CENSUS_TABLE, source })?;
        let line = line_of(&record, i);
        let state_code = field(&record, state_idx)
            .ok_or_else(|| AreaError::malformed(CENSUS_TABLE, line, "missing State Code"))?;
        let division_name = field(&record, division_idx)
            .ok_or_else(|| AreaError::malformed(CENSUS_TABLE, line, "missing Division"))?;
        out.push(StateDivision { state_code, division_name });
    }
    Ok(out)
}

/// Load the area directory from `path`, or the bundled table when `None`.
pub fn load_area_directory(path: Option<&Path>) -> Result<AreaDirectory, AreaError> {
    let rows = match path {
        Some(p) => {
            info!("Loading area table from {}", p.display());
            read_area_rows(open(p, AREA_TABLE)?)?
        }
        None => read_area_rows(BUNDLED_AREAS.as_bytes())?,
    };
    let dir = AreaDirectory::build(&rows)?;
    info!("Loaded {} city keys from {} area rows", dir.len(), rows.len());
    Ok(dir)
}

/// Load the state → division index from `path`, or the bundled table when `None`.
pub fn load_state_divisions(path: Option<&Path>) -> Result<StateDivisionIndex, AreaError> {
    let entries = match path {
        Some(p) => {
            info!("Loading census divisions from {}", p.display());
            read_state_divisions(open(p, CENSUS_TABLE)?)?
        }
        None => read_state_divisions(BUNDLED_CENSUS.as_bytes())?,
    };
    let idx = StateDivisionIndex::build(entries);
    info!("Loaded division mapping for {} states", idx.len());
    Ok(idx)
}

fn open(path: &Path, table: &'static str) -> Result<File, AreaError> {
    File::open(path).map_err(|e| AreaError::Read { table, source: e.into() })
}

fn column(headers: &StringRecord, name: &str, table: &'static str) -> Result<usize, AreaError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| AreaError::malformed(table, 1, format!("column '{}' not found", name)))
}

fn field(record: &StringRecord, idx: usize) -> Option<String> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn line_of(record: &StringRecord, i: usize) -> usize {
    record
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(i + 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::types::MatchPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "area_code\tarea_name\tdisplay_level\tselectable\tsort_sequence\n";

    fn divisions_tsv() -> String {
        let names = [
            "New England",
            "Middle Atlantic",
            "East North Central",
            "West North Central",
            "South Atlantic",
            "East South Central",
            "West South Central",
            "Mountain",
            "Pacific",
        ];
        names
            .iter()
            .enumerate()
            .map(|(i, n)| format!("0{}\t{}\t1\tT\t{}\n", 100 + i, n, i))
            .collect()
    }

    #[test]
    fn test_read_area_rows_levels_and_lines() {
        let tsv = format!("{}{}S49D\tSeattle-Tacoma-Bellevue,  WA\t2\tT\t83\n", HEADER, divisions_tsv());
        let rows = read_area_rows(tsv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 10);
        assert!(rows[..9].iter().all(|r| r.level == RowLevel::Division));
        assert_eq!(rows[9].level, RowLevel::City);
        assert_eq!(rows[9].line, 11);
        assert_eq!(rows[9].area_code.as_deref(), Some("S49D"));
        assert_eq!(rows[9].area_name.as_deref(), Some("Seattle-Tacoma-Bellevue,  WA"));
    }

    #[test]
    fn test_short_row_surfaces_as_malformed() {
        let tsv = format!("{}{}S49D\n", HEADER, divisions_tsv());
        let rows = read_area_rows(tsv.as_bytes()).unwrap();
        match AreaDirectory::build(&rows) {
            Err(AreaError::MalformedReferenceRow { line, .. }) => assert_eq!(line, 11),
            other => panic!("expected malformed row, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_column_is_malformed() {
        let tsv = "code\tname\nS49D\tSeattle,  WA\n";
        assert!(matches!(
            read_area_rows(tsv.as_bytes()),
            Err(AreaError::MalformedReferenceRow { line: 1, .. })
        ));
    }

    #[test]
    fn test_read_state_divisions() {
        let csv = "State,State Code,Region,Division\nOhio,OH,Midwest,East North Central\nOregon,OR,West,Pacific\n";
        let entries = read_state_divisions(csv.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].state_code, "OH");
        assert_eq!(entries[1].division_name, "Pacific");
    }

    #[test]
    fn test_state_row_missing_division() {
        let csv = "State,State Code,Region,Division\nOhio,OH,Midwest,\n";
        assert!(matches!(
            read_state_divisions(csv.as_bytes()),
            Err(AreaError::MalformedReferenceRow { line: 2, .. })
        ));
    }

    #[test]
    fn test_bundled_tables_load() {
        let dir = load_area_directory(None).unwrap();
        let idx = load_state_divisions(None).unwrap();
        assert_eq!(dir.divisions().count(), 9);
        assert_eq!(idx.len(), 51);
        let rec = dir.lookup("Pittsburgh", "PA", MatchPolicy::Strict).unwrap().unwrap();
        assert_eq!(rec.area_code, "A104");
        let rec = dir.lookup("St. Paul", "MN", MatchPolicy::Strict).unwrap().unwrap();
        assert_eq!(rec.area_code, "S24A");
        for name in idx.division_names() {
            assert!(dir.division_code(name).is_some(), "unmapped division {}", name);
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}{}A425\tPortland-Salem,  OR\t2\tT\t87\n", HEADER, divisions_tsv()).unwrap();
        let dir = load_area_directory(Some(file.path())).unwrap();
        let rec = dir.lookup("salem", "or", MatchPolicy::LastWins).unwrap().unwrap();
        assert_eq!(rec.area_code, "A425");
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_area_directory(Some(Path::new("/nonexistent/cu_area.tsv")));
        assert!(matches!(result, Err(AreaError::Read { .. })));
    }
}
