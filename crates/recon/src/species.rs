use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::config::SpeciesColumns;
use crate::error::ReconError;

const TABLE: &str = "species CSV";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeciesInfo {
    pub english_name: String,
    pub species_type: String,
}

/// Species code -> (English name, type). Codes are matched after trimming.
#[derive(Debug, Clone, Default)]
pub struct SpeciesMap {
    entries: HashMap<String, SpeciesInfo>,
    /// Codes that appeared more than once; the first row won.
    duplicates: Vec<String>,
    /// Codes whose row had a blank English name or type; not loaded.
    incomplete: Vec<String>,
}

impl SpeciesMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the code is already present or the row has a blank name
    /// or type. Returns false when the row was not stored.
    pub fn insert(&mut self, code: &str, english_name: &str, species_type: &str) -> bool {
        let code = code.trim();
        let (english_name, species_type) = (english_name.trim(), species_type.trim());
        if english_name.is_empty() || species_type.is_empty() {
            self.incomplete.push(code.to_string());
            return false;
        }
        if self.entries.contains_key(code) {
            self.duplicates.push(code.to_string());
            return false;
        }
        self.entries.insert(
            code.to_string(),
            SpeciesInfo {
                english_name: english_name.to_string(),
                species_type: species_type.to_string(),
            },
        );
        true
    }

    pub fn get(&self, code: &str) -> Option<&SpeciesInfo> {
        self.entries.get(code.trim())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    pub fn incomplete(&self) -> &[String] {
        &self.incomplete
    }

    /// Parse the species lookup CSV. Rows with a blank code are ignored.
    pub fn from_csv(csv_data: &str, columns: &SpeciesColumns) -> Result<Self, ReconError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(csv_data.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| lookup_err(e.to_string()))?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();

        let idx = |name: &str| -> Result<usize, ReconError> {
            headers.iter().position(|h| h == name).ok_or_else(|| ReconError::MissingColumn {
                table: TABLE.into(),
                column: name.into(),
            })
        };

        let code_idx = idx(&columns.code_column)?;
        let name_idx = idx(&columns.english_name_column)?;
        let type_idx = idx(&columns.type_column)?;

        let mut map = SpeciesMap::new();
        for record in reader.records() {
            let record = record.map_err(|e| lookup_err(e.to_string()))?;
            let code = record.get(code_idx).unwrap_or("");
            if code.trim().is_empty() {
                continue;
            }
            let name = record.get(name_idx).unwrap_or("");
            let kind = record.get(type_idx).unwrap_or("");
            if name.trim().is_empty() || kind.trim().is_empty() {
                log::warn!("species CSV: code '{}' has no English name or type, skipped", code.trim());
                map.incomplete.push(code.trim().to_string());
                continue;
            }
            if !map.insert(code, name, kind) {
                log::warn!("species CSV: duplicate code '{}', keeping first row", code.trim());
            }
        }

        log::info!("species CSV: {} codes loaded", map.len());
        Ok(map)
    }
}

fn lookup_err(message: String) -> ReconError {
    ReconError::Lookup {
        table: TABLE.into(),
        message,
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Shape of a species CSV, for the diagnose report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpeciesCsvStats {
    pub rows: usize,
    pub columns: Vec<String>,
    pub unique_raw: usize,
    pub duplicates_raw: usize,
    pub unique_trimmed: usize,
    pub duplicates_trimmed: usize,
    /// Trimmed codes that occur more than once, sorted.
    pub duplicate_codes: Vec<String>,
}

pub fn inspect_csv(csv_data: &str, code_column: &str) -> Result<SpeciesCsvStats, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| lookup_err(e.to_string()))?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let code_idx = columns.iter().position(|h| h == code_column).ok_or_else(|| {
        ReconError::MissingColumn {
            table: TABLE.into(),
            column: code_column.into(),
        }
    })?;

    let mut stats = SpeciesCsvStats {
        columns: columns.clone(),
        ..Default::default()
    };
    let mut raw = HashSet::new();
    let mut trimmed = HashSet::new();
    let mut repeated = HashSet::new();

    for record in reader.records() {
        let record = record.map_err(|e| lookup_err(e.to_string()))?;
        let code = record.get(code_idx).unwrap_or("");
        stats.rows += 1;
        if !raw.insert(code.to_string()) {
            stats.duplicates_raw += 1;
        }
        if !trimmed.insert(code.trim().to_string()) {
            stats.duplicates_trimmed += 1;
            repeated.insert(code.trim().to_string());
        }
    }

    stats.unique_raw = raw.len();
    stats.unique_trimmed = trimmed.len();
    stats.duplicate_codes = repeated.into_iter().collect();
    stats.duplicate_codes.sort();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
species,english_name,type
Quercus robur,English oak,tree
Bellis perennis,Common daisy,herb
";

    #[test]
    fn load_basic() {
        let map = SpeciesMap::from_csv(CSV, &SpeciesColumns::default()).unwrap();
        assert_eq!(map.len(), 2);
        let oak = map.get("Quercus robur").unwrap();
        assert_eq!(oak.english_name, "English oak");
        assert_eq!(oak.species_type, "tree");
    }

    #[test]
    fn lookup_trims_code() {
        let map = SpeciesMap::from_csv(CSV, &SpeciesColumns::default()).unwrap();
        assert!(map.get("  Bellis perennis ").is_some());
    }

    #[test]
    fn duplicate_code_first_wins() {
        let csv = "\
species,english_name,type
Quercus robur,English oak,tree
Quercus robur ,Pedunculate oak,shrub
";
        let map = SpeciesMap::from_csv(csv, &SpeciesColumns::default()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("Quercus robur").unwrap().english_name, "English oak");
        assert_eq!(map.duplicates(), &["Quercus robur".to_string()]);
    }

    #[test]
    fn column_order_does_not_matter() {
        let csv = "type,species,english_name\ntree,Fagus sylvatica,Beech\n";
        let map = SpeciesMap::from_csv(csv, &SpeciesColumns::default()).unwrap();
        assert_eq!(map.get("Fagus sylvatica").unwrap().species_type, "tree");
    }

    #[test]
    fn missing_column_is_error() {
        let csv = "species,english_name\nFagus sylvatica,Beech\n";
        let err = SpeciesMap::from_csv(csv, &SpeciesColumns::default()).unwrap_err();
        match err {
            ReconError::MissingColumn { column, .. } => assert_eq!(column, "type"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rows_without_name_or_type_are_not_loaded() {
        let csv = "species,english_name,type\noak,,tree\nash,Ash, \noak,English oak,tree\n";
        let map = SpeciesMap::from_csv(csv, &SpeciesColumns::default()).unwrap();
        assert!(map.get("ash").is_none());
        // the later complete row is the one that counts
        assert_eq!(map.get("oak").unwrap().english_name, "English oak");
        assert_eq!(map.incomplete(), ["oak", "ash"]);
        assert!(map.duplicates().is_empty());

        let mut direct = SpeciesMap::new();
        assert!(!direct.insert("elm", "Elm", ""));
        assert!(direct.is_empty());
    }

    #[test]
    fn blank_codes_skipped() {
        let csv = "species,english_name,type\n,Nothing,none\nFagus sylvatica,Beech,tree\n";
        let map = SpeciesMap::from_csv(csv, &SpeciesColumns::default()).unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn inspect_counts_whitespace_duplicates() {
        let csv = "\
species,english_name,type
Quercus robur,English oak,tree
Quercus robur ,English oak,tree
Bellis perennis,Common daisy,herb
";
        let stats = inspect_csv(csv, "species").unwrap();
        assert_eq!(stats.rows, 3);
        assert_eq!(stats.unique_raw, 3);
        assert_eq!(stats.duplicates_raw, 0);
        assert_eq!(stats.unique_trimmed, 2);
        assert_eq!(stats.duplicates_trimmed, 1);
        assert_eq!(stats.duplicate_codes, vec!["Quercus robur"]);
    }
}
