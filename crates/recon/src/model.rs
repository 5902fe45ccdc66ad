use serde::Serialize;

use crate::metadata::MetadataForm;
use crate::species::SpeciesMap;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// One attribute cell. Mirrors the SQLite storage classes a GeoPackage
/// feature table can hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl FieldValue {
    /// Null, or text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Lookup form of the value: text trimmed, numbers rendered, blanks None.
    pub fn lookup_key(&self) -> Option<String> {
        match self {
            Self::Null | Self::Blob(_) => None,
            Self::Text(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            Self::Integer(i) => Some(i.to_string()),
            Self::Real(r) => Some(r.to_string()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Bounding box as stored in a GeoPackage geometry header.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Envelope {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn union(&self, other: &Envelope) -> Envelope {
        Envelope {
            min_x: self.min_x.min(other.min_x),
            max_x: self.max_x.max(other.max_x),
            min_y: self.min_y.min(other.min_y),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// A feature geometry, kept as its WKB payload.
///
/// Two geometries are the same observation location when their WKB bytes
/// are identical; the container header (envelope, flags) plays no part.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub srs_id: i32,
    pub envelope: Option<Envelope>,
    pub empty: bool,
    pub wkb: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub sql_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }
}

/// A single observation row. `values` is aligned with the owning table's
/// columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub values: Vec<FieldValue>,
    pub geometry: Option<Geometry>,
}

/// One loaded feature layer.
#[derive(Debug, Clone)]
pub struct SurveyTable {
    /// Where the table came from (file path, for reports).
    pub source: String,
    /// Key used to find this table's submission in the metadata form.
    pub join_key: String,
    pub layer: String,
    pub srs_id: i32,
    pub geometry_column: String,
    pub geometry_type: String,
    pub columns: Vec<Column>,
    pub records: Vec<Record>,
}

impl SurveyTable {
    pub fn new(source: impl Into<String>, join_key: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            join_key: join_key.into(),
            layer: String::new(),
            srs_id: 4326,
            geometry_column: "geom".into(),
            geometry_type: "GEOMETRY".into(),
            columns: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Index of `name`, appending it (Null in every row) when absent.
    pub fn ensure_column(&mut self, name: &str, sql_type: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(Column::new(name, sql_type));
        for record in &mut self.records {
            record.values.push(FieldValue::Null);
        }
        self.columns.len() - 1
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Cell value by column name, for tests and reports.
    pub fn value(&self, row: usize, column: &str) -> Option<&FieldValue> {
        let idx = self.column_index(column)?;
        self.records.get(row).and_then(|r| r.values.get(idx))
    }

    /// Union of all record envelopes.
    pub fn bounds(&self) -> Option<Envelope> {
        self.records
            .iter()
            .filter_map(|r| r.geometry.as_ref().and_then(|g| g.envelope))
            .reduce(|a, b| a.union(&b))
    }
}

// ---------------------------------------------------------------------------
// Input + Output
// ---------------------------------------------------------------------------

/// Everything one reconciliation run needs, already loaded.
pub struct ReconInput {
    /// Newly staged tables, in the order they were discovered.
    pub tables: Vec<SurveyTable>,
    /// Previously published output, folded in ahead of `tables`.
    pub existing: Option<SurveyTable>,
    pub species: SpeciesMap,
    pub form: MetadataForm,
    /// Return the merged table before deduplication as well.
    pub keep_merged: bool,
}

/// What happened to one input table during enrichment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableReport {
    pub source: String,
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observer: Option<String>,
    pub dates_filled: usize,
    pub species_resolved: usize,
    pub species_unknown: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconSummary {
    pub tables: usize,
    pub rows_in: usize,
    pub rows_merged: usize,
    pub duplicates_removed: usize,
    pub rows_out: usize,
    pub tables_with_observer: usize,
    pub species_resolved: usize,
    pub species_unknown: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReconResult {
    /// Concatenation of all enriched tables, before deduplication. Only kept
    /// when the input asked for it.
    pub merged: Option<SurveyTable>,
    /// Final deduplicated table.
    pub table: SurveyTable,
    pub summary: ReconSummary,
    pub reports: Vec<TableReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values() {
        assert!(FieldValue::Null.is_blank());
        assert!(FieldValue::from("   ").is_blank());
        assert!(!FieldValue::from("x").is_blank());
        assert!(!FieldValue::Integer(0).is_blank());
    }

    #[test]
    fn lookup_key_trims_text() {
        assert_eq!(FieldValue::from(" Quercus robur ").lookup_key().as_deref(), Some("Quercus robur"));
        assert_eq!(FieldValue::Integer(42).lookup_key().as_deref(), Some("42"));
        assert_eq!(FieldValue::Null.lookup_key(), None);
    }

    #[test]
    fn ensure_column_backfills_null() {
        let mut table = SurveyTable::new("a.gpkg", "a");
        table.columns.push(Column::new("species", "TEXT"));
        table.records.push(Record {
            values: vec!["oak".into()],
            geometry: None,
        });
        let idx = table.ensure_column("observer", "TEXT");
        assert_eq!(idx, 1);
        assert_eq!(table.records[0].values[1], FieldValue::Null);
        assert_eq!(table.ensure_column("species", "TEXT"), 0);
    }

    #[test]
    fn bounds_union() {
        let g = |x: f64, y: f64| Geometry {
            srs_id: 4326,
            envelope: Some(Envelope { min_x: x, max_x: x, min_y: y, max_y: y }),
            empty: false,
            wkb: vec![],
        };
        let mut table = SurveyTable::new("a.gpkg", "a");
        table.records.push(Record { values: vec![], geometry: Some(g(1.0, 5.0)) });
        table.records.push(Record { values: vec![], geometry: Some(g(-2.0, 3.0)) });
        table.records.push(Record { values: vec![], geometry: None });
        let b = table.bounds().unwrap();
        assert_eq!((b.min_x, b.max_x, b.min_y, b.max_y), (-2.0, 1.0, 3.0, 5.0));
    }
}
