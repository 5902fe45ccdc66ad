use std::collections::HashSet;

use crate::config::GEOMETRY_KEY;
use crate::error::ReconError;
use crate::model::{FieldValue, Record, SurveyTable};

/// Hashable projection of one key cell.
///
/// Null equals Null; reals compare bitwise; integers and reals never compare
/// equal to each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyCell {
    Null,
    Integer(i64),
    Real(u64),
    Text(String),
    Bytes(Vec<u8>),
}

impl From<&FieldValue> for KeyCell {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Null => Self::Null,
            FieldValue::Integer(i) => Self::Integer(*i),
            FieldValue::Real(r) => Self::Real(r.to_bits()),
            FieldValue::Text(s) => Self::Text(s.clone()),
            FieldValue::Blob(b) => Self::Bytes(b.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum KeyPart {
    Geometry,
    Column(usize),
}

/// Resolve key names against the table. `geometry` (or the table's own
/// geometry column name) selects the feature geometry.
fn resolve_key(table: &SurveyTable, key: &[String]) -> Result<Vec<KeyPart>, ReconError> {
    key.iter()
        .map(|name| {
            if name == GEOMETRY_KEY || *name == table.geometry_column {
                Ok(KeyPart::Geometry)
            } else {
                table
                    .column_index(name)
                    .map(KeyPart::Column)
                    .ok_or_else(|| ReconError::UnknownKeyColumn(name.clone()))
            }
        })
        .collect()
}

fn key_of(record: &Record, parts: &[KeyPart]) -> Vec<KeyCell> {
    parts
        .iter()
        .map(|part| match part {
            KeyPart::Geometry => match record.geometry {
                Some(ref g) => KeyCell::Bytes(g.wkb.clone()),
                None => KeyCell::Null,
            },
            KeyPart::Column(i) => record
                .values
                .get(*i)
                .map(KeyCell::from)
                .unwrap_or(KeyCell::Null),
        })
        .collect()
}

/// Drop every record whose key was already seen. Returns the number removed.
pub fn dedup_table(table: &mut SurveyTable, key: &[String]) -> Result<usize, ReconError> {
    let parts = resolve_key(table, key)?;
    let before = table.records.len();
    let mut seen: HashSet<Vec<KeyCell>> = HashSet::with_capacity(before);

    table.records.retain(|record| seen.insert(key_of(record, &parts)));

    Ok(before - table.records.len())
}
