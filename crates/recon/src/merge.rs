use crate::model::{Column, FieldValue, Record, SurveyTable};

/// Concatenate tables in order into one table over the union of their columns.
///
/// Column order is first-seen order; the first table to declare a column fixes
/// its SQL type. Rows from tables lacking a column get Null there.
pub fn merge_tables(tables: Vec<SurveyTable>) -> SurveyTable {
    let mut merged = SurveyTable::new("merged", "");

    let Some(first) = tables.first() else {
        return merged;
    };
    merged.srs_id = first.srs_id;
    merged.geometry_column = first.geometry_column.clone();
    merged.geometry_type = first.geometry_type.clone();

    for table in &tables {
        if !table.geometry_type.eq_ignore_ascii_case(&merged.geometry_type) {
            merged.geometry_type = "GEOMETRY".into();
        }
        for column in &table.columns {
            if merged.column_index(&column.name).is_none() {
                merged.columns.push(Column::new(&column.name, &column.sql_type));
            }
        }
    }

    let total: usize = tables.iter().map(|t| t.len()).sum();
    merged.records.reserve(total);

    for table in tables {
        let mapping: Vec<usize> = table
            .columns
            .iter()
            .map(|c| merged.column_index(&c.name).unwrap_or(usize::MAX))
            .collect();

        for record in table.records {
            let mut values = vec![FieldValue::Null; merged.columns.len()];
            for (value, &target) in record.values.into_iter().zip(&mapping) {
                if let Some(slot) = values.get_mut(target) {
                    *slot = value;
                }
            }
            merged.records.push(Record {
                values,
                geometry: record.geometry,
            });
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, columns: &[&str], rows: &[&[&str]]) -> SurveyTable {
        let mut t = SurveyTable::new(format!("{name}.gpkg"), name);
        t.geometry_type = "POINT".into();
        t.columns = columns.iter().map(|c| Column::new(*c, "TEXT")).collect();
        t.records = rows
            .iter()
            .map(|r| Record {
                values: r.iter().map(|v| FieldValue::from(*v)).collect(),
                geometry: None,
            })
            .collect();
        t
    }

    #[test]
    fn union_of_columns_in_first_seen_order() {
        let a = table("a", &["species", "observer"], &[&["oak", "Ada"]]);
        let b = table("b", &["notes", "species"], &[&["wet", "ash"]]);
        let merged = merge_tables(vec![a, b]);

        let names: Vec<&str> = merged.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["species", "observer", "notes"]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.value(1, "species"), Some(&FieldValue::from("ash")));
        assert_eq!(merged.value(1, "observer"), Some(&FieldValue::Null));
        assert_eq!(merged.value(0, "notes"), Some(&FieldValue::Null));
    }

    #[test]
    fn preserves_row_order() {
        let a = table("a", &["n"], &[&["1"], &["2"]]);
        let b = table("b", &["n"], &[&["3"]]);
        let merged = merge_tables(vec![a, b]);
        let order: Vec<_> = (0..3).map(|i| merged.value(i, "n").cloned().unwrap()).collect();
        assert_eq!(order, vec!["1".into(), "2".into(), "3".into()]);
    }

    #[test]
    fn first_declaration_fixes_type() {
        let mut a = table("a", &["count"], &[]);
        a.columns[0].sql_type = "INTEGER".into();
        let mut b = table("b", &["count"], &[]);
        b.columns[0].sql_type = "REAL".into();
        let merged = merge_tables(vec![a, b]);
        assert_eq!(merged.columns[0].sql_type, "INTEGER");
    }

    #[test]
    fn mixed_geometry_types_widen() {
        let a = table("a", &[], &[]);
        let mut b = table("b", &[], &[]);
        b.geometry_type = "POLYGON".into();
        assert_eq!(merge_tables(vec![a.clone()]).geometry_type, "POINT");
        assert_eq!(merge_tables(vec![a, b]).geometry_type, "GEOMETRY");
    }

    #[test]
    fn empty_input() {
        let merged = merge_tables(Vec::new());
        assert!(merged.is_empty());
        assert!(merged.columns.is_empty());
    }
}
