use std::collections::BTreeSet;

use crate::model::{ReconSummary, TableReport};

/// Roll per-table reports and row counts into one summary.
pub fn compute_summary(
    reports: &[TableReport],
    rows_merged: usize,
    duplicates_removed: usize,
) -> ReconSummary {
    let mut unknown = BTreeSet::new();
    let mut rows_in = 0;
    let mut species_resolved = 0;
    let mut tables_with_observer = 0;

    for r in reports {
        rows_in += r.rows;
        species_resolved += r.species_resolved;
        if r.observer.is_some() {
            tables_with_observer += 1;
        }
        unknown.extend(r.species_unknown.iter().cloned());
    }

    ReconSummary {
        tables: reports.len(),
        rows_in,
        rows_merged,
        duplicates_removed,
        rows_out: rows_merged - duplicates_removed,
        tables_with_observer,
        species_resolved,
        species_unknown: unknown.into_iter().collect(),
    }
}
