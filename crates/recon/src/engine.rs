use crate::config::ReconConfig;
use crate::dedup::dedup_table;
use crate::enrich::enrich_table;
use crate::error::ReconError;
use crate::merge::merge_tables;
use crate::model::{ReconInput, ReconResult, SurveyTable};
use crate::summary::compute_summary;

/// Run reconciliation: enrich each new table, concatenate behind any existing
/// output, drop duplicates under the configured key.
pub fn run(config: &ReconConfig, input: ReconInput) -> Result<ReconResult, ReconError> {
    config.validate()?;

    let ReconInput {
        tables,
        existing,
        species,
        form,
        keep_merged,
    } = input;

    if tables.is_empty() {
        return Err(ReconError::NoInput);
    }

    let mut ordered = Vec::with_capacity(tables.len() + 1);
    if let Some(existing) = existing {
        log::info!("folding in {} existing rows from {}", existing.len(), existing.source);
        ordered.push(existing);
    }

    let mut reports = Vec::with_capacity(tables.len());
    for mut table in tables {
        reports.push(enrich_table(&mut table, &species, &form, config));
        ordered.push(table);
    }

    let mut table = merge_tables(ordered);
    add_missing_key_columns(&mut table, config);
    let rows_merged = table.len();
    log::info!("merged {rows_merged} rows from {} table(s)", reports.len());

    let merged = keep_merged.then(|| table.clone());
    let removed = dedup_table(&mut table, &config.dedup.key)?;
    log::info!("removed {removed} duplicate rows, {} remain", table.len());

    let summary = compute_summary(&reports, rows_merged, removed);

    Ok(ReconResult {
        merged,
        table,
        summary,
        reports,
    })
}

/// A key naming one of the configured survey columns is satisfiable even when
/// no input carries it and enrichment never added it: every row is Null there.
/// Other unknown names are left for dedup to reject.
fn add_missing_key_columns(table: &mut SurveyTable, config: &ReconConfig) {
    let cols = &config.columns;
    let known = [
        &cols.species,
        &cols.english_name,
        &cols.species_type,
        &cols.observer,
        &cols.date,
    ];
    for name in &config.dedup.key {
        if table.column_index(name).is_some() || !known.contains(&name) {
            continue;
        }
        log::warn!("no input has a '{name}' column; treating it as empty for duplicate detection");
        table.ensure_column(name, "TEXT");
    }
}
