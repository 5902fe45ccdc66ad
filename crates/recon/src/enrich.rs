use std::collections::BTreeSet;

use crate::config::{ReconConfig, UnknownSpecies};
use crate::metadata::MetadataForm;
use crate::model::{FieldValue, SurveyTable, TableReport};
use crate::species::SpeciesMap;

/// Fill observer/date from the metadata form and name/type from the species
/// map, in place.
pub fn enrich_table(
    table: &mut SurveyTable,
    species: &SpeciesMap,
    form: &MetadataForm,
    config: &ReconConfig,
) -> TableReport {
    let mut report = TableReport {
        source: table.source.clone(),
        rows: table.len(),
        ..Default::default()
    };

    apply_submission(table, form, config, &mut report);
    apply_species(table, species, config, &mut report);

    report
}

fn apply_submission(
    table: &mut SurveyTable,
    form: &MetadataForm,
    config: &ReconConfig,
    report: &mut TableReport,
) {
    let Some(submission) = form.get(&table.join_key) else {
        log::info!(
            "{}: no submission for '{}', observer/date left as recorded",
            table.source,
            table.join_key
        );
        return;
    };

    let cols = &config.columns;
    if table.column_index(&cols.observer).is_none() {
        report
            .warnings
            .push(format!("no '{}' column, added one", cols.observer));
    }
    let observer_idx = table.ensure_column(&cols.observer, "TEXT");
    for record in &mut table.records {
        record.values[observer_idx] = FieldValue::Text(submission.observer.clone());
    }
    report.observer = Some(submission.observer.clone());

    if let Some(ref date) = submission.date {
        let date_idx = table.ensure_column(&cols.date, "TEXT");
        for record in &mut table.records {
            if record.values[date_idx].is_blank() {
                record.values[date_idx] = FieldValue::Text(date.clone());
                report.dates_filled += 1;
            }
        }
    }

    log::info!(
        "{}: observer set to '{}' on {} rows ({} dates filled)",
        table.source,
        submission.observer,
        table.len(),
        report.dates_filled
    );
}

fn apply_species(
    table: &mut SurveyTable,
    species: &SpeciesMap,
    config: &ReconConfig,
    report: &mut TableReport,
) {
    let cols = &config.columns;
    let Some(code_idx) = table.column_index(&cols.species) else {
        log::warn!("{}: no '{}' column, species not resolved", table.source, cols.species);
        report
            .warnings
            .push(format!("no '{}' column, species not resolved", cols.species));
        return;
    };

    let name_idx = table.ensure_column(&cols.english_name, "TEXT");
    let type_idx = table.ensure_column(&cols.species_type, "TEXT");
    let blank_unknown = config.species.on_unknown == UnknownSpecies::Blank;
    let mut unknown = BTreeSet::new();

    for record in &mut table.records {
        let code = record.values[code_idx].lookup_key();
        match code.as_deref().and_then(|c| species.get(c)) {
            Some(info) => {
                record.values[name_idx] = FieldValue::Text(info.english_name.clone());
                record.values[type_idx] = FieldValue::Text(info.species_type.clone());
                report.species_resolved += 1;
            }
            None => {
                if let Some(code) = code {
                    unknown.insert(code);
                }
                if blank_unknown {
                    record.values[name_idx] = FieldValue::Null;
                    record.values[type_idx] = FieldValue::Null;
                }
            }
        }
    }

    if !unknown.is_empty() {
        log::warn!(
            "{}: {} species code(s) not in lookup: {}",
            table.source,
            unknown.len(),
            unknown.iter().cloned().collect::<Vec<_>>().join(", ")
        );
    }
    report.species_unknown = unknown.into_iter().collect();
}
