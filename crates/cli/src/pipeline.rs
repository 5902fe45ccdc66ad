//! `fieldmerge run`: load -> enrich -> merge -> deduplicate -> write.
//!
//! Both lookups are loaded before any survey file is touched, so a missing
//! species CSV or metadata sheet aborts with nothing written. Unreadable
//! survey files are skipped and reported.

use std::fmt;
use std::path::{Path, PathBuf};

use fieldmerge_io::run_log::{append_run_log, run_log_path, RunLogEntry, RUN_LOG_FILE};
use fieldmerge_io::{csv as species_csv, gpkg, xlsx};
use fieldmerge_recon::{ReconConfig, ReconError, ReconInput};

use crate::report::{FileOutcome, FileStatus, RunReport, RunStatus};

/// Everything a run needs, resolved from flags, saved settings and defaults.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub config: ReconConfig,
    pub inputs: Vec<PathBuf>,
    pub species_csv: PathBuf,
    pub metadata: PathBuf,
    pub output: PathBuf,
    pub merged_copy: Option<PathBuf>,
    pub write_run_log: bool,
}

impl RunPlan {
    /// Output layer: configured name, else the output file stem.
    pub fn output_layer(&self) -> String {
        layer_for(&self.config, &self.output)
    }
}

fn layer_for(config: &ReconConfig, path: &Path) -> String {
    if !config.output.layer.trim().is_empty() {
        return config.output.layer.trim().to_string();
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "survey".into())
}

#[derive(Debug)]
pub enum PipelineError {
    /// A required lookup, the previous output, or every input is unusable.
    FatalInput(String),
    /// Config problem only visible once data is loaded (unknown key column).
    Config(String),
    /// The output or merged copy could not be written.
    Output(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FatalInput(msg) | Self::Config(msg) | Self::Output(msg) => f.write_str(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn glob_dir(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, String> {
    let pattern = format!(
        "{}/*.{extension}",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let mut paths = glob::glob(&pattern)
        .map_err(|e| format!("bad search pattern {pattern}: {e}"))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("cannot read directory entry: {e}");
                None
            }
        })
        .filter(|p| p.is_file())
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

/// `*.gpkg` files in `dir`, sorted by name, minus anything in `exclude`.
pub fn discover_inputs(dir: &Path, exclude: &[&Path]) -> Result<Vec<PathBuf>, String> {
    if !dir.is_dir() {
        return Err(format!("input directory not found: {}", dir.display()));
    }
    Ok(glob_dir(dir, "gpkg")?
        .into_iter()
        .filter(|p| !exclude.iter().any(|e| same_file(p, e)))
        .collect())
}

/// The single submission export in `dir`. The run log and spreadsheet lock
/// files are not candidates.
pub fn discover_metadata(dir: &Path) -> Result<PathBuf, String> {
    let candidates: Vec<PathBuf> = glob_dir(dir, "xlsx")?
        .into_iter()
        .filter(|p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
            name != RUN_LOG_FILE && !name.starts_with("~$")
        })
        .collect();
    match candidates.len() {
        1 => Ok(candidates.into_iter().next().unwrap_or_default()),
        0 => Err(format!("no metadata spreadsheet (*.xlsx) in {}", dir.display())),
        n => Err(format!(
            "{n} spreadsheets in {}, expected exactly one: {}",
            dir.display(),
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

pub fn execute(plan: &RunPlan) -> Result<RunReport, PipelineError> {
    let config = &plan.config;
    let target_srs = config.output.target_srs;

    // Required lookups first.
    let species = species_csv::load_species(&plan.species_csv, &config.species).map_err(|e| {
        PipelineError::FatalInput(format!("species lookup unavailable: {e}"))
    })?;
    if !species.duplicates().is_empty() {
        log::warn!(
            "{} duplicate species code(s) in {}",
            species.duplicates().len(),
            plan.species_csv.display()
        );
    }
    if !species.incomplete().is_empty() {
        log::warn!(
            "{} species row(s) without an English name or type ignored in {}",
            species.incomplete().len(),
            plan.species_csv.display()
        );
    }
    let form = xlsx::load_metadata(&plan.metadata, &config.metadata).map_err(|e| {
        PipelineError::FatalInput(format!("metadata spreadsheet unavailable: {e}"))
    })?;

    let mut files = Vec::with_capacity(plan.inputs.len());
    let mut tables = Vec::with_capacity(plan.inputs.len());
    for path in &plan.inputs {
        let display = path.display().to_string();
        if same_file(path, &plan.output) {
            log::warn!("{display}: is the output file, not loading it as an input");
            files.push(FileOutcome::skipped(&display, "same file as the output"));
            continue;
        }
        match gpkg::read_table(path, target_srs) {
            Ok(table) => {
                log::info!("{display}: {} rows from layer '{}'", table.len(), table.layer);
                files.push(FileOutcome {
                    path: display,
                    status: FileStatus::Loaded,
                    rows: table.len(),
                    enriched_observer: None,
                    reason: None,
                });
                tables.push(table);
            }
            Err(e) => {
                log::warn!("{display}: skipped: {e}");
                files.push(FileOutcome::skipped(&display, e.to_string()));
            }
        }
    }

    if tables.is_empty() {
        return Err(PipelineError::FatalInput(if plan.inputs.is_empty() {
            "no input GeoPackages given".to_string()
        } else {
            format!("none of the {} input file(s) could be loaded", plan.inputs.len())
        }));
    }

    let existing = if config.output.merge_existing && plan.output.is_file() {
        let table = gpkg::read_table(&plan.output, target_srs).map_err(|e| {
            PipelineError::FatalInput(format!(
                "existing output {} is unreadable: {e}",
                plan.output.display()
            ))
        })?;
        Some(table)
    } else {
        None
    };
    let rows_existing = existing.as_ref().map(|t| t.len()).unwrap_or(0);

    let input = ReconInput {
        tables,
        existing,
        species,
        form,
        keep_merged: plan.merged_copy.is_some(),
    };
    let result = fieldmerge_recon::run(config, input).map_err(|e| match e {
        ReconError::UnknownKeyColumn(_) | ReconError::ConfigValidation(_) => {
            PipelineError::Config(e.to_string())
        }
        other => PipelineError::FatalInput(other.to_string()),
    })?;

    // Reports follow the order tables were loaded, which is the order of the
    // Loaded outcomes.
    let mut reports = result.reports.iter();
    for outcome in files.iter_mut().filter(|f| f.status == FileStatus::Loaded) {
        if let Some(report) = reports.next() {
            outcome.enriched_observer = report.observer.clone();
        }
    }

    gpkg::write_table(&plan.output, &result.table, &plan.output_layer()).map_err(|e| {
        PipelineError::Output(format!("cannot write {}: {e}", plan.output.display()))
    })?;

    if let (Some(copy), Some(merged)) = (&plan.merged_copy, &result.merged) {
        gpkg::write_table(copy, merged, &layer_for(config, copy)).map_err(|e| {
            PipelineError::Output(format!("cannot write merged copy {}: {e}", copy.display()))
        })?;
    }

    let skipped = files.iter().any(|f| f.status == FileStatus::Skipped);
    let report = RunReport {
        run_at: chrono::Utc::now().to_rfc3339(),
        status: if skipped { RunStatus::Partial } else { RunStatus::Ok },
        files,
        rows_in: result.summary.rows_in,
        rows_existing,
        rows_merged: result.summary.rows_merged,
        rows_removed: result.summary.duplicates_removed,
        rows_written: result.table.len(),
        output: plan.output.display().to_string(),
        merged_copy: plan.merged_copy.as_ref().map(|p| p.display().to_string()),
        species_unknown: result.summary.species_unknown.clone(),
    };

    if plan.write_run_log {
        let log_path = run_log_path(&plan.output);
        let entry = RunLogEntry {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            files_processed: report.loaded(),
            rows_merged: report.rows_merged,
            rows_saved: report.rows_written,
            note: report.note(),
        };
        if let Err(e) = append_run_log(&log_path, &entry) {
            log::warn!("run log not updated: {e}");
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldmerge_recon::model::{Column, FieldValue, Geometry, Record, SurveyTable};
    use tempfile::tempdir;

    fn point_wkb(x: f64, y: f64) -> Vec<u8> {
        let mut wkb = vec![1u8, 1, 0, 0, 0];
        wkb.extend_from_slice(&x.to_le_bytes());
        wkb.extend_from_slice(&y.to_le_bytes());
        wkb
    }

    const SPECIES: &str = "species,english_name,type\noak,English oak,tree\nash,Ash,tree\n";

    fn survey(dir: &Path, stem: &str, rows: &[(f64, &str, &str)]) -> PathBuf {
        let mut t = SurveyTable::new(stem, stem);
        t.geometry_type = "POINT".into();
        t.columns = vec![
            Column::new("species", "TEXT"),
            Column::new("observer", "TEXT"),
            Column::new("date", "TEXT"),
        ];
        t.records = rows
            .iter()
            .map(|(x, sp, obs)| Record {
                values: vec![(*sp).into(), (*obs).into(), FieldValue::Null],
                geometry: Some(Geometry {
                    srs_id: 4326,
                    envelope: None,
                    empty: false,
                    wkb: point_wkb(*x, 1.0),
                }),
            })
            .collect();
        let path = dir.join(format!("{stem}.gpkg"));
        gpkg::write_table(&path, &t, stem).unwrap();
        path
    }

    fn plan(dir: &Path, inputs: Vec<PathBuf>) -> RunPlan {
        let species = dir.join("species.csv");
        std::fs::write(&species, SPECIES).unwrap();
        let metadata = dir.join("form.csv");
        std::fs::write(
            &metadata,
            "Timestamp,Include your name here,Upload your gpkg files here\n\
             2025-06-01 09:00:00,Ada,https://drive.google.com/open?id=plotA\n",
        )
        .unwrap();
        RunPlan {
            config: ReconConfig::default(),
            inputs,
            species_csv: species,
            metadata,
            output: dir.join("out").join("combined.gpkg"),
            merged_copy: None,
            write_run_log: true,
        }
    }

    #[test]
    fn end_to_end_with_skip() {
        let dir = tempdir().unwrap();
        let a = survey(dir.path(), "plotA", &[(1.0, "oak", ""), (2.0, "ash", "")]);
        let b = survey(dir.path(), "plotB", &[(1.0, "oak", "Ada"), (3.0, "elm", "Bo")]);
        let broken = dir.path().join("broken.gpkg");
        std::fs::write(&broken, b"not sqlite").unwrap();

        let mut p = plan(dir.path(), vec![a, broken, b]);
        p.merged_copy = Some(dir.path().join("backup").join("merged.gpkg"));
        let report = execute(&p).unwrap();

        assert_eq!(report.status, RunStatus::Partial);
        assert_eq!(report.files[0].enriched_observer.as_deref(), Some("Ada"));
        assert_eq!(report.files[1].status, FileStatus::Skipped);
        assert!(report.files[2].enriched_observer.is_none());
        assert_eq!(report.rows_in, 4);
        assert_eq!(report.rows_removed, 1);
        assert_eq!(report.rows_written, 3);
        assert_eq!(report.species_unknown, vec!["elm"]);

        let out = gpkg::read_table(&p.output, 4326).unwrap();
        assert_eq!(out.layer, "combined");
        assert_eq!(out.len(), 3);
        assert_eq!(out.value(0, "date"), Some(&FieldValue::from("2025-06-01 09:00:00")));

        let merged = gpkg::read_table(p.merged_copy.as_ref().unwrap(), 4326).unwrap();
        assert_eq!(merged.len(), 4);

        assert!(run_log_path(&p.output).is_file());
    }

    #[test]
    fn missing_species_writes_nothing() {
        let dir = tempdir().unwrap();
        let a = survey(dir.path(), "plotA", &[(1.0, "oak", "")]);
        let mut p = plan(dir.path(), vec![a]);
        p.species_csv = dir.path().join("absent.csv");
        assert!(matches!(execute(&p), Err(PipelineError::FatalInput(_))));
        assert!(!p.output.exists());
        assert!(!run_log_path(&p.output).exists());
    }

    #[test]
    fn missing_metadata_writes_nothing() {
        let dir = tempdir().unwrap();
        let a = survey(dir.path(), "plotA", &[(1.0, "oak", "")]);
        let mut p = plan(dir.path(), vec![a]);
        p.metadata = dir.path().join("absent.xlsx");
        let err = execute(&p).unwrap_err();
        assert!(matches!(err, PipelineError::FatalInput(ref m) if m.contains("metadata")));
        assert!(!p.output.exists());
        assert!(!run_log_path(&p.output).exists());
    }

    #[test]
    fn layer_without_observer_and_no_form_match_still_runs() {
        let dir = tempdir().unwrap();
        let mut t = SurveyTable::new("plotZ", "plotZ");
        t.columns = vec![Column::new("species", "TEXT")];
        t.records = [1.0, 1.0, 2.0]
            .iter()
            .map(|x| Record {
                values: vec!["oak".into()],
                geometry: Some(Geometry {
                    srs_id: 4326,
                    envelope: None,
                    empty: false,
                    wkb: point_wkb(*x, 1.0),
                }),
            })
            .collect();
        let path = dir.path().join("plotZ.gpkg");
        gpkg::write_table(&path, &t, "plotZ").unwrap();

        // the form only mentions plotA
        let report = execute(&plan(dir.path(), vec![path])).unwrap();
        assert_eq!(report.rows_written, 2);
        assert!(report.files[0].enriched_observer.is_none());
    }

    #[test]
    fn second_run_folds_in_existing_output() {
        let dir = tempdir().unwrap();
        let a = survey(dir.path(), "plotA", &[(1.0, "oak", ""), (2.0, "ash", "")]);
        let p = plan(dir.path(), vec![a.clone()]);
        assert_eq!(execute(&p).unwrap().rows_written, 2);

        let c = survey(dir.path(), "plotC", &[(5.0, "oak", "Cy")]);
        let p2 = RunPlan { inputs: vec![a, c], ..p };
        let report = execute(&p2).unwrap();
        assert_eq!(report.rows_existing, 2);
        assert_eq!(report.rows_written, 3);
    }

    #[test]
    fn unknown_key_column_is_config_error() {
        let dir = tempdir().unwrap();
        let a = survey(dir.path(), "plotA", &[(1.0, "oak", "")]);
        let mut p = plan(dir.path(), vec![a]);
        p.config.dedup.key = vec!["plot_id".into()];
        assert!(matches!(execute(&p), Err(PipelineError::Config(_))));
        assert!(!p.output.exists());
    }

    #[test]
    fn discovery_skips_output_and_run_log() {
        let dir = tempdir().unwrap();
        survey(dir.path(), "b", &[(1.0, "oak", "")]);
        survey(dir.path(), "a", &[(1.0, "oak", "")]);
        let out = survey(dir.path(), "combined", &[(1.0, "oak", "")]);
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let found = discover_inputs(dir.path(), &[out.as_path()]).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.gpkg", "b.gpkg"]);

        assert!(discover_metadata(dir.path()).is_err());
        std::fs::write(dir.path().join(RUN_LOG_FILE), b"").unwrap();
        std::fs::write(dir.path().join("form.xlsx"), b"").unwrap();
        assert_eq!(discover_metadata(dir.path()).unwrap(), dir.path().join("form.xlsx"));
        std::fs::write(dir.path().join("other.xlsx"), b"").unwrap();
        assert!(discover_metadata(dir.path()).unwrap_err().contains("expected exactly one"));
    }
}
