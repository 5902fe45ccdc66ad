//! `fieldmerge diagnose`: inspect every file a run would touch, without
//! running it.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use fieldmerge_io::csv::inspect_species;
use fieldmerge_io::gpkg::{self, LayerInfo};
use fieldmerge_io::run_log::RUN_LOG_FILE;
use fieldmerge_io::xlsx::read_first_sheet;
use fieldmerge_recon::config::ReconConfig;
use fieldmerge_recon::species::SpeciesCsvStats;
use fieldmerge_recon::FieldValue;

pub const ERROR_LOG_FILE: &str = "error_log.txt";

const RULE: &str = "================================================================================";

/// Paths to check. Any of them may be absent.
#[derive(Debug, Clone, Default)]
pub struct DiagnoseTargets {
    pub species_csv: Option<PathBuf>,
    pub input_dir: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileFacts {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

impl FileFacts {
    fn of(path: &Path) -> Self {
        let meta = std::fs::metadata(path).ok().filter(|m| m.is_file());
        Self {
            path: path.display().to_string(),
            exists: meta.is_some(),
            size_bytes: meta.as_ref().map(|m| m.len()),
            modified: meta.and_then(|m| m.modified().ok()).map(|t| {
                chrono::DateTime::<chrono::Local>::from(t)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeciesCheck {
    pub file: FileFacts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SpeciesCsvStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpreadsheetCheck {
    pub file: FileFacts,
    pub rows: usize,
    pub columns: Vec<String>,
    pub missing_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GpkgCheck {
    pub file: FileFacts,
    pub layers: Vec<LayerInfo>,
    /// Layer a run would read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    pub rows: usize,
    pub columns: Vec<String>,
    pub unique_species: usize,
    /// Species values with leading or trailing whitespace.
    pub species_with_whitespace: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputCheck {
    pub file: FileFacts,
    pub expected_layer: String,
    pub layer_present: bool,
    pub layers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnoseReport {
    pub checked_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<SpeciesCheck>,
    pub spreadsheets: Vec<SpreadsheetCheck>,
    pub inputs: Vec<GpkgCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputCheck>,
    pub problems: Vec<String>,
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn check_species(path: &Path, config: &ReconConfig, problems: &mut Vec<String>) -> SpeciesCheck {
    let file = FileFacts::of(path);
    if !file.exists {
        problems.push(format!("species CSV not found: {}", path.display()));
        return SpeciesCheck { file, stats: None, error: None };
    }
    match inspect_species(path, &config.species.code_column) {
        Ok(stats) => {
            if stats.duplicates_trimmed > 0 {
                problems.push(format!(
                    "species CSV has {} duplicate code(s) after trimming: {}",
                    stats.duplicates_trimmed,
                    stats.duplicate_codes.join(", ")
                ));
            }
            SpeciesCheck { file, stats: Some(stats), error: None }
        }
        Err(e) => {
            problems.push(format!("species CSV unreadable: {e}"));
            SpeciesCheck { file, stats: None, error: Some(e.to_string()) }
        }
    }
}

fn check_spreadsheet(path: &Path, config: &ReconConfig, problems: &mut Vec<String>) -> SpreadsheetCheck {
    let file = FileFacts::of(path);
    let mut check = SpreadsheetCheck {
        file,
        rows: 0,
        columns: Vec::new(),
        missing_columns: Vec::new(),
        error: None,
    };
    if !check.file.exists {
        problems.push(format!("metadata spreadsheet not found: {}", path.display()));
        return check;
    }
    match read_first_sheet(path) {
        Ok(sheet) => {
            check.rows = sheet.rows.len();
            let required = [&config.metadata.link_column, &config.metadata.observer_column];
            check.missing_columns = required
                .iter()
                .filter(|c| !sheet.headers.iter().any(|h| h.trim() == c.as_str()))
                .map(|c| c.to_string())
                .collect();
            if !check.missing_columns.is_empty() {
                problems.push(format!(
                    "{}: missing column(s) {}",
                    path.display(),
                    check.missing_columns.join(", ")
                ));
            }
            check.columns = sheet.headers;
        }
        Err(e) => {
            problems.push(format!("metadata spreadsheet unreadable: {e}"));
            check.error = Some(e.to_string());
        }
    }
    check
}

fn check_gpkg(path: &Path, config: &ReconConfig, problems: &mut Vec<String>) -> GpkgCheck {
    let mut check = GpkgCheck {
        file: FileFacts::of(path),
        layers: Vec::new(),
        layer: None,
        rows: 0,
        columns: Vec::new(),
        unique_species: 0,
        species_with_whitespace: 0,
        error: None,
    };

    let layers = match gpkg::list_layers(path) {
        Ok(layers) => layers,
        Err(e) => {
            problems.push(format!("{}: {e}", path.display()));
            check.error = Some(e.to_string());
            return check;
        }
    };
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let chosen = layers
        .iter()
        .find(|l| l.name == stem)
        .or_else(|| layers.first())
        .map(|l| l.name.clone());
    check.layers = layers;

    let Some(layer) = chosen else {
        problems.push(format!("{}: no feature layer", path.display()));
        return check;
    };

    match gpkg::read_layer(path, &layer) {
        Ok(table) => {
            check.rows = table.len();
            check.columns = table.columns.iter().map(|c| c.name.clone()).collect();
            if let Some(idx) = table.column_index(&config.columns.species) {
                let mut distinct = std::collections::HashSet::new();
                for record in &table.records {
                    if let Some(FieldValue::Text(s)) = record.values.get(idx) {
                        distinct.insert(s.clone());
                        if s.trim().len() != s.len() {
                            check.species_with_whitespace += 1;
                        }
                    }
                }
                check.unique_species = distinct.len();
            }
        }
        Err(e) => {
            problems.push(format!("{}: layer '{layer}': {e}", path.display()));
            check.error = Some(e.to_string());
        }
    }
    check.layer = Some(layer);
    check
}

fn check_output(path: &Path, config: &ReconConfig, problems: &mut Vec<String>) -> OutputCheck {
    let expected_layer = if config.output.layer.trim().is_empty() {
        path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
    } else {
        config.output.layer.trim().to_string()
    };
    let mut check = OutputCheck {
        file: FileFacts::of(path),
        expected_layer,
        layer_present: false,
        layers: Vec::new(),
        rows: None,
        error: None,
    };
    if !check.file.exists {
        // First run: nothing published yet.
        return check;
    }
    match gpkg::list_layers(path) {
        Ok(layers) => {
            if let Some(layer) = layers.iter().find(|l| l.name == check.expected_layer) {
                check.layer_present = true;
                check.rows = Some(layer.feature_count);
            } else {
                problems.push(format!(
                    "{}: expected layer '{}' not found",
                    path.display(),
                    check.expected_layer
                ));
            }
            check.layers = layers.into_iter().map(|l| l.name).collect();
        }
        Err(e) => {
            problems.push(format!("{}: {e}", path.display()));
            check.error = Some(e.to_string());
        }
    }
    check
}

fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| {
                    p.is_file()
                        && p.extension()
                            .map(|e| e.eq_ignore_ascii_case(extension))
                            .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

pub fn diagnose(targets: &DiagnoseTargets, config: &ReconConfig) -> DiagnoseReport {
    let mut problems = Vec::new();

    let species = targets
        .species_csv
        .as_deref()
        .map(|p| check_species(p, config, &mut problems));

    let spreadsheet_paths: Vec<PathBuf> = match (&targets.metadata, &targets.input_dir) {
        (Some(path), _) => vec![path.clone()],
        (None, Some(dir)) => {
            let found: Vec<PathBuf> = files_with_extension(dir, "xlsx")
                .into_iter()
                .filter(|p| p.file_name().and_then(|n| n.to_str()) != Some(RUN_LOG_FILE))
                .collect();
            if found.len() != 1 {
                problems.push(format!(
                    "expected exactly one metadata spreadsheet in {}, found {}",
                    dir.display(),
                    found.len()
                ));
            }
            found
        }
        (None, None) => Vec::new(),
    };
    let spreadsheets = spreadsheet_paths
        .iter()
        .map(|p| check_spreadsheet(p, config, &mut problems))
        .collect();

    let mut inputs = Vec::new();
    if let Some(dir) = &targets.input_dir {
        if !dir.is_dir() {
            problems.push(format!("input directory not found: {}", dir.display()));
        }
        for path in files_with_extension(dir, "gpkg") {
            let is_output = targets
                .output
                .as_deref()
                .map(|o| o.file_name() == path.file_name() && o.parent() == path.parent())
                .unwrap_or(false);
            if !is_output {
                inputs.push(check_gpkg(&path, config, &mut problems));
            }
        }
    }

    let output = targets
        .output
        .as_deref()
        .map(|p| check_output(p, config, &mut problems));

    DiagnoseReport {
        checked_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        species,
        spreadsheets,
        inputs,
        output,
        problems,
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{RULE}\n{title}\n{RULE}");
}

fn facts(out: &mut String, indent: &str, f: &FileFacts) {
    let _ = writeln!(out, "{indent}File: {}", f.path);
    let _ = writeln!(out, "{indent}Exists: {}", f.exists);
    if let Some(size) = f.size_bytes {
        let _ = writeln!(out, "{indent}Size: {size} bytes");
    }
    if let Some(modified) = &f.modified {
        let _ = writeln!(out, "{indent}Last modified: {modified}");
    }
}

impl DiagnoseReport {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "fieldmerge diagnosis, {}", self.checked_at);

        if let Some(species) = &self.species {
            section(&mut out, "SPECIES CSV");
            facts(&mut out, "", &species.file);
            if let Some(s) = &species.stats {
                let _ = writeln!(out, "Rows: {}", s.rows);
                let _ = writeln!(out, "Columns: {}", s.columns.join(", "));
                let _ = writeln!(out, "Unique codes (raw): {}", s.unique_raw);
                let _ = writeln!(out, "Duplicate codes (raw): {}", s.duplicates_raw);
                let _ = writeln!(out, "Unique codes (trimmed): {}", s.unique_trimmed);
                let _ = writeln!(out, "Duplicate codes (trimmed): {}", s.duplicates_trimmed);
                if !s.duplicate_codes.is_empty() {
                    let _ = writeln!(out, "Duplicated: {}", s.duplicate_codes.join(", "));
                }
            }
            if let Some(e) = &species.error {
                let _ = writeln!(out, "ERROR: {e}");
            }
        }

        if !self.spreadsheets.is_empty() {
            section(&mut out, "METADATA SPREADSHEET");
            for s in &self.spreadsheets {
                facts(&mut out, "", &s.file);
                let _ = writeln!(out, "Rows: {}", s.rows);
                let _ = writeln!(out, "Columns: {}", s.columns.join(", "));
                if !s.missing_columns.is_empty() {
                    let _ = writeln!(out, "Missing columns: {}", s.missing_columns.join(", "));
                }
                if let Some(e) = &s.error {
                    let _ = writeln!(out, "ERROR: {e}");
                }
            }
        }

        if !self.inputs.is_empty() {
            section(&mut out, "INPUT GEOPACKAGES");
            let _ = writeln!(out, "Files found: {}", self.inputs.len());
            for g in &self.inputs {
                let _ = writeln!(out);
                facts(&mut out, "  ", &g.file);
                let names: Vec<&str> = g.layers.iter().map(|l| l.name.as_str()).collect();
                let _ = writeln!(out, "  Layers: {}", names.join(", "));
                if let Some(layer) = &g.layer {
                    let _ = writeln!(out, "  Layer read: {layer} ({} rows)", g.rows);
                    let _ = writeln!(out, "  Columns: {}", g.columns.join(", "));
                    let _ = writeln!(out, "  Unique species: {}", g.unique_species);
                    let _ = writeln!(
                        out,
                        "  Species with stray whitespace: {}",
                        g.species_with_whitespace
                    );
                }
                if let Some(e) = &g.error {
                    let _ = writeln!(out, "  ERROR: {e}");
                }
            }
        }

        if let Some(o) = &self.output {
            section(&mut out, "MAIN OUTPUT");
            facts(&mut out, "", &o.file);
            if o.file.exists {
                let _ = writeln!(out, "Layers: {}", o.layers.join(", "));
                let _ = writeln!(out, "Expected layer: {}", o.expected_layer);
                match o.rows {
                    Some(rows) => {
                        let _ = writeln!(out, "Rows: {rows}");
                    }
                    None => {
                        let _ = writeln!(out, "Expected layer not present");
                    }
                }
            }
            if let Some(e) = &o.error {
                let _ = writeln!(out, "ERROR: {e}");
            }
        }

        section(&mut out, "PROBLEMS");
        if self.problems.is_empty() {
            let _ = writeln!(out, "none");
        } else {
            for p in &self.problems {
                let _ = writeln!(out, "- {p}");
            }
        }
        out
    }
}

/// Append a timestamped block to the error log.
pub fn append_error_log(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    write!(file, "\n{RULE}\nLOG ENTRY - {stamp}\n{RULE}\n{text}\n{RULE}\n\n")
}
