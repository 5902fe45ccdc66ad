//! Error snapshots: after a fatal run, copy every input the run touched into
//! a timestamped folder together with a report, so the failure can be
//! reproduced elsewhere.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "error_report.txt";
/// Subfolder holding the survey GeoPackages.
pub const SURVEY_DIR: &str = "survey_files";

/// Files to preserve. Missing ones are noted in the report, not copied.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSources {
    pub species_csv: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
}

fn copy_into(src: &Path, dir: &Path, missing: &mut Vec<String>) -> io::Result<()> {
    let Some(name) = src.file_name() else {
        return Ok(());
    };
    if !src.is_file() {
        missing.push(src.display().to_string());
        return Ok(());
    }
    fs::copy(src, dir.join(name))?;
    Ok(())
}

/// Create `root/error_snapshot_YYYYMMDD_HHMMSS/` and fill it. Returns the
/// folder.
pub fn write_snapshot(root: &Path, sources: &SnapshotSources, report: &str) -> io::Result<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let mut folder = root.join(format!("error_snapshot_{stamp}"));
    // Two failures within a second must not share a folder.
    let mut n = 1;
    while folder.exists() {
        folder = root.join(format!("error_snapshot_{stamp}_{n}"));
        n += 1;
    }
    fs::create_dir_all(&folder)?;

    let mut missing = Vec::new();
    for path in [&sources.species_csv, &sources.metadata, &sources.output]
        .into_iter()
        .flatten()
    {
        copy_into(path, &folder, &mut missing)?;
    }
    if !sources.inputs.is_empty() {
        let survey = folder.join(SURVEY_DIR);
        fs::create_dir_all(&survey)?;
        for path in &sources.inputs {
            copy_into(path, &survey, &mut missing)?;
        }
    }

    let mut text = report.to_string();
    if !missing.is_empty() {
        text.push_str("\nNot copied (missing):\n");
        for m in &missing {
            text.push_str(&format!("- {m}\n"));
        }
    }
    fs::write(folder.join(REPORT_FILE), text)?;
    log::info!("error snapshot written to {}", folder.display());
    Ok(folder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn copies_sources_and_report() {
        let dir = tempdir().unwrap();
        let species = dir.path().join("species.csv");
        fs::write(&species, "species\noak\n").unwrap();
        let a = dir.path().join("a.gpkg");
        fs::write(&a, b"a").unwrap();

        let sources = SnapshotSources {
            species_csv: Some(species),
            metadata: Some(dir.path().join("gone.xlsx")),
            inputs: vec![a],
            output: None,
        };
        let root = dir.path().join("snaps");
        let folder = write_snapshot(&root, &sources, "boom").unwrap();

        let name = folder.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("error_snapshot_"));
        assert!(folder.join("species.csv").is_file());
        assert!(folder.join(SURVEY_DIR).join("a.gpkg").is_file());
        let report = fs::read_to_string(folder.join(REPORT_FILE)).unwrap();
        assert!(report.starts_with("boom"));
        assert!(report.contains("gone.xlsx"));

        // a second snapshot in the same second gets its own folder
        let again = write_snapshot(&root, &sources, "boom").unwrap();
        assert_ne!(folder, again);
    }
}
