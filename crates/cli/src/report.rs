//! Caller-visible run summary: per-file outcome plus row counts.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Loaded,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: String,
    pub status: FileStatus,
    pub rows: usize,
    /// Observer taken from the submission form, when the file matched one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enriched_observer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FileOutcome {
    pub fn skipped(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            status: FileStatus::Skipped,
            rows: 0,
            enriched_observer: None,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every input loaded.
    Ok,
    /// Output written, but some inputs were skipped.
    Partial,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_at: String,
    pub status: RunStatus,
    pub files: Vec<FileOutcome>,
    /// Rows across the newly loaded input files.
    pub rows_in: usize,
    /// Rows folded in from the previous output.
    pub rows_existing: usize,
    pub rows_merged: usize,
    pub rows_removed: usize,
    pub rows_written: usize,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_copy: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub species_unknown: Vec<String>,
}

impl RunReport {
    pub fn loaded(&self) -> usize {
        self.files.iter().filter(|f| f.status == FileStatus::Loaded).count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| f.status == FileStatus::Skipped)
    }

    /// Short outcome line for the run log.
    pub fn note(&self) -> String {
        let skipped: Vec<&str> = self
            .skipped()
            .map(|f| {
                std::path::Path::new(&f.path)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(&f.path)
            })
            .collect();
        if skipped.is_empty() {
            "ok".to_string()
        } else {
            format!("skipped {}: {}", skipped.len(), skipped.join(", "))
        }
    }

    /// Human summary to stderr.
    pub fn print_human(&self) {
        for f in &self.files {
            match f.status {
                FileStatus::Loaded => eprintln!(
                    "  loaded  {} ({} rows{})",
                    f.path,
                    f.rows,
                    f.enriched_observer
                        .as_deref()
                        .map(|o| format!(", observer {o}"))
                        .unwrap_or_default()
                ),
                FileStatus::Skipped => eprintln!(
                    "  skipped {}: {}",
                    f.path,
                    f.reason.as_deref().unwrap_or("unreadable")
                ),
            }
        }
        eprintln!(
            "{} file(s) loaded, {} skipped: {} rows in, {} existing, {} merged, {} duplicates removed, {} written to {}",
            self.loaded(),
            self.files.len() - self.loaded(),
            self.rows_in,
            self.rows_existing,
            self.rows_merged,
            self.rows_removed,
            self.rows_written,
            self.output,
        );
        if !self.species_unknown.is_empty() {
            eprintln!("unknown species codes: {}", self.species_unknown.join(", "));
        }
        if let Some(copy) = &self.merged_copy {
            eprintln!("merged copy: {copy}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(files: Vec<FileOutcome>) -> RunReport {
        RunReport {
            run_at: "2025-06-01T00:00:00Z".into(),
            status: RunStatus::Ok,
            files,
            rows_in: 0,
            rows_existing: 0,
            rows_merged: 0,
            rows_removed: 0,
            rows_written: 0,
            output: "out.gpkg".into(),
            merged_copy: None,
            species_unknown: vec![],
        }
    }

    #[test]
    fn note_names_skipped_files() {
        let loaded = FileOutcome {
            path: "/in/a.gpkg".into(),
            status: FileStatus::Loaded,
            rows: 3,
            enriched_observer: None,
            reason: None,
        };
        assert_eq!(report(vec![loaded.clone()]).note(), "ok");

        let r = report(vec![loaded, FileOutcome::skipped("/in/b.gpkg", "bad")]);
        assert_eq!(r.loaded(), 1);
        assert_eq!(r.note(), "skipped 1: b.gpkg");
    }

    #[test]
    fn json_shape() {
        let r = report(vec![FileOutcome::skipped("x.gpkg", "no feature layer found")]);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["files"][0]["status"], "skipped");
        assert_eq!(v["files"][0]["reason"], "no feature layer found");
        assert!(v.get("merged_copy").is_none());
    }
}
