//! Submission spreadsheet -> per-file observer/date metadata.
//!
//! Each form row names one or more uploaded files, either as share links
//! carrying an `id=` parameter or as a bare file name. The key extracted from
//! a row is compared against each survey file's stem.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::config::MetadataColumns;
use crate::error::ReconError;

const TABLE: &str = "metadata spreadsheet";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub observer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MetadataForm {
    entries: HashMap<String, Submission>,
    rows_read: usize,
}

fn link_pattern() -> &'static Regex {
    static LINK: OnceLock<Regex> = OnceLock::new();
    LINK.get_or_init(|| Regex::new(r"https?://[^\s,]+").expect("static regex"))
}

/// Join keys named by one link cell.
///
/// URLs contribute the value of their `id=` parameter; URLs without one are
/// ignored. A cell with no URL at all is read as a file name.
pub fn extract_keys(cell: &str) -> Vec<String> {
    let links: Vec<&str> = link_pattern().find_iter(cell).map(|m| m.as_str()).collect();

    if links.is_empty() {
        let name = cell.trim();
        if name.is_empty() {
            return Vec::new();
        }
        return vec![file_stem(name).to_string()];
    }

    links
        .iter()
        .filter_map(|link| {
            let (_, rest) = link.split_once("id=")?;
            let id = rest.split('&').next().unwrap_or("");
            (!id.is_empty()).then(|| id.to_string())
        })
        .collect()
}

/// `"abc.gpkg"` -> `"abc"`; names without an extension pass through.
fn file_stem(name: &str) -> &str {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rfind('.') {
        Some(dot) if dot > 0 => &base[..dot],
        _ => base,
    }
}

impl MetadataForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, submission: Submission) {
        self.entries.insert(key.to_string(), submission);
    }

    pub fn get(&self, key: &str) -> Option<&Submission> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of spreadsheet rows that were read (including skipped ones).
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Build from a header row plus data rows, all cells as text.
    ///
    /// Rows with no link or no observer are skipped. When several rows name
    /// the same file, the later row wins.
    pub fn from_rows(
        headers: &[String],
        rows: &[Vec<String>],
        columns: &MetadataColumns,
    ) -> Result<Self, ReconError> {
        let idx = |name: &str| headers.iter().position(|h| h.trim() == name);

        let link_idx = idx(&columns.link_column).ok_or_else(|| ReconError::MissingColumn {
            table: TABLE.into(),
            column: columns.link_column.clone(),
        })?;
        let observer_idx =
            idx(&columns.observer_column).ok_or_else(|| ReconError::MissingColumn {
                table: TABLE.into(),
                column: columns.observer_column.clone(),
            })?;
        let date_idx = idx(&columns.date_column);
        if date_idx.is_none() {
            log::debug!("{TABLE}: no '{}' column, dates will not be filled", columns.date_column);
        }

        let mut form = MetadataForm::new();
        for row in rows {
            form.rows_read += 1;
            let cell = |i: usize| row.get(i).map(|s| s.trim()).unwrap_or("");

            let links = cell(link_idx);
            let observer = cell(observer_idx);
            if links.is_empty() || observer.is_empty() {
                continue;
            }

            let date = date_idx.map(cell).filter(|d| !d.is_empty()).map(str::to_string);

            for key in extract_keys(links) {
                form.insert(
                    &key,
                    Submission {
                        observer: observer.to_string(),
                        date: date.clone(),
                    },
                );
            }
        }

        log::info!("{TABLE}: {} submissions from {} rows", form.len(), form.rows_read);
        Ok(form)
    }
}
