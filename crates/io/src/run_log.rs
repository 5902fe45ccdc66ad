// Run history workbook (log.xlsx)
//
// One row per run, appended. The workbook is small, so appending means read
// every existing row with calamine and write the whole sheet back out.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Workbook, XlsxError};

use crate::error::SheetError;

pub const RUN_LOG_FILE: &str = "log.xlsx";
pub const RUN_LOG_COLUMNS: [&str; 5] = [
    "timestamp",
    "files_processed",
    "total_gpkg_rows_merged",
    "final_rows_saved",
    "note",
];

#[derive(Debug, Clone, PartialEq)]
pub struct RunLogEntry {
    pub timestamp: String,
    pub files_processed: usize,
    pub rows_merged: usize,
    pub rows_saved: usize,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq)]
enum LogCell {
    Text(String),
    Number(f64),
}

/// `log.xlsx` in the output file's directory.
pub fn run_log_path(output: &Path) -> PathBuf {
    output
        .parent()
        .map(|p| p.join(RUN_LOG_FILE))
        .unwrap_or_else(|| PathBuf::from(RUN_LOG_FILE))
}

fn read_existing(path: &Path) -> Result<Vec<Vec<LogCell>>, SheetError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| SheetError::Workbook {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let range = workbook.worksheet_range(&sheet).map_err(|e| SheetError::Workbook {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    Ok(range
        .rows()
        .skip(1) // header
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::Float(n) => LogCell::Number(*n),
                    Data::Int(n) => LogCell::Number(*n as f64),
                    Data::Empty => LogCell::Text(String::new()),
                    other => LogCell::Text(other.to_string()),
                })
                .collect()
        })
        .collect())
}

fn write_all(path: &Path, rows: &[Vec<LogCell>]) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, name) in RUN_LOG_COLUMNS.iter().enumerate() {
        sheet.write_string(0, col as u16, *name)?;
    }
    for (r, row) in rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            match cell {
                LogCell::Text(s) if s.is_empty() => {}
                LogCell::Text(s) => {
                    sheet.write_string(r, c as u16, s)?;
                }
                LogCell::Number(n) => {
                    sheet.write_number(r, c as u16, *n)?;
                }
            }
        }
    }
    sheet.set_column_width(0, 20)?;
    workbook.save(path)
}

/// Append one entry, creating the workbook on first use.
pub fn append_run_log(path: &Path, entry: &RunLogEntry) -> Result<(), SheetError> {
    let mut rows = if path.is_file() {
        read_existing(path)?
    } else {
        Vec::new()
    };
    rows.push(vec![
        LogCell::Text(entry.timestamp.clone()),
        LogCell::Number(entry.files_processed as f64),
        LogCell::Number(entry.rows_merged as f64),
        LogCell::Number(entry.rows_saved as f64),
        LogCell::Text(entry.note.clone()),
    ]);

    write_all(path, &rows).map_err(|e| SheetError::Write {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    log::debug!("run log {} now has {} entries", path.display(), rows.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xlsx::read_first_sheet;
    use tempfile::tempdir;

    fn entry(n: usize, note: &str) -> RunLogEntry {
        RunLogEntry {
            timestamp: format!("2025-06-0{n} 12:00:00"),
            files_processed: n,
            rows_merged: n * 10,
            rows_saved: n * 9,
            note: note.into(),
        }
    }

    #[test]
    fn log_path_sits_next_to_output() {
        assert_eq!(
            run_log_path(Path::new("/data/out/survey.gpkg")),
            PathBuf::from("/data/out/log.xlsx")
        );
    }

    #[test]
    fn appends_preserve_earlier_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(RUN_LOG_FILE);
        append_run_log(&path, &entry(1, "first")).unwrap();
        append_run_log(&path, &entry(2, "")).unwrap();
        append_run_log(&path, &entry(3, "third")).unwrap();

        let sheet = read_first_sheet(&path).unwrap();
        assert_eq!(sheet.headers, RUN_LOG_COLUMNS.to_vec());
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[0][0], "2025-06-01 12:00:00");
        assert_eq!(sheet.rows[0][4], "first");
        assert_eq!(sheet.rows[1][2], "20");
        assert_eq!(sheet.rows[2][3], "27");
        assert_eq!(sheet.rows[2][4], "third");
    }

    #[test]
    fn unreadable_log_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(RUN_LOG_FILE);
        std::fs::write(&path, b"not a workbook").unwrap();
        assert!(append_run_log(&path, &entry(1, "x")).is_err());
    }
}
