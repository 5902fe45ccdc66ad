// Submission spreadsheet import (xlsx, xls, xlsb, ods; csv accepted too)
//
// Only the first sheet is read. Every cell comes back as display text so the
// metadata form can treat links, names and timestamps uniformly.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate};

use fieldmerge_recon::config::MetadataColumns;
use fieldmerge_recon::MetadataForm;

use crate::csv::read_file_as_utf8;
use crate::error::SheetError;

/// Header row plus data rows, all as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetRows {
    pub sheet: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Render an Excel date serial (days since 1899-12-30) as
/// `YYYY-MM-DD HH:MM:SS`.
pub fn format_excel_datetime(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    // Round to whole seconds: serials carry float noise in the last digits.
    let secs = (millis + 500).div_euclid(1000);
    let dt = base.checked_add_signed(Duration::seconds(secs))?;
    Some(dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => format_number(*n),
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => b.to_string().to_uppercase(),
        Data::Error(_) => String::new(),
        Data::DateTime(dt) => format_excel_datetime(dt.as_f64())
            .unwrap_or_else(|| format_number(dt.as_f64())),
        Data::DateTimeIso(s) => s.replacen('T', " ", 1),
        Data::DurationIso(s) => s.clone(),
    }
}

fn read_csv_rows(path: &Path) -> Result<SheetRows, SheetError> {
    let content = read_file_as_utf8(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut all = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SheetError::Workbook {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        all.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    let mut all = all.into_iter();
    let headers = all.next().ok_or_else(|| SheetError::Empty {
        path: path.display().to_string(),
    })?;
    Ok(SheetRows {
        sheet: String::new(),
        headers: headers.iter().map(|h| h.trim_start_matches('\u{feff}').to_string()).collect(),
        rows: all.collect(),
    })
}

/// Read the first sheet of a workbook (or a CSV file) as text rows.
pub fn read_first_sheet(path: &Path) -> Result<SheetRows, SheetError> {
    let path_str = path.display().to_string();
    if !path.is_file() {
        return Err(SheetError::Io {
            path: path_str,
            message: "file not found".into(),
        });
    }

    let is_csv = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        return read_csv_rows(path);
    }

    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| SheetError::Workbook {
        path: path_str.clone(),
        message: e.to_string(),
    })?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| SheetError::Workbook {
            path: path_str.clone(),
            message: "workbook has no sheets".into(),
        })?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| SheetError::Workbook {
            path: path_str.clone(),
            message: e.to_string(),
        })?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
    let headers = rows.next().ok_or(SheetError::Empty { path: path_str })?;

    Ok(SheetRows {
        sheet,
        headers,
        rows: rows.collect(),
    })
}

/// Load the submission form: file key -> observer/date.
pub fn load_metadata(path: &Path, columns: &MetadataColumns) -> Result<MetadataForm, SheetError> {
    let sheet = read_first_sheet(path)?;
    MetadataForm::from_rows(&sheet.headers, &sheet.rows, columns).map_err(|e| {
        SheetError::Invalid {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{Format, Workbook};
    use tempfile::tempdir;

    #[test]
    fn excel_serials() {
        assert_eq!(
            format_excel_datetime(45809.385416666664).as_deref(),
            Some("2025-06-01 09:15:00")
        );
        assert_eq!(format_excel_datetime(1.0).as_deref(), Some("1899-12-31 00:00:00"));
        assert_eq!(format_excel_datetime(-1.0), None);
    }

    #[test]
    fn numbers_render_without_trailing_zero() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn reads_form_workbook() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("form.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let date = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
        sheet.write_string(0, 0, "Timestamp").unwrap();
        sheet.write_string(0, 1, "Include your name here").unwrap();
        sheet.write_string(0, 2, "Upload your gpkg files here").unwrap();
        sheet.write_number_with_format(1, 0, 45809.385416666664, &date).unwrap();
        sheet.write_string(1, 1, "Ada").unwrap();
        sheet
            .write_string(1, 2, "https://drive.google.com/open?id=plotA")
            .unwrap();
        sheet.write_number(2, 0, 7.0).unwrap();
        workbook.save(&path).unwrap();

        let rows = read_first_sheet(&path).unwrap();
        assert_eq!(rows.headers[1], "Include your name here");
        assert_eq!(rows.rows[0][0], "2025-06-01 09:15:00");
        assert_eq!(rows.rows[1][0], "7");

        let form = load_metadata(&path, &MetadataColumns::default()).unwrap();
        let sub = form.get("plotA").unwrap();
        assert_eq!(sub.observer, "Ada");
        assert_eq!(sub.date.as_deref(), Some("2025-06-01 09:15:00"));
    }

    #[test]
    fn csv_form_is_accepted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("form.csv");
        std::fs::write(
            &path,
            "Timestamp,Include your name here,Upload your gpkg files here\n\
             2025-06-02 10:00:00,Grace,plotB.gpkg\n",
        )
        .unwrap();
        let form = load_metadata(&path, &MetadataColumns::default()).unwrap();
        assert_eq!(form.get("plotB").unwrap().observer, "Grace");
    }

    #[test]
    fn missing_column_and_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("form.csv");
        std::fs::write(&path, "Timestamp,Name\n2025-06-02,Grace\n").unwrap();
        assert!(matches!(
            load_metadata(&path, &MetadataColumns::default()),
            Err(SheetError::Invalid { .. })
        ));
        assert!(matches!(
            load_metadata(&dir.path().join("nope.xlsx"), &MetadataColumns::default()),
            Err(SheetError::Io { .. })
        ));
    }

    #[test]
    fn empty_csv_has_no_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(read_first_sheet(&path), Err(SheetError::Empty { .. })));
    }
}
