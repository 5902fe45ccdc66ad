// Species lookup CSV

use std::io::Read;
use std::path::Path;

use fieldmerge_recon::config::SpeciesColumns;
use fieldmerge_recon::species::{inspect_csv, SpeciesCsvStats};
use fieldmerge_recon::SpeciesMap;

use crate::error::SheetError;

/// Read a text file as UTF-8, falling back to Windows-1252 for files saved
/// by spreadsheet tools in a Latin-1 code page.
pub fn read_file_as_utf8(path: &Path) -> Result<String, SheetError> {
    let io_err = |e: std::io::Error| SheetError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    };
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(io_err)?;

    // Try UTF-8 first; on failure, recover the buffer from the error
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            log::debug!("{}: not UTF-8, decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Load the species code -> (english name, type) map.
pub fn load_species(path: &Path, columns: &SpeciesColumns) -> Result<SpeciesMap, SheetError> {
    let content = read_file_as_utf8(path)?;
    SpeciesMap::from_csv(&content, columns).map_err(|e| SheetError::Invalid {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Row and duplicate statistics for the diagnose report.
pub fn inspect_species(path: &Path, code_column: &str) -> Result<SpeciesCsvStats, SheetError> {
    let content = read_file_as_utf8(path)?;
    inspect_csv(&content, code_column).map_err(|e| SheetError::Invalid {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
