use std::fmt;

/// Failure reading or writing a GeoPackage.
#[derive(Debug)]
pub enum GpkgError {
    /// Filesystem error (missing file, permissions, rename).
    Io(String),
    /// SQLite-level error.
    Sqlite(String),
    /// The file opened but has no GeoPackage metadata tables.
    NotGeoPackage(String),
    /// No table in `gpkg_contents` is a feature layer.
    NoFeatureLayer,
    /// A requested layer does not exist.
    UnknownLayer(String),
    /// The layer has no entry in `gpkg_geometry_columns`.
    MissingGeometry { layer: String },
    /// Malformed geometry blob or WKB payload.
    Geometry(String),
    /// Reprojection between these SRS ids is not available.
    UnsupportedSrs { from: i32, to: i32 },
}

impl fmt::Display for GpkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Sqlite(msg) => write!(f, "SQLite error: {msg}"),
            Self::NotGeoPackage(msg) => write!(f, "not a GeoPackage: {msg}"),
            Self::NoFeatureLayer => write!(f, "no feature layer found"),
            Self::UnknownLayer(layer) => write!(f, "layer '{layer}' not found"),
            Self::MissingGeometry { layer } => {
                write!(f, "layer '{layer}' has no geometry column")
            }
            Self::Geometry(msg) => write!(f, "bad geometry: {msg}"),
            Self::UnsupportedSrs { from, to } => {
                write!(f, "cannot reproject from EPSG:{from} to EPSG:{to}")
            }
        }
    }
}

impl std::error::Error for GpkgError {}

impl From<rusqlite::Error> for GpkgError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e.to_string())
    }
}

impl From<std::io::Error> for GpkgError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Failure reading a lookup table or writing the run log.
#[derive(Debug)]
pub enum SheetError {
    /// File missing or unreadable.
    Io { path: String, message: String },
    /// Workbook could not be parsed or has no sheets.
    Workbook { path: String, message: String },
    /// The spreadsheet has no header row.
    Empty { path: String },
    /// Headers or content do not match what the lookup expects.
    Invalid { path: String, message: String },
    /// Writing the workbook failed.
    Write { path: String, message: String },
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "cannot read {path}: {message}"),
            Self::Workbook { path, message } => write!(f, "cannot parse {path}: {message}"),
            Self::Empty { path } => write!(f, "{path}: no header row"),
            Self::Invalid { path, message } => write!(f, "{path}: {message}"),
            Self::Write { path, message } => write!(f, "cannot write {path}: {message}"),
        }
    }
}

impl std::error::Error for SheetError {}
