// File I/O: GeoPackage layers, species CSV, submission spreadsheet, run log

pub mod blob;
pub mod csv;
pub mod error;
pub mod gpkg;
pub mod reproject;
pub mod run_log;
pub mod wkb;
pub mod xlsx;

pub use error::{GpkgError, SheetError};
pub use gpkg::{list_layers, read_layer, read_table, write_table, LayerInfo};
