//! `fieldmerge-recon`: survey record reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded survey tables plus the species and
//! metadata lookups, returns one enriched, deduplicated table.
//! No GeoPackage or spreadsheet IO here.

pub mod config;
pub mod dedup;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod merge;
pub mod metadata;
pub mod model;
pub mod species;
pub mod summary;

pub use config::ReconConfig;
pub use engine::run;
pub use error::ReconError;
pub use metadata::MetadataForm;
pub use model::{FieldValue, Geometry, ReconInput, ReconResult, Record, SurveyTable};
pub use species::SpeciesMap;
