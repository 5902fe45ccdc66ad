use serde::Deserialize;

use crate::error::ReconError;

/// SRS ids the reconciler can write (and reproject between).
pub const SUPPORTED_SRS: [i32; 2] = [4326, 3857];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Reconciliation settings. Every section has defaults, so an empty
/// document is a valid config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconConfig {
    pub columns: ColumnNames,
    pub metadata: MetadataColumns,
    pub species: SpeciesColumns,
    pub dedup: DedupConfig,
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Survey table columns
// ---------------------------------------------------------------------------

/// Attribute names inside the survey layers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnNames {
    pub species: String,
    pub english_name: String,
    pub species_type: String,
    pub observer: String,
    pub date: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            species: "species".into(),
            english_name: "english_name".into(),
            species_type: "type".into(),
            observer: "observer".into(),
            date: "date".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata form
// ---------------------------------------------------------------------------

/// Header names in the submission spreadsheet.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataColumns {
    /// Cell holding upload links (or a bare file name).
    pub link_column: String,
    pub observer_column: String,
    /// Submission date. A spreadsheet without this column simply provides no
    /// dates.
    pub date_column: String,
}

impl Default for MetadataColumns {
    fn default() -> Self {
        Self {
            link_column: "Upload your gpkg files here".into(),
            observer_column: "Include your name here".into(),
            date_column: "Timestamp".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Species lookup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeciesColumns {
    pub code_column: String,
    pub english_name_column: String,
    pub type_column: String,
    pub on_unknown: UnknownSpecies,
}

impl Default for SpeciesColumns {
    fn default() -> Self {
        Self {
            code_column: "species".into(),
            english_name_column: "english_name".into(),
            type_column: "type".into(),
            on_unknown: UnknownSpecies::default(),
        }
    }
}

/// What to do with name/type when a row's species code is not in the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownSpecies {
    /// Clear both fields.
    #[default]
    Blank,
    /// Leave whatever the surveyor entered.
    Keep,
}

// ---------------------------------------------------------------------------
// Dedup + Output
// ---------------------------------------------------------------------------

/// Name that always refers to the feature geometry in a dedup key,
/// whatever the layer calls its geometry column.
pub const GEOMETRY_KEY: &str = "geometry";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DedupConfig {
    pub key: Vec<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            key: vec![GEOMETRY_KEY.into(), "species".into(), "observer".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub target_srs: i32,
    /// Output layer name; empty means "use the output file stem".
    pub layer: String,
    /// Fold the rows of an existing output file in ahead of new inputs.
    pub merge_existing: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            target_srs: 4326,
            layer: String::new(),
            merge_existing: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.dedup.key.is_empty() {
            return Err(ReconError::ConfigValidation(
                "dedup.key must name at least one column".into(),
            ));
        }

        for (i, name) in self.dedup.key.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ReconError::ConfigValidation(
                    "dedup.key contains an empty column name".into(),
                ));
            }
            if self.dedup.key[..i].contains(name) {
                return Err(ReconError::ConfigValidation(format!(
                    "dedup.key lists '{name}' more than once"
                )));
            }
        }

        let required = [
            ("columns.species", &self.columns.species),
            ("columns.english_name", &self.columns.english_name),
            ("columns.species_type", &self.columns.species_type),
            ("columns.observer", &self.columns.observer),
            ("columns.date", &self.columns.date),
            ("metadata.link_column", &self.metadata.link_column),
            ("metadata.observer_column", &self.metadata.observer_column),
            ("species.code_column", &self.species.code_column),
            ("species.english_name_column", &self.species.english_name_column),
            ("species.type_column", &self.species.type_column),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!("{field} must not be empty")));
            }
        }

        if !SUPPORTED_SRS.contains(&self.output.target_srs) {
            return Err(ReconError::ConfigValidation(format!(
                "output.target_srs {} is not supported (expected one of {:?})",
                self.output.target_srs, SUPPORTED_SRS
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
