// Persisted settings
// Loaded from ~/.config/fieldmerge/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Overrides the settings file location (used by tests and portable installs).
pub const SETTINGS_ENV: &str = "FIELDMERGE_SETTINGS";

/// Last-used locations, so a routine run needs no arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Local folder holding the downloaded `.gpkg` files and the form export.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub species_csv: Option<PathBuf>,

    /// Consolidated GeoPackage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_gpkg: Option<PathBuf>,

    /// Where the merged, pre-deduplication copy goes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(SETTINGS_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fieldmerge");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{e}; using default settings");
                Self::default()
            }
        }
    }

    /// Parse a settings file. Lines starting with `//` are ignored.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Error reading {}: {}", path.display(), e))?;

        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str(&cleaned)
            .map_err(|e| format!("Error parsing {}: {}", path.display(), e))
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| e.to_string())?;

        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Delete the settings file. Returns whether one existed.
    pub fn clear() -> Result<bool, String> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| e.to_string())?;
        Ok(true)
    }

    /// Fill unset fields from `other`. Fields already set win.
    pub fn or(self, other: &Settings) -> Settings {
        Settings {
            input_dir: self.input_dir.or_else(|| other.input_dir.clone()),
            species_csv: self.species_csv.or_else(|| other.species_csv.clone()),
            output_gpkg: self.output_gpkg.or_else(|| other.output_gpkg.clone()),
            backup_dir: self.backup_dir.or_else(|| other.backup_dir.clone()),
        }
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            input_dir: Some(PathBuf::from("/data/uploads")),
            species_csv: Some(PathBuf::from("/data/species.csv")),
            ..Default::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);

        // unset fields are not written
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("output_gpkg"));
    }

    #[test]
    fn comments_and_unknown_keys_are_tolerated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            "// written by hand\n{\n  \"output_gpkg\": \"/srv/out.gpkg\",\n  \"theme\": \"dark\"\n}\n",
        )
        .unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.output_gpkg, Some(PathBuf::from("/srv/out.gpkg")));
        assert!(settings.input_dir.is_none());
    }

    #[test]
    fn legacy_drive_folder_key_is_dropped_on_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{\"drive_folder_id\": \"abc123\", \"species_csv\": \"/s.csv\"}").unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.species_csv, Some(PathBuf::from("/s.csv")));
        settings.save_to(&path).unwrap();
        assert!(!fs::read_to_string(&path).unwrap().contains("drive_folder_id"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Settings::load_from(&path).unwrap_err().contains("Error parsing"));
    }

    #[test]
    fn explicit_values_win_over_saved() {
        let saved = Settings {
            input_dir: Some(PathBuf::from("/saved/in")),
            output_gpkg: Some(PathBuf::from("/saved/out.gpkg")),
            ..Default::default()
        };
        let flags = Settings {
            output_gpkg: Some(PathBuf::from("/flag/out.gpkg")),
            ..Default::default()
        };
        let merged = flags.or(&saved);
        assert_eq!(merged.input_dir, Some(PathBuf::from("/saved/in")));
        assert_eq!(merged.output_gpkg, Some(PathBuf::from("/flag/out.gpkg")));
    }
}
