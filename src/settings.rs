//! Persisted user settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeSelectionTechnique {
    /// Every selected age is equally likely.
    EqualWeight,
    /// Ages are drawn in proportion to how long a tree spends in each phase.
    Weighted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorVariationSet {
    Vanilla,
    Custom,
    Curated,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub use_dead_model_during_winter: bool,
    #[serde(default)]
    pub disable_tree_growth: bool,
    #[serde(default = "Settings::default_age_selection")]
    pub age_selection_technique: AgeSelectionTechnique,
    #[serde(default = "Settings::default_color_set")]
    pub color_variation_set: ColorVariationSet,
    /// Folder holding `FoliageColorData/`. Palette export/import is off when unset.
    #[serde(default)]
    pub palette_dir: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Settings {
    fn default_age_selection() -> AgeSelectionTechnique {
        AgeSelectionTechnique::Weighted
    }

    fn default_color_set() -> ColorVariationSet {
        ColorVariationSet::Vanilla
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Loads settings, falling back to defaults when the file does not exist yet.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, yaml).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn reset(&mut self) {
        let palette_dir = self.palette_dir.take();
        *self = Self {
            palette_dir,
            ..Self::default()
        };
    }

    /// Turns the winter illusion off so every tracked tree gets restored and
    /// untracked, after which the mod can be removed safely.
    pub fn request_safe_removal(&mut self) {
        self.use_dead_model_during_winter = false;
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_dead_model_during_winter: false,
            disable_tree_growth: false,
            age_selection_technique: Self::default_age_selection(),
            color_variation_set: Self::default_color_set(),
            palette_dir: None,
            log_level: default_log_level(),
        }
    }
}
