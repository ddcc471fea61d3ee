//! Preset loading and saving
//!
//! Presets live in YAML files. Loading a missing or malformed file is an
//! error (unlike app config, a preset has no sensible default to fall back
//! to); saving creates parent directories as needed.

use super::TreePreset;
use std::path::Path;

/// Errors from preset file operations.
#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("Failed to read preset: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse preset: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Load a preset from a YAML file.
pub fn load_preset(path: &Path) -> Result<TreePreset, PresetError> {
    log::info!("load_preset: Loading from {:?}", path);

    let contents = std::fs::read_to_string(path)?;
    let preset = serde_yaml::from_str(&contents)?;

    log::info!("load_preset: Successfully loaded preset from {:?}", path);
    Ok(preset)
}

/// Save a preset to a YAML file, creating parent directories if needed.
pub fn save_preset(preset: &TreePreset, path: &Path) -> Result<(), PresetError> {
    log::info!("save_preset: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let yaml = serde_yaml::to_string(preset)?;
    std::fs::write(path, yaml)?;

    log::info!("save_preset: Preset saved successfully");
    Ok(())
}
