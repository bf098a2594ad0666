//! Named capture regions, built in or saved by the user.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{CaptureError, Result};
use crate::region::CaptureRegion;

pub type PresetMap = BTreeMap<String, String>;

pub fn get_preset_file_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CaptureError::InvalidSettings("could not find home directory".to_string()))?;
    Ok(home.join(".pagecapture-presets.json"))
}

pub fn load_presets_from(preset_file: &Path) -> Result<PresetMap> {
    if !preset_file.exists() {
        return Ok(PresetMap::new());
    }

    let content = std::fs::read_to_string(preset_file)?;
    let presets = serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(path = %preset_file.display(), error = %e, "ignoring unreadable preset file");
        PresetMap::new()
    });

    Ok(presets)
}

pub fn save_presets_to(preset_file: &Path, presets: &PresetMap) -> Result<()> {
    let content = serde_json::to_string_pretty(presets)?;
    std::fs::write(preset_file, content)?;
    Ok(())
}

pub fn load_presets() -> Result<PresetMap> {
    load_presets_from(&get_preset_file_path()?)
}

pub fn save_presets(presets: &PresetMap) -> Result<()> {
    save_presets_to(&get_preset_file_path()?, presets)
}

pub fn get_builtin_presets() -> PresetMap {
    let mut presets = PresetMap::new();

    // Full-screen regions for common resolutions
    presets.insert("1080p".to_string(), "0,0,1920,1080".to_string());
    presets.insert("720p".to_string(), "0,0,1280,720".to_string());
    presets.insert("1440p".to_string(), "0,0,2560,1440".to_string());
    presets.insert("macbook-13".to_string(), "0,0,1440,900".to_string());

    // Centered portrait page on a 1080p screen
    presets.insert("portrait-page".to_string(), "607,23,690,1007".to_string());

    presets
}

/// Built-in presets overlaid with the ones in `preset_file`.
pub fn get_all_presets_from(preset_file: &Path) -> Result<PresetMap> {
    let mut all_presets = get_builtin_presets();
    all_presets.extend(load_presets_from(preset_file)?);
    Ok(all_presets)
}

pub fn get_all_presets() -> Result<PresetMap> {
    get_all_presets_from(&get_preset_file_path()?)
}

pub fn resolve(presets: &PresetMap, name: &str) -> Result<CaptureRegion> {
    let value = presets.get(name).ok_or_else(|| {
        CaptureError::InvalidSettings(format!(
            "preset '{}' not found; use --list-presets to see available presets",
            name
        ))
    })?;
    CaptureRegion::parse(value).ok_or_else(|| {
        CaptureError::InvalidSettings(format!("preset '{}' has invalid region '{}'", name, value))
    })
}

/// Parses `name:x,y,width,height`.
pub fn parse_preset_definition(definition: &str) -> Result<(String, CaptureRegion)> {
    let Some((name, value)) = definition.split_once(':') else {
        return Err(CaptureError::InvalidSettings(
            "invalid preset format; use name:x,y,width,height".to_string(),
        ));
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(CaptureError::InvalidSettings("preset name is empty".to_string()));
    }

    let region = CaptureRegion::parse(value.trim()).ok_or_else(|| {
        CaptureError::InvalidSettings(format!(
            "invalid crop region format: {}; use x,y,width,height",
            value.trim()
        ))
    })?;

    Ok((name.to_string(), region))
}
