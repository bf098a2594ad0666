//! Per-run configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{defaults, limits};
use crate::error::{CaptureError, Result};
use crate::input::{AdvanceKey, InjectorKind};
use crate::region::{CaptureRegion, Point};

fn default_capture_speed() -> u64 {
    defaults::CAPTURE_SPEED_MS
}

/// Immutable settings for one capture run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSettings {
    pub top_left: Point,
    pub bottom_right: Point,
    pub total_pages: u32,
    pub file_name: String,
    /// Milliseconds to wait before each capture.
    #[serde(default = "default_capture_speed")]
    pub capture_speed: u64,
    #[serde(default)]
    pub save_path: Option<PathBuf>,
    /// Locale tag of the caller's UI. Never changes behavior.
    #[serde(default)]
    pub language: Option<String>,
}

impl CaptureSettings {
    pub fn new(region: CaptureRegion, total_pages: u32, file_name: impl Into<String>) -> Self {
        Self {
            top_left: region.top_left(),
            bottom_right: region.bottom_right(),
            total_pages,
            file_name: file_name.into(),
            capture_speed: defaults::CAPTURE_SPEED_MS,
            save_path: None,
            language: None,
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: CaptureSettings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_pages == 0 {
            return Err(CaptureError::InvalidSettings(
                "total pages must be at least 1".to_string(),
            ));
        }

        let name = self.file_name.trim();
        if name.is_empty() {
            return Err(CaptureError::InvalidSettings(
                "file name must not be empty".to_string(),
            ));
        }
        if name.contains(['/', '\\']) {
            return Err(CaptureError::InvalidSettings(format!(
                "file name '{}' must not contain path separators",
                name
            )));
        }

        self.region().map(|_| ())
    }

    pub fn region(&self) -> Result<CaptureRegion> {
        CaptureRegion::from_corners(self.top_left, self.bottom_right)
    }

    /// Wait before each capture, clamped to the configured bounds.
    pub fn capture_delay(&self) -> Duration {
        Duration::from_millis(
            self.capture_speed
                .clamp(limits::MIN_CAPTURE_SPEED_MS, limits::MAX_CAPTURE_SPEED_MS),
        )
    }

    pub fn output_dir(&self) -> PathBuf {
        self.save_path.clone().unwrap_or_else(default_save_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir().join(format!("{}.pdf", self.file_name.trim()))
    }
}

/// The platform downloads folder, or the working directory when there is none.
pub fn default_save_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Options of the surrounding driver that are not part of a run's settings.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Time given to the user to focus the target window before page 1.
    pub start_delay: Duration,
    pub staging_dir: PathBuf,
    pub advance_key: AdvanceKey,
    pub injector: InjectorKind,
    /// Ring the terminal bell on each capture.
    pub shutter_sound: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        let staging_dir = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(defaults::STAGING_DIR_NAME);

        Self {
            start_delay: Duration::from_secs(defaults::START_DELAY_SECS),
            staging_dir,
            advance_key: AdvanceKey::Right,
            injector: InjectorKind::Enigo,
            shutter_sound: false,
        }
    }
}
