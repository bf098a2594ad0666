//! Screen-capture permission probe.
//!
//! The driver calls [`probe_screen_capture`] before a run to surface
//! remediation instead of failing mid-run. All user-facing guidance text is
//! left to the caller; only the state and the OS deep-link commands live here.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capturer::DisplayGrabber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionState {
    Granted,
    Denied,
}

impl PermissionState {
    pub fn is_granted(self) -> bool {
        self == PermissionState::Granted
    }
}

/// Copyable shell commands that open the relevant OS privacy panes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationCommands {
    pub screen_recording: String,
    pub accessibility: String,
}

impl RemediationCommands {
    pub fn macos() -> Self {
        Self {
            screen_recording: r#"open "x-apple.systempreferences:com.apple.preference.security?Privacy_ScreenCapture""#
                .to_string(),
            accessibility: r#"open "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility""#
                .to_string(),
        }
    }

    /// Only macOS gates capture and input behind privacy panes.
    pub fn for_current_platform() -> Option<Self> {
        if cfg!(target_os = "macos") {
            Some(Self::macos())
        } else {
            None
        }
    }
}

/// Reports whether any screen can currently be captured.
///
/// Zero sources and an enumeration failure both count as denied: on the
/// platforms that gate capture, that is how a missing authorization shows up.
pub fn probe_screen_capture(grabber: &dyn DisplayGrabber) -> PermissionState {
    match grabber.source_count() {
        Ok(0) => {
            warn!("no capturable screen sources");
            PermissionState::Denied
        }
        Ok(count) => {
            debug!(count, "screen capture available");
            PermissionState::Granted
        }
        Err(e) => {
            warn!(error = %e, "screen source enumeration failed");
            PermissionState::Denied
        }
    }
}
