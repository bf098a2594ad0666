//! Synthetic "next page" key presses and cursor queries.
//!
//! The capture engine only sees [`InputInjector`]. Two backends exist:
//! [`EnigoInjector`] talks to the OS input APIs directly, [`ShellInjector`]
//! goes through the platform's scripting tool (osascript, PowerShell or
//! xdotool) for setups where direct injection is blocked.

use async_trait::async_trait;
use enigo::{Direction, Enigo, Key, Keyboard, Mouse, Settings};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{CaptureError, Result};
use crate::region::Point;

/// Key sent to the foreground application to move to its next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvanceKey {
    Right,
    PageDown,
    Space,
    Down,
}

impl AdvanceKey {
    pub fn parse(key_type: &str) -> Option<Self> {
        match key_type.to_lowercase().as_str() {
            "right" | "rightarrow" => Some(AdvanceKey::Right),
            "pagedown" => Some(AdvanceKey::PageDown),
            "space" => Some(AdvanceKey::Space),
            "down" | "downarrow" => Some(AdvanceKey::Down),
            _ => None,
        }
    }

    fn enigo_key(self) -> Key {
        match self {
            AdvanceKey::Right => Key::RightArrow,
            AdvanceKey::PageDown => Key::PageDown,
            AdvanceKey::Space => Key::Space,
            AdvanceKey::Down => Key::DownArrow,
        }
    }

    /// macOS virtual key code for System Events.
    fn mac_key_code(self) -> u8 {
        match self {
            AdvanceKey::Right => 124,
            AdvanceKey::PageDown => 121,
            AdvanceKey::Space => 49,
            AdvanceKey::Down => 125,
        }
    }

    /// WScript.Shell SendKeys notation.
    fn send_keys(self) -> &'static str {
        match self {
            AdvanceKey::Right => "{RIGHT}",
            AdvanceKey::PageDown => "{PGDN}",
            AdvanceKey::Space => " ",
            AdvanceKey::Down => "{DOWN}",
        }
    }

    /// X keysym name for xdotool.
    fn keysym(self) -> &'static str {
        match self {
            AdvanceKey::Right => "Right",
            AdvanceKey::PageDown => "Next",
            AdvanceKey::Space => "space",
            AdvanceKey::Down => "Down",
        }
    }
}

/// Which [`InputInjector`] backend a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectorKind {
    Enigo,
    Shell,
}

impl InjectorKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "enigo" => Some(InjectorKind::Enigo),
            "shell" => Some(InjectorKind::Shell),
            _ => None,
        }
    }
}

#[async_trait]
pub trait InputInjector: Send + Sync {
    /// Sends one advance key press to the foreground application.
    async fn press_advance_key(&self) -> Result<()>;

    fn name(&self) -> &str;
}

pub fn select_injector(kind: InjectorKind, key: AdvanceKey) -> Arc<dyn InputInjector> {
    match kind {
        InjectorKind::Enigo => Arc::new(EnigoInjector::new(key)),
        InjectorKind::Shell => Arc::new(ShellInjector::new(key)),
    }
}

/// Requires Accessibility permission on macOS.
pub struct EnigoInjector {
    key: AdvanceKey,
}

impl EnigoInjector {
    pub fn new(key: AdvanceKey) -> Self {
        Self { key }
    }
}

#[async_trait]
impl InputInjector for EnigoInjector {
    async fn press_advance_key(&self) -> Result<()> {
        let key = self.key;
        // Enigo is not Sync; build one per press on the blocking pool
        tokio::task::spawn_blocking(move || {
            let mut enigo = Enigo::new(&Settings::default())
                .map_err(|e| CaptureError::InputInjectionFailed(e.to_string()))?;
            enigo
                .key(key.enigo_key(), Direction::Click)
                .map_err(|e| CaptureError::InputInjectionFailed(e.to_string()))
        })
        .await??;

        debug!(?key, "advance key sent");
        Ok(())
    }

    fn name(&self) -> &str {
        "enigo"
    }
}

pub struct ShellInjector {
    key: AdvanceKey,
}

impl ShellInjector {
    pub fn new(key: AdvanceKey) -> Self {
        Self { key }
    }

    /// Program and arguments that press the key on this platform.
    pub fn command(&self) -> (&'static str, Vec<String>) {
        if cfg!(target_os = "macos") {
            (
                "osascript",
                vec![
                    "-e".to_string(),
                    format!(
                        "tell application \"System Events\" to key code {}",
                        self.key.mac_key_code()
                    ),
                ],
            )
        } else if cfg!(target_os = "windows") {
            (
                "powershell",
                vec![
                    "-command".to_string(),
                    format!(
                        "$wsh = New-Object -ComObject WScript.Shell; $wsh.SendKeys('{}')",
                        self.key.send_keys()
                    ),
                ],
            )
        } else {
            (
                "xdotool",
                vec!["key".to_string(), self.key.keysym().to_string()],
            )
        }
    }
}

#[async_trait]
impl InputInjector for ShellInjector {
    async fn press_advance_key(&self) -> Result<()> {
        let (program, args) = self.command();
        let output = tokio::process::Command::new(program)
            .args(&args)
            .output()
            .await
            .map_err(|e| CaptureError::InputInjectionFailed(format!("{}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(program, status = %output.status, %stderr, "key press command failed");
            return Err(CaptureError::InputInjectionFailed(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        debug!(program, key = ?self.key, "advance key sent");
        Ok(())
    }

    fn name(&self) -> &str {
        "shell"
    }
}

/// Current cursor position in logical screen pixels.
pub fn cursor_position() -> Result<Point> {
    let enigo = Enigo::new(&Settings::default())
        .map_err(|e| CaptureError::InputInjectionFailed(e.to_string()))?;
    let (x, y) = enigo.location().map_err(|e| {
        CaptureError::InputInjectionFailed(format!("failed to get cursor position: {}", e))
    })?;
    Ok(Point::new(x, y))
}
