//! Progress events pushed from a run to its driver.
//!
//! A run owns one [`ProgressReporter`]; the driver owns the matching receiver.
//! The reporter enforces event order: `current` only grows while capturing,
//! `status` never moves backwards, and nothing follows a terminal event.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::CaptureError;
use crate::permission::RemediationCommands;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureStatus {
    Idle,
    Capturing,
    Converting,
    Completed,
    Error,
}

impl CaptureStatus {
    fn rank(self) -> u8 {
        match self {
            CaptureStatus::Idle => 0,
            CaptureStatus::Capturing => 1,
            CaptureStatus::Converting => 2,
            CaptureStatus::Completed | CaptureStatus::Error => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CaptureStatus::Completed | CaptureStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureProgress {
    pub current: u32,
    pub total: u32,
    pub status: CaptureStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<RemediationCommands>,
}

impl CaptureProgress {
    fn with(current: u32, total: u32, status: CaptureStatus, message: impl Into<String>) -> Self {
        Self {
            current,
            total,
            status,
            message: Some(message.into()),
            commands: None,
        }
    }

    /// Emitted once before page 1 while the user focuses the target window.
    pub fn waiting(total: u32) -> Self {
        Self::with(
            0,
            total,
            CaptureStatus::Capturing,
            "Click on the app/browser window you want to capture...",
        )
    }

    pub fn capturing(current: u32, total: u32) -> Self {
        Self::with(
            current,
            total,
            CaptureStatus::Capturing,
            format!("Capturing page {}/{}...", current, total),
        )
    }

    pub fn converting(current: u32, total: u32, message: impl Into<String>) -> Self {
        Self::with(current, total, CaptureStatus::Converting, message)
    }

    pub fn completed(pages: u32, total: u32) -> Self {
        Self::with(
            pages,
            total,
            CaptureStatus::Completed,
            format!("PDF conversion completed! ({} pages)", pages),
        )
    }

    pub fn failed(current: u32, total: u32, error: &CaptureError) -> Self {
        let message = match error {
            CaptureError::Cancelled => "Capture cancelled".to_string(),
            other => other.to_string(),
        };
        Self {
            commands: error.remediation(),
            ..Self::with(current, total, CaptureStatus::Error, message)
        }
    }
}

pub type ProgressReceiver = mpsc::UnboundedReceiver<CaptureProgress>;

/// Creates the push channel between a run and its driver.
pub fn channel() -> (ProgressReporter, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressReporter::new(tx), rx)
}

pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<CaptureProgress>,
    last: Mutex<Option<(u32, CaptureStatus)>>,
}

impl ProgressReporter {
    pub fn new(tx: mpsc::UnboundedSender<CaptureProgress>) -> Self {
        Self {
            tx,
            last: Mutex::new(None),
        }
    }

    /// A reporter whose events go nowhere.
    pub fn detached() -> Self {
        let (reporter, _rx) = channel();
        reporter
    }

    /// Sends `progress` unless it would break the event order.
    /// Returns whether the event was sent.
    pub fn emit(&self, progress: CaptureProgress) -> bool {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());

        if let Some((current, status)) = *last {
            if status.is_terminal() {
                debug!(?progress.status, "dropping progress after terminal event");
                return false;
            }
            let regresses = progress.status.rank() < status.rank()
                || (progress.status == CaptureStatus::Capturing
                    && status == CaptureStatus::Capturing
                    && progress.current <= current);
            if regresses && progress.status != CaptureStatus::Error {
                warn!(
                    from = ?status,
                    to = ?progress.status,
                    current = progress.current,
                    "dropping out-of-order progress"
                );
                return false;
            }
        }

        *last = Some((progress.current, progress.status));
        if self.tx.send(progress).is_err() {
            debug!("progress receiver dropped");
        }
        true
    }

    pub fn is_finished(&self) -> bool {
        self.last
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some_and(|(_, status)| status.is_terminal())
    }
}
