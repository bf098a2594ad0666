//! Capture-to-PDF runs, as seen by a driver.
//!
//! A [`RunSession`] owns the staging directory and the services of one
//! driver. It sequences permission probe, capture, assembly and cleanup,
//! and keeps the captured images when the PDF write alone failed so the
//! driver can retry into another directory without capturing again.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::assembler::DocumentAssembler;
use crate::capturer::{DisplayGrabber, ScreenRegionCapturer};
use crate::engine::{PageCaptureEngine, StopSignal};
use crate::error::{CaptureError, Result};
use crate::input::InputInjector;
use crate::permission::{PermissionState, probe_screen_capture};
use crate::progress::{CaptureProgress, ProgressReporter};
use crate::settings::{CaptureSettings, RunOptions, default_save_dir};
use crate::staging::StagingDir;

/// Result of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub pdf_path: PathBuf,
    pub pages: usize,
}

/// Captured images waiting for a successful PDF write.
#[derive(Debug, Clone)]
struct PendingAssembly {
    images: Vec<PathBuf>,
    file_name: String,
    total: u32,
}

pub struct RunSession {
    engine: PageCaptureEngine,
    assembler: DocumentAssembler,
    staging: StagingDir,
    stop: StopSignal,
    start_delay: Duration,
    pending: Option<PendingAssembly>,
}

impl RunSession {
    pub fn new(
        grabber: Arc<dyn DisplayGrabber>,
        injector: Arc<dyn InputInjector>,
        options: &RunOptions,
    ) -> Self {
        let capturer = ScreenRegionCapturer::new(grabber).with_shutter_sound(options.shutter_sound);
        Self {
            engine: PageCaptureEngine::new(capturer, injector),
            assembler: DocumentAssembler::new(default_save_dir()),
            staging: StagingDir::new(&options.staging_dir),
            stop: StopSignal::new(),
            start_delay: options.start_delay,
            pending: None,
        }
    }

    /// Handle the driver keeps to cancel a run from another task or thread.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn staging(&self) -> &StagingDir {
        &self.staging
    }

    pub fn permission_state(&self) -> PermissionState {
        probe_screen_capture(self.engine.capturer().grabber())
    }

    /// Whether a failed PDF write left images that [`retry_assembly`] can use.
    ///
    /// [`retry_assembly`]: RunSession::retry_assembly
    pub fn has_pending_assembly(&self) -> bool {
        self.pending.is_some()
    }

    /// Runs one capture-to-PDF pass. Every outcome ends with exactly one
    /// terminal progress event (`completed` or `error`).
    pub async fn start_run(
        &mut self,
        settings: &CaptureSettings,
        progress: &ProgressReporter,
    ) -> Result<RunOutcome> {
        let total = settings.total_pages;
        match self.run(settings, progress).await {
            Ok(outcome) => {
                progress.emit(CaptureProgress::completed(outcome.pages as u32, total));
                Ok(outcome)
            }
            Err(e) => {
                match &e {
                    CaptureError::Cancelled => info!("run cancelled"),
                    other => error!(error = %other, "run failed"),
                }
                progress.emit(CaptureProgress::failed(0, total, &e));
                Err(e)
            }
        }
    }

    async fn run(
        &mut self,
        settings: &CaptureSettings,
        progress: &ProgressReporter,
    ) -> Result<RunOutcome> {
        settings.validate()?;
        self.stop.clear();
        self.pending = None;

        if !self.permission_state().is_granted() {
            return Err(CaptureError::PermissionDenied(
                "no capturable screen sources; grant screen recording access".to_string(),
            ));
        }

        let total = settings.total_pages;
        if !self.start_delay.is_zero() {
            progress.emit(CaptureProgress::waiting(total));
            tokio::time::sleep(self.start_delay).await;
        }
        if self.stop.is_stopped() {
            return Err(CaptureError::Cancelled);
        }

        self.staging.prepare().await?;

        let images = match self
            .engine
            .capture_pages(settings, &self.staging, progress, &self.stop)
            .await
        {
            Ok(images) => images,
            Err(e) => {
                self.staging.cleanup().await;
                return Err(e);
            }
        };

        progress.emit(CaptureProgress::converting(
            images.len() as u32,
            total,
            "Converting to PDF...",
        ));

        self.pending = Some(PendingAssembly {
            images,
            file_name: settings.file_name.trim().to_string(),
            total,
        });
        let output_dir = settings.output_dir();
        self.assemble(&output_dir).await
    }

    /// Writes the PDF for images kept from a run whose write failed, into
    /// `output_dir`. Capture is not repeated.
    pub async fn retry_assembly(
        &mut self,
        output_dir: &Path,
        progress: &ProgressReporter,
    ) -> Result<RunOutcome> {
        let Some(pending) = &self.pending else {
            return Err(CaptureError::EmptyInput);
        };
        let (captured, total) = (pending.images.len() as u32, pending.total);

        progress.emit(CaptureProgress::converting(
            captured,
            total,
            "Saving to new location...",
        ));

        match self.assemble(output_dir).await {
            Ok(outcome) => {
                progress.emit(CaptureProgress::completed(outcome.pages as u32, total));
                Ok(outcome)
            }
            Err(e) => {
                progress.emit(CaptureProgress::failed(0, total, &e));
                Err(e)
            }
        }
    }

    /// Assembles the pending images. Staging survives only a write failure.
    async fn assemble(&mut self, output_dir: &Path) -> Result<RunOutcome> {
        let Some(pending) = self.pending.clone() else {
            return Err(CaptureError::EmptyInput);
        };

        match self
            .assembler
            .create_pdf(&pending.images, &pending.file_name, Some(output_dir))
            .await
        {
            Ok(pdf_path) => {
                self.pending = None;
                self.staging.cleanup().await;
                Ok(RunOutcome {
                    pdf_path,
                    pages: pending.images.len(),
                })
            }
            Err(e) if e.is_retryable_write() => {
                warn!(error = %e, "pdf write failed; keeping captured pages for retry");
                Err(e)
            }
            Err(e) => {
                self.pending = None;
                self.staging.cleanup().await;
                Err(e)
            }
        }
    }

    /// Discards any kept images and removes the staging directory.
    /// Safe to call at any time when no run is active.
    pub async fn reset(&mut self) {
        self.pending = None;
        self.staging.cleanup().await;
    }
}
