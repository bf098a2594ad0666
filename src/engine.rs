//! The per-page capture loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::capturer::ScreenRegionCapturer;
use crate::error::{CaptureError, Result};
use crate::input::InputInjector;
use crate::progress::{CaptureProgress, ProgressReporter};
use crate::settings::CaptureSettings;
use crate::staging::StagingDir;

/// Cooperative cancellation flag, checked between pages.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }
}

pub struct PageCaptureEngine {
    capturer: ScreenRegionCapturer,
    injector: Arc<dyn InputInjector>,
}

impl PageCaptureEngine {
    pub fn new(capturer: ScreenRegionCapturer, injector: Arc<dyn InputInjector>) -> Self {
        Self { capturer, injector }
    }

    pub fn capturer(&self) -> &ScreenRegionCapturer {
        &self.capturer
    }

    /// Captures `settings.total_pages` pages into `staging`, pressing the
    /// advance key between pages, and returns the staged paths in capture
    /// order.
    ///
    /// `stop` is honored before each page and before each advance key press;
    /// a wait or capture already in flight completes first. Any failure
    /// aborts the whole run.
    pub async fn capture_pages(
        &self,
        settings: &CaptureSettings,
        staging: &StagingDir,
        progress: &ProgressReporter,
        stop: &StopSignal,
    ) -> Result<Vec<PathBuf>> {
        let region = settings.region()?;
        let total = settings.total_pages;
        let delay = settings.capture_delay();
        let mut pages = Vec::new();

        info!(
            %region,
            total,
            delay_ms = delay.as_millis() as u64,
            injector = self.injector.name(),
            "starting page capture"
        );

        for index in 1..=total {
            if stop.is_stopped() {
                info!(captured = pages.len(), "capture stopped by user");
                return Err(CaptureError::Cancelled);
            }

            progress.emit(CaptureProgress::capturing(index, total));

            tokio::time::sleep(delay).await;

            let png = self.capturer.capture(region).await?;
            let path = staging.write_page(index, total, &png).await?;
            pages.push(path);

            if index < total {
                if stop.is_stopped() {
                    info!(captured = pages.len(), "capture stopped by user");
                    return Err(CaptureError::Cancelled);
                }
                if let Err(e) = self.injector.press_advance_key().await {
                    warn!(page = index, error = %e, "advance key press failed");
                    return Err(match e {
                        CaptureError::InputInjectionFailed(_) => e,
                        other => CaptureError::InputInjectionFailed(other.to_string()),
                    });
                }
            }

            debug!(page = index, total, "page captured");
        }

        info!(pages = pages.len(), "page capture finished");
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capturer::{DisplayFrame, DisplayGrabber};
    use crate::progress::{self, CaptureStatus};
    use crate::region::CaptureRegion;
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::AtomicU32;

    /// Display whose colour changes with every advance key press.
    struct PagedDisplay {
        page: Arc<AtomicU32>,
        grabs: AtomicU32,
    }

    impl DisplayGrabber for PagedDisplay {
        fn source_count(&self) -> Result<usize> {
            Ok(1)
        }

        fn grab_primary(&self) -> Result<DisplayFrame> {
            self.grabs.fetch_add(1, Ordering::SeqCst);
            let shade = self.page.load(Ordering::SeqCst) as u8;
            Ok(DisplayFrame {
                image: RgbaImage::from_pixel(200, 100, Rgba([shade, 0, 0, 255])),
                scale_factor: 1.0,
            })
        }
    }

    struct Keyboard {
        page: Arc<AtomicU32>,
        presses: AtomicU32,
        fail_after: Option<u32>,
        stop_on_press: Option<StopSignal>,
    }

    #[async_trait]
    impl InputInjector for Keyboard {
        async fn press_advance_key(&self) -> Result<()> {
            let pressed = self.presses.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_after.is_some_and(|n| pressed > n) {
                return Err(CaptureError::InputInjectionFailed("not permitted".to_string()));
            }
            if let Some(stop) = &self.stop_on_press {
                stop.stop();
            }
            self.page.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    struct Rig {
        engine: PageCaptureEngine,
        display: Arc<PagedDisplay>,
        keyboard: Arc<Keyboard>,
        staging: StagingDir,
        _dir: tempfile::TempDir,
    }

    fn rig(fail_after: Option<u32>, stop_on_press: Option<StopSignal>) -> Rig {
        let page = Arc::new(AtomicU32::new(1));
        let display = Arc::new(PagedDisplay {
            page: Arc::clone(&page),
            grabs: AtomicU32::new(0),
        });
        let keyboard = Arc::new(Keyboard {
            page,
            presses: AtomicU32::new(0),
            fail_after,
            stop_on_press,
        });
        let engine = PageCaptureEngine::new(
            ScreenRegionCapturer::new(display.clone()),
            keyboard.clone(),
        );
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingDir::new(dir.path().join("temp_images"));
        Rig {
            engine,
            display,
            keyboard,
            staging,
            _dir: dir,
        }
    }

    fn settings(pages: u32) -> CaptureSettings {
        CaptureSettings::new(CaptureRegion::new(10, 10, 50, 40), pages, "test")
    }

    #[tokio::test(start_paused = true)]
    async fn captures_every_page_in_order() {
        let rig = rig(None, None);
        rig.staging.prepare().await.unwrap();
        let (reporter, mut rx) = progress::channel();

        let pages = rig
            .engine
            .capture_pages(&settings(3), &rig.staging, &reporter, &StopSignal::new())
            .await
            .unwrap();

        assert_eq!(pages.len(), 3);
        for (i, path) in pages.iter().enumerate() {
            assert_eq!(path, &rig.staging.page_path(i as u32 + 1, 3));
            let img = image::open(path).unwrap().to_rgba8();
            assert_eq!(img.dimensions(), (50, 40));
            assert_eq!(img.get_pixel(0, 0)[0], i as u8 + 1);
        }
        assert_eq!(rig.keyboard.presses.load(Ordering::SeqCst), 2);

        let mut currents = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.status, CaptureStatus::Capturing);
            currents.push(event.current);
        }
        assert_eq!(currents, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn single_page_sends_no_key() {
        let rig = rig(None, None);
        rig.staging.prepare().await.unwrap();

        let pages = rig
            .engine
            .capture_pages(
                &settings(1),
                &rig.staging,
                &ProgressReporter::detached(),
                &StopSignal::new(),
            )
            .await
            .unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(rig.keyboard.presses.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn key_failure_aborts_the_run() {
        let rig = rig(Some(1), None);
        rig.staging.prepare().await.unwrap();

        let err = rig
            .engine
            .capture_pages(
                &settings(4),
                &rig.staging,
                &ProgressReporter::detached(),
                &StopSignal::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CaptureError::InputInjectionFailed(_)));
        assert_eq!(rig.display.grabs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_takes_effect_at_the_next_page() {
        let stop = StopSignal::new();
        let rig = rig(None, Some(stop.clone()));
        rig.staging.prepare().await.unwrap();
        let (reporter, mut rx) = progress::channel();

        let err = rig
            .engine
            .capture_pages(&settings(5), &rig.staging, &reporter, &stop)
            .await
            .unwrap_err();

        assert!(matches!(err, CaptureError::Cancelled));
        assert_eq!(rig.display.grabs.load(Ordering::SeqCst), 1);
        let mut events = 0;
        while rx.try_recv().is_ok() {
            events += 1;
        }
        assert_eq!(events, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_the_wait_sends_no_further_key() {
        let rig = rig(None, None);
        rig.staging.prepare().await.unwrap();
        let stop = StopSignal::new();
        let mut s = settings(5);
        s.capture_speed = 500;

        let progress = ProgressReporter::detached();
        let run = rig
            .engine
            .capture_pages(&s, &rig.staging, &progress, &stop);
        let cancel = async {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            stop.stop();
        };
        let (result, ()) = tokio::join!(run, cancel);

        assert!(matches!(result, Err(CaptureError::Cancelled)));
        assert_eq!(rig.display.grabs.load(Ordering::SeqCst), 1);
        assert_eq!(rig.keyboard.presses.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_page_count_stops_without_reserving_pages() {
        let rig = rig(None, None);
        rig.staging.prepare().await.unwrap();
        let stop = StopSignal::new();
        stop.stop();

        let err = rig
            .engine
            .capture_pages(
                &settings(u32::MAX),
                &rig.staging,
                &ProgressReporter::detached(),
                &stop,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CaptureError::Cancelled));
        assert_eq!(rig.display.grabs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_the_clamped_capture_speed_before_each_page() {
        let rig = rig(None, None);
        rig.staging.prepare().await.unwrap();
        let mut s = settings(2);
        s.capture_speed = 50;

        let started = tokio::time::Instant::now();
        rig.engine
            .capture_pages(&s, &rig.staging, &ProgressReporter::detached(), &StopSignal::new())
            .await
            .unwrap();

        assert!(started.elapsed() >= std::time::Duration::from_millis(1000));
    }
}
