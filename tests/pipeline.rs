use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use pagecapture::progress::{self, ProgressReceiver};
use pagecapture::{
    CaptureError, CaptureProgress, CaptureRegion, CaptureSettings, CaptureStatus, DisplayFrame,
    DisplayGrabber, InputInjector, ProgressReporter, RunOptions, RunSession,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

struct FakeDisplay {
    sources: AtomicUsize,
    grabs: AtomicU32,
}

impl DisplayGrabber for FakeDisplay {
    fn source_count(&self) -> pagecapture::Result<usize> {
        Ok(self.sources.load(Ordering::SeqCst))
    }

    fn grab_primary(&self) -> pagecapture::Result<DisplayFrame> {
        self.grabs.fetch_add(1, Ordering::SeqCst);
        Ok(DisplayFrame {
            image: RgbaImage::from_pixel(1600, 1000, Rgba([30, 60, 90, 255])),
            scale_factor: 2.0,
        })
    }
}

#[derive(Default)]
struct FakeKeyboard {
    presses: AtomicU32,
}

#[async_trait]
impl InputInjector for FakeKeyboard {
    async fn press_advance_key(&self) -> pagecapture::Result<()> {
        self.presses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct Harness {
    session: RunSession,
    display: Arc<FakeDisplay>,
    keyboard: Arc<FakeKeyboard>,
    dir: TempDir,
}

impl Harness {
    fn new(sources: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let display = Arc::new(FakeDisplay {
            sources: AtomicUsize::new(sources),
            grabs: AtomicU32::new(0),
        });
        let keyboard = Arc::new(FakeKeyboard::default());
        let options = RunOptions {
            start_delay: Duration::ZERO,
            staging_dir: dir.path().join("temp_images"),
            ..RunOptions::default()
        };
        let session = RunSession::new(display.clone(), keyboard.clone(), &options);
        Self {
            session,
            display,
            keyboard,
            dir,
        }
    }

    fn settings(&self, pages: u32, save_dir: &Path) -> CaptureSettings {
        let region = CaptureRegion::new(100, 100, 300, 400);
        let mut settings = CaptureSettings::new(region, pages, "book");
        settings.save_path = Some(save_dir.to_path_buf());
        settings.capture_speed = 500;
        settings
    }

    fn staging_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.session.staging().path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

fn drain(rx: &mut ProgressReceiver) -> Vec<CaptureProgress> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn page_count(pdf: &Path) -> usize {
    let bytes = std::fs::read(pdf).unwrap();
    let needle = b"/Type /Page /Parent";
    bytes.windows(needle.len()).filter(|w| w == needle).count()
}

#[tokio::test(start_paused = true)]
async fn full_run_produces_one_page_per_capture() {
    let mut h = Harness::new(1);
    let out = h.dir.path().join("out");
    std::fs::create_dir(&out).unwrap();
    let settings = h.settings(4, &out);
    let (reporter, mut rx) = progress::channel();

    let outcome = h.session.start_run(&settings, &reporter).await.unwrap();

    assert_eq!(outcome.pages, 4);
    assert_eq!(outcome.pdf_path, out.join("book.pdf"));
    assert_eq!(page_count(&outcome.pdf_path), 4);
    assert_eq!(h.display.grabs.load(Ordering::SeqCst), 4);
    assert_eq!(h.keyboard.presses.load(Ordering::SeqCst), 3);
    assert!(!h.session.staging().exists());

    let bytes = std::fs::read(&outcome.pdf_path).unwrap();
    let media_box = b"/MediaBox [0 0 600 800]";
    assert_eq!(bytes.windows(media_box.len()).filter(|w| w == media_box).count(), 4);

    let events = drain(&mut rx);
    let capturing: Vec<u32> = events
        .iter()
        .filter(|e| e.status == CaptureStatus::Capturing)
        .map(|e| e.current)
        .collect();
    assert_eq!(capturing, vec![1, 2, 3, 4]);
    let tail: Vec<CaptureStatus> = events.iter().rev().take(2).map(|e| e.status).collect();
    assert_eq!(tail, vec![CaptureStatus::Completed, CaptureStatus::Converting]);
}

#[tokio::test(start_paused = true)]
async fn single_page_run_presses_no_key() {
    let mut h = Harness::new(1);
    let out = h.dir.path().to_path_buf();
    let settings = h.settings(1, &out);

    let outcome = h
        .session
        .start_run(&settings, &ProgressReporter::detached())
        .await
        .unwrap();

    assert_eq!(page_count(&outcome.pdf_path), 1);
    assert_eq!(h.keyboard.presses.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_permission_fails_before_staging() {
    let mut h = Harness::new(0);
    let out = h.dir.path().to_path_buf();
    let settings = h.settings(3, &out);
    let (reporter, mut rx) = progress::channel();

    let err = h.session.start_run(&settings, &reporter).await.unwrap_err();

    assert!(matches!(err, CaptureError::PermissionDenied(_)));
    assert!(!h.session.staging().exists());
    assert_eq!(h.display.grabs.load(Ordering::SeqCst), 0);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, CaptureStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn write_failure_retries_without_recapturing() {
    let mut h = Harness::new(1);
    let missing = h.dir.path().join("missing").join("dir");
    let settings = h.settings(3, &missing);

    let err = h
        .session
        .start_run(&settings, &ProgressReporter::detached())
        .await
        .unwrap_err();

    assert!(err.is_retryable_write());
    assert!(h.session.has_pending_assembly());
    assert_eq!(
        h.staging_files(),
        vec!["img_0001.png", "img_0002.png", "img_0003.png"]
    );

    let writable = h.dir.path().join("writable");
    std::fs::create_dir(&writable).unwrap();
    let (reporter, mut rx) = progress::channel();
    let outcome = h.session.retry_assembly(&writable, &reporter).await.unwrap();

    assert_eq!(outcome.pdf_path, writable.join("book.pdf"));
    assert_eq!(page_count(&outcome.pdf_path), 3);
    assert_eq!(h.display.grabs.load(Ordering::SeqCst), 3);
    assert!(!h.session.has_pending_assembly());
    assert!(!h.session.staging().exists());

    let statuses: Vec<CaptureStatus> = drain(&mut rx).iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![CaptureStatus::Converting, CaptureStatus::Completed]);
}

#[tokio::test(start_paused = true)]
async fn retry_without_pending_images_is_empty_input() {
    let mut h = Harness::new(1);
    let out = h.dir.path().to_path_buf();

    let err = h
        .session
        .retry_assembly(&out, &ProgressReporter::detached())
        .await
        .unwrap_err();

    assert!(matches!(err, CaptureError::EmptyInput));
}

#[tokio::test(start_paused = true)]
async fn stop_before_start_cancels_without_capturing() {
    let dir = tempfile::tempdir().unwrap();
    let display = Arc::new(FakeDisplay {
        sources: AtomicUsize::new(1),
        grabs: AtomicU32::new(0),
    });
    let options = RunOptions {
        start_delay: Duration::from_secs(1),
        staging_dir: dir.path().join("temp_images"),
        ..RunOptions::default()
    };
    let mut session = RunSession::new(display.clone(), Arc::new(FakeKeyboard::default()), &options);
    let stop = session.stop_signal();
    let mut settings = CaptureSettings::new(CaptureRegion::new(0, 0, 100, 100), 5, "book");
    settings.save_path = Some(dir.path().to_path_buf());
    let (reporter, mut rx) = progress::channel();

    let run = session.start_run(&settings, &reporter);
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        stop.stop();
    };
    let (result, ()) = tokio::join!(run, cancel);

    assert!(matches!(result, Err(CaptureError::Cancelled)));
    assert_eq!(display.grabs.load(Ordering::SeqCst), 0);
    let events = drain(&mut rx);
    let last = events.last().unwrap();
    assert_eq!(last.status, CaptureStatus::Error);
    assert_eq!(last.message.as_deref(), Some("Capture cancelled"));
}

#[tokio::test(start_paused = true)]
async fn reset_twice_is_a_no_op() {
    let mut h = Harness::new(1);
    let missing = h.dir.path().join("missing");
    let settings = h.settings(2, &missing.join("deeper"));
    let _ = h
        .session
        .start_run(&settings, &ProgressReporter::detached())
        .await;
    assert!(h.session.staging().exists());

    h.session.reset().await;
    assert!(!h.session.staging().exists());
    assert!(!h.session.has_pending_assembly());

    h.session.reset().await;
    assert!(!h.session.staging().exists());
}

#[tokio::test(start_paused = true)]
async fn invalid_settings_are_reported() {
    let mut h = Harness::new(1);
    let out = h.dir.path().to_path_buf();
    let mut settings = h.settings(2, &out);
    settings.file_name = String::new();
    let (reporter, mut rx) = progress::channel();

    let err = h.session.start_run(&settings, &reporter).await.unwrap_err();

    assert!(matches!(err, CaptureError::InvalidSettings(_)));
    assert_eq!(drain(&mut rx).len(), 1);
    assert!(!h.session.staging().exists());
}
