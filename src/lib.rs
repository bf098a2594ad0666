//! Captures a screen region page by page while pressing a "next page" key in
//! the foreground application, then assembles the pages into one PDF.
//!
//! The pipeline is [`capturer`] → [`engine`] → [`assembler`], sequenced for a
//! driver by [`session::RunSession`].

pub mod assembler;
pub mod capturer;
pub mod constants;
pub mod engine;
pub mod error;
pub mod input;
pub mod pdf;
pub mod permission;
pub mod presets;
pub mod progress;
pub mod region;
pub mod session;
pub mod settings;
pub mod staging;

pub use assembler::DocumentAssembler;
pub use capturer::{DisplayFrame, DisplayGrabber, ScreenRegionCapturer, ScreenshotsGrabber};
pub use engine::{PageCaptureEngine, StopSignal};
pub use error::{CaptureError, Result};
pub use input::{AdvanceKey, InjectorKind, InputInjector, select_injector};
pub use permission::{PermissionState, RemediationCommands};
pub use progress::{CaptureProgress, CaptureStatus, ProgressReporter};
pub use region::{CaptureRegion, Point};
pub use session::{RunOutcome, RunSession};
pub use settings::{CaptureSettings, RunOptions};
pub use staging::StagingDir;
