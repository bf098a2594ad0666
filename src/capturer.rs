//! Primary-display capture and region cropping.

use image::{ImageFormat, RgbaImage};
use std::io::{Cursor, Write};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{CaptureError, Result};
use crate::region::CaptureRegion;

/// A full-resolution bitmap of the primary display.
pub struct DisplayFrame {
    pub image: RgbaImage,
    /// Physical pixels per logical pixel for this bitmap.
    pub scale_factor: f64,
}

/// Source of primary-display bitmaps.
///
/// Implementations are blocking; callers move them off the async runtime.
pub trait DisplayGrabber: Send + Sync {
    /// Number of screens the OS lets this process capture.
    fn source_count(&self) -> Result<usize>;

    /// Grabs the primary display, or fails with
    /// [`CaptureError::PermissionDenied`] when no screen is capturable.
    fn grab_primary(&self) -> Result<DisplayFrame>;
}

/// [`DisplayGrabber`] backed by the `screenshots` crate.
pub struct ScreenshotsGrabber;

impl ScreenshotsGrabber {
    pub fn new() -> Self {
        Self
    }

    fn screens() -> Result<Vec<screenshots::Screen>> {
        screenshots::Screen::all()
            .map_err(|e| CaptureError::PermissionDenied(format!("failed to get screens: {}", e)))
    }
}

impl Default for ScreenshotsGrabber {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayGrabber for ScreenshotsGrabber {
    fn source_count(&self) -> Result<usize> {
        Ok(Self::screens()?.len())
    }

    fn grab_primary(&self) -> Result<DisplayFrame> {
        let screens = Self::screens()?;
        let primary = screens
            .iter()
            .position(|s| s.display_info.is_primary)
            .unwrap_or(0);
        let screen = screens
            .into_iter()
            .nth(primary)
            .ok_or_else(|| {
                CaptureError::PermissionDenied("no capturable screen sources".to_string())
            })?;

        let logical_width = screen.display_info.width;
        let logical_height = screen.display_info.height;
        let reported = screen.display_info.scale_factor as f64;
        let captured = screen.capture().map_err(|e| {
            CaptureError::PermissionDenied(format!("failed to capture screen: {}", e))
        })?;

        // screenshots uses image 0.24, we use 0.25; move the raw buffer across
        let width = captured.width();
        let height = captured.height();
        let image = RgbaImage::from_raw(width, height, captured.into_raw()).ok_or_else(|| {
            CaptureError::Runtime(format!("captured buffer does not match {}x{}", width, height))
        })?;

        // Effective factor of the bitmap we actually got
        let scale_factor = if logical_width > 0 {
            width as f64 / logical_width as f64
        } else {
            reported
        };
        if (scale_factor - reported).abs() > 0.01 {
            warn!(
                reported,
                effective = scale_factor,
                "display bitmap does not match the reported scale factor"
            );
        }

        debug!(
            width,
            height,
            logical_width,
            logical_height,
            scale_factor,
            "primary display captured"
        );

        Ok(DisplayFrame {
            image,
            scale_factor,
        })
    }
}

/// Captures a logical-pixel region of the primary display as PNG bytes.
#[derive(Clone)]
pub struct ScreenRegionCapturer {
    grabber: Arc<dyn DisplayGrabber>,
    shutter_sound: bool,
}

impl ScreenRegionCapturer {
    pub fn new(grabber: Arc<dyn DisplayGrabber>) -> Self {
        Self {
            grabber,
            shutter_sound: false,
        }
    }

    pub fn with_shutter_sound(mut self, enabled: bool) -> Self {
        self.shutter_sound = enabled;
        self
    }

    pub fn grabber(&self) -> &dyn DisplayGrabber {
        self.grabber.as_ref()
    }

    pub async fn capture(&self, region: CaptureRegion) -> Result<Vec<u8>> {
        let grabber = Arc::clone(&self.grabber);
        let png = tokio::task::spawn_blocking(move || {
            let frame = grabber.grab_primary()?;
            let cropped = crop(&frame, region)?;
            encode_png(&cropped)
        })
        .await??;

        if self.shutter_sound {
            ring_bell();
        }

        Ok(png)
    }
}

/// Crops `region` out of `frame`, scaling it to physical pixels and clamping
/// it to the bitmap.
pub fn crop(frame: &DisplayFrame, region: CaptureRegion) -> Result<RgbaImage> {
    let (width, height) = frame.image.dimensions();
    let rect = region
        .to_pixels(frame.scale_factor, width, height)
        .ok_or_else(|| {
            CaptureError::PermissionDenied(format!(
                "crop of region {} failed on a {}x{} bitmap",
                region, width, height
            ))
        })?;

    debug!(
        x = rect.x,
        y = rect.y,
        width = rect.width,
        height = rect.height,
        "cropping display bitmap"
    );

    Ok(image::imageops::crop_imm(&frame.image, rect.x, rect.y, rect.width, rect.height).to_image())
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

// Cosmetic only; never awaited and failures are ignored.
fn ring_bell() {
    let mut stderr = std::io::stderr();
    let _ = stderr.write_all(b"\x07");
    let _ = stderr.flush();
}
