//! Capture geometry: logical screen points, the logical capture region and
//! the physical pixel rectangle read from a display bitmap.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CaptureError, Result};

/// A logical-pixel screen coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Region to capture, in logical screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Region in physical bitmap pixels, always inside the bitmap it was
/// computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds the region spanned by two picked corners.
    ///
    /// Corners picked out of order are normalized per axis, so the result is
    /// the same whichever corner the user clicked first. A region that is
    /// empty along either axis is rejected.
    pub fn from_corners(top_left: Point, bottom_right: Point) -> Result<Self> {
        let x = top_left.x.min(bottom_right.x);
        let y = top_left.y.min(bottom_right.y);
        let width = top_left.x.abs_diff(bottom_right.x);
        let height = top_left.y.abs_diff(bottom_right.y);

        if width == 0 || height == 0 {
            return Err(CaptureError::InvalidSettings(format!(
                "capture region is empty ({}x{}); pick two distinct corners",
                width, height
            )));
        }

        Ok(Self::new(x, y, width, height))
    }

    /// Parses `x,y,width,height` (commas, colons or spaces as separators).
    pub fn parse(crop_str: &str) -> Option<Self> {
        let parts: Vec<i32> = crop_str
            .split(|c| c == ',' || c == ':' || c == ' ')
            .filter_map(|s| s.trim().parse().ok())
            .collect();

        if parts.len() == 4 && parts[2] > 0 && parts[3] > 0 {
            Some(Self::new(parts[0], parts[1], parts[2] as u32, parts[3] as u32))
        } else {
            None
        }
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(
            self.x.saturating_add(self.width as i32),
            self.y.saturating_add(self.height as i32),
        )
    }

    /// Maps the region onto a bitmap of `image_width`x`image_height` physical
    /// pixels taken from a display with the given scale factor.
    ///
    /// Coordinates are scaled and floored, then clamped so the rectangle never
    /// reads outside the bitmap. The clamp silently shifts or shrinks the
    /// rectangle; it never fails. Returns `None` only when the clamped
    /// rectangle is empty.
    pub fn to_pixels(
        &self,
        scale_factor: f64,
        image_width: u32,
        image_height: u32,
    ) -> Option<PixelRect> {
        if image_width == 0 || image_height == 0 {
            return None;
        }

        let scaled_x = (self.x as f64 * scale_factor).floor() as i64;
        let scaled_y = (self.y as f64 * scale_factor).floor() as i64;
        let scaled_w = (self.width as f64 * scale_factor).floor() as i64;
        let scaled_h = (self.height as f64 * scale_factor).floor() as i64;

        let safe_x = scaled_x.clamp(0, image_width as i64 - 1);
        let safe_y = scaled_y.clamp(0, image_height as i64 - 1);
        let safe_w = scaled_w.min(image_width as i64 - safe_x);
        let safe_h = scaled_h.min(image_height as i64 - safe_y);

        if safe_w <= 0 || safe_h <= 0 {
            return None;
        }

        Some(PixelRect {
            x: safe_x as u32,
            y: safe_y as u32,
            width: safe_w as u32,
            height: safe_h as u32,
        })
    }
}

impl fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}
