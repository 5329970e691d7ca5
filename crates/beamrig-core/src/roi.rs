//! Scintillator-edge ROI conversion between display and stored frames.
//!
//! The display frame puts `v = 0` at the top of the image and grows downward.
//! The stored frame used by the backend puts the origin at the bottom, so
//! `v_stored = H - v_display`. The horizontal axis is never flipped.

use serde::{Deserialize, Serialize};

use crate::{Pt2, Real, RigError, RigResult};

/// Pixel dimensions of a camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn width_f(&self) -> Real {
        self.width as Real
    }

    pub fn height_f(&self) -> Real {
        self.height as Real
    }
}

/// Axis-aligned rectangle given by its horizontal and vertical edges.
///
/// Edges are not required to be ordered: a stored ROI typically has
/// `v_start > v_end` because the vertical axis is inverted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub h_start: Real,
    pub h_end: Real,
    pub v_start: Real,
    pub v_end: Real,
}

impl Roi {
    pub fn new(h_start: Real, h_end: Real, v_start: Real, v_end: Real) -> Self {
        Self {
            h_start,
            h_end,
            v_start,
            v_end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideOrientation {
    Vertical,
    Horizontal,
}

/// One overlay guide line in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuideSegment {
    pub orientation: GuideOrientation,
    pub from: Pt2,
    pub to: Pt2,
}

/// Converts rectangles for a frame of fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiMapper {
    size: ImageSize,
}

impl RoiMapper {
    pub fn new(size: ImageSize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Stored (origin bottom) to display (origin top).
    pub fn to_display(&self, stored: &Roi) -> Roi {
        let h = self.size.height_f();
        Roi {
            h_start: stored.h_start,
            h_end: stored.h_end,
            v_start: h - stored.v_start,
            v_end: h - stored.v_end,
        }
    }

    /// Display (origin top) to stored (origin bottom).
    ///
    /// # Errors
    ///
    /// [`RigError::InvalidRoi`] if any edge is NaN or lies outside the frame.
    pub fn to_stored(&self, display: &Roi) -> RigResult<Roi> {
        self.validate(display)?;
        let h = self.size.height_f();
        Ok(Roi {
            h_start: display.h_start,
            h_end: display.h_end,
            v_start: h - display.v_start,
            v_end: h - display.v_end,
        })
    }

    /// Check every edge is a number inside `[0, W]` or `[0, H]`.
    ///
    /// The bounds are symmetric under the vertical flip, so this applies to
    /// both frames.
    pub fn validate(&self, roi: &Roi) -> RigResult<()> {
        let w = self.size.width_f();
        let h = self.size.height_f();
        let edges = [
            ("hStart", roi.h_start, w),
            ("hEnd", roi.h_end, w),
            ("vStart", roi.v_start, h),
            ("vEnd", roi.v_end, h),
        ];
        for (name, value, limit) in edges {
            if value.is_nan() {
                return Err(RigError::invalid_roi(format!("{name} is not a number")));
            }
            if !(0.0..=limit).contains(&value) {
                return Err(RigError::invalid_roi(format!(
                    "{name}={value} outside [0, {limit}]"
                )));
            }
        }
        Ok(())
    }

    /// Four guide lines for a display-frame rectangle: vertical lines at
    /// `h_start`/`h_end` spanning the full height, horizontal lines at
    /// `v_start`/`v_end` spanning the full width.
    pub fn overlay_lines(&self, display: &Roi) -> [GuideSegment; 4] {
        let w = self.size.width_f();
        let h = self.size.height_f();
        let vertical = |x: Real| GuideSegment {
            orientation: GuideOrientation::Vertical,
            from: Pt2::new(x, 0.0),
            to: Pt2::new(x, h),
        };
        let horizontal = |y: Real| GuideSegment {
            orientation: GuideOrientation::Horizontal,
            from: Pt2::new(0.0, y),
            to: Pt2::new(w, y),
        };
        [
            vertical(display.h_start),
            vertical(display.h_end),
            horizontal(display.v_start),
            horizontal(display.v_end),
        ]
    }
}
