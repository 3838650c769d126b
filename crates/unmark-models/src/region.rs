//! Region descriptors supplied by the client and their pixel-space form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Padding in pixels added on every side of a region before it is masked.
pub const REGION_PADDING: i32 = 3;

/// Visual effect used to obscure a region.
///
/// The declaration order is the order in which effects are applied to a frame
/// when several methods are requested together, so `Ns` runs after `Telea` and
/// may overwrite pixels it shares with a `Telea` mask.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ObscureMethod {
    /// Heavy block pixelation
    Mosaic,
    /// Strong Gaussian blur
    #[default]
    Blur,
    /// Solid colour fill
    Black,
    /// Curvature-based (Telea) inpainting
    Telea,
    /// Fluid-dynamics-based (Navier-Stokes) inpainting
    Ns,
}

impl ObscureMethod {
    /// Every method, in application order.
    pub const ALL: [ObscureMethod; 5] = [
        ObscureMethod::Mosaic,
        ObscureMethod::Blur,
        ObscureMethod::Black,
        ObscureMethod::Telea,
        ObscureMethod::Ns,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObscureMethod::Mosaic => "mosaic",
            ObscureMethod::Blur => "blur",
            ObscureMethod::Black => "black",
            ObscureMethod::Telea => "telea",
            ObscureMethod::Ns => "ns",
        }
    }

    /// Whether the method reconstructs content with inpainting.
    pub fn is_inpaint(&self) -> bool {
        matches!(self, ObscureMethod::Telea | ObscureMethod::Ns)
    }
}

impl fmt::Display for ObscureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown tags fall back to blur.
impl From<&str> for ObscureMethod {
    fn from(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "mosaic" | "pixelate" => ObscureMethod::Mosaic,
            "black" => ObscureMethod::Black,
            "telea" => ObscureMethod::Telea,
            "ns" => ObscureMethod::Ns,
            _ => ObscureMethod::Blur,
        }
    }
}

impl From<String> for ObscureMethod {
    fn from(tag: String) -> Self {
        Self::from(tag.as_str())
    }
}

/// A fractional rectangle (0.0 to 1.0 relative to the frame) plus the method
/// used to obscure it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionDescriptor {
    /// X coordinate of the top-left corner (0.0 = left, 1.0 = right)
    pub x: f64,
    /// Y coordinate of the top-left corner (0.0 = top, 1.0 = bottom)
    pub y: f64,
    /// Width of the rectangle (0.0 to 1.0)
    pub width: f64,
    /// Height of the rectangle (0.0 to 1.0)
    pub height: f64,
    /// Obscuring method, blur when absent
    #[serde(default)]
    pub method: ObscureMethod,
}

impl RegionDescriptor {
    /// Create a new region descriptor.
    pub fn new(x: f64, y: f64, width: f64, height: f64, method: ObscureMethod) -> Self {
        Self {
            x,
            y,
            width,
            height,
            method,
        }
    }

    /// Whether every coordinate is finite and within `0.0..=1.0`.
    pub fn is_normalized(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
    }

    /// Convert to a padded pixel rectangle inside a `frame_width` x `frame_height` frame.
    ///
    /// Fractions are scaled and truncated, the rectangle grows by `padding` on
    /// each side and is clamped to the frame. Returns `None` when the converted
    /// rectangle has no area or lies completely outside the frame.
    pub fn to_pixel_rect(&self, frame_width: i32, frame_height: i32, padding: i32) -> Option<PixelRect> {
        let w = frame_width as f64;
        let h = frame_height as f64;

        let x1 = (self.x * w) as i64;
        let y1 = (self.y * h) as i64;
        let x2 = ((self.x + self.width) * w) as i64;
        let y2 = ((self.y + self.height) * h) as i64;

        // Casts saturate, so extreme fractions must not overflow below
        if x2.saturating_sub(x1) <= 0 || y2.saturating_sub(y1) <= 0 {
            return None;
        }

        let padding = padding.max(0) as i64;
        let left = x1.saturating_sub(padding).max(0);
        let top = y1.saturating_sub(padding).max(0);
        let right = x2.saturating_add(padding).min(frame_width as i64);
        let bottom = y2.saturating_add(padding).min(frame_height as i64);

        if right <= left || bottom <= top {
            return None;
        }

        Some(PixelRect::new(
            left as i32,
            top as i32,
            (right - left) as i32,
            (bottom - top) as i32,
        ))
    }
}

/// An axis-aligned rectangle in absolute pixel coordinates (half-open).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }
}
