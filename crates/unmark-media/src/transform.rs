//! Per-frame obscuring effects applied through a binary mask.

use opencv::core::{self, Mat, Rect, Scalar, Size};
use opencv::prelude::*;
use opencv::{imgproc, photo};
use serde::{Deserialize, Serialize};
use unmark_models::ObscureMethod;

use crate::error::{MediaError, MediaResult};
use crate::mask::MaskSet;

/// Side of a mosaic cell in pixels.
pub const MOSAIC_BLOCK_SIZE: i32 = 20;

/// Gaussian kernel size for `blur`.
pub const BLUR_KERNEL_SIZE: i32 = 51;

/// Neighbourhood radius for both inpainting algorithms.
pub const INPAINT_RADIUS: f64 = 5.0;

/// Tuning for the effects. Defaults match the documented behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub mosaic_block_size: i32,
    /// Forced odd
    pub blur_kernel_size: i32,
    pub inpaint_radius: f64,
    /// BGR colour for `black`
    pub fill_color: [u8; 3],
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            mosaic_block_size: MOSAIC_BLOCK_SIZE,
            blur_kernel_size: BLUR_KERNEL_SIZE,
            inpaint_radius: INPAINT_RADIUS,
            fill_color: [0, 0, 0],
        }
    }
}

/// Applies obscuring effects to decoded frames.
#[derive(Debug, Clone, Default)]
pub struct FrameTransformer {
    config: TransformConfig,
}

impl FrameTransformer {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Apply every mask in the set, in method priority order.
    pub fn apply_all(&self, frame: &Mat, masks: &MaskSet) -> MediaResult<Mat> {
        let mut current = frame.try_clone()?;
        for (method, mask) in masks.iter() {
            current = self.apply(&current, mask, method)?;
        }
        Ok(current)
    }

    /// Return a copy of `frame` with `method` applied to the active pixels of `mask`.
    ///
    /// Pixels outside the mask are copied unchanged. An all-zero mask returns a
    /// byte-identical copy.
    pub fn apply(&self, frame: &Mat, mask: &Mat, method: ObscureMethod) -> MediaResult<Mat> {
        check_mask(frame, mask)?;

        let Some(bounds) = mask_bounds(mask)? else {
            return Ok(frame.try_clone()?);
        };

        match method {
            ObscureMethod::Mosaic => self.mosaic(frame, mask, bounds),
            ObscureMethod::Blur => self.blur(frame, mask, bounds),
            ObscureMethod::Black => self.fill(frame, mask),
            ObscureMethod::Telea => self.inpaint(frame, mask, bounds, photo::INPAINT_TELEA),
            ObscureMethod::Ns => self.inpaint(frame, mask, bounds, photo::INPAINT_NS),
        }
    }

    /// Downsample the bounding box to roughly one pixel per block, then scale
    /// it back up with nearest-neighbour so each block becomes one colour.
    fn mosaic(&self, frame: &Mat, mask: &Mat, bounds: Rect) -> MediaResult<Mat> {
        let block = self.config.mosaic_block_size.max(1);
        let region = Mat::roi(frame, bounds)?.try_clone()?;

        let small_size = Size::new((bounds.width / block).max(1), (bounds.height / block).max(1));
        let mut small = Mat::default();
        imgproc::resize(&region, &mut small, small_size, 0.0, 0.0, imgproc::INTER_LINEAR)?;

        let mut pixelated = Mat::default();
        imgproc::resize(&small, &mut pixelated, bounds.size(), 0.0, 0.0, imgproc::INTER_NEAREST)?;

        composite(frame, mask, bounds, &pixelated)
    }

    /// Gaussian blur over the bounding box grown by half a kernel, so edge
    /// pixels are averaged with real neighbours instead of border padding.
    fn blur(&self, frame: &Mat, mask: &Mat, bounds: Rect) -> MediaResult<Mat> {
        let kernel = self.config.blur_kernel_size.max(1) | 1;
        let context = grow_within(bounds, kernel / 2, frame.cols(), frame.rows());

        let region = Mat::roi(frame, context)?.try_clone()?;
        let mut blurred = Mat::default();
        imgproc::gaussian_blur_def(&region, &mut blurred, Size::new(kernel, kernel), 0.0)?;

        composite(frame, mask, context, &blurred)
    }

    fn fill(&self, frame: &Mat, mask: &Mat) -> MediaResult<Mat> {
        let [b, g, r] = self.config.fill_color;
        let solid = Mat::new_rows_cols_with_default(
            frame.rows(),
            frame.cols(),
            frame.typ(),
            Scalar::new(b as f64, g as f64, r as f64, 0.0),
        )?;

        let mut output = frame.try_clone()?;
        solid.copy_to_masked(&mut output, mask)?;
        Ok(output)
    }

    /// Inpaint inside a margin around the mask; untouched pixels are copied back.
    fn inpaint(&self, frame: &Mat, mask: &Mat, bounds: Rect, flags: i32) -> MediaResult<Mat> {
        let margin = (self.config.inpaint_radius.ceil() as i32).max(1) * 2;
        let context = grow_within(bounds, margin, frame.cols(), frame.rows());

        let region = Mat::roi(frame, context)?.try_clone()?;
        let region_mask = Mat::roi(mask, context)?.try_clone()?;

        let mut restored = Mat::default();
        photo::inpaint(&region, &region_mask, &mut restored, self.config.inpaint_radius, flags)?;

        composite(frame, mask, context, &restored)
    }
}

/// Copy the masked pixels of `patch` over `frame` inside `area`.
fn composite(frame: &Mat, mask: &Mat, area: Rect, patch: &Mat) -> MediaResult<Mat> {
    let mut output = frame.try_clone()?;
    let area_mask = Mat::roi(mask, area)?;
    let mut area_out = Mat::roi_mut(&mut output, area)?;
    patch.copy_to_masked(&mut *area_out, &*area_mask)?;
    drop(area_out);
    Ok(output)
}

/// Tight bounding box of the active pixels, `None` when there are none.
fn mask_bounds(mask: &Mat) -> MediaResult<Option<Rect>> {
    if core::count_non_zero(mask)? == 0 {
        return Ok(None);
    }
    let mut points = Mat::default();
    core::find_non_zero(mask, &mut points)?;
    let bounds = imgproc::bounding_rect(&points)?;
    Ok((bounds.area() > 0).then_some(bounds))
}

fn grow_within(rect: Rect, by: i32, width: i32, height: i32) -> Rect {
    let x = (rect.x - by).max(0);
    let y = (rect.y - by).max(0);
    let right = (rect.x + rect.width + by).min(width);
    let bottom = (rect.y + rect.height + by).min(height);
    Rect::new(x, y, right - x, bottom - y)
}

fn check_mask(frame: &Mat, mask: &Mat) -> MediaResult<()> {
    if frame.rows() != mask.rows() || frame.cols() != mask.cols() {
        return Err(MediaError::internal(format!(
            "Mask is {}x{} but frame is {}x{}",
            mask.cols(),
            mask.rows(),
            frame.cols(),
            frame.rows()
        )));
    }
    if mask.typ() != core::CV_8UC1 {
        return Err(MediaError::internal("Mask must be single-channel 8-bit"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{compile_masks, fill_rect};
    use crate::test_support::{empty_mask, gradient_frame};
    use opencv::core::Vec3b;
    use std::collections::HashSet;
    use unmark_models::{PixelRect, RegionDescriptor, REGION_PADDING};

    fn pixel(frame: &Mat, x: i32, y: i32) -> [u8; 3] {
        let px = frame.at_2d::<Vec3b>(y, x).unwrap();
        [px[0], px[1], px[2]]
    }

    fn same_pixels(a: &Mat, b: &Mat) -> bool {
        a.data_bytes().unwrap() == b.data_bytes().unwrap()
    }

    fn mask_with(width: i32, height: i32, rect: PixelRect) -> Mat {
        let mut mask = empty_mask(width, height);
        fill_rect(&mut mask, rect).unwrap();
        mask
    }

    fn unchanged_outside(before: &Mat, after: &Mat, rect: PixelRect) -> bool {
        (0..before.rows()).all(|y| {
            (0..before.cols()).all(|x| rect.contains(x, y) || pixel(before, x, y) == pixel(after, x, y))
        })
    }

    fn distinct_colors(frame: &Mat, rect: PixelRect) -> usize {
        let mut colors = HashSet::new();
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                colors.insert(pixel(frame, x, y));
            }
        }
        colors.len()
    }

    /// Sum of absolute differences between horizontal neighbours.
    fn variation(frame: &Mat, rect: PixelRect) -> u64 {
        let mut total = 0;
        for y in rect.y..rect.bottom() {
            for x in rect.x + 1..rect.right() {
                let (a, b) = (pixel(frame, x - 1, y), pixel(frame, x, y));
                total += (0..3).map(|c| a[c].abs_diff(b[c]) as u64).sum::<u64>();
            }
        }
        total
    }

    #[test]
    fn test_zero_area_mask_is_identity_for_every_method() {
        let frame = gradient_frame(96, 64, 3);
        let mask = empty_mask(96, 64);
        let transformer = FrameTransformer::default();

        for method in ObscureMethod::ALL {
            let out = transformer.apply(&frame, &mask, method).unwrap();
            assert!(same_pixels(&frame, &out), "{method} changed an unmasked frame");
        }
    }

    #[test]
    fn test_pixels_outside_mask_are_untouched() {
        let frame = gradient_frame(120, 80, 9);
        let rect = PixelRect::new(30, 20, 40, 30);
        let mask = mask_with(120, 80, rect);
        let transformer = FrameTransformer::default();

        for method in ObscureMethod::ALL {
            let out = transformer.apply(&frame, &mask, method).unwrap();
            assert!(unchanged_outside(&frame, &out, rect), "{method} leaked outside its mask");
        }
    }

    #[test]
    fn test_black_fills_masked_pixels() {
        let frame = gradient_frame(64, 64, 0);
        let rect = PixelRect::new(10, 10, 20, 20);
        let out = FrameTransformer::default()
            .apply(&frame, &mask_with(64, 64, rect), ObscureMethod::Black)
            .unwrap();

        assert_eq!(pixel(&out, 10, 10), [0, 0, 0]);
        assert_eq!(pixel(&out, 29, 29), [0, 0, 0]);
        assert_eq!(pixel(&out, 30, 30), pixel(&frame, 30, 30));
    }

    #[test]
    fn test_custom_fill_color() {
        let frame = gradient_frame(32, 32, 0);
        let transformer = FrameTransformer::new(TransformConfig {
            fill_color: [255, 0, 128],
            ..TransformConfig::default()
        });
        let out = transformer
            .apply(&frame, &mask_with(32, 32, PixelRect::new(0, 0, 8, 8)), ObscureMethod::Black)
            .unwrap();
        assert_eq!(pixel(&out, 4, 4), [255, 0, 128]);
    }

    #[test]
    fn test_mosaic_is_coarser_than_input() {
        let frame = gradient_frame(200, 120, 1);
        let rect = PixelRect::new(40, 20, 100, 60);
        let out = FrameTransformer::default()
            .apply(&frame, &mask_with(200, 120, rect), ObscureMethod::Mosaic)
            .unwrap();

        // 100x60 collapses to 5x3 cells
        assert!(distinct_colors(&frame, rect) > 15);
        assert!(distinct_colors(&out, rect) <= 15);
        assert_eq!(pixel(&out, 40, 20), pixel(&out, 59, 39));
    }

    #[test]
    fn test_mosaic_on_small_region_degrades_to_single_cell() {
        let frame = gradient_frame(64, 64, 2);
        let rect = PixelRect::new(5, 5, 12, 9);
        let out = FrameTransformer::default()
            .apply(&frame, &mask_with(64, 64, rect), ObscureMethod::Mosaic)
            .unwrap();

        assert_eq!(distinct_colors(&out, rect), 1);
    }

    #[test]
    fn test_blur_smooths_masked_region() {
        let frame = gradient_frame(160, 120, 4);
        let rect = PixelRect::new(40, 30, 60, 50);
        let out = FrameTransformer::default()
            .apply(&frame, &mask_with(160, 120, rect), ObscureMethod::Blur)
            .unwrap();

        assert!(variation(&out, rect) * 3 < variation(&frame, rect));
    }

    #[test]
    fn test_inpaint_changes_masked_region() {
        let frame = gradient_frame(96, 96, 5);
        let rect = PixelRect::new(30, 30, 20, 20);
        let mask = mask_with(96, 96, rect);
        let transformer = FrameTransformer::default();

        for method in [ObscureMethod::Telea, ObscureMethod::Ns] {
            let out = transformer.apply(&frame, &mask, method).unwrap();
            assert!(!same_pixels(&frame, &out), "{method} left the region untouched");
        }
    }

    #[test]
    fn test_mask_size_mismatch_is_an_error() {
        let frame = gradient_frame(64, 48, 0);
        let mask = empty_mask(48, 64);
        let err = FrameTransformer::default()
            .apply(&frame, &mask, ObscureMethod::Blur)
            .unwrap_err();
        assert!(matches!(err, MediaError::Internal(_)));
    }

    #[test]
    fn test_apply_all_runs_in_priority_order() {
        let frame = gradient_frame(100, 100, 6);
        let regions = [
            RegionDescriptor::new(0.2, 0.2, 0.3, 0.3, ObscureMethod::Black),
            RegionDescriptor::new(0.2, 0.2, 0.3, 0.3, ObscureMethod::Mosaic),
        ];
        let masks = compile_masks(&regions, 100, 100, REGION_PADDING).unwrap();
        let out = FrameTransformer::default().apply_all(&frame, &masks).unwrap();

        // black runs after mosaic and wins on the shared pixels
        assert_eq!(pixel(&out, 30, 30), [0, 0, 0]);
        assert_eq!(pixel(&out, 90, 90), pixel(&frame, 90, 90));
    }

    #[test]
    fn test_apply_all_without_masks_copies_frame() {
        let frame = gradient_frame(40, 30, 7);
        let masks = compile_masks(&[], 40, 30, REGION_PADDING).unwrap();
        let out = FrameTransformer::default().apply_all(&frame, &masks).unwrap();
        assert!(same_pixels(&frame, &out));
    }
}
