//! Compile fractional region descriptors into one binary mask per method.

use std::collections::BTreeMap;

use opencv::core::{Mat, Rect, Scalar, CV_8UC1};
use opencv::imgproc;
use opencv::prelude::*;
use unmark_models::{ObscureMethod, PixelRect, RegionDescriptor};

use crate::error::{MediaError, MediaResult};

/// Value written to active mask pixels.
pub const MASK_ACTIVE: f64 = 255.0;

/// Frame-sized single-channel masks keyed by method, iterated in application order.
#[derive(Debug)]
pub struct MaskSet {
    width: i32,
    height: i32,
    masks: BTreeMap<ObscureMethod, Mat>,
}

impl MaskSet {
    /// Frame width the masks were compiled for.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Frame height the masks were compiled for.
    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn get(&self, method: ObscureMethod) -> Option<&Mat> {
        self.masks.get(&method)
    }

    /// Methods present, in application order.
    pub fn methods(&self) -> impl Iterator<Item = ObscureMethod> + '_ {
        self.masks.keys().copied()
    }

    /// `(method, mask)` pairs in application order.
    pub fn iter(&self) -> impl Iterator<Item = (ObscureMethod, &Mat)> {
        self.masks.iter().map(|(method, mask)| (*method, mask))
    }
}

/// Build one mask per distinct method present in `regions`.
///
/// Each descriptor is scaled to pixels, grown by `padding` on every side,
/// clamped to the frame and OR-ed into its method's mask. Degenerate
/// descriptors still register their method but add no active pixels.
pub fn compile_masks(
    regions: &[RegionDescriptor],
    width: i32,
    height: i32,
    padding: i32,
) -> MediaResult<MaskSet> {
    if width <= 0 || height <= 0 {
        return Err(MediaError::internal(format!(
            "Cannot compile masks for a {}x{} frame",
            width, height
        )));
    }

    let mut masks = BTreeMap::new();

    for region in regions {
        if !masks.contains_key(&region.method) {
            let blank = Mat::new_rows_cols_with_default(height, width, CV_8UC1, Scalar::all(0.0))?;
            masks.insert(region.method, blank);
        }

        let Some(rect) = region.to_pixel_rect(width, height, padding) else {
            continue;
        };

        if let Some(mask) = masks.get_mut(&region.method) {
            fill_rect(mask, rect)?;
        }
    }

    Ok(MaskSet {
        width,
        height,
        masks,
    })
}

/// Set every pixel of `rect` (half-open) to the active value.
pub fn fill_rect(mask: &mut Mat, rect: PixelRect) -> MediaResult<()> {
    imgproc::rectangle(
        mask,
        Rect::new(rect.x, rect.y, rect.width, rect.height),
        Scalar::all(MASK_ACTIVE),
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )?;
    Ok(())
}
