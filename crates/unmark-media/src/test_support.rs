//! Synthetic frames and clips for unit tests.

use std::path::Path;

use opencv::core::{Mat, Scalar, Size, Vec3b, CV_8UC1, CV_8UC3};
use opencv::prelude::*;
use opencv::videoio::VideoWriter;

use crate::error::{MediaError, MediaResult};

/// A BGR frame where every pixel has a distinct-ish colour.
pub fn gradient_frame(width: i32, height: i32, seed: u8) -> Mat {
    let mut frame =
        Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(0.0)).unwrap();
    for y in 0..height {
        for x in 0..width {
            let px = frame.at_2d_mut::<Vec3b>(y, x).unwrap();
            *px = Vec3b::from([
                (x * 7 + y) as u8,
                (y * 5 + x * 3) as u8,
                ((x ^ y) as u8).wrapping_add(seed),
            ]);
        }
    }
    frame
}

/// An all-zero single-channel mask.
pub fn empty_mask(width: i32, height: i32) -> Mat {
    Mat::new_rows_cols_with_default(height, width, CV_8UC1, Scalar::all(0.0)).unwrap()
}

/// Write an MJPEG AVI of gradient frames at 10 fps.
pub fn write_test_video(path: &Path, width: i32, height: i32, frames: u32) -> MediaResult<()> {
    let path_str = path
        .to_str()
        .ok_or_else(|| MediaError::internal("test path is not UTF-8"))?;
    let fourcc = VideoWriter::fourcc('M', 'J', 'P', 'G')?;
    let mut writer = VideoWriter::new(path_str, fourcc, 10.0, Size::new(width, height), true)?;
    if !writer.is_opened()? {
        return Err(MediaError::internal("test video writer did not open"));
    }
    for i in 0..frames {
        writer.write(&gradient_frame(width, height, (i * 10) as u8))?;
    }
    writer.release()?;
    Ok(())
}
