//! Obscuring throughput benchmarks.
//!
//! ```bash
//! cargo bench --package unmark-media --bench obscure
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use opencv::{
    core::{Mat, Scalar, Vec3b, CV_8UC3},
    prelude::*,
};
use std::time::Duration;
use unmark_media::{compile_masks, FrameTransformer};
use unmark_models::{ObscureMethod, RegionDescriptor, REGION_PADDING};

/// Synthetic BGR frame with per-pixel variation.
fn create_test_frame(width: i32, height: i32) -> Mat {
    let mut frame = Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(128.0))
        .expect("Failed to create test frame");

    for y in 0..height {
        for x in 0..width {
            let pixel = frame.at_2d_mut::<Vec3b>(y, x).unwrap();
            pixel[0] = ((x * 7 + y * 11) % 256) as u8;
            pixel[1] = ((x * 13 + y * 17) % 256) as u8;
            pixel[2] = ((x * 19 + y * 23) % 256) as u8;
        }
    }

    frame
}

/// One watermark-sized region in the lower right corner per method.
fn bench_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("obscure_method");
    group.warm_up_time(Duration::from_secs(2));
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(1));

    let transformer = FrameTransformer::default();

    for (width, height) in [(1280, 720), (1920, 1080)] {
        let frame = create_test_frame(width, height);

        for method in ObscureMethod::ALL {
            let regions = [RegionDescriptor::new(0.75, 0.85, 0.2, 0.1, method)];
            let masks = compile_masks(&regions, width, height, REGION_PADDING).unwrap();

            group.bench_with_input(
                BenchmarkId::new(method.as_str(), format!("{}x{}", width, height)),
                &masks,
                |b, masks| b.iter(|| black_box(transformer.apply_all(&frame, masks).unwrap())),
            );
        }
    }

    group.finish();
}

/// Mask compilation for a growing number of regions.
fn bench_compile_masks(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_masks");

    for count in [1usize, 8, 32] {
        let regions: Vec<_> = (0..count)
            .map(|i| {
                let offset = (i % 8) as f64 * 0.1;
                RegionDescriptor::new(offset, offset, 0.1, 0.05, ObscureMethod::ALL[i % 5])
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), &regions, |b, regions| {
            b.iter(|| black_box(compile_masks(regions, 1920, 1080, REGION_PADDING).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_methods, bench_compile_masks);
criterion_main!(benches);
