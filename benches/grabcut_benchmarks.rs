//! Performance benchmarks for imageops-grabcut
//!
//! Measures the per-pixel stages separately from the full loop, since the
//! min-cut dominates end-to-end time on larger inputs.

use criterion::*;
use image::Rgb;
use imageops_grabcut::{
    compute_beta, compute_weights, BoundingBox, ColorImage, DiagonalScaling, EnergyModel,
    GaussianMixture, GrabCut, GrabCutConfig, Image, MixtureSettings, Neighborhood,
};
use itertools::iproduct;
use std::hint::black_box;

/// Helper function to create a test RGB image with an object in the middle
fn create_scene(width: u32, height: u32) -> Image<Rgb<u8>> {
    let mut image: Image<Rgb<u8>> = Image::new(width, height);
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let radius = width.min(height) as f32 / 4.0;

    iproduct!(0..height, 0..width).for_each(|(y, x)| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let pixel = if (dx * dx + dy * dy).sqrt() < radius {
            Rgb([200 + (x % 40) as u8, 60, 50 + (y % 30) as u8])
        } else {
            let r = ((x * 120) / width) as u8;
            let g = ((y * 160) / height) as u8;
            Rgb([r, g, 180])
        };
        image.put_pixel(x, y, pixel);
    });

    image
}

fn centered_box(width: u32, height: u32) -> BoundingBox {
    BoundingBox::new(width / 5, height / 5, width * 4 / 5, height * 4 / 5)
}

/// Benchmark contrast estimation and pairwise weights
fn bench_smoothness(c: &mut Criterion) {
    let sizes = vec![
        (100, 100), // Small
        (320, 240), // Medium
        (640, 480), // Large
    ];

    let mut group = c.benchmark_group("smoothness");
    group.sample_size(10);

    for (width, height) in sizes {
        let pixels = width * height;
        group.throughput(Throughput::Elements(pixels as u64));

        let colors = ColorImage::from_rgb(&create_scene(width, height)).unwrap();

        group.bench_with_input(
            BenchmarkId::new("compute_beta", format!("{}x{}", width, height)),
            &colors,
            |b, img| b.iter(|| black_box(compute_beta(img))),
        );

        for neighborhood in [Neighborhood::Four, Neighborhood::Eight] {
            group.bench_with_input(
                BenchmarkId::new(
                    format!("compute_weights_{:?}", neighborhood),
                    format!("{}x{}", width, height),
                ),
                &colors,
                |b, img| {
                    b.iter(|| {
                        black_box(compute_weights(
                            img,
                            neighborhood,
                            0.01,
                            DiagonalScaling::None,
                        ))
                    })
                },
            );
        }
    }

    group.finish();
}

/// Benchmark mixture fitting and unary evaluation
fn bench_color_models(c: &mut Criterion) {
    let sizes = vec![(100, 100), (320, 240), (640, 480)];

    let mut group = c.benchmark_group("color_models");
    group.sample_size(10);

    for (width, height) in sizes {
        let pixels = width * height;
        group.throughput(Throughput::Elements(pixels as u64));

        let colors = ColorImage::from_rgb(&create_scene(width, height)).unwrap();
        let samples = colors.pixels().to_vec();

        group.bench_with_input(
            BenchmarkId::new("gmm_initialize", format!("{}x{}", width, height)),
            &samples,
            |b, s| b.iter(|| black_box(GaussianMixture::initialize(s, 5, MixtureSettings::default()))),
        );

        let (model, labels) = GaussianMixture::initialize(&samples, 5, MixtureSettings::default());
        group.bench_with_input(
            BenchmarkId::new("gmm_reestimate", format!("{}x{}", width, height)),
            &samples,
            |b, s| b.iter(|| black_box(model.reestimate(s, &labels))),
        );

        group.bench_with_input(
            BenchmarkId::new("assign_components", format!("{}x{}", width, height)),
            &samples,
            |b, s| b.iter(|| black_box(model.assign_components(s))),
        );

        let energy = EnergyModel::new(50.0, 1e9);
        let bbox = centered_box(width, height);
        group.bench_with_input(
            BenchmarkId::new("unary_costs", format!("{}x{}", width, height)),
            &colors,
            |b, img| b.iter(|| black_box(energy.unary_costs(img, &bbox, &model, &model))),
        );
    }

    group.finish();
}

/// Benchmark the full refinement loop
fn bench_grab_cut(c: &mut Criterion) {
    let sizes = vec![
        (32, 32), // Small
        (64, 48), // Medium
    ];

    let mut group = c.benchmark_group("grab_cut");
    group.sample_size(10); // Fewer samples for expensive operations

    for (width, height) in sizes {
        let pixels = width * height;
        group.throughput(Throughput::Elements(pixels as u64));

        let image = create_scene(width, height);
        let bbox = centered_box(width, height);

        for max_iterations in [1, 5] {
            let config = GrabCutConfig::default().with_max_iterations(max_iterations);
            group.bench_with_input(
                BenchmarkId::new(
                    format!("iterations_{}", max_iterations),
                    format!("{}x{}", width, height),
                ),
                &image,
                |b, img| b.iter(|| black_box(img.grab_cut(bbox, &config).unwrap())),
            );
        }
    }

    group.finish();
}

/// Benchmark single iterations at sizes where the min-cut dominates
fn bench_grab_cut_large(c: &mut Criterion) {
    let sizes = vec![(256, 256), (640, 480)];

    let mut group = c.benchmark_group("grab_cut_large");
    group.sample_size(10);

    for (width, height) in sizes {
        group.throughput(Throughput::Elements((width * height) as u64));

        let image = create_scene(width, height);
        let bbox = centered_box(width, height);
        let config = GrabCutConfig::default().with_max_iterations(1);
        group.bench_with_input(
            BenchmarkId::new("iterations_1", format!("{}x{}", width, height)),
            &image,
            |b, img| b.iter(|| black_box(img.grab_cut(bbox, &config).unwrap())),
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_smoothness,
    bench_color_models,
    bench_grab_cut,
    bench_grab_cut_large
);
criterion_main!(benches);
