//! Performance benchmarks for Stamp MCP Server
//!
//! Run with: `cargo bench`
//! All inputs are generated in memory; no fixture files are required.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::{Rgba, RgbaImage};
use stamp_mcp_server::pdf::{raster_to_pdf, stamp_pdf_page};
use stamp_mcp_server::{
    composite, compute_placement, BlendMode, CanvasSpec, Dimensions, PlacementMode,
};

fn white_page(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
}

fn gradient_stamp(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        Rgba([
            (x * 255 / w.max(1)) as u8,
            (y * 255 / h.max(1)) as u8,
            128,
            200,
        ])
    })
}

/// Benchmark placement computation (pure math, should be trivial)
fn bench_placement(c: &mut Criterion) {
    let canvas = CanvasSpec::raster(1200.0, 1600.0);
    let stamp = Dimensions::new(400.0, 200.0);

    c.bench_function("compute_placement", |b| {
        b.iter(|| {
            let _ = compute_placement(
                black_box(&canvas),
                black_box(stamp),
                PlacementMode::BottomRight,
                30.0,
            )
            .unwrap();
        });
    });
}

/// Benchmark compositing at typical page sizes
fn bench_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite");

    for (page_w, page_h) in [(612u32, 792u32), (1200, 1600), (2480, 3508)] {
        let page = white_page(page_w, page_h);
        let stamp = gradient_stamp(400, 200);

        let canvas = CanvasSpec::raster(page_w as f32, page_h as f32);
        let placement = compute_placement(
            &canvas,
            Dimensions::new(400.0, 200.0),
            PlacementMode::BottomRight,
            50.0,
        )
        .unwrap();

        group.throughput(Throughput::Elements(page_w as u64 * page_h as u64));
        group.bench_with_input(
            BenchmarkId::new("normal", format!("{}x{}", page_w, page_h)),
            &(&page, &stamp, &placement),
            |b, (page, stamp, placement)| {
                b.iter(|| {
                    let _ = composite(
                        black_box(page),
                        black_box(stamp),
                        placement,
                        80.0,
                        BlendMode::Normal,
                    )
                    .unwrap();
                });
            },
        );
    }

    group.finish();
}

/// Benchmark the blend modes against each other at a fixed page size
fn bench_blend_modes(c: &mut Criterion) {
    let page = white_page(1200, 1600);
    let stamp = gradient_stamp(400, 200);

    let canvas = CanvasSpec::raster(1200.0, 1600.0);
    let placement = compute_placement(
        &canvas,
        Dimensions::new(400.0, 200.0),
        PlacementMode::Center,
        100.0,
    )
    .unwrap();

    let mut group = c.benchmark_group("blend_modes");
    for (name, mode) in [
        ("normal", BlendMode::Normal),
        ("multiply", BlendMode::Multiply),
        ("screen", BlendMode::Screen),
        ("overlay", BlendMode::Overlay),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let _ = composite(black_box(&page), black_box(&stamp), &placement, 80.0, mode)
                    .unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark wrapping a composited raster as a PDF
fn bench_raster_to_pdf(c: &mut Criterion) {
    let page = white_page(1200, 1600);

    let mut group = c.benchmark_group("raster_to_pdf");
    group.throughput(Throughput::Bytes((1200 * 1600 * 4) as u64));
    group.bench_function("1200x1600", |b| {
        b.iter(|| {
            let _ = raster_to_pdf(black_box(&page)).unwrap();
        });
    });
    group.finish();
}

/// Benchmark the PDF-native stamping path end to end
fn bench_stamp_pdf_page(c: &mut Criterion) {
    let base = raster_to_pdf(&white_page(612, 792)).unwrap();
    let stamp = gradient_stamp(200, 100);

    let canvas = CanvasSpec::pdf_page(612.0, 792.0);
    let placement = compute_placement(
        &canvas,
        Dimensions::new(200.0, 100.0),
        PlacementMode::BottomRight,
        30.0,
    )
    .unwrap();

    c.bench_function("stamp_pdf_page", |b| {
        b.iter(|| {
            let _ = stamp_pdf_page(
                black_box(&base),
                black_box(&stamp),
                1,
                &placement,
                80.0,
                BlendMode::Normal,
            )
            .unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_placement,
    bench_composite,
    bench_blend_modes,
    bench_raster_to_pdf,
    bench_stamp_pdf_page,
);

criterion_main!(benches);
