use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::RgbImage;
use tempfile::TempDir;
use web_vision::diff::diff_images;

fn write_gradient(path: &std::path::Path, width: u32, height: u32, offset: u8) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            ((x % 256) as u8).wrapping_add(offset),
            (y % 256) as u8,
            128,
        ])
    });
    img.save(path).unwrap();
}

fn benchmark_diff(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.png");
    let b = tmp.path().join("b.png");
    write_gradient(&a, 1280, 800, 0);
    write_gradient(&b, 1280, 800, 64);

    c.bench_function("diff_1280x800", |bench| {
        let diff = tmp.path().join("diff.png");
        bench.iter(|| {
            let result = diff_images(black_box(&a), black_box(&b), &diff, 0.1);
            assert!(result.is_ok());
        })
    });

    let a_small = tmp.path().join("a_small.png");
    let b_small = tmp.path().join("b_small.png");
    write_gradient(&a_small, 320, 240, 0);
    write_gradient(&b_small, 320, 240, 0);

    c.bench_function("diff_320x240_identical", |bench| {
        let diff = tmp.path().join("diff_small.png");
        bench.iter(|| {
            let result = diff_images(black_box(&a_small), black_box(&b_small), &diff, 0.1);
            assert!(result.is_ok());
        })
    });
}

criterion_group!(benches, benchmark_diff);
criterion_main!(benches);
