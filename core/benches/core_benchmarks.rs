use criterion::{Criterion, black_box, criterion_group, criterion_main};

use redlilium_core::asset::AssetReference;
use redlilium_core::hash::fnv1a_hash;
use redlilium_core::math::{Rotator, Vec3, mat4_from_translation, perspective_rh};

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

fn bench_fnv1a_small(c: &mut Criterion) {
    c.bench_function("fnv1a_24_bytes", |b| {
        let data = [7u8; 24];
        b.iter(|| fnv1a_hash(black_box(&data)));
    });
}

fn bench_fnv1a_bytecode(c: &mut Criterion) {
    c.bench_function("fnv1a_16k_bytes", |b| {
        let data = vec![3u8; 16 * 1024];
        b.iter(|| fnv1a_hash(black_box(&data)));
    });
}

fn bench_asset_path_parse(c: &mut Criterion) {
    c.bench_function("asset_reference_parse", |b| {
        b.iter(|| AssetReference::parse(black_box("Material'EditorMaterials:AxisX_Mat")));
    });
}

// ---------------------------------------------------------------------------
// Math
// ---------------------------------------------------------------------------

fn bench_axis_matrix(c: &mut Criterion) {
    c.bench_function("translate_rotator_matrix", |b| {
        b.iter(|| {
            mat4_from_translation(black_box(Vec3::new(1.0, 2.0, 3.0)))
                * Rotator::new(0.0, -90.0, 0.0).to_matrix()
        });
    });
}

fn bench_view_projection(c: &mut Criterion) {
    c.bench_function("perspective_rh", |b| {
        b.iter(|| perspective_rh(black_box(1.0), black_box(16.0 / 9.0), 0.1, 1000.0));
    });
}

criterion_group!(hashing, bench_fnv1a_small, bench_fnv1a_bytecode, bench_asset_path_parse);
criterion_group!(math, bench_axis_matrix, bench_view_projection);
criterion_main!(hashing, math);
