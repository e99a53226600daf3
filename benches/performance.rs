// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::{Matrix4, Vector3};
use polycork::geometry::{boolean, is_self_intersecting, BooleanOp, Primitive};
use polycork::{EngineConfig, Mesh};

fn shifted(mesh: &Mesh, offset: Vector3<f64>) -> Mesh {
    let mut mesh = mesh.clone();
    mesh.transform(&Matrix4::new_translation(&offset));
    mesh
}

fn bench_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives");

    group.bench_function("cube", |b| {
        b.iter(|| Primitive::cube(black_box(Vector3::new(10.0, 10.0, 10.0)), false).to_mesh());
    });

    group.bench_function("sphere_32", |b| {
        b.iter(|| Primitive::sphere(black_box(10.0), black_box(32)).to_mesh());
    });

    group.bench_function("cylinder", |b| {
        b.iter(|| Primitive::cylinder(black_box(20.0), black_box(5.0), black_box(32)).to_mesh());
    });

    group.finish();
}

fn bench_cube_booleans(c: &mut Criterion) {
    let mut group = c.benchmark_group("cube_booleans");
    let a = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
    let b = shifted(&a, Vector3::new(0.5, 0.25, 0.125));
    let config = EngineConfig::default();

    for op in [
        BooleanOp::Union,
        BooleanOp::Difference,
        BooleanOp::Intersection,
        BooleanOp::SymmetricDifference,
        BooleanOp::Resolve,
    ] {
        group.bench_with_input(BenchmarkId::new(op.name(), ""), &op, |bench, &op| {
            bench.iter(|| boolean(black_box(&a), black_box(&b), op, &config).unwrap());
        });
    }

    group.finish();
}

fn bench_sphere_union(c: &mut Criterion) {
    let mut group = c.benchmark_group("sphere_union");
    group.sample_size(10);

    for segments in [16u32, 32, 64] {
        let a = Primitive::sphere(1.0, segments).to_mesh();
        let b = shifted(&a, Vector3::new(0.7, 0.11, 0.05));

        group.bench_with_input(BenchmarkId::new("parallel", segments), &segments, |bench, _| {
            let config = EngineConfig::default();
            bench.iter(|| boolean(&a, &b, BooleanOp::Union, &config).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("serial", segments), &segments, |bench, _| {
            let config = EngineConfig::serial();
            bench.iter(|| boolean(&a, &b, BooleanOp::Union, &config).unwrap());
        });
    }

    group.finish();
}

fn bench_self_intersection(c: &mut Criterion) {
    let mesh = Primitive::sphere(1.0, 64).to_mesh();
    c.bench_function("self_intersection_sphere_64", |b| {
        b.iter(|| is_self_intersecting(black_box(&mesh)));
    });
}

criterion_group!(
    benches,
    bench_primitives,
    bench_cube_booleans,
    bench_sphere_union,
    bench_self_intersection
);
criterion_main!(benches);
