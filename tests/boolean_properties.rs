// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Algebraic properties of the Boolean operations

use approx::assert_relative_eq;
use nalgebra::{Matrix4, Vector3};
use polycork::geometry::analytics::{dimensions, signed_volume, surface_area};
use polycork::geometry::mesh::canonical_triangle_set;
use polycork::geometry::topology::EdgeMap;
use polycork::geometry::{boolean, is_closed, BooleanOp, Primitive, Provenance};
use polycork::{EngineConfig, Mesh};
use std::collections::HashMap;

fn cube_at(offset: Vector3<f64>) -> Mesh {
    let mut mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
    mesh.transform(&Matrix4::new_translation(&offset));
    mesh
}

/// Overlapping cubes with no coplanar faces
fn general_pair() -> (Mesh, Mesh) {
    (cube_at(Vector3::zeros()), cube_at(Vector3::new(0.5, 0.25, 0.125)))
}

const OVERLAP: f64 = 0.5 * 0.75 * 0.875;

#[test]
fn test_union_is_idempotent() {
    let cube = cube_at(Vector3::zeros());
    let result = polycork::union(&cube, &cube).unwrap();
    assert_eq!(canonical_triangle_set(&result), canonical_triangle_set(&cube));
}

#[test]
fn test_difference_annihilates() {
    let sphere = Primitive::sphere(1.0, 12).to_mesh();
    let result = polycork::difference(&sphere, &sphere).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.triangle_count(), 0);
}

#[test]
fn test_union_and_intersection_commute() {
    let (a, b) = general_pair();

    let ab = polycork::union(&a, &b).unwrap();
    let ba = polycork::union(&b, &a).unwrap();
    assert_relative_eq!(signed_volume(&ab), signed_volume(&ba), epsilon = 1e-9);
    assert_relative_eq!(surface_area(&ab), surface_area(&ba), epsilon = 1e-9);

    let ab = polycork::intersection(&a, &b).unwrap();
    let ba = polycork::intersection(&b, &a).unwrap();
    assert_relative_eq!(signed_volume(&ab), OVERLAP, epsilon = 1e-9);
    assert_relative_eq!(signed_volume(&ba), OVERLAP, epsilon = 1e-9);
    assert_relative_eq!(surface_area(&ab), surface_area(&ba), epsilon = 1e-9);
}

#[test]
fn test_difference_does_not_commute() {
    let a = cube_at(Vector3::zeros());
    let mut b = Primitive::cube(Vector3::new(2.0, 0.5, 0.5), false).to_mesh();
    b.transform(&Matrix4::new_translation(&Vector3::new(0.3, 0.2, 0.35)));

    let a_minus_b = polycork::difference(&a, &b).unwrap();
    let b_minus_a = polycork::difference(&b, &a).unwrap();
    assert_relative_eq!(signed_volume(&a_minus_b), 1.0 - 0.7 * 0.25, epsilon = 1e-9);
    assert_relative_eq!(signed_volume(&b_minus_a), 0.5 - 0.7 * 0.25, epsilon = 1e-9);
}

#[test]
fn test_xor_matches_both_differences() {
    let (a, b) = general_pair();

    let xor = polycork::symmetric_difference(&a, &b).unwrap();
    let a_minus_b = polycork::difference(&a, &b).unwrap();
    let b_minus_a = polycork::difference(&b, &a).unwrap();

    assert_relative_eq!(
        signed_volume(&xor),
        signed_volume(&a_minus_b) + signed_volume(&b_minus_a),
        epsilon = 1e-9
    );
    assert_relative_eq!(signed_volume(&xor), 2.0 - 2.0 * OVERLAP, epsilon = 1e-9);
    assert_relative_eq!(
        surface_area(&xor),
        surface_area(&a_minus_b) + surface_area(&b_minus_a),
        epsilon = 1e-9
    );

    let swapped = polycork::symmetric_difference(&b, &a).unwrap();
    assert_relative_eq!(signed_volume(&swapped), signed_volume(&xor), epsilon = 1e-9);
}

#[test]
fn test_disjoint_solids() {
    let a = cube_at(Vector3::zeros());
    let mut b = Primitive::sphere(0.5, 10).to_mesh();
    b.transform(&Matrix4::new_translation(&Vector3::new(3.0, 0.5, 0.5)));

    let inter = polycork::intersection(&a, &b).unwrap();
    assert!(inter.is_empty());

    let union = polycork::union(&a, &b).unwrap();
    assert_eq!(union.triangle_count(), a.triangle_count() + b.triangle_count());
    assert_relative_eq!(
        signed_volume(&union),
        signed_volume(&a) + signed_volume(&b),
        epsilon = 1e-9
    );

    let diff = polycork::difference(&a, &b).unwrap();
    assert_eq!(canonical_triangle_set(&diff), canonical_triangle_set(&a));
}

#[test]
fn test_nested_solids() {
    let outer = Primitive::cube(Vector3::new(4.0, 4.0, 4.0), true).to_mesh();
    let inner = Primitive::sphere(1.0, 12).to_mesh();

    let union = polycork::union(&outer, &inner).unwrap();
    assert_eq!(canonical_triangle_set(&union), canonical_triangle_set(&outer));

    let inter = polycork::intersection(&outer, &inner).unwrap();
    assert_eq!(canonical_triangle_set(&inter), canonical_triangle_set(&inner));

    // A hollow shell: outer surface plus the inverted sphere
    let shell = polycork::difference(&outer, &inner).unwrap();
    assert!(is_closed(&shell));
    assert_relative_eq!(
        signed_volume(&shell),
        64.0 - signed_volume(&inner),
        epsilon = 1e-9
    );
}

#[test]
fn test_resolve_keeps_both_operands() {
    let (a, b) = general_pair();
    let resolved = polycork::resolve_intersections(&a, &b).unwrap();
    assert!(resolved.triangle_count() >= a.triangle_count() + b.triangle_count());
    assert_relative_eq!(surface_area(&resolved), 12.0, epsilon = 1e-9);
}

#[test]
fn test_general_position_results_are_solid() {
    let (a, b) = general_pair();
    for op in [BooleanOp::Union, BooleanOp::Intersection, BooleanOp::Difference] {
        let result = boolean(&a, &b, op, &EngineConfig::default()).unwrap();
        assert!(polycork::is_solid(&result), "{} result is not solid", op.name());
    }
}

#[test]
fn test_serial_and_parallel_agree() {
    let a = Primitive::sphere(1.0, 16).to_mesh();
    let mut b = a.clone();
    b.transform(&Matrix4::new_translation(&Vector3::new(0.7, 0.11, 0.05)));

    let parallel = boolean(&a, &b, BooleanOp::Union, &EngineConfig::default()).unwrap();
    let serial = boolean(&a, &b, BooleanOp::Union, &EngineConfig::serial()).unwrap();
    assert_eq!(canonical_triangle_set(&parallel), canonical_triangle_set(&serial));
}

#[test]
fn test_remesh_keeps_result_closed() {
    let (a, b) = general_pair();
    let config = EngineConfig::default().with_remesh();
    let result = boolean(&a, &b, BooleanOp::Union, &config).unwrap();
    assert!(is_closed(&result));
    // Collapses may move unpinned vertices slightly
    assert_relative_eq!(signed_volume(&result), 2.0 - OVERLAP, epsilon = 0.05);
}

#[test]
fn test_resolve_curve_is_a_clean_seam() {
    let (a, b) = general_pair();
    let resolved = boolean(&a, &b, BooleanOp::Resolve, &EngineConfig::default()).unwrap();
    let edges = EdgeMap::build(&resolved.triangles);

    let mut curve_degree: HashMap<usize, usize> = HashMap::new();
    let mut curve_edges = 0;
    for (&(u, v), triangles) in edges.iter() {
        let from_a = triangles
            .iter()
            .filter(|&&t| resolved.triangles[t].provenance == Provenance::A)
            .count();
        let from_b = triangles.len() - from_a;
        if from_a == 0 || from_b == 0 {
            assert_eq!(triangles.len(), 2, "edge ({u}, {v}) is not shared by two triangles");
            continue;
        }
        assert_eq!((from_a, from_b), (2, 2), "curve edge ({u}, {v})");
        curve_edges += 1;
        *curve_degree.entry(u).or_default() += 1;
        *curve_degree.entry(v).or_default() += 1;
    }

    assert!(curve_edges >= 3);
    for (vertex, degree) in curve_degree {
        assert_eq!(degree, 2, "curve vertex {vertex}");
    }
}

/// Unit cubes sharing four face planes. The coplanar contacts force the
/// perturbation retry, after which the result is moved back to exact
/// coordinates.
mod shared_axis {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn pair() -> (Mesh, Mesh) {
        (cube_at(Vector3::zeros()), cube_at(Vector3::new(0.5, 0.0, 0.0)))
    }

    fn assert_dimensions(mesh: &Mesh, expected: [f64; 3]) {
        let size = dimensions(mesh);
        for axis in 0..3 {
            assert_relative_eq!(size[axis], expected[axis], epsilon = TOLERANCE);
        }
    }

    /// Every vertex lies in the axis-aligned box `[x0, x1] x [0, 1] x [0, 1]`
    fn assert_within(mesh: &Mesh, x0: f64, x1: f64) {
        for vertex in &mesh.vertices {
            let p = vertex.position;
            assert!(
                p.x >= x0 - TOLERANCE && p.x <= x1 + TOLERANCE,
                "vertex {p:?} outside x range [{x0}, {x1}]"
            );
            assert!(p.y >= -TOLERANCE && p.y <= 1.0 + TOLERANCE, "vertex {p:?}");
            assert!(p.z >= -TOLERANCE && p.z <= 1.0 + TOLERANCE, "vertex {p:?}");
        }
    }

    #[test]
    fn test_intersection_box() {
        let (a, b) = pair();
        let result = polycork::intersection(&a, &b).unwrap();
        assert!(is_closed(&result));
        assert_dimensions(&result, [0.5, 1.0, 1.0]);
        assert_within(&result, 0.5, 1.0);
        assert_relative_eq!(signed_volume(&result), 0.5, epsilon = TOLERANCE);
    }

    #[test]
    fn test_union_box() {
        let (a, b) = pair();
        let result = polycork::union(&a, &b).unwrap();
        assert!(is_closed(&result));
        assert_dimensions(&result, [1.5, 1.0, 1.0]);
        assert_within(&result, 0.0, 1.5);
        assert_relative_eq!(signed_volume(&result), 1.5, epsilon = TOLERANCE);
    }

    #[test]
    fn test_difference_remainder() {
        let (a, b) = pair();
        let result = polycork::difference(&a, &b).unwrap();
        assert!(is_closed(&result));
        assert_dimensions(&result, [0.5, 1.0, 1.0]);
        assert_within(&result, 0.0, 0.5);
        assert_relative_eq!(signed_volume(&result), 0.5, epsilon = TOLERANCE);
        assert!(result.vertices.iter().all(|v| v.position.x <= 0.5));
    }

    #[test]
    fn test_xor_is_both_remainders() {
        let (a, b) = pair();
        let result = polycork::symmetric_difference(&a, &b).unwrap();
        assert!(is_closed(&result));
        assert_dimensions(&result, [1.5, 1.0, 1.0]);
        assert_relative_eq!(signed_volume(&result), 1.0, epsilon = TOLERANCE);
        assert!(result
            .vertices
            .iter()
            .all(|v| v.position.x <= 0.5 || v.position.x >= 1.0));
    }
}
