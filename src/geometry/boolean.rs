// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Boolean operations on closed triangle meshes
//!
//! One call runs the full pipeline on a private working copy of both
//! operands: candidate pairs from two BVHs, the intersection curve,
//! retriangulation along the curve, containment classification, selection
//! and optional remeshing. A degenerate configuration found anywhere along
//! the way restarts the pipeline with operand B dilated by a deterministic
//! perturbation (or every vertex jittered, when only resolving). The
//! perturbation only decides connectivity: the result of a retry is moved
//! back to exact positions and cleaned of the zero-area pieces that leaves.

use super::attributes::{TriangleData, VertexData};
use super::bvh::BVH;
use super::classification::{classify, Surface};
use super::curve::IntersectionCurve;
use super::mesh::{canonical_triangle_set, Containment, Mesh, Provenance, Triangle};
use super::mesh_utils::validate_solid;
use super::remesh::remesh;
use super::repair::{repair_degeneracies, weld_vertices};
use super::tie_break::{dilate_positions, outward_directions, perturb_positions, perturbation_magnitude};
use super::topology::update_manifold_flags;
use super::triangle_intersection::{edge_key, shared_vertices};
use super::triangle_splitting::{subdivide, Subdivision};
use crate::config::{EngineConfig, WELD_TOLERANCE_SCALE};
use crate::error::{CorkError, CorkResult};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BooleanOp {
    Union,
    /// A minus B
    Difference,
    Intersection,
    SymmetricDifference,
    /// Make the intersection curve explicit and keep everything
    Resolve,
}

impl BooleanOp {
    pub fn name(self) -> &'static str {
        match self {
            BooleanOp::Union => "union",
            BooleanOp::Difference => "difference",
            BooleanOp::Intersection => "intersection",
            BooleanOp::SymmetricDifference => "xor",
            BooleanOp::Resolve => "resolve",
        }
    }

    /// Whether a classified triangle is kept, and if so whether it is flipped
    fn select(self, provenance: Provenance, label: Containment) -> Option<bool> {
        let inside = label == Containment::Inside;
        match self {
            BooleanOp::Union => (!inside).then_some(false),
            BooleanOp::Intersection => inside.then_some(false),
            BooleanOp::Difference => match provenance {
                Provenance::A => (!inside).then_some(false),
                Provenance::B => inside.then_some(true),
            },
            // (A - B) + (B - A): the inside part of either operand is kept
            // facing the other way
            BooleanOp::SymmetricDifference => Some(inside),
            BooleanOp::Resolve => Some(false),
        }
    }
}

/// Run `op` on two meshes
///
/// Inputs are checked before any work starts. For every operation except
/// [`BooleanOp::Resolve`] both operands must be solids unless
/// `config.check_solidity` is off. The result is a new mesh containing only
/// referenced vertices.
pub fn boolean<V: VertexData, T: TriangleData>(
    a: &Mesh<V, T>,
    b: &Mesh<V, T>,
    op: BooleanOp,
    config: &EngineConfig,
) -> CorkResult<Mesh<V, T>> {
    if op == BooleanOp::Resolve {
        a.validate()?;
        b.validate()?;
    } else {
        validate_solid(a, config)?;
        validate_solid(b, config)?;

        if canonical_triangle_set(a) == canonical_triangle_set(b) {
            debug!("{}: operands are identical", op.name());
            return Ok(match op {
                BooleanOp::Union | BooleanOp::Intersection => compact(a.clone()),
                _ => Mesh::new(),
            });
        }
    }

    if op == BooleanOp::SymmetricDifference {
        return symmetric_difference(a, b, config);
    }
    run(a, b, op, config)
}

/// Retry loop: the unperturbed attempt, then up to
/// `max_perturbation_attempts` perturbed ones
fn run<V: VertexData, T: TriangleData>(
    a: &Mesh<V, T>,
    b: &Mesh<V, T>,
    op: BooleanOp,
    config: &EngineConfig,
) -> CorkResult<Mesh<V, T>> {
    let working = a.disjoint_union(b);
    let diagonal = working.bounding_box().diagonal();
    let attempts = config.max_perturbation_attempts + 1;

    for attempt in 0..attempts {
        match run_attempt(&working, a.vertex_count(), op, config, attempt, diagonal) {
            Ok(result) => {
                debug!(
                    "{}: {} triangles, {} vertices after {} attempt(s)",
                    op.name(),
                    result.triangle_count(),
                    result.vertex_count(),
                    attempt + 1
                );
                return Ok(result);
            }
            Err(err) if err.is_degenerate() => {
                warn!(
                    "{}: degenerate configuration on attempt {}/{}, perturbing",
                    op.name(),
                    attempt + 1,
                    attempts
                );
            }
            Err(err) => return Err(err),
        }
    }

    Err(CorkError::DegenerateIntersection { attempts })
}

/// (A - B) + (B - A)
///
/// In general position a single pass labels both parts. Once a perturbation
/// is needed each difference must dilate its own subtrahend, so the two are
/// computed separately and welded along the curve they share.
fn symmetric_difference<V: VertexData, T: TriangleData>(
    a: &Mesh<V, T>,
    b: &Mesh<V, T>,
    config: &EngineConfig,
) -> CorkResult<Mesh<V, T>> {
    let op = BooleanOp::SymmetricDifference;
    let working = a.disjoint_union(b);
    let diagonal = working.bounding_box().diagonal();

    match run_attempt(&working, a.vertex_count(), op, config, 0, diagonal) {
        Err(err) if err.is_degenerate() => {
            warn!("{}: degenerate configuration, combining both differences", op.name());
            let mut result = run(a, b, BooleanOp::Difference, config)?;
            let mut reverse = run(b, a, BooleanOp::Difference, config)?;
            for triangle in &mut reverse.triangles {
                triangle.provenance = triangle.provenance.other();
            }
            result.merge(&reverse);
            let (_, welded) = weld_vertices(&mut result, diagonal * WELD_TOLERANCE_SCALE);
            debug!("{}: {} curve vertices shared by both differences", op.name(), welded);
            Ok(compact(result))
        }
        result => result,
    }
}

/// One pass of the pipeline at a fixed perturbation
fn run_attempt<V: VertexData, T: TriangleData>(
    working: &Mesh<V, T>,
    first_b_vertex: usize,
    op: BooleanOp,
    config: &EngineConfig,
    attempt: usize,
    diagonal: f64,
) -> CorkResult<Mesh<V, T>> {
    let resolve = op == BooleanOp::Resolve;
    let exact = working.positions();
    let triangles: Vec<[usize; 3]> = working.triangles.iter().map(|t| t.indices).collect();

    let magnitude = perturbation_magnitude(diagonal, config.perturbation_scale, attempt);
    let positions = if resolve {
        perturb_positions(&exact, attempt, magnitude, |_| true)
    } else {
        let outward = outward_directions(
            &exact,
            working
                .triangles
                .iter()
                .filter(|t| t.provenance == Provenance::B)
                .map(|t| &t.indices),
        );
        dilate_positions(&exact, &outward, attempt, magnitude, |v| v >= first_b_vertex)
    };
    let mut working = working.clone();
    for (vertex, position) in working.vertices.iter_mut().zip(&positions) {
        vertex.position = *position;
    }

    let start = Instant::now();
    let pairs = candidate_pairs(&working, &positions, &triangles, resolve);
    debug!("attempt {}: {} candidate pairs in {:?}", attempt, pairs.len(), start.elapsed());

    let start = Instant::now();
    let curve = IntersectionCurve::build(&positions, &triangles, &pairs, config.parallel, resolve)?;
    debug!(
        "attempt {}: {} curve vertices, {} segments in {:?}",
        attempt,
        curve.vertices.len(),
        curve.segments.len(),
        start.elapsed()
    );

    // Reference surfaces for containment are the operands before splitting
    let surfaces = (!resolve).then(|| {
        [
            Surface::from_operand(&working, Provenance::A),
            Surface::from_operand(&working, Provenance::B),
        ]
    });

    let start = Instant::now();
    let Subdivision {
        mut mesh,
        mut curve_edges,
        first_curve_vertex,
    } = subdivide(&working, &curve, config.max_flip_iterations)?;
    debug!("attempt {}: subdivision in {:?}", attempt, start.elapsed());

    if let Some(surfaces) = &surfaces {
        let start = Instant::now();
        classify(&mut mesh, &curve_edges, surfaces, config.ray_attempts, config.parallel)?;
        debug!("attempt {}: classification in {:?}", attempt, start.elapsed());
    }

    let mut mesh = select(mesh, op);

    if attempt > 0 {
        for (vertex, position) in mesh.vertices.iter_mut().zip(&exact) {
            vertex.position = *position;
        }
        let restored = curve.exact_positions(&exact, &triangles);
        for (vertex, position) in mesh.vertices[first_curve_vertex..].iter_mut().zip(restored) {
            vertex.position = position;
        }
        let (stats, map) = repair_degeneracies(&mut mesh, diagonal * WELD_TOLERANCE_SCALE);
        curve_edges = curve_edges
            .into_iter()
            .map(|(u, v)| edge_key(map[u], map[v]))
            .filter(|(u, v)| u != v)
            .collect();
        debug!(
            "attempt {}: exact positions restored, {} vertices welded, {} triangles dropped, {} flips",
            attempt,
            stats.welded,
            stats.dropped + 2 * stats.cancelled,
            stats.flips
        );
        if stats.remaining > 0 {
            warn!(
                "{}: {} zero-area triangles left after restoring exact positions",
                op.name(),
                stats.remaining
            );
        }
    }

    if let Some(remesh_config) = &config.remesh {
        let stats = remesh(&mut mesh, &curve_edges, remesh_config);
        debug!(
            "attempt {}: remesh {} splits, {} collapses, {} flips",
            attempt, stats.splits, stats.collapses, stats.flips
        );
    }

    Ok(compact(mesh))
}

/// Broad phase
///
/// Boolean runs only pair triangles of A with triangles of B. Resolve runs
/// pair every two triangles that share no vertex, so each operand's own
/// crossings are made explicit as well.
fn candidate_pairs<V, T>(
    working: &Mesh<V, T>,
    positions: &[nalgebra::Point3<f64>],
    triangles: &[[usize; 3]],
    resolve: bool,
) -> Vec<(usize, usize)> {
    if resolve {
        let bvh = BVH::from_triangles(positions, triangles.iter().enumerate());
        return bvh
            .self_pairs()
            .filter(|&(t, u)| shared_vertices(&triangles[t], &triangles[u]).is_empty())
            .collect();
    }

    let of = |provenance: Provenance| {
        BVH::from_triangles(
            positions,
            working
                .triangles
                .iter()
                .enumerate()
                .filter(move |(_, t)| t.provenance == provenance)
                .map(|(i, t)| (i, &t.indices)),
        )
    };
    let bvh_a = of(Provenance::A);
    let bvh_b = of(Provenance::B);
    bvh_a.candidate_pairs(&bvh_b).collect()
}

/// Keep, drop or flip each triangle according to its label. Vertex ids are
/// left alone until the result is compacted.
fn select<V, T>(mut mesh: Mesh<V, T>, op: BooleanOp) -> Mesh<V, T> {
    let triangles: Vec<Triangle<T>> = std::mem::take(&mut mesh.triangles)
        .into_iter()
        .filter_map(|mut t| {
            let flip = op.select(t.provenance, t.label)?;
            if flip {
                t.flip();
            }
            Some(t)
        })
        .collect();
    mesh.triangles = triangles;
    mesh
}

fn compact<V, T>(mut mesh: Mesh<V, T>) -> Mesh<V, T> {
    mesh.remove_orphaned_vertices();
    update_manifold_flags(&mut mesh);
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::analytics::signed_volume;
    use crate::geometry::mesh_utils::is_closed;
    use crate::geometry::primitives::Primitive;
    use nalgebra::{Matrix4, Vector3};

    fn cube_at(size: f64, offset: Vector3<f64>) -> Mesh {
        let mut mesh = Primitive::cube(Vector3::new(size, size, size), false).to_mesh();
        mesh.transform(&Matrix4::new_translation(&offset));
        mesh
    }

    #[test]
    fn test_selection_table() {
        use Containment::*;
        use Provenance::*;
        assert_eq!(BooleanOp::Union.select(A, Outside), Some(false));
        assert_eq!(BooleanOp::Union.select(B, Inside), None);
        assert_eq!(BooleanOp::Difference.select(A, Inside), None);
        assert_eq!(BooleanOp::Difference.select(B, Inside), Some(true));
        assert_eq!(BooleanOp::Difference.select(B, Outside), None);
        assert_eq!(BooleanOp::Intersection.select(A, Inside), Some(false));
        assert_eq!(BooleanOp::SymmetricDifference.select(A, Inside), Some(true));
        assert_eq!(BooleanOp::SymmetricDifference.select(B, Outside), Some(false));
        assert_eq!(BooleanOp::Resolve.select(B, Unset), Some(false));
    }

    #[test]
    fn test_general_position_cubes() {
        let a = cube_at(1.0, Vector3::zeros());
        let b = cube_at(1.0, Vector3::new(0.5, 0.25, 0.125));
        let config = EngineConfig::default();

        let inter = boolean(&a, &b, BooleanOp::Intersection, &config).unwrap();
        assert!(is_closed(&inter));
        assert!((signed_volume(&inter) - 0.5 * 0.75 * 0.875).abs() < 1e-4);

        let union = boolean(&a, &b, BooleanOp::Union, &config).unwrap();
        assert!(is_closed(&union));
        assert!((signed_volume(&union) - (2.0 - 0.5 * 0.75 * 0.875)).abs() < 1e-4);

        let diff = boolean(&a, &b, BooleanOp::Difference, &config).unwrap();
        assert!(is_closed(&diff));
        assert!((signed_volume(&diff) - (1.0 - 0.5 * 0.75 * 0.875)).abs() < 1e-4);
    }

    #[test]
    fn test_identical_operands_shortcut() {
        let a = cube_at(1.0, Vector3::zeros());
        let config = EngineConfig::default();
        let union = boolean(&a, &a, BooleanOp::Union, &config).unwrap();
        assert_eq!(canonical_triangle_set(&union), canonical_triangle_set(&a));
        let diff = boolean(&a, &a, BooleanOp::Difference, &config).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_resolve_keeps_everything() {
        let a = cube_at(1.0, Vector3::zeros());
        let b = cube_at(1.0, Vector3::new(0.5, 0.25, 0.125));
        let resolved = boolean(&a, &b, BooleanOp::Resolve, &EngineConfig::default()).unwrap();
        assert!(resolved.triangle_count() > a.triangle_count() + b.triangle_count());
        assert!((signed_volume(&resolved) - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_invalid_input_is_rejected_before_work() {
        let a = cube_at(1.0, Vector3::zeros());
        let mut open = a.clone();
        open.triangles.pop();
        let err = boolean(&a, &open, BooleanOp::Union, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, CorkError::NonClosedInput));

        let err = boolean(&a, &Mesh::new(), BooleanOp::Resolve, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, CorkError::EmptyMeshInput));
    }
}
