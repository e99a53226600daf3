// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Clean-up after a perturbed run is moved back to exact positions
//!
//! A retry decides connectivity on slightly moved geometry. Once every
//! vertex is back where the input puts it, pieces that were thin in the
//! perturbed run lose their extent: vertices coincide, and a fin between two
//! touching faces folds flat. This pass welds coincident vertices, drops
//! triangles that repeat a vertex, cancels opposite-facing copies of the same
//! triangle and flips the long edge of every zero-area triangle into its
//! neighbour, which turns the fin into a T-junction fix on that neighbour.

use super::attributes::TriangleData;
use super::mesh::{Mesh, Triangle};
use super::remesh::{move_triangle, rotate_to_edge};
use super::robust_predicates::collinear;
use super::topology::EdgeMap;
use super::triangle_intersection::{edge_key, EdgeKey};
use ahash::{AHashMap, AHashSet};
use log::debug;
use nalgebra::Point3;

/// Counts of the edits made by [`repair_degeneracies`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    pub welded: usize,
    pub dropped: usize,
    pub cancelled: usize,
    pub flips: usize,
    /// Zero-area triangles no flip could remove
    pub remaining: usize,
}

/// Representative of every vertex: an earlier vertex within `tolerance`, or
/// the vertex itself
pub fn weld_map(positions: &[Point3<f64>], tolerance: f64) -> Vec<usize> {
    let cell = tolerance.max(f64::MIN_POSITIVE);
    let key = |p: &Point3<f64>| [p.x, p.y, p.z].map(|c| (c / cell).floor() as i64);

    let mut grid: AHashMap<[i64; 3], Vec<usize>> = AHashMap::new();
    let mut map = Vec::with_capacity(positions.len());
    for (i, p) in positions.iter().enumerate() {
        let [x, y, z] = key(p);
        let mut found = None;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbour = [x.saturating_add(dx), y.saturating_add(dy), z.saturating_add(dz)];
                    let Some(list) = grid.get(&neighbour) else {
                        continue;
                    };
                    if let Some(&j) = list.iter().find(|&&j| (positions[j] - p).norm() <= tolerance) {
                        found = Some(j);
                        break 'search;
                    }
                }
            }
        }
        match found {
            Some(j) => map.push(j),
            None => {
                map.push(i);
                grid.entry([x, y, z]).or_default().push(i);
            }
        }
    }
    map
}

/// Point every triangle at the representative of its corners. Vertices left
/// unused are dropped when the output is compacted. Returns the vertex map
/// and the number of vertices merged away.
pub fn weld_vertices<V, T>(mesh: &mut Mesh<V, T>, tolerance: f64) -> (Vec<usize>, usize) {
    let map = weld_map(&mesh.positions(), tolerance);
    let merged = map.iter().enumerate().filter(|&(i, &r)| i != r).count();
    if merged > 0 {
        for triangle in &mut mesh.triangles {
            triangle.indices = triangle.indices.map(|i| map[i]);
        }
    }
    (map, merged)
}

fn drop_collapsed<T>(triangles: &mut Vec<Triangle<T>>) -> usize {
    let before = triangles.len();
    triangles.retain(|t| {
        let [a, b, c] = t.indices;
        a != b && b != c && c != a
    });
    before - triangles.len()
}

/// Same corners, rotated so the smallest index comes first
fn rotated([a, b, c]: [usize; 3]) -> [usize; 3] {
    if a <= b && a <= c {
        [a, b, c]
    } else if b <= c {
        [b, c, a]
    } else {
        [c, a, b]
    }
}

/// Remove pairs of triangles on the same corners with opposite winding
fn cancel_opposite_pairs<T>(triangles: &mut Vec<Triangle<T>>) -> usize {
    let mut open: AHashMap<[usize; 3], Vec<usize>> = AHashMap::new();
    let mut removed = vec![false; triangles.len()];
    let mut cancelled = 0;
    for (t, triangle) in triangles.iter().enumerate() {
        let key = rotated(triangle.indices);
        let reverse = rotated([key[0], key[2], key[1]]);
        match open.get_mut(&reverse).and_then(Vec::pop) {
            Some(u) => {
                removed[t] = true;
                removed[u] = true;
                cancelled += 1;
            }
            None => open.entry(key).or_default().push(t),
        }
    }
    if cancelled > 0 {
        let mut index = 0;
        triangles.retain(|_| {
            let keep = !removed[index];
            index += 1;
            keep
        });
    }
    cancelled
}

/// Directed edge of `t` between its two farthest corners
fn longest_edge(positions: &[Point3<f64>], indices: &[usize; 3]) -> (usize, usize) {
    let [a, b, c] = *indices;
    [(a, b), (b, c), (c, a)]
        .into_iter()
        .map(|(u, v)| ((positions[u] - positions[v]).norm_squared(), (u, v)))
        .fold((f64::NEG_INFINITY, (a, b)), |best, next| if next.0 > best.0 { next } else { best })
        .1
}

/// One sweep of edge flips over zero-area triangles
///
/// A flat triangle `a b c` with `c` between `a` and `b` is flipped with the
/// triangle across `a b`. If that neighbour is flat too, both must agree on
/// `a b` as their long edge, so the flips never undo each other.
fn flip_flat_triangles<T: TriangleData>(positions: &[Point3<f64>], triangles: &mut [Triangle<T>]) -> (usize, usize) {
    let edges = EdgeMap::build(triangles);
    let flat: Vec<bool> = triangles
        .iter()
        .map(|t| {
            let [a, b, c] = t.indices.map(|i| positions[i]);
            collinear(&a, &b, &c)
        })
        .collect();

    let mut touched = vec![false; triangles.len()];
    let mut created: AHashSet<EdgeKey> = AHashSet::new();
    let mut flips = 0;
    for t1 in 0..triangles.len() {
        if !flat[t1] || touched[t1] {
            continue;
        }
        let (a, b) = longest_edge(positions, &triangles[t1].indices);
        let &[x, y] = edges.triangles(a, b) else {
            continue;
        };
        let t2 = if x == t1 { y } else { x };
        if touched[t2] {
            continue;
        }
        let (Some([_, _, c]), Some([_, _, d])) = (
            rotate_to_edge(&triangles[t1].indices, (a, b)),
            rotate_to_edge(&triangles[t2].indices, (b, a)),
        ) else {
            continue;
        };
        if c == d || !edges.triangles(c, d).is_empty() || created.contains(&edge_key(c, d)) {
            continue;
        }
        if flat[t2] && longest_edge(positions, &triangles[t2].indices) != (b, a) {
            continue;
        }

        triangles[t1] = move_triangle(&triangles[t1], [c, a, d]);
        triangles[t2] = move_triangle(&triangles[t2], [d, b, c]);
        touched[t1] = true;
        touched[t2] = true;
        created.insert(edge_key(c, d));
        flips += 1;
    }
    let remaining = flat.iter().zip(&touched).filter(|&(&f, &t)| f && !t).count();
    (flips, remaining)
}

/// Weld vertices closer than `tolerance` and remove the zero-area triangles
/// left behind
///
/// Returns the edit counts and the weld map, so callers can carry vertex
/// sets such as curve edges over to the welded mesh.
pub fn repair_degeneracies<V, T: TriangleData>(mesh: &mut Mesh<V, T>, tolerance: f64) -> (RepairStats, Vec<usize>) {
    let (map, welded) = weld_vertices(mesh, tolerance);
    let positions = mesh.positions();
    let mut stats = RepairStats {
        welded,
        ..RepairStats::default()
    };

    for _ in 0..=mesh.triangle_count() {
        let dropped = drop_collapsed(&mut mesh.triangles);
        let cancelled = cancel_opposite_pairs(&mut mesh.triangles);
        let (flips, remaining) = flip_flat_triangles(&positions, &mut mesh.triangles);
        stats.dropped += dropped;
        stats.cancelled += cancelled;
        stats.flips += flips;
        stats.remaining = remaining;
        if dropped + cancelled + flips == 0 {
            break;
        }
    }

    debug!(
        "repair: {} welded, {} dropped, {} cancelled, {} flips, {} flat triangles left",
        stats.welded, stats.dropped, stats.cancelled, stats.flips, stats.remaining
    );
    (stats, map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::analytics::signed_volume;
    use crate::geometry::mesh::Vertex;
    use crate::geometry::primitives::Primitive;
    use crate::geometry::topology::is_consistently_oriented;
    use nalgebra::Vector3;

    fn cube() -> Mesh {
        Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh()
    }

    fn is_closed(mesh: &Mesh) -> bool {
        EdgeMap::build(&mesh.triangles).all_edges_shared_twice() && is_consistently_oriented(&mesh.triangles)
    }

    fn flat_count(mesh: &Mesh) -> usize {
        (0..mesh.triangle_count())
            .filter(|&t| {
                let [a, b, c] = mesh.triangle_positions(t);
                collinear(&a, &b, &c)
            })
            .count()
    }

    /// Cube whose first triangle is split at the midpoint of one edge, with
    /// the T-junction closed by a zero-area triangle
    fn cube_with_flat_fin() -> Mesh {
        let mut mesh = cube();
        let [u, v, w] = mesh.triangles[0].indices;
        let midpoint = nalgebra::center(&mesh.vertices[u].position, &mesh.vertices[v].position);
        let m = mesh.add_vertex(Vertex::new(midpoint));
        mesh.triangles[0].indices = [u, m, w];
        mesh.add_triangle(Triangle::new([m, v, w]));
        mesh.add_triangle(Triangle::new([m, u, v]));
        mesh
    }

    #[test]
    fn test_weld_map_points_at_earlier_vertices() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1e-13, 0.0, 0.0),
            Point3::new(1.0, 0.0, 2e-13),
            Point3::new(0.0, 0.0, 1e-6),
        ];
        assert_eq!(weld_map(&positions, 1e-10), vec![0, 1, 0, 1, 4]);
        assert_eq!(weld_map(&positions, 0.0), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_flat_fin_is_flipped_away() {
        let mut mesh = cube_with_flat_fin();
        assert!(is_closed(&mesh));
        assert_eq!(flat_count(&mesh), 1);

        let (stats, _) = repair_degeneracies(&mut mesh, 1e-10);
        assert_eq!(stats.flips, 1);
        assert_eq!(stats.remaining, 0);
        assert_eq!(mesh.triangle_count(), 14);
        assert_eq!(flat_count(&mesh), 0);
        assert!(is_closed(&mesh));
        assert!((signed_volume(&mesh) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_near_duplicate_vertex_is_welded() {
        let mut mesh = cube();
        let corner = mesh.triangles[0].indices[0];
        let copy = mesh.add_vertex(Vertex::new(mesh.vertices[corner].position + Vector3::new(1e-13, 0.0, 0.0)));
        mesh.triangles[0].indices[0] = copy;
        assert!(!is_closed(&mesh));

        let (stats, map) = repair_degeneracies(&mut mesh, 1e-10);
        assert_eq!(stats.welded, 1);
        assert_eq!(map[copy], corner);
        assert!(is_closed(&mesh));
    }

    #[test]
    fn test_opposite_copies_cancel_and_collapsed_triangles_drop() {
        let mut mesh = cube();
        mesh.add_triangle(Triangle::new([0, 2, 5]));
        mesh.add_triangle(Triangle::new([5, 2, 0]));
        mesh.add_triangle(Triangle::new([3, 3, 1]));

        let (stats, _) = repair_degeneracies(&mut mesh, 1e-10);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(mesh.triangle_count(), 12);
        assert!(is_closed(&mesh));
    }
}
