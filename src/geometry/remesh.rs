// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Local remeshing around the intersection curve
//!
//! Retriangulation leaves slivers and very short edges next to the curve.
//! This pass runs on the selected result and collapses short edges, flips
//! poorly shaped pairs of coplanar triangles and splits long edges, without
//! touching the curve itself: curve edges are never collapsed or flipped,
//! and curve vertices are pinned like non-manifold ones.

use super::attributes::{TriangleData, VertexData};
use super::mesh::{Mesh, Triangle, Vertex};
use super::robust_predicates::{dominant_axis, orient2d_value, project};
use super::topology::{update_manifold_flags, vertex_triangles, EdgeMap};
use super::triangle_intersection::EdgeKey;
use crate::config::RemeshConfig;
use log::debug;
use nalgebra::{Point3, Vector3};
use std::collections::BTreeSet;

/// Counts of the edits made by [`remesh`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemeshStats {
    pub collapses: usize,
    pub flips: usize,
    pub splits: usize,
}

/// Merge two vertices into one
///
/// A non-manifold vertex wins outright over a manifold one. Otherwise the
/// midpoint is used.
pub fn merge_vertices<V: VertexData>(v0: &Vertex<V>, v1: &Vertex<V>) -> Vertex<V> {
    let weight = match (v0.manifold, v1.manifold) {
        (false, true) => 1.0,
        (true, false) => 0.0,
        _ => 0.5,
    };
    let position = Point3::from(v0.position.coords * weight + v1.position.coords * (1.0 - weight));
    Vertex {
        position,
        manifold: v0.manifold && v1.manifold,
        data: V::merge(&v0.data, &v1.data, weight),
    }
}

/// Fold a retired triangle's payload into its surviving neighbour
pub fn merge_triangles<T: TriangleData>(keep: &Triangle<T>, retired: &Triangle<T>, keep_weight: f64) -> Triangle<T> {
    Triangle {
        indices: keep.indices,
        provenance: keep.provenance,
        label: keep.label,
        data: T::merge(&keep.data, &retired.data, keep_weight),
    }
}

/// Split `parent` at `midpoint`, which lies on its directed edge `edge`
///
/// Returns `None` if the parent does not have that edge.
pub fn split_triangle<T: TriangleData>(
    parent: &Triangle<T>,
    edge: (usize, usize),
    midpoint: usize,
) -> Option<(Triangle<T>, Triangle<T>)> {
    let [a, b, c] = rotate_to_edge(&parent.indices, edge)?;
    let (first, second) = T::split(&parent.data);
    let child = |indices, data| Triangle {
        indices,
        provenance: parent.provenance,
        label: parent.label,
        data,
    };
    Some((child([a, midpoint, c], first), child([midpoint, b, c], second)))
}

/// Same triangle with new corners, as produced by an edge flip
pub fn move_triangle<T: TriangleData>(triangle: &Triangle<T>, indices: [usize; 3]) -> Triangle<T> {
    Triangle {
        indices,
        provenance: triangle.provenance,
        label: triangle.label,
        data: T::moved(&triangle.data),
    }
}

pub(super) fn rotate_to_edge(indices: &[usize; 3], (a, b): (usize, usize)) -> Option<[usize; 3]> {
    (0..3)
        .find(|&k| indices[k] == a && indices[(k + 1) % 3] == b)
        .map(|k| [indices[k], indices[(k + 1) % 3], indices[(k + 2) % 3]])
}

fn opposite(indices: &[usize; 3], a: usize, b: usize) -> usize {
    indices.iter().copied().find(|&v| v != a && v != b).unwrap_or(a)
}

/// Order the two triangles of an edge as (holds a→b, holds b→a)
fn oriented_pair<T>(triangles: &[Triangle<T>], pair: &[usize], (a, b): EdgeKey) -> Option<(usize, usize)> {
    let [t1, t2] = *pair else {
        return None;
    };
    if triangles[t1].provenance != triangles[t2].provenance {
        return None;
    }
    match (
        rotate_to_edge(&triangles[t1].indices, (a, b)),
        rotate_to_edge(&triangles[t2].indices, (b, a)),
    ) {
        (Some(_), Some(_)) => Some((t1, t2)),
        _ => match (
            rotate_to_edge(&triangles[t2].indices, (a, b)),
            rotate_to_edge(&triangles[t1].indices, (b, a)),
        ) {
            (Some(_), Some(_)) => Some((t2, t1)),
            _ => None,
        },
    }
}

fn normal(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Vector3<f64> {
    (b - a).cross(&(c - a))
}

/// Smallest interior angle in degrees
fn min_angle(p: [Point3<f64>; 3]) -> f64 {
    (0..3)
        .map(|k| {
            let u = p[(k + 1) % 3] - p[k];
            let v = p[(k + 2) % 3] - p[k];
            let denom = u.norm() * v.norm();
            if denom == 0.0 {
                0.0
            } else {
                (u.dot(&v) / denom).clamp(-1.0, 1.0).acos().to_degrees()
            }
        })
        .fold(f64::INFINITY, f64::min)
}

fn edge_length<V, T>(mesh: &Mesh<V, T>, (a, b): EdgeKey) -> f64 {
    (mesh.vertices[a].position - mesh.vertices[b].position).norm()
}

/// Interior edges eligible for editing, with their lengths, in a stable order
fn editable_edges<V, T>(mesh: &Mesh<V, T>, edges: &EdgeMap, curve_edges: &BTreeSet<EdgeKey>) -> Vec<(EdgeKey, f64)> {
    let mut list: Vec<(EdgeKey, f64)> = edges
        .iter()
        .filter(|(key, tris)| tris.len() == 2 && !curve_edges.contains(key))
        .map(|(&key, _)| (key, edge_length(mesh, key)))
        .collect();
    list.sort_by(|x, y| x.0.cmp(&y.0));
    list
}

fn split_long_edges<V: VertexData, T: TriangleData>(
    mesh: &mut Mesh<V, T>,
    curve_edges: &BTreeSet<EdgeKey>,
    max_length: f64,
) -> usize {
    let edges = EdgeMap::build(&mesh.triangles);
    let mut candidates: Vec<(EdgeKey, f64)> = editable_edges(mesh, &edges, curve_edges)
        .into_iter()
        .filter(|&(_, len)| len > max_length)
        .collect();
    // Longest first
    candidates.sort_by(|x, y| y.1.total_cmp(&x.1).then(x.0.cmp(&y.0)));

    let mut touched = vec![false; mesh.triangle_count()];
    let mut splits = 0;
    for (key, _) in candidates {
        let Some((t1, t2)) = oriented_pair(&mesh.triangles, edges.triangles(key.0, key.1), key) else {
            continue;
        };
        if touched[t1] || touched[t2] {
            continue;
        }
        let (a, b) = key;
        let va = &mesh.vertices[a];
        let vb = &mesh.vertices[b];
        let midpoint = Vertex::with_data(
            nalgebra::center(&va.position, &vb.position),
            V::interpolate_edge(&va.data, &vb.data, 0.5),
        );
        let m = mesh.add_vertex(midpoint);

        let (Some((c1, c2)), Some((d1, d2))) = (
            split_triangle(&mesh.triangles[t1], (a, b), m),
            split_triangle(&mesh.triangles[t2], (b, a), m),
        ) else {
            continue;
        };
        mesh.triangles[t1] = c1;
        mesh.triangles[t2] = d1;
        mesh.add_triangle(c2);
        mesh.add_triangle(d2);
        touched[t1] = true;
        touched[t2] = true;
        touched.extend([true, true]);
        splits += 1;
    }
    splits
}

fn collapse_short_edges<V: VertexData, T: TriangleData>(
    mesh: &mut Mesh<V, T>,
    curve_edges: &BTreeSet<EdgeKey>,
    min_length: f64,
) -> usize {
    let edges = EdgeMap::build(&mesh.triangles);
    let incident = vertex_triangles(mesh.vertex_count(), &mesh.triangles);
    let mut candidates: Vec<(EdgeKey, f64)> = editable_edges(mesh, &edges, curve_edges)
        .into_iter()
        .filter(|&(_, len)| len < min_length)
        .collect();
    // Shortest first
    candidates.sort_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)));

    let ring = |v: usize| -> BTreeSet<usize> {
        incident[v]
            .iter()
            .flat_map(|&t| mesh.triangles[t].indices)
            .filter(|&w| w != v)
            .collect()
    };

    let mut plans = Vec::new();
    let mut touched = vec![false; mesh.vertex_count()];
    for (key, _) in candidates {
        let (a, b) = key;
        if touched[a] || touched[b] {
            continue;
        }
        let Some((t1, t2)) = oriented_pair(&mesh.triangles, edges.triangles(a, b), key) else {
            continue;
        };
        let pinned_a = !mesh.vertices[a].manifold;
        let pinned_b = !mesh.vertices[b].manifold;
        if pinned_a && pinned_b {
            continue;
        }
        let (keep, gone) = if pinned_b { (b, a) } else { (a, b) };

        // Link condition: the only common neighbours are the two apexes
        let apexes: BTreeSet<usize> = [
            opposite(&mesh.triangles[t1].indices, a, b),
            opposite(&mesh.triangles[t2].indices, a, b),
        ]
        .into_iter()
        .collect();
        let common: BTreeSet<usize> = ring(a).intersection(&ring(b)).copied().collect();
        if common != apexes {
            continue;
        }

        let merged = merge_vertices(&mesh.vertices[keep], &mesh.vertices[gone]);

        // Surviving triangles must keep their facing
        let star: BTreeSet<usize> = incident[a].iter().chain(&incident[b]).copied().collect();
        let folds = star.iter().filter(|&&t| t != t1 && t != t2).any(|&t| {
            let idx = mesh.triangles[t].indices;
            let before = idx.map(|v| mesh.vertices[v].position);
            let after = idx.map(|v| if v == keep || v == gone { merged.position } else { mesh.vertices[v].position });
            let n0 = normal(&before[0], &before[1], &before[2]);
            let n1 = normal(&after[0], &after[1], &after[2]);
            n1.dot(&n0) <= 0.0 || n1.norm_squared() == 0.0
        });
        if folds {
            continue;
        }

        for &t in &star {
            for v in mesh.triangles[t].indices {
                touched[v] = true;
            }
        }
        plans.push((keep, gone, [t1, t2], star, merged));
    }

    let mut alive = vec![true; mesh.triangle_count()];
    let collapses = plans.len();
    for (keep, gone, retired, star, merged) in plans {
        mesh.vertices[keep] = merged;
        for r in retired {
            // The neighbour across the edge facing the kept vertex absorbs it
            let apex = opposite(&mesh.triangles[r].indices, keep, gone);
            let neighbour = edges
                .triangles(gone, apex)
                .iter()
                .copied()
                .find(|&t| t != r && alive[t]);
            if let Some(n) = neighbour {
                let wn = mesh.triangle_area(n);
                let wr = mesh.triangle_area(r);
                let weight = if wn + wr > 0.0 { wn / (wn + wr) } else { 0.5 };
                mesh.triangles[n] = merge_triangles(&mesh.triangles[n], &mesh.triangles[r], weight);
            }
            alive[r] = false;
        }
        for t in star {
            if alive[t] {
                for v in mesh.triangles[t].indices.iter_mut() {
                    if *v == gone {
                        *v = keep;
                    }
                }
            }
        }
    }

    let mut index = 0;
    mesh.triangles.retain(|_| {
        let keep = alive[index];
        index += 1;
        keep
    });
    collapses
}

fn flip_poor_edges<V, T: TriangleData>(mesh: &mut Mesh<V, T>, curve_edges: &BTreeSet<EdgeKey>, min_angle_degrees: f64) -> usize {
    const COPLANAR_COSINE: f64 = 1.0 - 1e-9;

    let edges = EdgeMap::build(&mesh.triangles);
    let mut touched = vec![false; mesh.triangle_count()];
    let mut flips = 0;

    for (key, _) in editable_edges(mesh, &edges, curve_edges) {
        let Some((t1, t2)) = oriented_pair(&mesh.triangles, edges.triangles(key.0, key.1), key) else {
            continue;
        };
        if touched[t1] || touched[t2] {
            continue;
        }
        let (a, b) = key;
        let c = opposite(&mesh.triangles[t1].indices, a, b);
        let d = opposite(&mesh.triangles[t2].indices, a, b);
        if c == d || !edges.triangles(c, d).is_empty() {
            continue;
        }

        let [pa, pb, pc, pd] = [a, b, c, d].map(|v| mesh.vertices[v].position);
        let n1 = normal(&pa, &pb, &pc);
        let n2 = normal(&pb, &pa, &pd);
        let (l1, l2) = (n1.norm(), n2.norm());
        if l1 == 0.0 || l2 == 0.0 || n1.dot(&n2) / (l1 * l2) < COPLANAR_COSINE {
            continue;
        }

        let current = min_angle([pa, pb, pc]).min(min_angle([pb, pa, pd]));
        if current >= min_angle_degrees {
            continue;
        }

        // The new diagonal must cross the old one inside the quad
        let axis = dominant_axis(&(n1 + n2));
        let [qa, qb, qc, qd] = [pa, pb, pc, pd].map(|p| project(&p, axis));
        let convex = orient2d_value(&qc, &qd, &qa) * orient2d_value(&qc, &qd, &qb) < 0.0
            && orient2d_value(&qa, &qb, &qc) * orient2d_value(&qa, &qb, &qd) < 0.0;
        if !convex {
            continue;
        }

        let improved = min_angle([pc, pa, pd]).min(min_angle([pd, pb, pc]));
        if improved <= current {
            continue;
        }

        mesh.triangles[t1] = move_triangle(&mesh.triangles[t1], [c, a, d]);
        mesh.triangles[t2] = move_triangle(&mesh.triangles[t2], [d, b, c]);
        touched[t1] = true;
        touched[t2] = true;
        flips += 1;
    }
    flips
}

/// Mark curve vertices non-manifold so collapses never move them
fn pin_curve_vertices<V, T>(mesh: &mut Mesh<V, T>, curve_edges: &BTreeSet<EdgeKey>) {
    for &(a, b) in curve_edges {
        for v in [a, b] {
            if let Some(vertex) = mesh.vertices.get_mut(v) {
                vertex.manifold = false;
            }
        }
    }
}

fn mean_edge_length<V, T>(mesh: &Mesh<V, T>) -> f64 {
    let edges = EdgeMap::build(&mesh.triangles);
    if edges.is_empty() {
        return 0.0;
    }
    edges.iter().map(|(&key, _)| edge_length(mesh, key)).sum::<f64>() / edges.len() as f64
}

/// Run the quality pass in place
///
/// Vertices are never removed or renumbered, so `curve_edges` stays valid.
/// Vertices left without triangles are dropped when the output is assembled.
pub fn remesh<V: VertexData, T: TriangleData>(
    mesh: &mut Mesh<V, T>,
    curve_edges: &BTreeSet<EdgeKey>,
    config: &RemeshConfig,
) -> RemeshStats {
    let mut stats = RemeshStats::default();
    for iteration in 0..config.max_iterations {
        update_manifold_flags(mesh);
        let mean = mean_edge_length(mesh);
        if mean == 0.0 {
            break;
        }

        let before = stats;
        stats.splits += split_long_edges(mesh, curve_edges, config.max_edge_ratio * mean);
        update_manifold_flags(mesh);
        pin_curve_vertices(mesh, curve_edges);
        stats.collapses += collapse_short_edges(mesh, curve_edges, config.min_edge_ratio * mean);
        stats.flips += flip_poor_edges(mesh, curve_edges, config.min_angle_degrees);

        debug!(
            "remesh iteration {}: {} splits, {} collapses, {} flips so far",
            iteration, stats.splits, stats.collapses, stats.flips
        );
        if stats == before {
            break;
        }
    }
    update_manifold_flags(mesh);
    stats
}
