// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Triangle-triangle intersection for indexed meshes
//!
//! Two triangles in general position either miss each other or cross along
//! a segment whose two endpoints are edge/triangle piercings. Each piercing is
//! identified by the undirected edge and the pierced triangle, which gives
//! the same key no matter which of the edge's two triangles found it.

use super::robust_predicates::{segment_triangle_intersect, Crossing};
use nalgebra::Point3;

/// Undirected edge as (smaller vertex, larger vertex)
pub type EdgeKey = (usize, usize);

pub fn edge_key(a: usize, b: usize) -> EdgeKey {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Edge `edge` crosses triangle `triangle` at parameter `t`, measured from
/// `edge.0` towards `edge.1`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeHit {
    pub edge: EdgeKey,
    pub triangle: usize,
    pub t: f64,
}

/// Result of intersecting one triangle pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PairIntersection {
    Disjoint,
    Segment([EdgeHit; 2]),
    Degenerate,
}

fn corners(positions: &[Point3<f64>], tri: &[usize; 3]) -> [Point3<f64>; 3] {
    tri.map(|v| positions[v])
}

/// Vertices the two triangles have in common
pub fn shared_vertices(a: &[usize; 3], b: &[usize; 3]) -> Vec<usize> {
    a.iter().copied().filter(|v| b.contains(v)).collect()
}

/// Test the edges of `edges_of` against `against`, skipping edges that touch
/// `skip_vertex`
fn edge_hits(
    positions: &[Point3<f64>],
    triangles: &[[usize; 3]],
    edges_of: usize,
    against: usize,
    skip_vertex: Option<usize>,
    hits: &mut Vec<EdgeHit>,
) -> bool {
    let tri = corners(positions, &triangles[against]);
    let [a, b, c] = triangles[edges_of];
    for (u, v) in [(a, b), (b, c), (c, a)] {
        if skip_vertex.is_some_and(|s| s == u || s == v) {
            continue;
        }
        let edge = edge_key(u, v);
        match segment_triangle_intersect(&positions[edge.0], &positions[edge.1], &tri) {
            Crossing::Miss => {}
            Crossing::Hit(t) => hits.push(EdgeHit {
                edge,
                triangle: against,
                t,
            }),
            Crossing::Degenerate => return false,
        }
    }
    true
}

/// Intersect two triangles that share no vertex
///
/// The six edge/triangle tests must produce zero or two piercings. Any
/// other count, or any degenerate predicate, means the pair is not in
/// general position.
pub fn intersect_pair(
    positions: &[Point3<f64>],
    triangles: &[[usize; 3]],
    t: usize,
    u: usize,
) -> PairIntersection {
    let mut hits = Vec::with_capacity(2);
    if !edge_hits(positions, triangles, t, u, None, &mut hits)
        || !edge_hits(positions, triangles, u, t, None, &mut hits)
    {
        return PairIntersection::Degenerate;
    }

    match hits.as_slice() {
        [] => PairIntersection::Disjoint,
        [h0, h1] => PairIntersection::Segment([*h0, *h1]),
        _ => PairIntersection::Degenerate,
    }
}

/// Self-intersection test for two triangles of the same surface
///
/// Pairs sharing an edge are adjacent and never reported. Pairs sharing one
/// vertex only test the edges away from that vertex. A repeated triangle is
/// an intersection.
pub fn pair_touches(positions: &[Point3<f64>], triangles: &[[usize; 3]], t: usize, u: usize) -> Crossing<()> {
    let shared = shared_vertices(&triangles[t], &triangles[u]);
    let skip = match shared.len() {
        0 => None,
        1 => Some(shared[0]),
        2 => return Crossing::Miss,
        _ => return Crossing::Hit(()),
    };

    let mut hits = Vec::new();
    let clean = edge_hits(positions, triangles, t, u, skip, &mut hits)
        && edge_hits(positions, triangles, u, t, skip, &mut hits);

    if !hits.is_empty() {
        Crossing::Hit(())
    } else if !clean {
        Crossing::Degenerate
    } else {
        Crossing::Miss
    }
}
