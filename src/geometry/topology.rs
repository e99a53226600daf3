// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Index-based connectivity: edge incidence, vertex fans and face adjacency

use super::mesh::{Mesh, Triangle};
use super::triangle_intersection::{edge_key, EdgeKey};
use ahash::{AHashMap, AHashSet};

/// Undirected edge to incident triangles
#[derive(Debug, Clone, Default)]
pub struct EdgeMap {
    edges: AHashMap<EdgeKey, Vec<usize>>,
}

impl EdgeMap {
    pub fn build<T>(triangles: &[Triangle<T>]) -> Self {
        Self::from_indices(triangles.iter().map(|t| &t.indices))
    }

    pub fn from_indices<'a>(triangles: impl IntoIterator<Item = &'a [usize; 3]>) -> Self {
        let mut edges: AHashMap<EdgeKey, Vec<usize>> = AHashMap::new();
        for (t, &[a, b, c]) in triangles.into_iter().enumerate() {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                edges.entry(edge_key(u, v)).or_default().push(t);
            }
        }
        Self { edges }
    }

    /// Triangles incident to edge a–b
    pub fn triangles(&self, a: usize, b: usize) -> &[usize] {
        self.edges.get(&edge_key(a, b)).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EdgeKey, &Vec<usize>)> {
        self.edges.iter()
    }

    /// Every edge bounded by exactly two triangles
    pub fn all_edges_shared_twice(&self) -> bool {
        self.edges.values().all(|tris| tris.len() == 2)
    }

    /// No edge bounded by more than two triangles
    pub fn all_edges_at_most_twice(&self) -> bool {
        self.edges.values().all(|tris| tris.len() <= 2)
    }
}

/// Vertex to incident triangles
pub fn vertex_triangles<T>(vertex_count: usize, triangles: &[Triangle<T>]) -> Vec<Vec<usize>> {
    let mut incident = vec![Vec::new(); vertex_count];
    for (t, triangle) in triangles.iter().enumerate() {
        for &v in &triangle.indices {
            incident[v].push(t);
        }
    }
    incident
}

/// Each directed edge is used at most once, so neighbours wind consistently
pub fn is_consistently_oriented<T>(triangles: &[Triangle<T>]) -> bool {
    let mut directed = AHashSet::with_capacity(triangles.len() * 3);
    triangles
        .iter()
        .flat_map(|t| t.edges())
        .all(|edge| directed.insert(edge))
}

/// Number of edge-connected fans around `vertex`
fn fan_count<T>(vertex: usize, incident: &[usize], triangles: &[Triangle<T>]) -> usize {
    let mut seen = vec![false; incident.len()];
    let mut fans = 0;
    for start in 0..incident.len() {
        if seen[start] {
            continue;
        }
        fans += 1;
        seen[start] = true;
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            let ti = &triangles[incident[i]];
            for j in 0..incident.len() {
                if seen[j] {
                    continue;
                }
                let tj = &triangles[incident[j]];
                let shares_edge = ti
                    .indices
                    .iter()
                    .any(|&w| w != vertex && tj.contains_vertex(w));
                if shares_edge {
                    seen[j] = true;
                    stack.push(j);
                }
            }
        }
    }
    fans
}

/// A vertex is manifold when every edge around it has two triangles and its
/// triangles form a single fan
pub fn is_vertex_manifold<T>(
    vertex: usize,
    incident: &[usize],
    triangles: &[Triangle<T>],
    edges: &EdgeMap,
) -> bool {
    if incident.is_empty() {
        return false;
    }
    let edges_ok = incident.iter().all(|&t| {
        triangles[t]
            .edges()
            .iter()
            .filter(|&&(u, v)| u == vertex || v == vertex)
            .all(|&(u, v)| edges.triangles(u, v).len() == 2)
    });
    edges_ok && fan_count(vertex, incident, triangles) == 1
}

/// Recompute every vertex's manifold flag
pub fn update_manifold_flags<V, T>(mesh: &mut Mesh<V, T>) {
    let edges = EdgeMap::build(&mesh.triangles);
    let incident = vertex_triangles(mesh.vertex_count(), &mesh.triangles);
    for (v, tris) in incident.iter().enumerate() {
        mesh.vertices[v].manifold = is_vertex_manifold(v, tris, &mesh.triangles, &edges);
    }
}

/// Neighbours across each edge restricted to triangles of the same provenance
///
/// Around a curve edge of the working mesh four triangles meet, two from
/// each operand. Only the two from the same operand are linked.
pub fn same_provenance_adjacency<T>(triangles: &[Triangle<T>], edges: &EdgeMap) -> Vec<Vec<(usize, EdgeKey)>> {
    let mut adjacency = vec![Vec::new(); triangles.len()];
    for (&key, incident) in edges.iter() {
        for (i, &t) in incident.iter().enumerate() {
            for &u in &incident[i + 1..] {
                if triangles[t].provenance == triangles[u].provenance {
                    adjacency[t].push((u, key));
                    adjacency[u].push((t, key));
                }
            }
        }
    }
    // Hash order is not stable; traversal order must be
    for neighbours in &mut adjacency {
        neighbours.sort_unstable();
    }
    adjacency
}
