// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh representation and utilities
//!
//! Vertices and triangles live in flat arenas. Triangles refer to vertices by
//! index, so edits never leave dangling references and a mesh can be cloned
//! or serialized as plain data.

use super::attributes::{TriangleData, VertexData};
use super::BoundingBox;
use crate::error::{CorkError, CorkResult};
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Which input solid a triangle descends from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provenance {
    A,
    B,
}

impl Provenance {
    pub fn other(self) -> Self {
        match self {
            Provenance::A => Provenance::B,
            Provenance::B => Provenance::A,
        }
    }
}

/// Whether a triangle lies inside the other operand's volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Containment {
    Unset,
    Inside,
    Outside,
}

impl Containment {
    /// Label on the far side of an intersection-curve edge
    pub fn flipped(self) -> Self {
        match self {
            Containment::Inside => Containment::Outside,
            Containment::Outside => Containment::Inside,
            Containment::Unset => Containment::Unset,
        }
    }
}

/// Vertex with position, manifold flag and payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex<V = ()> {
    pub position: Point3<f64>,
    /// Set when the vertex has a single closed fan of incident triangles
    pub manifold: bool,
    pub data: V,
}

impl<V: Default> Vertex<V> {
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            manifold: true,
            data: V::default(),
        }
    }
}

impl<V> Vertex<V> {
    pub fn with_data(position: Point3<f64>, data: V) -> Self {
        Self {
            position,
            manifold: true,
            data,
        }
    }
}

/// Triangle defined by three vertex indices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Triangle<T = ()> {
    pub indices: [usize; 3],
    pub provenance: Provenance,
    pub label: Containment,
    pub data: T,
}

impl<T: Default> Triangle<T> {
    pub fn new(indices: [usize; 3]) -> Self {
        Self {
            indices,
            provenance: Provenance::A,
            label: Containment::Unset,
            data: T::default(),
        }
    }
}

impl<T> Triangle<T> {
    pub fn with_data(indices: [usize; 3], data: T) -> Self {
        Self {
            indices,
            provenance: Provenance::A,
            label: Containment::Unset,
            data,
        }
    }

    /// Reverse the winding order
    pub fn flip(&mut self) {
        self.indices.swap(1, 2);
    }

    pub fn contains_vertex(&self, vertex: usize) -> bool {
        self.indices.contains(&vertex)
    }

    /// Directed edges in winding order
    pub fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.indices;
        [(a, b), (b, c), (c, a)]
    }
}

/// Triangular mesh with per-vertex payload `V` and per-triangle payload `T`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mesh<V = (), T = ()> {
    pub vertices: Vec<Vertex<V>>,
    pub triangles: Vec<Triangle<T>>,
}

impl<V, T> Mesh<V, T> {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new()
    }

    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            triangles: Vec::with_capacity(triangle_count),
        }
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, vertex: Vertex<V>) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    /// Add a triangle and return its index
    pub fn add_triangle(&mut self, triangle: Triangle<T>) -> usize {
        let index = self.triangles.len();
        self.triangles.push(triangle);
        index
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.triangles.is_empty()
    }

    /// Vertex positions in index order
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    /// Corner positions of a triangle
    pub fn triangle_positions(&self, triangle: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.triangles[triangle].indices;
        [
            self.vertices[a].position,
            self.vertices[b].position,
            self.vertices[c].position,
        ]
    }

    /// Area-weighted normal (length is twice the area)
    pub fn triangle_normal(&self, triangle: usize) -> Vector3<f64> {
        let [a, b, c] = self.triangle_positions(triangle);
        (b - a).cross(&(c - a))
    }

    pub fn triangle_area(&self, triangle: usize) -> f64 {
        self.triangle_normal(triangle).norm() / 2.0
    }

    /// Compute bounding box
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.vertices.iter().map(|v| &v.position))
    }

    /// Transform all vertex positions by a matrix
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for vertex in &mut self.vertices {
            vertex.position = matrix.transform_point(&vertex.position);
        }
    }

    /// Reverse the orientation of every triangle
    pub fn flip_orientation(&mut self) {
        for triangle in &mut self.triangles {
            triangle.flip();
        }
    }

    /// Check the arena invariants: non-empty, indices in range and distinct
    pub fn validate(&self) -> CorkResult<()> {
        if self.is_empty() {
            return Err(CorkError::EmptyMeshInput);
        }

        let vertex_count = self.vertices.len();
        for (t, triangle) in self.triangles.iter().enumerate() {
            if let Some(&index) = triangle.indices.iter().find(|&&i| i >= vertex_count) {
                return Err(CorkError::OutOfRangeVertexReference {
                    triangle: t,
                    index,
                    vertex_count,
                });
            }
            let [a, b, c] = triangle.indices;
            if a == b || b == c || c == a {
                return Err(CorkError::DegenerateTriangle { triangle: t });
            }
        }

        Ok(())
    }

    /// Drop vertices no triangle references and renumber the rest.
    /// Returns the number of vertices removed.
    pub fn remove_orphaned_vertices(&mut self) -> usize {
        let original_count = self.vertices.len();
        let mut used = vec![false; original_count];
        for triangle in &self.triangles {
            for &i in &triangle.indices {
                used[i] = true;
            }
        }

        let mut remap = vec![usize::MAX; original_count];
        let mut next = 0;
        for (i, &is_used) in used.iter().enumerate() {
            if is_used {
                remap[i] = next;
                next += 1;
            }
        }

        let mut index = 0;
        self.vertices.retain(|_| {
            let keep = used[index];
            index += 1;
            keep
        });

        for triangle in &mut self.triangles {
            for i in &mut triangle.indices {
                *i = remap[*i];
            }
        }

        original_count - self.vertices.len()
    }
}

impl<V: Clone, T: Clone> Mesh<V, T> {
    /// Concatenate two meshes, tagging triangles of `self` with provenance A
    /// and triangles of `other` with provenance B
    pub fn disjoint_union(&self, other: &Mesh<V, T>) -> Mesh<V, T> {
        let mut result = Mesh::with_capacity(
            self.vertex_count() + other.vertex_count(),
            self.triangle_count() + other.triangle_count(),
        );
        result.vertices.extend(self.vertices.iter().cloned());
        result.vertices.extend(other.vertices.iter().cloned());

        let offset = self.vertex_count();
        for triangle in &self.triangles {
            let mut t = triangle.clone();
            t.provenance = Provenance::A;
            t.label = Containment::Unset;
            result.triangles.push(t);
        }
        for triangle in &other.triangles {
            let mut t = triangle.clone();
            t.indices = t.indices.map(|i| i + offset);
            t.provenance = Provenance::B;
            t.label = Containment::Unset;
            result.triangles.push(t);
        }
        result
    }

    /// Append another mesh without any intersection handling
    pub fn merge(&mut self, other: &Mesh<V, T>) {
        let offset = self.vertices.len();
        self.vertices.extend(other.vertices.iter().cloned());
        for triangle in &other.triangles {
            let mut t = triangle.clone();
            t.indices = t.indices.map(|i| i + offset);
            self.triangles.push(t);
        }
    }
}

impl<V: VertexData, T: TriangleData> Mesh<V, T> {
    /// Build a mesh from plain positions and index triples with default payloads
    pub fn from_raw(positions: &[Point3<f64>], indices: &[[usize; 3]]) -> Self {
        let mut mesh = Mesh::with_capacity(positions.len(), indices.len());
        for p in positions {
            mesh.add_vertex(Vertex::new(*p));
        }
        for tri in indices {
            mesh.add_triangle(Triangle::new(*tri));
        }
        mesh
    }
}

impl<V, T> Default for Mesh<V, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Triangles as rotated corner-position bit patterns, sorted. Two meshes with
/// the same canonical set describe the same surface with the same winding.
pub fn canonical_triangle_set<V, T>(mesh: &Mesh<V, T>) -> Vec<[[u64; 3]; 3]> {
    let key = |p: &Point3<f64>| [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
    let mut set: Vec<[[u64; 3]; 3]> = mesh
        .triangles
        .iter()
        .map(|t| {
            let mut corners = t.indices.map(|i| key(&mesh.vertices[i].position));
            // Rotate (not sort) so winding is preserved
            let min = (0..3).min_by_key(|&i| corners[i]).unwrap_or(0);
            corners.rotate_left(min);
            corners
        })
        .collect();
    set.sort_unstable();
    set
}
