// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Flat interchange mesh
//!
//! [`FlatMesh`] is the plain-array form meshes take at the edges of the
//! crate: files, the session store and the CLI. It carries no attributes and
//! no topology flags, only positions and index triples.

use crate::error::{CorkError, CorkResult};
use crate::geometry::attributes::{TriangleData, VertexData};
use crate::geometry::transform::Positioned;
use crate::geometry::Mesh;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatMesh {
    pub vertices: Vec<[f64; 3]>,
    pub triangles: Vec<[usize; 3]>,
}

impl FlatMesh {
    pub fn new(vertices: Vec<[f64; 3]>, triangles: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            triangles,
        }
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

    /// Emptiness first, then every index against the vertex count
    pub fn validate(&self) -> CorkResult<()> {
        if self.is_empty() {
            return Err(CorkError::EmptyMeshInput);
        }
        let vertex_count = self.vertices.len();
        for (t, triangle) in self.triangles.iter().enumerate() {
            if let Some(&index) = triangle.iter().find(|&&i| i >= vertex_count) {
                return Err(CorkError::OutOfRangeVertexReference {
                    triangle: t,
                    index,
                    vertex_count,
                });
            }
        }
        Ok(())
    }

    /// Validated conversion into an engine mesh with default payloads
    pub fn to_mesh<V: VertexData, T: TriangleData>(&self) -> CorkResult<Mesh<V, T>> {
        self.validate()?;
        let positions: Vec<Point3<f64>> = self
            .vertices
            .iter()
            .map(|&[x, y, z]| Point3::new(x, y, z))
            .collect();
        Ok(Mesh::from_raw(&positions, &self.triangles))
    }

    /// Copy positions and indices out of `mesh`, keeping only vertices some
    /// triangle references
    pub fn from_mesh<V, T>(mesh: &Mesh<V, T>) -> Self {
        let mut remap = vec![usize::MAX; mesh.vertex_count()];
        let mut vertices = Vec::with_capacity(mesh.vertex_count());
        let mut triangles = Vec::with_capacity(mesh.triangle_count());

        for triangle in &mesh.triangles {
            let indices = triangle.indices.map(|i| {
                if remap[i] == usize::MAX {
                    remap[i] = vertices.len();
                    let p = mesh.vertices[i].position;
                    vertices.push([p.x, p.y, p.z]);
                }
                remap[i]
            });
            triangles.push(indices);
        }

        Self {
            vertices,
            triangles,
        }
    }
}

impl Positioned for FlatMesh {
    fn for_each_position(&mut self, mut f: impl FnMut(&mut Point3<f64>)) {
        for v in &mut self.vertices {
            let mut p = Point3::new(v[0], v[1], v[2]);
            f(&mut p);
            *v = [p.x, p.y, p.z];
        }
    }
}
