// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Closed test solids
//!
//! Every generator shares vertices between neighbouring triangles and winds
//! triangles counter-clockwise seen from outside, so the results are valid
//! Boolean operands as they are.

use super::attributes::{TriangleData, VertexData};
use super::Mesh;
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Geometric primitives
pub enum Primitive {
    Cube { size: Vector3<f64>, center: bool },
    Sphere { r: f64, fn_: u32 },
    Cylinder { h: f64, r: f64, fn_: u32 },
}

impl Primitive {
    pub fn cube(size: Vector3<f64>, center: bool) -> Self {
        Self::Cube { size, center }
    }

    pub fn sphere(r: f64, fn_: u32) -> Self {
        let segments = if fn_ >= 3 { fn_ } else { 32 };
        Self::Sphere { r, fn_: segments }
    }

    pub fn cylinder(h: f64, r: f64, fn_: u32) -> Self {
        let segments = if fn_ >= 3 { fn_ } else { 32 };
        Self::Cylinder {
            h,
            r,
            fn_: segments,
        }
    }

    pub fn to_mesh(&self) -> Mesh {
        self.to_mesh_with()
    }

    /// Same solid with default payloads of the requested types
    pub fn to_mesh_with<V: VertexData, T: TriangleData>(&self) -> Mesh<V, T> {
        let (positions, triangles) = match self {
            Self::Cube { size, center } => cube_geometry(*size, *center),
            Self::Sphere { r, fn_ } => sphere_geometry(*r, *fn_ as usize),
            Self::Cylinder { h, r, fn_ } => cylinder_geometry(*h, *r, *fn_ as usize),
        };
        Mesh::from_raw(&positions, &triangles)
    }
}

type Geometry = (Vec<Point3<f64>>, Vec<[usize; 3]>);

fn cube_geometry(size: Vector3<f64>, center: bool) -> Geometry {
    let min = if center { -size / 2.0 } else { Vector3::zeros() };
    let max = min + size;

    // 8 vertices of the cube
    let positions = vec![
        Point3::new(min.x, min.y, min.z),
        Point3::new(max.x, min.y, min.z),
        Point3::new(max.x, max.y, min.z),
        Point3::new(min.x, max.y, min.z),
        Point3::new(min.x, min.y, max.z),
        Point3::new(max.x, min.y, max.z),
        Point3::new(max.x, max.y, max.z),
        Point3::new(min.x, max.y, max.z),
    ];

    let triangles = vec![
        // Front (z+)
        [4, 5, 6],
        [4, 6, 7],
        // Back (z-)
        [1, 0, 3],
        [1, 3, 2],
        // Right (x+)
        [5, 1, 2],
        [5, 2, 6],
        // Left (x-)
        [0, 4, 7],
        [0, 7, 3],
        // Top (y+)
        [7, 6, 2],
        [7, 2, 3],
        // Bottom (y-)
        [0, 1, 5],
        [0, 5, 4],
    ];

    (positions, triangles)
}

/// UV sphere around the origin with single pole vertices
fn sphere_geometry(radius: f64, segments: usize) -> Geometry {
    let stacks = segments.max(2);
    let slices = segments;

    let mut positions = vec![Point3::new(0.0, radius, 0.0)];
    for i in 1..stacks {
        let phi = PI * i as f64 / stacks as f64;
        let y = radius * phi.cos();
        let r = radius * phi.sin();
        for j in 0..slices {
            let theta = 2.0 * PI * j as f64 / slices as f64;
            positions.push(Point3::new(r * theta.cos(), y, r * theta.sin()));
        }
    }
    let south = positions.len();
    positions.push(Point3::new(0.0, -radius, 0.0));

    let ring = |i: usize, j: usize| 1 + (i - 1) * slices + j % slices;
    let mut triangles = Vec::with_capacity(2 * slices * (stacks - 1));

    for j in 0..slices {
        triangles.push([0, ring(1, j + 1), ring(1, j)]);
    }
    for i in 1..stacks - 1 {
        for j in 0..slices {
            let (a0, a1) = (ring(i, j), ring(i, j + 1));
            let (b0, b1) = (ring(i + 1, j), ring(i + 1, j + 1));
            triangles.push([a0, b1, b0]);
            triangles.push([a0, a1, b1]);
        }
    }
    for j in 0..slices {
        triangles.push([south, ring(stacks - 1, j), ring(stacks - 1, j + 1)]);
    }

    (positions, triangles)
}

/// Cylinder from z = 0 to z = height
fn cylinder_geometry(height: f64, radius: f64, segments: usize) -> Geometry {
    let mut positions = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, height)];
    for i in 0..segments {
        let angle = 2.0 * PI * i as f64 / segments as f64;
        let (sin, cos) = angle.sin_cos();
        positions.push(Point3::new(radius * cos, radius * sin, 0.0));
        positions.push(Point3::new(radius * cos, radius * sin, height));
    }

    let bottom = |i: usize| 2 + 2 * (i % segments);
    let top = |i: usize| 3 + 2 * (i % segments);
    let mut triangles = Vec::with_capacity(4 * segments);

    for i in 0..segments {
        let (bi, bn, ti, tn) = (bottom(i), bottom(i + 1), top(i), top(i + 1));
        triangles.push([0, bn, bi]);
        triangles.push([1, ti, tn]);
        triangles.push([bi, bn, ti]);
        triangles.push([ti, bn, tn]);
    }

    (positions, triangles)
}
