// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Whole-mesh rigid transforms
//!
//! These only move vertex positions. They are meant for finished meshes and
//! never run inside a Boolean operation. The 180° rotations negate
//! coordinates directly so they are exact.

use super::mesh::Mesh;
use nalgebra::{Point3, Vector3};

/// Anything that stores vertex positions
pub trait Positioned {
    fn for_each_position(&mut self, f: impl FnMut(&mut Point3<f64>));
}

impl<V, T> Positioned for Mesh<V, T> {
    fn for_each_position(&mut self, mut f: impl FnMut(&mut Point3<f64>)) {
        for vertex in &mut self.vertices {
            f(&mut vertex.position);
        }
    }
}

pub fn translate<M: Positioned>(mesh: &mut M, offset: &Vector3<f64>) {
    mesh.for_each_position(|p| *p += *offset);
}

pub fn translate_z<M: Positioned>(mesh: &mut M, dz: f64) {
    mesh.for_each_position(|p| p.z += dz);
}

/// Half turn about the X axis
pub fn rotate_180_x<M: Positioned>(mesh: &mut M) {
    mesh.for_each_position(|p| {
        p.y = -p.y;
        p.z = -p.z;
    });
}

/// Half turn about the Y axis
pub fn rotate_180_y<M: Positioned>(mesh: &mut M) {
    mesh.for_each_position(|p| {
        p.x = -p.x;
        p.z = -p.z;
    });
}

/// Rotate about the Z axis, counter-clockwise seen from +Z
pub fn rotate_z<M: Positioned>(mesh: &mut M, radians: f64) {
    let (sin, cos) = radians.sin_cos();
    mesh.for_each_position(|p| {
        let (x, y) = (p.x, p.y);
        p.x = x * cos - y * sin;
        p.y = x * sin + y * cos;
    });
}
