// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh measurements used by `polycork info` and by the property tests

use super::mesh::Mesh;
use super::mesh_utils::{is_closed, is_manifold};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Mesh statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshStats {
    /// Signed enclosed volume, positive for outward-facing solids
    pub volume: f64,
    pub surface_area: f64,
    /// Bounding box [min_x, min_y, min_z, max_x, max_y, max_z]
    pub bbox: [f64; 6],
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub is_manifold: bool,
    pub is_closed: bool,
}

impl MeshStats {
    pub fn empty() -> Self {
        Self {
            volume: 0.0,
            surface_area: 0.0,
            bbox: [0.0; 6],
            vertex_count: 0,
            triangle_count: 0,
            is_manifold: true,
            is_closed: false,
        }
    }

    pub fn dimensions(&self) -> [f64; 3] {
        [
            self.bbox[3] - self.bbox[0],
            self.bbox[4] - self.bbox[1],
            self.bbox[5] - self.bbox[2],
        ]
    }

    /// Pretty print statistics
    pub fn print(&self) {
        let [dx, dy, dz] = self.dimensions();
        println!("╔══════════════════════════════════════════════════════════╗");
        println!("║              MESH STATISTICS                             ║");
        println!("╠══════════════════════════════════════════════════════════╣");
        println!("║ Volume:          {:>14.6}                          ║", self.volume);
        println!("║ Surface Area:    {:>14.6}                          ║", self.surface_area);
        println!("║                                                          ║");
        println!(
            "║   Min: ({:>9.3}, {:>9.3}, {:>9.3})                  ║",
            self.bbox[0], self.bbox[1], self.bbox[2]
        );
        println!(
            "║   Max: ({:>9.3}, {:>9.3}, {:>9.3})                  ║",
            self.bbox[3], self.bbox[4], self.bbox[5]
        );
        println!("║   Size: {:>9.3} × {:>9.3} × {:>9.3}                  ║", dx, dy, dz);
        println!("║                                                          ║");
        println!("║ Vertices:        {:>10}                              ║", self.vertex_count);
        println!("║ Triangles:       {:>10}                              ║", self.triangle_count);
        println!(
            "║ Manifold:        {:>10}                              ║",
            if self.is_manifold { "Yes" } else { "No" }
        );
        println!(
            "║ Closed:          {:>10}                              ║",
            if self.is_closed { "Yes" } else { "No" }
        );
        println!("╚══════════════════════════════════════════════════════════╝");
    }
}

/// Analyze mesh geometry and compute statistics
pub fn analyze<V, T>(mesh: &Mesh<V, T>) -> MeshStats {
    if mesh.is_empty() {
        return MeshStats::empty();
    }
    let bbox = mesh.bounding_box();
    MeshStats {
        volume: signed_volume(mesh),
        surface_area: surface_area(mesh),
        bbox: [bbox.min.x, bbox.min.y, bbox.min.z, bbox.max.x, bbox.max.y, bbox.max.z],
        vertex_count: mesh.vertex_count(),
        triangle_count: mesh.triangle_count(),
        is_manifold: is_manifold(mesh),
        is_closed: is_closed(mesh),
    }
}

/// Sum of signed tetrahedron volumes against the origin
pub fn signed_volume<V, T>(mesh: &Mesh<V, T>) -> f64 {
    (0..mesh.triangle_count())
        .map(|t| {
            let [a, b, c] = mesh.triangle_positions(t);
            a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
        })
        .sum()
}

pub fn surface_area<V, T>(mesh: &Mesh<V, T>) -> f64 {
    (0..mesh.triangle_count()).map(|t| mesh.triangle_area(t)).sum()
}

/// Extent of the bounding box along each axis
pub fn dimensions<V, T>(mesh: &Mesh<V, T>) -> Vector3<f64> {
    mesh.bounding_box().size()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use approx::assert_relative_eq;

    #[test]
    fn test_analyze_cube() {
        let mesh = Primitive::cube(Vector3::new(10.0, 10.0, 10.0), true).to_mesh();
        let stats = analyze(&mesh);

        assert_relative_eq!(stats.volume, 1000.0, epsilon = 1e-9);
        assert_relative_eq!(stats.surface_area, 600.0, epsilon = 1e-9);
        assert_eq!(stats.dimensions(), [10.0, 10.0, 10.0]);
        assert_eq!(stats.vertex_count, 8);
        assert!(stats.is_closed);
    }

    #[test]
    fn test_inverted_mesh_has_negative_volume() {
        let mut mesh = Primitive::cube(Vector3::new(2.0, 3.0, 4.0), false).to_mesh();
        mesh.flip_orientation();
        assert_relative_eq!(signed_volume(&mesh), -24.0, epsilon = 1e-9);
        assert_eq!(dimensions(&mesh), Vector3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn test_sphere_approaches_analytic_volume() {
        let mesh = Primitive::sphere(1.0, 64).to_mesh();
        let volume = signed_volume(&mesh);
        let exact = 4.0 / 3.0 * std::f64::consts::PI;
        assert!(volume < exact);
        assert!((exact - volume) / exact < 0.01);
    }

    #[test]
    fn test_empty_mesh_stats() {
        let stats = analyze(&Mesh::<(), ()>::new());
        assert_eq!(stats.triangle_count, 0);
        assert!(!stats.is_closed);
    }
}
