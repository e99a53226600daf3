// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Round-trip tests for mesh files

use anyhow::Result;
use nalgebra::{Matrix4, Vector3};
use polycork::geometry::analytics::signed_volume;
use polycork::geometry::mesh::canonical_triangle_set;
use polycork::geometry::{is_closed, Primitive};
use polycork::io::{self, FlatMesh};
use polycork::Mesh;
use tempfile::tempdir;

fn overlapping_union() -> Mesh {
    let a = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
    let mut b = a.clone();
    b.transform(&Matrix4::new_translation(&Vector3::new(0.5, 0.25, 0.125)));
    polycork::union(&a, &b).unwrap()
}

#[test]
fn test_off_round_trip_is_exact() -> Result<()> {
    let mesh = overlapping_union();
    let dir = tempdir()?;
    let path = dir.path().join("union.off");

    io::save_mesh(&path, &FlatMesh::from_mesh(&mesh))?;
    let loaded: Mesh = io::load_mesh(&path)?.to_mesh()?;

    assert_eq!(canonical_triangle_set(&loaded), canonical_triangle_set(&mesh));
    assert!(polycork::is_solid(&loaded));
    Ok(())
}

#[test]
fn test_binary_stl_round_trip_stays_closed() -> Result<()> {
    let mesh = Primitive::sphere(5.0, 24).to_mesh();
    let dir = tempdir()?;
    let path = dir.path().join("sphere.stl");

    io::save_mesh(&path, &FlatMesh::from_mesh(&mesh))?;
    let loaded: Mesh = io::load_mesh(&path)?.to_mesh()?;

    assert_eq!(loaded.vertex_count(), mesh.vertex_count());
    assert_eq!(loaded.triangle_count(), mesh.triangle_count());
    assert!(is_closed(&loaded));
    assert!((signed_volume(&loaded) - signed_volume(&mesh)).abs() < 1e-3);
    Ok(())
}

#[test]
fn test_ascii_stl_feeds_boolean() -> Result<()> {
    let dir = tempdir()?;
    let a_path = dir.path().join("a.stl");
    let b_path = dir.path().join("b.stl");

    let a = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), true).to_mesh();
    let mut b = Primitive::cylinder(4.0, 0.5, 16).to_mesh();
    b.transform(&Matrix4::new_translation(&Vector3::new(0.1, 0.05, -2.0)));

    io::save_stl_ascii(&a_path, &FlatMesh::from_mesh(&a))?;
    io::save_stl_ascii(&b_path, &FlatMesh::from_mesh(&b))?;

    let a: Mesh = io::load_mesh(&a_path)?.to_mesh()?;
    let b: Mesh = io::load_mesh(&b_path)?.to_mesh()?;
    let drilled = polycork::difference(&a, &b)?;

    assert!(is_closed(&drilled));
    assert!(signed_volume(&drilled) < 8.0);
    assert!(signed_volume(&drilled) > 8.0 - std::f64::consts::PI * 0.25 * 2.0);
    Ok(())
}

#[test]
fn test_unsupported_extension() {
    let dir = tempdir().unwrap();
    let mesh = FlatMesh::from_mesh(&Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh());
    assert!(io::save_mesh(dir.path().join("cube.ply"), &mesh).is_err());
}
