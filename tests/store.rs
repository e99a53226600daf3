// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Session store workflows

use anyhow::Result;
use nalgebra::Vector3;
use polycork::geometry::Primitive;
use polycork::{CorkError, EngineConfig, FlatMesh, MeshStore};
use tempfile::tempdir;

fn unit_cube() -> FlatMesh {
    FlatMesh::from_mesh(&Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh())
}

fn volume(mesh: &FlatMesh) -> f64 {
    let mesh: polycork::Mesh = mesh.to_mesh().unwrap();
    polycork::geometry::analytics::signed_volume(&mesh)
}

#[test]
fn test_load_operate_save() -> Result<()> {
    let dir = tempdir()?;
    let cube_path = dir.path().join("cube.off");
    polycork::save_mesh(&cube_path, &unit_cube())?;

    let mut store = MeshStore::with_config(EngineConfig::serial());
    store.load(1, &cube_path)?;
    store.copy(1, 2)?;
    store.translate(2, Vector3::new(0.5, 0.25, 0.125))?;

    store.union(1, 2, 10)?;
    store.intersection(1, 2, 11)?;
    store.difference(1, 2, 12)?;
    store.xor(1, 2, 13)?;

    let overlap = 0.5 * 0.75 * 0.875;
    assert!((volume(store.get(10)?) - (2.0 - overlap)).abs() < 1e-9);
    assert!((volume(store.get(11)?) - overlap).abs() < 1e-9);
    assert!((volume(store.get(12)?) - (1.0 - overlap)).abs() < 1e-9);
    assert!((volume(store.get(13)?) - (2.0 - 2.0 * overlap)).abs() < 1e-9);
    assert!(store.is_solid(10)?);

    let out = dir.path().join("union.stl");
    store.save(10, &out)?;
    store.load(20, &out)?;
    assert_eq!(store.get(20)?.triangle_count(), store.get(10)?.triangle_count());
    Ok(())
}

#[test]
fn test_rotations_round_trip() -> Result<()> {
    let mut store = MeshStore::new();
    store.insert(1, unit_cube());

    store.rotate_180_x(1)?;
    store.rotate_180_x(1)?;
    assert_eq!(store.get(1)?, &unit_cube());

    store.rotate_180_y(1)?;
    store.translate_z(1, 1.0)?;
    let mesh = store.get(1)?;
    assert!(mesh.vertices.iter().all(|v| (-1.0..=0.0).contains(&v[0])));
    assert!(mesh.vertices.iter().all(|v| (0.0..=1.0).contains(&v[2])));

    store.rotate_z(1, std::f64::consts::PI)?;
    assert!(store.get(1)?.vertices.iter().all(|v| v[0] > -1e-12));
    Ok(())
}

#[test]
fn test_missing_ids_and_files() {
    let mut store = MeshStore::new();
    assert!(store.load(1, "/nonexistent/cube.stl").is_err());
    assert!(store.get(1).is_err());

    let err = store.save(3, "/tmp/never_written.off").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CorkError>(),
        Some(CorkError::MeshNotFound { id: 3 })
    ));
    assert!(matches!(store.xor(1, 2, 3), Err(CorkError::MeshNotFound { id: 1 })));
}

#[test]
fn test_clear_all() {
    let mut store = MeshStore::new();
    for id in 0..4 {
        store.insert(id, unit_cube());
    }
    assert_eq!(store.len(), 4);
    store.clear_all();
    assert!(store.is_empty());
    assert!(!store.delete(0));
}
