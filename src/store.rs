// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Session store for meshes addressed by integer id
//!
//! Hosts that cannot hold Rust values across calls keep their meshes here
//! and refer to them by id. The store owns plain [`FlatMesh`] values and is
//! owned by its caller.

use crate::config::EngineConfig;
use crate::error::{CorkError, CorkResult};
use crate::geometry::mesh_utils::is_solid_with;
use crate::geometry::{boolean, transform, BooleanOp, Mesh};
use crate::io::{self, FlatMesh};
use ahash::AHashMap;
use anyhow::Result;
use log::debug;
use nalgebra::Vector3;
use std::path::Path;

/// Mesh identifier used by the store
pub type MeshId = i32;

#[derive(Debug, Default)]
pub struct MeshStore {
    meshes: AHashMap<MeshId, FlatMesh>,
    config: EngineConfig,
}

impl MeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            meshes: AHashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Stored ids in ascending order
    pub fn ids(&self) -> Vec<MeshId> {
        let mut ids: Vec<MeshId> = self.meshes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Read a mesh file into `id`, replacing whatever was stored there
    pub fn load(&mut self, id: MeshId, path: impl AsRef<Path>) -> Result<()> {
        let mesh = io::load_mesh(path)?;
        self.meshes.insert(id, mesh);
        Ok(())
    }

    pub fn save(&self, id: MeshId, path: impl AsRef<Path>) -> Result<()> {
        io::save_mesh(path, self.get(id)?)
    }

    /// Store a mesh, returning the one it replaces
    pub fn insert(&mut self, id: MeshId, mesh: FlatMesh) -> Option<FlatMesh> {
        self.meshes.insert(id, mesh)
    }

    pub fn get(&self, id: MeshId) -> CorkResult<&FlatMesh> {
        self.meshes.get(&id).ok_or(CorkError::MeshNotFound { id })
    }

    fn get_mut(&mut self, id: MeshId) -> CorkResult<&mut FlatMesh> {
        self.meshes.get_mut(&id).ok_or(CorkError::MeshNotFound { id })
    }

    pub fn copy(&mut self, src: MeshId, dst: MeshId) -> CorkResult<()> {
        let mesh = self.get(src)?.clone();
        self.meshes.insert(dst, mesh);
        Ok(())
    }

    /// Remove a mesh. Returns false if nothing was stored under `id`.
    pub fn delete(&mut self, id: MeshId) -> bool {
        self.meshes.remove(&id).is_some()
    }

    pub fn clear_all(&mut self) {
        self.meshes.clear();
    }

    /// Whether the stored mesh is closed and free of self-intersections.
    /// Structurally invalid meshes are reported as not solid.
    pub fn is_solid(&self, id: MeshId) -> CorkResult<bool> {
        match self.get(id)?.to_mesh::<(), ()>() {
            Ok(mesh) => Ok(is_solid_with(&mesh, &self.config)),
            Err(err) => {
                debug!("mesh {} is not a valid mesh: {}", id, err);
                Ok(false)
            }
        }
    }

    pub fn union(&mut self, a: MeshId, b: MeshId, out: MeshId) -> CorkResult<()> {
        self.apply(a, b, out, BooleanOp::Union)
    }

    pub fn difference(&mut self, a: MeshId, b: MeshId, out: MeshId) -> CorkResult<()> {
        self.apply(a, b, out, BooleanOp::Difference)
    }

    pub fn intersection(&mut self, a: MeshId, b: MeshId, out: MeshId) -> CorkResult<()> {
        self.apply(a, b, out, BooleanOp::Intersection)
    }

    pub fn xor(&mut self, a: MeshId, b: MeshId, out: MeshId) -> CorkResult<()> {
        self.apply(a, b, out, BooleanOp::SymmetricDifference)
    }

    pub fn resolve_intersections(&mut self, a: MeshId, b: MeshId, out: MeshId) -> CorkResult<()> {
        self.apply(a, b, out, BooleanOp::Resolve)
    }

    /// Operands are read before `out` is cleared, so `out` may name one of
    /// them. On failure `out` stays empty.
    fn apply(&mut self, a: MeshId, b: MeshId, out: MeshId, op: BooleanOp) -> CorkResult<()> {
        let mesh_a: Mesh = self.get(a)?.to_mesh()?;
        let mesh_b: Mesh = self.get(b)?.to_mesh()?;
        self.meshes.remove(&out);

        let result = boolean(&mesh_a, &mesh_b, op, &self.config)?;
        debug!(
            "{}({}, {}) -> {}: {} triangles",
            op.name(),
            a,
            b,
            out,
            result.triangle_count()
        );
        self.meshes.insert(out, FlatMesh::from_mesh(&result));
        Ok(())
    }

    pub fn translate(&mut self, id: MeshId, offset: Vector3<f64>) -> CorkResult<()> {
        transform::translate(self.get_mut(id)?, &offset);
        Ok(())
    }

    pub fn translate_z(&mut self, id: MeshId, dz: f64) -> CorkResult<()> {
        transform::translate_z(self.get_mut(id)?, dz);
        Ok(())
    }

    pub fn rotate_180_x(&mut self, id: MeshId) -> CorkResult<()> {
        transform::rotate_180_x(self.get_mut(id)?);
        Ok(())
    }

    pub fn rotate_180_y(&mut self, id: MeshId) -> CorkResult<()> {
        transform::rotate_180_y(self.get_mut(id)?);
        Ok(())
    }

    pub fn rotate_z(&mut self, id: MeshId, radians: f64) -> CorkResult<()> {
        transform::rotate_z(self.get_mut(id)?, radians);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;

    fn cube_at(offset: Vector3<f64>) -> FlatMesh {
        let mut mesh = FlatMesh::from_mesh(&Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh());
        transform::translate(&mut mesh, &offset);
        mesh
    }

    #[test]
    fn test_insert_get_copy_delete() {
        let mut store = MeshStore::new();
        assert!(store.insert(1, cube_at(Vector3::zeros())).is_none());
        store.copy(1, 2).unwrap();
        assert_eq!(store.ids(), vec![1, 2]);
        assert_eq!(store.get(2).unwrap(), store.get(1).unwrap());

        assert!(store.delete(1));
        assert!(!store.delete(1));
        assert!(matches!(store.get(1), Err(CorkError::MeshNotFound { id: 1 })));

        store.clear_all();
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_ids() {
        let mut store = MeshStore::new();
        store.insert(1, cube_at(Vector3::zeros()));
        assert!(matches!(store.copy(7, 8), Err(CorkError::MeshNotFound { id: 7 })));
        assert!(matches!(store.union(1, 9, 3), Err(CorkError::MeshNotFound { id: 9 })));
        assert!(matches!(store.rotate_z(4, 1.0), Err(CorkError::MeshNotFound { id: 4 })));
        assert!(matches!(store.is_solid(5), Err(CorkError::MeshNotFound { id: 5 })));
    }

    #[test]
    fn test_transforms_edit_in_place() {
        let mut store = MeshStore::new();
        store.insert(1, cube_at(Vector3::zeros()));
        store.translate_z(1, 2.0).unwrap();
        store.rotate_180_x(1).unwrap();
        let zs: Vec<f64> = store.get(1).unwrap().vertices.iter().map(|v| v[2]).collect();
        assert!(zs.iter().all(|&z| (-3.0..=-2.0).contains(&z)));
    }

    #[test]
    fn test_is_solid() {
        let mut store = MeshStore::with_config(EngineConfig::serial());
        store.insert(1, cube_at(Vector3::zeros()));
        assert!(store.is_solid(1).unwrap());

        let mut open = cube_at(Vector3::zeros());
        open.triangles.pop();
        store.insert(2, open);
        assert!(!store.is_solid(2).unwrap());

        store.insert(3, FlatMesh::default());
        assert!(!store.is_solid(3).unwrap());
    }

    #[test]
    fn test_failed_operation_clears_output() {
        let mut store = MeshStore::new();
        store.insert(1, cube_at(Vector3::zeros()));
        let mut open = cube_at(Vector3::zeros());
        open.triangles.pop();
        store.insert(2, open);
        store.insert(3, cube_at(Vector3::zeros()));

        assert!(matches!(store.union(1, 2, 3), Err(CorkError::NonClosedInput)));
        assert!(store.get(3).is_err());
    }

    #[test]
    fn test_output_may_alias_operand() {
        let mut store = MeshStore::new();
        store.insert(1, cube_at(Vector3::zeros()));
        store.insert(2, cube_at(Vector3::new(0.5, 0.25, 0.125)));
        store.union(1, 2, 1).unwrap();
        assert!(store.get(1).unwrap().triangle_count() > 12);
    }
}
