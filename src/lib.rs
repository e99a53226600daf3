// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polycork Boolean Engine
//!
//! Robust Boolean operations (union, difference, intersection, symmetric
//! difference) on closed, oriented triangle meshes, plus intersection
//! resolution and solidity queries. Geometric decisions use exact
//! predicates and degeneracies are removed by deterministic perturbation.

pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod store;

pub use config::{EngineConfig, RemeshConfig};
pub use error::{CorkError, CorkResult};
pub use geometry::{BooleanOp, Mesh, Primitive};
pub use io::{load_mesh, save_mesh, FlatMesh};
pub use store::MeshStore;

use geometry::attributes::{TriangleData, VertexData};

/// A ∪ B with the default configuration
pub fn union<V: VertexData, T: TriangleData>(a: &Mesh<V, T>, b: &Mesh<V, T>) -> CorkResult<Mesh<V, T>> {
    geometry::boolean(a, b, BooleanOp::Union, &EngineConfig::default())
}

/// A − B with the default configuration
pub fn difference<V: VertexData, T: TriangleData>(
    a: &Mesh<V, T>,
    b: &Mesh<V, T>,
) -> CorkResult<Mesh<V, T>> {
    geometry::boolean(a, b, BooleanOp::Difference, &EngineConfig::default())
}

/// A ∩ B with the default configuration
pub fn intersection<V: VertexData, T: TriangleData>(
    a: &Mesh<V, T>,
    b: &Mesh<V, T>,
) -> CorkResult<Mesh<V, T>> {
    geometry::boolean(a, b, BooleanOp::Intersection, &EngineConfig::default())
}

/// (A − B) ∪ (B − A) with the default configuration
pub fn symmetric_difference<V: VertexData, T: TriangleData>(
    a: &Mesh<V, T>,
    b: &Mesh<V, T>,
) -> CorkResult<Mesh<V, T>> {
    geometry::boolean(a, b, BooleanOp::SymmetricDifference, &EngineConfig::default())
}

/// Both operands with their intersection curve made explicit
pub fn resolve_intersections<V: VertexData, T: TriangleData>(
    a: &Mesh<V, T>,
    b: &Mesh<V, T>,
) -> CorkResult<Mesh<V, T>> {
    geometry::boolean(a, b, BooleanOp::Resolve, &EngineConfig::default())
}

/// Closed and not self-intersecting
pub fn is_solid<V, T>(mesh: &Mesh<V, T>) -> bool {
    geometry::is_solid(mesh)
}
