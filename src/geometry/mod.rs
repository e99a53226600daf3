// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - mesh representation, Boolean pipeline and mesh queries

pub mod analytics;
pub mod attributes;
mod bbox;
pub mod boolean;
pub mod bvh;
pub mod classification;
pub mod curve;
pub mod mesh;
pub mod mesh_utils;
pub mod primitives;
pub mod remesh;
pub mod repair;
pub mod robust_predicates;
pub mod tie_break;
pub mod topology;
pub mod transform;
pub mod triangle_intersection;
pub mod triangle_splitting;

pub use analytics::{analyze, MeshStats};
pub use attributes::{AttributeInterpolate, AttributeMerge, AttributeSplit, TriangleData, VertexData};
pub use bbox::BoundingBox;
pub use boolean::{boolean, BooleanOp};
pub use mesh::{Containment, Mesh, Provenance, Triangle, Vertex};
pub use mesh_utils::{is_closed, is_manifold, is_self_intersecting, is_solid};
pub use primitives::Primitive;
pub use transform::Positioned;
