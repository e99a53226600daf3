// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh validation: closedness, manifoldness and self-intersection

use super::bvh::BVH;
use super::mesh::Mesh;
use super::robust_predicates::Crossing;
use super::tie_break::{perturb_positions, perturbation_magnitude};
use super::topology::{is_consistently_oriented, EdgeMap};
use super::triangle_intersection::pair_touches;
use crate::config::EngineConfig;
use crate::error::{CorkError, CorkResult};
use log::{debug, warn};
use rayon::prelude::*;

/// Check if mesh is manifold (each edge shared by at most 2 triangles)
pub fn is_manifold<V, T>(mesh: &Mesh<V, T>) -> bool {
    EdgeMap::build(&mesh.triangles).all_edges_at_most_twice()
}

/// Check if mesh is closed: each edge shared by exactly 2 triangles that
/// traverse it in opposite directions
pub fn is_closed<V, T>(mesh: &Mesh<V, T>) -> bool {
    !mesh.triangles.is_empty()
        && EdgeMap::build(&mesh.triangles).all_edges_shared_twice()
        && is_consistently_oriented(&mesh.triangles)
}

pub fn is_self_intersecting<V, T>(mesh: &Mesh<V, T>) -> bool {
    is_self_intersecting_with(mesh, &EngineConfig::default())
}

/// Does any pair of non-adjacent triangles touch?
///
/// Adjacent triangles are excused: a shared edge is never a contact, and a
/// shared vertex only counts when the opposite edge reaches the other
/// triangle. Degenerate contacts are retried with every vertex perturbed.
/// If they persist the mesh is reported as self-intersecting.
pub fn is_self_intersecting_with<V, T>(mesh: &Mesh<V, T>, config: &EngineConfig) -> bool {
    let positions = mesh.positions();
    let triangles: Vec<[usize; 3]> = mesh.triangles.iter().map(|t| t.indices).collect();
    let diagonal = mesh.bounding_box().diagonal();

    for attempt in 0..=config.max_perturbation_attempts {
        let magnitude = perturbation_magnitude(diagonal, config.perturbation_scale, attempt);
        let moved = perturb_positions(&positions, attempt, magnitude, |_| true);
        let bvh = BVH::from_triangles(&moved, triangles.iter().enumerate());
        let pairs: Vec<(usize, usize)> = bvh.self_pairs().collect();

        let touch = |&(t, u): &(usize, usize)| pair_touches(&moved, &triangles, t, u);
        let results: Vec<Crossing<()>> = if config.parallel {
            pairs.par_iter().map(touch).collect()
        } else {
            pairs.iter().map(touch).collect()
        };

        if let Some(i) = results.iter().position(Crossing::is_hit) {
            debug!("triangles {} and {} intersect", pairs[i].0, pairs[i].1);
            return true;
        }
        if !results.iter().any(Crossing::is_degenerate) {
            return false;
        }
        warn!(
            "self-intersection check: degenerate contact on attempt {}, perturbing",
            attempt
        );
    }

    warn!("self-intersection check: contact stayed degenerate, treating mesh as self-intersecting");
    true
}

pub fn is_solid<V, T>(mesh: &Mesh<V, T>) -> bool {
    is_solid_with(mesh, &EngineConfig::default())
}

/// Closed and free of self-intersections, reporting which test failed
pub fn is_solid_with<V, T>(mesh: &Mesh<V, T>, config: &EngineConfig) -> bool {
    if !is_closed(mesh) {
        debug!("mesh is not closed");
        return false;
    }
    if is_self_intersecting_with(mesh, config) {
        debug!("mesh is self-intersecting");
        return false;
    }
    true
}

/// Input checks for a Boolean operand, in order: structure, closedness,
/// self-intersection
pub fn validate_solid<V, T>(mesh: &Mesh<V, T>, config: &EngineConfig) -> CorkResult<()> {
    mesh.validate()?;
    if !config.check_solidity {
        return Ok(());
    }
    if !is_closed(mesh) {
        return Err(CorkError::NonClosedInput);
    }
    if is_self_intersecting_with(mesh, config) {
        return Err(CorkError::SelfIntersectingInput);
    }
    Ok(())
}
