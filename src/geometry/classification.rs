// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Containment classification of the subdivided working mesh
//!
//! Labels are propagated over face adjacency between triangles of the same
//! operand. Crossing an ordinary edge keeps the label, crossing an edge of the
//! intersection curve flips it. Each connected piece then needs a single
//! point-containment test against the other operand, done by counting ray
//! crossings with exact predicates.

use super::bbox::BoundingBox;
use super::bvh::BVH;
use super::mesh::{Containment, Mesh, Provenance};
use super::robust_predicates::{segment_triangle_intersect, Crossing};
use super::topology::{same_provenance_adjacency, EdgeMap};
use super::triangle_intersection::EdgeKey;
use crate::error::{CorkError, CorkResult};
use log::debug;
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::{BTreeSet, VecDeque};

/// Closed triangle surface used as the reference for point containment
pub struct Surface {
    positions: Vec<Point3<f64>>,
    triangles: Vec<[usize; 3]>,
    bvh: BVH,
    bounds: BoundingBox,
}

impl Surface {
    pub fn new(positions: Vec<Point3<f64>>, triangles: Vec<[usize; 3]>) -> Self {
        let bvh = BVH::from_triangles(&positions, triangles.iter().enumerate());
        let bounds = bvh.bounds();
        Self {
            positions,
            triangles,
            bvh,
            bounds,
        }
    }

    /// Surface made of the triangles of one operand of a working mesh
    pub fn from_operand<V, T>(mesh: &Mesh<V, T>, provenance: Provenance) -> Self {
        let triangles = mesh
            .triangles
            .iter()
            .filter(|t| t.provenance == provenance)
            .map(|t| t.indices)
            .collect();
        Self::new(mesh.positions(), triangles)
    }

    /// Parity of crossings along one ray, or `None` if the ray grazes an
    /// edge, a vertex or lies in a face plane
    fn crossing_parity(&self, origin: &Point3<f64>, direction: &Vector3<f64>) -> Option<bool> {
        let reach = 2.0 * (self.bounds.diagonal() + (origin - self.bounds.center()).norm()) + 1.0;
        let end = origin + direction * reach;
        let query = BoundingBox::from_points([origin, &end]);

        let mut inside = false;
        for t in self.bvh.query_triangles(&query) {
            let tri = self.triangles[t].map(|i| self.positions[i]);
            match segment_triangle_intersect(origin, &end, &tri) {
                Crossing::Miss => {}
                Crossing::Hit(_) => inside = !inside,
                Crossing::Degenerate => return None,
            }
        }
        Some(inside)
    }

    /// Is `point` inside the volume bounded by this surface?
    ///
    /// Tries up to `ray_attempts` deterministic directions and reports a
    /// degeneracy if every one of them grazes the surface.
    pub fn contains(&self, point: &Point3<f64>, ray_attempts: usize) -> CorkResult<bool> {
        if self.triangles.is_empty() || !self.bounds.contains(point) {
            return Ok(false);
        }
        (0..ray_attempts.max(1))
            .find_map(|attempt| self.crossing_parity(point, &ray_direction(attempt)))
            .ok_or_else(CorkError::degenerate)
    }
}

/// Deterministic ray direction for a given attempt
fn ray_direction(attempt: usize) -> Vector3<f64> {
    let mut rng = StdRng::seed_from_u64(0x5EED_0000 + attempt as u64);
    loop {
        let v = Vector3::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        let n = v.norm();
        if n > 0.1 && n <= 1.0 {
            return v / n;
        }
    }
}

/// Summary of a classification run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassificationStats {
    pub components: usize,
    pub inside: usize,
    pub outside: usize,
}

/// One connected piece of an operand with labels relative to its seed
struct Component {
    triangles: Vec<usize>,
    /// Parity relative to the seed triangle, indexed like `triangles`
    flipped: Vec<bool>,
    seed: usize,
}

/// Label every triangle of a Boolean working mesh as inside or outside the
/// other operand
///
/// `surfaces[0]` is operand A and `surfaces[1]` operand B, as they were
/// before subdivision.
pub fn classify<V: Sync, T: Sync>(
    mesh: &mut Mesh<V, T>,
    curve_edges: &BTreeSet<EdgeKey>,
    surfaces: &[Surface; 2],
    ray_attempts: usize,
    parallel: bool,
) -> CorkResult<ClassificationStats> {
    let edges = EdgeMap::build(&mesh.triangles);
    let adjacency = same_provenance_adjacency(&mesh.triangles, &edges);
    let components = collect_components(mesh, &adjacency, curve_edges)?;

    let seed_label = |component: &Component| -> CorkResult<Containment> {
        let triangle = &mesh.triangles[component.seed];
        let [a, b, c] = mesh.triangle_positions(component.seed);
        let centroid = Point3::from((a.coords + b.coords + c.coords) / 3.0);
        let other = match triangle.provenance {
            Provenance::A => &surfaces[1],
            Provenance::B => &surfaces[0],
        };
        Ok(if other.contains(&centroid, ray_attempts)? {
            Containment::Inside
        } else {
            Containment::Outside
        })
    };

    let seeds: Vec<Containment> = if parallel {
        components.par_iter().map(seed_label).collect::<CorkResult<_>>()?
    } else {
        components.iter().map(seed_label).collect::<CorkResult<_>>()?
    };

    let mut stats = ClassificationStats {
        components: components.len(),
        ..Default::default()
    };
    for (component, seed) in components.iter().zip(seeds) {
        for (&t, &flipped) in component.triangles.iter().zip(&component.flipped) {
            let label = if flipped { seed.flipped() } else { seed };
            match label {
                Containment::Inside => stats.inside += 1,
                _ => stats.outside += 1,
            }
            mesh.triangles[t].label = label;
        }
    }

    debug!(
        "classification: {} components, {} inside, {} outside",
        stats.components, stats.inside, stats.outside
    );
    Ok(stats)
}

/// Breadth-first walk over same-operand adjacency, recording for every
/// triangle whether an odd number of curve edges separates it from the
/// component's first triangle
fn collect_components<V, T>(
    mesh: &Mesh<V, T>,
    adjacency: &[Vec<(usize, EdgeKey)>],
    curve_edges: &BTreeSet<EdgeKey>,
) -> CorkResult<Vec<Component>> {
    let n = mesh.triangle_count();
    let mut parity: Vec<Option<bool>> = vec![None; n];
    let mut components = Vec::new();

    for start in 0..n {
        if parity[start].is_some() {
            continue;
        }
        parity[start] = Some(false);
        let mut members = vec![start];
        let mut queue = VecDeque::from([start]);

        while let Some(t) = queue.pop_front() {
            let here = parity[t].unwrap_or(false);
            for &(u, edge) in &adjacency[t] {
                let expected = here ^ curve_edges.contains(&edge);
                match parity[u] {
                    None => {
                        parity[u] = Some(expected);
                        members.push(u);
                        queue.push_back(u);
                    }
                    Some(existing) if existing != expected => {
                        return Err(CorkError::ClassificationConflict { triangle: u });
                    }
                    Some(_) => {}
                }
            }
        }

        // Largest triangle gives the best-conditioned ray origin
        let seed = members
            .iter()
            .copied()
            .max_by(|&x, &y| mesh.triangle_area(x).total_cmp(&mesh.triangle_area(y)).then(y.cmp(&x)))
            .unwrap_or(start);
        let seed_parity = parity[seed].unwrap_or(false);
        let flipped = members
            .iter()
            .map(|&t| parity[t].unwrap_or(false) != seed_parity)
            .collect();
        components.push(Component {
            triangles: members,
            flipped,
            seed,
        });
    }

    Ok(components)
}
