// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Deterministic symbolic perturbation
//!
//! When an exact predicate returns zero the pipeline restarts with every
//! movable vertex displaced. Boolean runs dilate operand B along its vertex
//! normals so that faces shared with A resolve the same way everywhere, and
//! add a small [`tie_break_offset`] to break symmetric ties. Resolve runs use
//! the tie-break offset alone. The offset depends only on the vertex's
//! coordinate bits and the attempt number, so a retry is reproducible across
//! runs, threads and platforms, and vertices that share a position move
//! together.

use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// SplitMix64 finalizer
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed derived from a canonical encoding of the position and the attempt
fn seed(position: &Point3<f64>, attempt: usize) -> u64 {
    // -0.0 and 0.0 are the same point
    let bits = |v: f64| if v == 0.0 { 0 } else { v.to_bits() };
    let mut h = mix(attempt as u64);
    for v in [position.x, position.y, position.z] {
        h = mix(h ^ bits(v));
    }
    h
}

/// Offset for one vertex on a given attempt. Attempt 0 is the unperturbed
/// run and always yields zero. Each component lies in `[-magnitude, magnitude]`.
pub fn tie_break_offset(position: &Point3<f64>, attempt: usize, magnitude: f64) -> Vector3<f64> {
    if attempt == 0 || magnitude == 0.0 {
        return Vector3::zeros();
    }
    let mut rng = StdRng::seed_from_u64(seed(position, attempt));
    Vector3::new(
        rng.gen_range(-1.0..=1.0),
        rng.gen_range(-1.0..=1.0),
        rng.gen_range(-1.0..=1.0),
    ) * magnitude
}

/// Perturbed copy of `positions`, moving only the entries selected by `movable`
pub fn perturb_positions(
    positions: &[Point3<f64>],
    attempt: usize,
    magnitude: f64,
    movable: impl Fn(usize) -> bool,
) -> Vec<Point3<f64>> {
    positions
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if movable(i) {
                p + tie_break_offset(p, attempt, magnitude)
            } else {
                *p
            }
        })
        .collect()
}

/// Share of a dilation step given to the tie-break offset. Below
/// `1 / sqrt(3)`, so even a cube corner still moves away from all three of
/// its faces.
pub const DILATION_JITTER: f64 = 0.25;

/// Unit angle-weighted normal at every vertex used by `triangles`, zero for
/// the others
pub fn outward_directions<'a>(
    positions: &[Point3<f64>],
    triangles: impl IntoIterator<Item = &'a [usize; 3]>,
) -> Vec<Vector3<f64>> {
    let mut sums = vec![Vector3::zeros(); positions.len()];
    for &[a, b, c] in triangles {
        let Some(normal) = (positions[b] - positions[a])
            .cross(&(positions[c] - positions[a]))
            .try_normalize(0.0)
        else {
            continue;
        };
        for (v, u, w) in [(a, b, c), (b, c, a), (c, a, b)] {
            let angle = (positions[u] - positions[v]).angle(&(positions[w] - positions[v]));
            sums[v] += normal * angle;
        }
    }
    sums.into_iter()
        .map(|sum| sum.try_normalize(0.0).unwrap_or_else(Vector3::zeros))
        .collect()
}

/// Copy of `positions` with the movable entries pushed `magnitude` along
/// `directions`, plus a tie-break offset of up to [`DILATION_JITTER`] times
/// `magnitude`
pub fn dilate_positions(
    positions: &[Point3<f64>],
    directions: &[Vector3<f64>],
    attempt: usize,
    magnitude: f64,
    movable: impl Fn(usize) -> bool,
) -> Vec<Point3<f64>> {
    if attempt == 0 {
        return positions.to_vec();
    }
    positions
        .iter()
        .zip(directions)
        .enumerate()
        .map(|(i, (p, d))| {
            if movable(i) {
                p + d * magnitude + tie_break_offset(p, attempt, magnitude * DILATION_JITTER)
            } else {
                *p
            }
        })
        .collect()
}

/// Perturbation magnitude for a model of the given bounding-box diagonal
pub fn perturbation_magnitude(diagonal: f64, scale: f64, attempt: usize) -> f64 {
    // Grow slowly so later attempts escape near-degenerate neighbourhoods
    let diagonal = if diagonal > 0.0 { diagonal } else { 1.0 };
    diagonal * scale * (1u64 << attempt.min(16)) as f64
}
