// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Attribute policies for per-vertex and per-triangle payloads
//!
//! The engine never inspects payload data. Whenever it creates, merges or
//! splits an element it asks the payload type how to derive the new value:
//!
//! - [`AttributeMerge`]: two elements collapse into one
//! - [`AttributeSplit`]: a triangle is divided or moved by an edge flip
//! - [`AttributeInterpolate`]: a new vertex appears on an edge or at a
//!   triple-triangle point
//!
//! `()` is the empty payload. `f64` and `Vector3<f64>` interpolate linearly,
//! which covers scalar fields and per-vertex colours or normals.

use nalgebra::Vector3;

/// Combine two payloads when their owners merge
pub trait AttributeMerge: Sized {
    /// `weight_a` is the share of `a` in the result, in `[0, 1]`
    fn merge(a: &Self, b: &Self, weight_a: f64) -> Self;
}

/// Derive payloads when a triangle is replaced by new triangles
pub trait AttributeSplit: Clone {
    /// Parent split into exactly two children
    fn split(parent: &Self) -> (Self, Self) {
        (parent.clone(), parent.clone())
    }

    /// One of the pieces produced when a triangle is retriangulated around
    /// the intersection curve
    fn subdivide(parent: &Self) -> Self {
        parent.clone()
    }

    /// Triangle rebuilt by an edge flip
    fn moved(from: &Self) -> Self {
        from.clone()
    }
}

/// Derive payloads for vertices created on the intersection curve
pub trait AttributeInterpolate: Sized {
    /// Point at parameter `t` along the edge from `a` to `b`
    fn interpolate_edge(a: &Self, b: &Self, t: f64) -> Self;

    /// Point where three triangles meet. The weights sum to one.
    fn interpolate_triple(corners: [&Self; 3], weights: [f64; 3]) -> Self;
}

/// Everything the engine needs from a vertex payload
pub trait VertexData: AttributeMerge + AttributeInterpolate + Clone + Default + Send + Sync {}

impl<T> VertexData for T where T: AttributeMerge + AttributeInterpolate + Clone + Default + Send + Sync {}

/// Everything the engine needs from a triangle payload
pub trait TriangleData: AttributeMerge + AttributeSplit + Clone + Default + Send + Sync {}

impl<T> TriangleData for T where T: AttributeMerge + AttributeSplit + Clone + Default + Send + Sync {}

impl AttributeMerge for () {
    fn merge(_: &Self, _: &Self, _: f64) -> Self {}
}

impl AttributeSplit for () {}

impl AttributeInterpolate for () {
    fn interpolate_edge(_: &Self, _: &Self, _: f64) -> Self {}

    fn interpolate_triple(_: [&Self; 3], _: [f64; 3]) -> Self {}
}

impl AttributeMerge for f64 {
    fn merge(a: &Self, b: &Self, weight_a: f64) -> Self {
        a * weight_a + b * (1.0 - weight_a)
    }
}

impl AttributeSplit for f64 {}

impl AttributeInterpolate for f64 {
    fn interpolate_edge(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }

    fn interpolate_triple(corners: [&Self; 3], weights: [f64; 3]) -> Self {
        corners[0] * weights[0] + corners[1] * weights[1] + corners[2] * weights[2]
    }
}

impl AttributeMerge for Vector3<f64> {
    fn merge(a: &Self, b: &Self, weight_a: f64) -> Self {
        a * weight_a + b * (1.0 - weight_a)
    }
}

impl AttributeSplit for Vector3<f64> {}

impl AttributeInterpolate for Vector3<f64> {
    fn interpolate_edge(a: &Self, b: &Self, t: f64) -> Self {
        a.lerp(b, t)
    }

    fn interpolate_triple(corners: [&Self; 3], weights: [f64; 3]) -> Self {
        corners[0] * weights[0] + corners[1] * weights[1] + corners[2] * weights[2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scalar_interpolation() {
        assert_relative_eq!(f64::interpolate_edge(&2.0, &6.0, 0.25), 3.0);
        assert_relative_eq!(
            f64::interpolate_triple([&0.0, &3.0, &6.0], [1.0 / 3.0; 3]),
            3.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_scalar_merge_weight() {
        assert_relative_eq!(f64::merge(&1.0, &3.0, 0.5), 2.0);
        assert_relative_eq!(f64::merge(&1.0, &3.0, 1.0), 1.0);
        assert_relative_eq!(f64::merge(&1.0, &3.0, 0.0), 3.0);
    }

    #[test]
    fn test_vector_interpolation() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(2.0, 4.0, -2.0);
        let mid = Vector3::interpolate_edge(&a, &b, 0.5);
        assert_relative_eq!(mid, Vector3::new(1.0, 2.0, -1.0));
    }

    #[test]
    fn test_default_split_copies_parent() {
        let (left, right) = f64::split(&7.0);
        assert_eq!(left, 7.0);
        assert_eq!(right, 7.0);
        assert_eq!(f64::subdivide(&7.0), 7.0);
        assert_eq!(f64::moved(&7.0), 7.0);
    }
}
