// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Bounding Volume Hierarchy (BVH) for spatial acceleration
//! Used to prune triangle pairs before exact intersection tests

use super::BoundingBox;
use nalgebra::Point3;

/// BVH node
#[derive(Debug, Clone)]
pub struct BVHNode {
    /// Bounding box of this node
    pub bbox: BoundingBox,
    /// Left child (None for leaf)
    pub left: Option<Box<BVHNode>>,
    /// Right child (None for leaf)
    pub right: Option<Box<BVHNode>>,
    /// Triangle indices with their boxes (only for leaf nodes)
    pub triangles: Vec<(usize, BoundingBox)>,
}

impl BVHNode {
    /// Create a leaf node
    fn leaf(bbox: BoundingBox, triangles: Vec<(usize, BoundingBox)>) -> Self {
        Self {
            bbox,
            left: None,
            right: None,
            triangles,
        }
    }

    /// Create an internal node
    fn internal(bbox: BoundingBox, left: Box<BVHNode>, right: Box<BVHNode>) -> Self {
        Self {
            bbox,
            left: Some(left),
            right: Some(right),
            triangles: Vec::new(),
        }
    }

    /// Check if this is a leaf node
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    fn children(&self) -> Option<(&BVHNode, &BVHNode)> {
        match (&self.left, &self.right) {
            (Some(l), Some(r)) => Some((l, r)),
            _ => None,
        }
    }
}

/// Bounding Volume Hierarchy over a set of triangles
#[derive(Debug, Clone)]
pub struct BVH {
    root: BVHNode,
    len: usize,
}

impl BVH {
    /// Build BVH from triangles
    /// triangles: Vec of (triangle_index, bbox) pairs
    pub fn build(triangles: Vec<(usize, BoundingBox)>) -> Self {
        let len = triangles.len();
        if triangles.is_empty() {
            return Self {
                root: BVHNode::leaf(BoundingBox::empty(), Vec::new()),
                len,
            };
        }

        let root = Self::build_recursive(triangles, 0);
        Self { root, len }
    }

    /// Build over the listed triangles of an indexed mesh
    pub fn from_triangles<'a>(
        positions: &[Point3<f64>],
        triangles: impl IntoIterator<Item = (usize, &'a [usize; 3])>,
    ) -> Self {
        let entries = triangles
            .into_iter()
            .map(|(idx, tri)| (idx, BoundingBox::from_points(tri.iter().map(|&v| &positions[v]))))
            .collect();
        Self::build(entries)
    }

    /// Recursively build BVH node
    fn build_recursive(mut triangles: Vec<(usize, BoundingBox)>, depth: usize) -> BVHNode {
        const MAX_DEPTH: usize = 32;
        const MIN_TRIANGLES: usize = 4;

        let bbox = Self::compute_union_bbox(&triangles);

        // Base case: create leaf if few triangles or max depth reached
        if triangles.len() <= MIN_TRIANGLES || depth >= MAX_DEPTH {
            return BVHNode::leaf(bbox, triangles);
        }

        // Sort triangle centers along the longest axis, ties broken by index
        let axis = Self::longest_axis(&bbox);
        triangles.sort_by(|(ia, a), (ib, b)| {
            a.center()[axis]
                .total_cmp(&b.center()[axis])
                .then(ia.cmp(ib))
        });

        // Split at median
        let right_triangles = triangles.split_off(triangles.len() / 2);
        let left = Box::new(Self::build_recursive(triangles, depth + 1));
        let right = Box::new(Self::build_recursive(right_triangles, depth + 1));

        BVHNode::internal(bbox, left, right)
    }

    fn longest_axis(bbox: &BoundingBox) -> usize {
        let size = bbox.size();
        if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        }
    }

    /// Compute union bounding box of triangles
    fn compute_union_bbox(triangles: &[(usize, BoundingBox)]) -> BoundingBox {
        triangles
            .iter()
            .fold(BoundingBox::empty(), |acc, (_, b)| acc.union(b))
    }

    /// Number of triangles indexed
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bounds(&self) -> BoundingBox {
        self.root.bbox
    }

    /// Query triangles that intersect with given bounding box
    pub fn query_triangles(&self, bbox: &BoundingBox) -> Vec<usize> {
        let mut result = Vec::new();
        Self::query_recursive(&self.root, bbox, &mut result);
        result
    }

    /// Recursively query BVH
    fn query_recursive(node: &BVHNode, bbox: &BoundingBox, result: &mut Vec<usize>) {
        if !node.bbox.intersects(bbox) {
            return;
        }

        match node.children() {
            None => result.extend(
                node.triangles
                    .iter()
                    .filter(|(_, b)| b.intersects(bbox))
                    .map(|(idx, _)| *idx),
            ),
            Some((left, right)) => {
                Self::query_recursive(left, bbox, result);
                Self::query_recursive(right, bbox, result);
            }
        }
    }

    /// Lazily enumerate `(self_triangle, other_triangle)` pairs whose boxes
    /// overlap. Every truly intersecting pair is produced; false positives
    /// are possible.
    pub fn candidate_pairs<'a>(&'a self, other: &'a BVH) -> CandidatePairs<'a> {
        CandidatePairs {
            stack: vec![(&self.root, &other.root)],
            pending: Vec::new(),
            same_tree: false,
        }
    }

    /// Lazily enumerate pairs `(t, u)` with `t < u` of overlapping triangles
    /// within this hierarchy
    pub fn self_pairs(&self) -> CandidatePairs<'_> {
        CandidatePairs {
            stack: vec![(&self.root, &self.root)],
            pending: Vec::new(),
            same_tree: true,
        }
    }

    /// Get root node (for testing)
    #[cfg(test)]
    pub fn root(&self) -> &BVHNode {
        &self.root
    }
}

/// Dual-tree traversal yielding overlapping triangle pairs
pub struct CandidatePairs<'a> {
    stack: Vec<(&'a BVHNode, &'a BVHNode)>,
    pending: Vec<(usize, usize)>,
    same_tree: bool,
}

impl<'a> CandidatePairs<'a> {
    fn expand(&mut self, a: &'a BVHNode, b: &'a BVHNode) {
        let same_node = self.same_tree && std::ptr::eq(a, b);

        if same_node {
            match a.children() {
                None => {
                    for (i, (ti, bi)) in a.triangles.iter().enumerate() {
                        for (tj, bj) in &a.triangles[i + 1..] {
                            if bi.intersects(bj) {
                                self.pending.push(((*ti).min(*tj), (*ti).max(*tj)));
                            }
                        }
                    }
                }
                Some((l, r)) => {
                    self.stack.push((l, r));
                    self.stack.push((r, r));
                    self.stack.push((l, l));
                }
            }
            return;
        }

        if !a.bbox.intersects(&b.bbox) {
            return;
        }

        match (a.children(), b.children()) {
            (None, None) => {
                for (ti, bi) in &a.triangles {
                    for (tj, bj) in &b.triangles {
                        if bi.intersects(bj) {
                            let pair = if self.same_tree {
                                ((*ti).min(*tj), (*ti).max(*tj))
                            } else {
                                (*ti, *tj)
                            };
                            self.pending.push(pair);
                        }
                    }
                }
            }
            (Some((l, r)), None) => {
                self.stack.push((r, b));
                self.stack.push((l, b));
            }
            (None, Some((l, r))) => {
                self.stack.push((a, r));
                self.stack.push((a, l));
            }
            (Some((al, ar)), Some((bl, br))) => {
                // Descend into the larger box first
                if a.bbox.volume() >= b.bbox.volume() {
                    self.stack.push((ar, b));
                    self.stack.push((al, b));
                } else {
                    self.stack.push((a, br));
                    self.stack.push((a, bl));
                }
            }
        }
    }
}

impl<'a> Iterator for CandidatePairs<'a> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(pair) = self.pending.pop() {
                return Some(pair);
            }
            let (a, b) = self.stack.pop()?;
            self.expand(a, b);
        }
    }
}
