// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types for the Boolean engine
//!
//! Input problems are reported before any working mesh is built. Numerical
//! degeneracies are retried internally with a deterministic perturbation and
//! only surface as [`CorkError::DegenerateIntersection`] once every attempt
//! has failed.

use thiserror::Error;

/// Errors produced by mesh validation, Boolean operations and the session store
#[derive(Error, Debug)]
pub enum CorkError {
    /// Mesh has no vertices or no triangles
    #[error("empty mesh input")]
    EmptyMeshInput,

    /// A triangle references a vertex index past the end of the vertex list
    #[error("triangle {triangle} references vertex {index}, but the mesh has only {vertex_count} vertices")]
    OutOfRangeVertexReference {
        triangle: usize,
        index: usize,
        vertex_count: usize,
    },

    /// A triangle uses the same vertex more than once
    #[error("triangle {triangle} repeats a vertex index")]
    DegenerateTriangle { triangle: usize },

    /// The operand intersects itself
    #[error("input mesh is self-intersecting")]
    SelfIntersectingInput,

    /// Some edge is not shared by exactly two triangles
    #[error("input mesh is not closed")]
    NonClosedInput,

    /// General position could not be restored by perturbation
    #[error("degenerate intersection could not be resolved after {attempts} attempts")]
    DegenerateIntersection { attempts: usize },

    /// Label propagation reached a triangle with two different labels
    #[error("containment labels conflict at triangle {triangle}")]
    ClassificationConflict { triangle: usize },

    /// No mesh is stored under the given id
    #[error("no mesh stored under id {id}")]
    MeshNotFound { id: i32 },

    /// Malformed mesh file
    #[error("format error: {0}")]
    Format(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias for engine operations
pub type CorkResult<T> = Result<T, CorkError>;

impl CorkError {
    /// Marker raised inside a pipeline attempt; the retry loop fills in the
    /// attempt count if perturbation never succeeds
    pub(crate) fn degenerate() -> Self {
        CorkError::DegenerateIntersection { attempts: 0 }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, CorkError::DegenerateIntersection { .. })
    }

    /// True for errors caused by the caller's mesh rather than by numerics
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            CorkError::EmptyMeshInput
                | CorkError::OutOfRangeVertexReference { .. }
                | CorkError::DegenerateTriangle { .. }
                | CorkError::SelfIntersectingInput
                | CorkError::NonClosedInput
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CorkError::OutOfRangeVertexReference {
            triangle: 3,
            index: 9,
            vertex_count: 8,
        };
        let msg = err.to_string();
        assert!(msg.contains("triangle 3"));
        assert!(msg.contains("vertex 9"));

        let err = CorkError::DegenerateIntersection { attempts: 6 };
        assert!(err.to_string().contains("6 attempts"));
    }

    #[test]
    fn test_input_error_classification() {
        assert!(CorkError::EmptyMeshInput.is_input_error());
        assert!(CorkError::NonClosedInput.is_input_error());
        assert!(!CorkError::DegenerateIntersection { attempts: 1 }.is_input_error());
        assert!(!CorkError::MeshNotFound { id: 4 }.is_input_error());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.stl");
        let err: CorkError = io.into();
        assert!(matches!(err, CorkError::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CorkError>();
    }
}
