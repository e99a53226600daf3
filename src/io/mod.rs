// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - flat interchange meshes and mesh files

mod flat;
mod off;
mod stl;

pub use flat::FlatMesh;
pub use off::{load_off, parse_off, save_off};
pub use stl::{load_stl, save_stl, save_stl_ascii};

use anyhow::{bail, Result};
use std::path::Path;

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Load a mesh file, choosing the reader by extension
pub fn load_mesh(path: impl AsRef<Path>) -> Result<FlatMesh> {
    let path = path.as_ref();
    match extension(path).as_str() {
        "stl" => load_stl(path),
        "off" => load_off(path),
        other => bail!("Unsupported mesh format {:?}: {:?}", other, path),
    }
}

/// Save a mesh file, choosing the writer by extension. STL is written binary.
pub fn save_mesh(path: impl AsRef<Path>, mesh: &FlatMesh) -> Result<()> {
    let path = path.as_ref();
    match extension(path).as_str() {
        "stl" => save_stl(path, mesh),
        "off" => save_off(path, mesh),
        other => bail!("Unsupported mesh format {:?}: {:?}", other, path),
    }
}
