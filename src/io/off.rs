// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Object File Format (OFF) import and export
//!
//! Polygonal faces are fanned into triangles on read. Comments start with
//! `#` and run to the end of the line.

use super::flat::FlatMesh;
use crate::config::{MAX_FILE_TRIANGLES, MAX_FILE_VERTICES};
use crate::error::CorkError;
use anyhow::{Context, Result};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Shortest possible vertex line, `0 0 0\n`
const MIN_VERTEX_BYTES: usize = 6;
/// Shortest possible face line, `3 0 1 2\n`
const MIN_FACE_BYTES: usize = 8;
/// Shortest possible face index, `0 `
const MIN_INDEX_BYTES: usize = 2;

pub fn load_off(path: &Path) -> Result<FlatMesh> {
    let source =
        fs::read_to_string(path).with_context(|| format!("Failed to read OFF file: {:?}", path))?;
    parse_off(&source).with_context(|| format!("Failed to parse OFF file: {:?}", path))
}

/// Parse OFF text
pub fn parse_off(source: &str) -> Result<FlatMesh, CorkError> {
    let mut tokens = source
        .lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .flat_map(str::split_whitespace);

    match tokens.next() {
        Some("OFF") => {}
        Some(other) => return Err(format_error(format!("expected OFF header, found {:?}", other))),
        None => return Err(format_error("empty file")),
    }

    let vertex_count: usize = next_number(&mut tokens, "vertex count")?;
    let face_count: usize = next_number(&mut tokens, "face count")?;
    let _edge_count: usize = next_number(&mut tokens, "edge count")?;
    if vertex_count > MAX_FILE_VERTICES {
        return Err(format_error(format!(
            "{} vertices exceeds the limit of {}",
            vertex_count, MAX_FILE_VERTICES
        )));
    }
    if face_count > MAX_FILE_TRIANGLES {
        return Err(format_error(format!(
            "{} faces exceeds the limit of {}",
            face_count, MAX_FILE_TRIANGLES
        )));
    }

    // Header counts are untrusted; never reserve more than the text can hold
    let mut vertices = Vec::with_capacity(vertex_count.min(source.len() / MIN_VERTEX_BYTES));
    for _ in 0..vertex_count {
        let x = next_number(&mut tokens, "vertex coordinate")?;
        let y = next_number(&mut tokens, "vertex coordinate")?;
        let z = next_number(&mut tokens, "vertex coordinate")?;
        vertices.push([x, y, z]);
    }

    let mut triangles = Vec::with_capacity(face_count.min(source.len() / MIN_FACE_BYTES));
    for face in 0..face_count {
        let n: usize = next_number(&mut tokens, "face size")?;
        if n < 3 {
            return Err(format_error(format!("face {} has only {} corners", face, n)));
        }
        let mut corners = Vec::with_capacity(n.min(source.len() / MIN_INDEX_BYTES));
        for _ in 0..n {
            corners.push(next_number::<usize>(&mut tokens, "face index")?);
        }
        for i in 1..n - 1 {
            triangles.push([corners[0], corners[i], corners[i + 1]]);
        }
    }
    if triangles.len() > MAX_FILE_TRIANGLES {
        return Err(format_error(format!(
            "{} triangles exceeds the limit of {}",
            triangles.len(),
            MAX_FILE_TRIANGLES
        )));
    }

    Ok(FlatMesh::new(vertices, triangles))
}

fn next_number<'a, N: std::str::FromStr>(
    tokens: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<N, CorkError> {
    let token = tokens
        .next()
        .ok_or_else(|| format_error(format!("unexpected end of file reading {}", what)))?;
    token
        .parse()
        .map_err(|_| format_error(format!("invalid {}: {:?}", what, token)))
}

fn format_error(message: impl Into<String>) -> CorkError {
    CorkError::Format(message.into())
}

pub fn save_off(path: &Path, mesh: &FlatMesh) -> Result<()> {
    mesh.validate()?;

    let file = fs::File::create(path).with_context(|| format!("Failed to create OFF file: {:?}", path))?;
    let mut w = BufWriter::new(file);
    writeln!(w, "OFF")?;
    writeln!(w, "{} {} 0", mesh.vertex_count(), mesh.triangle_count())?;
    for [x, y, z] in &mesh.vertices {
        writeln!(w, "{} {} {}", x, y, z)?;
    }
    for [a, b, c] in &mesh.triangles {
        writeln!(w, "3 {} {} {}", a, b, c)?;
    }
    w.flush()
        .with_context(|| format!("Failed to write OFF file: {:?}", path))?;
    Ok(())
}
