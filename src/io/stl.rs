// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL import and export
//!
//! Reading goes through `stl_io`, which accepts binary and ASCII files and
//! welds bit-identical corners into shared vertices. Binary output is written
//! by `stl_io` in single precision. ASCII output keeps full precision.

use super::flat::FlatMesh;
use crate::config::MAX_FILE_TRIANGLES;
use anyhow::{bail, Context, Result};
use log::{debug, warn};
use nalgebra::Point3;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use stl_io::{Normal, Triangle as StlTriangle, Vertex as StlVertex};

const BINARY_HEADER_LEN: u64 = 84;
const BINARY_RECORD_LEN: u64 = 50;

/// Load an STL file into a welded flat mesh
pub fn load_stl(path: &Path) -> Result<FlatMesh> {
    let file = File::open(path).with_context(|| format!("Failed to open STL file: {:?}", path))?;
    let file_len = file.metadata().map(|m| m.len()).unwrap_or(0);
    let mut reader = BufReader::new(file);

    check_binary_triangle_count(&mut reader, file_len)
        .with_context(|| format!("Failed to read STL file: {:?}", path))?;

    let stl = stl_io::read_stl(&mut reader).with_context(|| format!("Failed to read STL file: {:?}", path))?;
    if stl.faces.len() > MAX_FILE_TRIANGLES {
        bail!(
            "STL file {:?} has {} triangles, the limit is {}",
            path,
            stl.faces.len(),
            MAX_FILE_TRIANGLES
        );
    }

    let vertices: Vec<[f64; 3]> = stl
        .vertices
        .iter()
        .map(|v| [v[0] as f64, v[1] as f64, v[2] as f64])
        .collect();

    let mut triangles = Vec::with_capacity(stl.faces.len());
    let mut collapsed = 0usize;
    for face in &stl.faces {
        let [a, b, c] = face.vertices;
        // Welding can merge two corners of a sliver
        if a == b || b == c || c == a {
            collapsed += 1;
            continue;
        }
        triangles.push([a, b, c]);
    }
    if collapsed > 0 {
        warn!("{:?}: dropped {} triangles with welded corners", path, collapsed);
    }

    debug!(
        "loaded {:?}: {} vertices, {} triangles",
        path,
        vertices.len(),
        triangles.len()
    );
    Ok(FlatMesh::new(vertices, triangles))
}

/// Refuse oversized binary files before `stl_io` allocates for them
fn check_binary_triangle_count<R: Read + Seek>(reader: &mut R, file_len: u64) -> Result<()> {
    let mut header = [0u8; BINARY_HEADER_LEN as usize];
    if reader.read_exact(&mut header).is_ok() {
        let count = u32::from_le_bytes([header[80], header[81], header[82], header[83]]) as u64;
        let looks_binary = file_len == BINARY_HEADER_LEN + BINARY_RECORD_LEN * count;
        if looks_binary && count > MAX_FILE_TRIANGLES as u64 {
            bail!(
                "binary STL declares {} triangles, the limit is {}",
                count,
                MAX_FILE_TRIANGLES
            );
        }
    }
    reader.seek(SeekFrom::Start(0))?;
    Ok(())
}

/// Unit face normal from the corner positions, zero for degenerate faces
fn face_normal(mesh: &FlatMesh, triangle: &[usize; 3]) -> [f64; 3] {
    let [a, b, c] = triangle.map(|i| {
        let [x, y, z] = mesh.vertices[i];
        Point3::new(x, y, z)
    });
    let n = (b - a).cross(&(c - a));
    let len = n.norm();
    if len > 0.0 {
        let n = n / len;
        [n.x, n.y, n.z]
    } else {
        [0.0; 3]
    }
}

/// Write a binary STL
pub fn save_stl(path: &Path, mesh: &FlatMesh) -> Result<()> {
    mesh.validate()?;

    let triangles: Vec<StlTriangle> = mesh
        .triangles
        .iter()
        .map(|tri| {
            let n = face_normal(mesh, tri);
            let corner = |i: usize| {
                let [x, y, z] = mesh.vertices[i];
                StlVertex::new([x as f32, y as f32, z as f32])
            };
            StlTriangle {
                normal: Normal::new([n[0] as f32, n[1] as f32, n[2] as f32]),
                vertices: [corner(tri[0]), corner(tri[1]), corner(tri[2])],
            }
        })
        .collect();

    let file = File::create(path).with_context(|| format!("Failed to create STL file: {:?}", path))?;
    let mut writer = BufWriter::new(file);
    stl_io::write_stl(&mut writer, triangles.iter())
        .with_context(|| format!("Failed to write STL file: {:?}", path))?;
    writer.flush()?;
    Ok(())
}

/// Write an ASCII STL with full double precision coordinates
pub fn save_stl_ascii(path: &Path, mesh: &FlatMesh) -> Result<()> {
    mesh.validate()?;

    let file = File::create(path).with_context(|| format!("Failed to create STL file: {:?}", path))?;
    let mut w = BufWriter::new(file);

    writeln!(w, "solid polycork")?;
    for tri in &mesh.triangles {
        let n = face_normal(mesh, tri);
        writeln!(w, "  facet normal {:e} {:e} {:e}", n[0], n[1], n[2])?;
        writeln!(w, "    outer loop")?;
        for &i in tri {
            let [x, y, z] = mesh.vertices[i];
            writeln!(w, "      vertex {:e} {:e} {:e}", x, y, z)?;
        }
        writeln!(w, "    endloop")?;
        writeln!(w, "  endfacet")?;
    }
    writeln!(w, "endsolid polycork")?;
    w.flush()
        .with_context(|| format!("Failed to write STL file: {:?}", path))?;
    Ok(())
}
