use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use glam::Vec3;
use log::debug;
use std::io::{Cursor, Seek, SeekFrom};

use super::{decode_text, resolved, FormatAdapter, ParseFuture};
use crate::config::{DEFAULT_COLOR, DEFAULT_SHININESS};
use crate::dispatch::ModelFormat;
use crate::material::{Material, MaterialLibrary};
use crate::scene::{Geometry, MaterialSlot, Model, SceneNode};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// STL adapter; the bare geometry is wrapped in a mesh with the default blue material
pub struct StlAdapter;

impl FormatAdapter for StlAdapter {
    fn name(&self) -> &'static str {
        "STL"
    }

    fn parse<'a>(&'a self, bytes: &'a [u8]) -> ParseFuture<'a> {
        let result = parse_stl(bytes).map(|geometry| {
            let mut materials = MaterialLibrary::new();
            let material = materials.add(Material::phong_hex(DEFAULT_COLOR, DEFAULT_SHININESS));
            let mesh = SceneNode::mesh("", geometry, MaterialSlot::Single(material));
            Model::with_materials(mesh, materials)
        });
        resolved(ModelFormat::Stl, result)
    }
}

/// Parses binary or ASCII STL into unindexed triangles with per-face normals
pub fn parse_stl(bytes: &[u8]) -> Result<Geometry> {
    if is_binary(bytes) {
        parse_binary(bytes)
    } else {
        parse_ascii(&decode_text(bytes))
    }
}

/// Binary when the facet count in the header matches the file length exactly;
/// otherwise ASCII only if the file opens with `solid`.
fn is_binary(bytes: &[u8]) -> bool {
    if bytes.len() >= HEADER_LEN + 4 {
        let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
        if HEADER_LEN + 4 + count * FACET_LEN == bytes.len() {
            return true;
        }
    }
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    !bytes[start..].starts_with(b"solid")
}

fn parse_binary(bytes: &[u8]) -> Result<Geometry> {
    if bytes.len() < HEADER_LEN + 4 {
        bail!("Binary STL is truncated: {} bytes", bytes.len());
    }

    let mut cursor = Cursor::new(bytes);
    cursor.seek(SeekFrom::Start(HEADER_LEN as u64))?;
    let count = cursor.read_u32::<LittleEndian>()? as usize;

    let expected = HEADER_LEN + 4 + count * FACET_LEN;
    if bytes.len() < expected {
        bail!(
            "Binary STL declares {} facets ({} bytes) but has {} bytes",
            count,
            expected,
            bytes.len()
        );
    }

    let mut positions = Vec::with_capacity(count * 3);
    let mut normals = Vec::with_capacity(count * 3);
    for _ in 0..count {
        let normal = read_vec3(&mut cursor)?;
        for _ in 0..3 {
            positions.push(read_vec3(&mut cursor)?);
            normals.push(normal);
        }
        let _attribute = cursor.read_u16::<LittleEndian>()?;
    }

    debug!("Binary STL: {} facets", count);
    Ok(Geometry::triangles(positions, None).with_normals(normals))
}

fn read_vec3(cursor: &mut Cursor<&[u8]>) -> std::io::Result<Vec3> {
    Ok(Vec3::new(
        cursor.read_f32::<LittleEndian>()?,
        cursor.read_f32::<LittleEndian>()?,
        cursor.read_f32::<LittleEndian>()?,
    ))
}

fn parse_ascii(text: &str) -> Result<Geometry> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut normal = Vec3::ZERO;

    for (line_no, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("facet") => {
                if tokens.next() == Some("normal") {
                    normal = parse_vec3(&mut tokens)
                        .with_context(|| format!("Bad facet normal on line {}", line_no + 1))?;
                }
            }
            Some("vertex") => {
                let vertex = parse_vec3(&mut tokens)
                    .with_context(|| format!("Bad vertex on line {}", line_no + 1))?;
                positions.push(vertex);
                normals.push(normal);
            }
            _ => {}
        }
    }

    if positions.len() % 3 != 0 {
        bail!("ASCII STL has {} vertices, not a multiple of 3", positions.len());
    }

    debug!("ASCII STL: {} facets", positions.len() / 3);
    Ok(Geometry::triangles(positions, None).with_normals(normals))
}

fn parse_vec3<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut next = || -> Result<f32> {
        let token = tokens.next().context("missing coordinate")?;
        token
            .parse::<f32>()
            .with_context(|| format!("invalid number {:?}", token))
    };
    Ok(Vec3::new(next()?, next()?, next()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_triangle() -> Vec<u8> {
        let mut bytes = vec![0u8; 80];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        for v in [[0.0f32, 0.0, 1.0], [0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]] {
            for c in v {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes
    }

    #[test]
    fn test_binary_triangle() {
        let geometry = parse_stl(&binary_triangle()).unwrap();
        assert_eq!(geometry.positions.len(), 3);
        assert_eq!(geometry.positions[1], Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(geometry.normals.unwrap()[0], Vec3::Z);
    }

    #[test]
    fn test_binary_header_starting_with_solid_is_still_binary() {
        let mut bytes = binary_triangle();
        bytes[..5].copy_from_slice(b"solid");
        let geometry = parse_stl(&bytes).unwrap();
        assert_eq!(geometry.positions.len(), 3);
    }

    #[test]
    fn test_ascii_triangle() {
        let text = "solid test\n facet normal 0 0 1\n  outer loop\n   vertex 0 0 0\n   vertex 1 0 0\n   vertex 0 1 0\n  endloop\n endfacet\nendsolid test\n";
        let geometry = parse_stl(text.as_bytes()).unwrap();
        assert_eq!(geometry.positions.len(), 3);
        assert_eq!(geometry.normals.unwrap()[2], Vec3::Z);
    }

    #[test]
    fn test_truncated_binary_fails() {
        assert!(parse_stl(b"garbage").is_err());

        let mut bytes = binary_triangle();
        bytes.truncate(100);
        assert!(parse_stl(&bytes).is_err());
    }

    #[test]
    fn test_ascii_bad_number_fails() {
        let text = "solid x\nfacet normal 0 0 1\nvertex 0 zero 0\n";
        assert!(parse_stl(text.as_bytes()).is_err());
    }
}
