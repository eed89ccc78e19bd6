//! Stanford PLY adapter: ASCII, binary little endian and binary big endian bodies.

use anyhow::{anyhow, bail, ensure, Context, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use glam::Vec3;
use log::debug;
use std::io::Cursor;
use std::marker::PhantomData;

use super::{resolved, triangulate_fan, FormatAdapter, ParseFuture};
use crate::config::{DEFAULT_COLOR, DEFAULT_SHININESS};
use crate::dispatch::ModelFormat;
use crate::material::{Material, MaterialLibrary};
use crate::scene::{Geometry, MaterialSlot, Model, SceneNode};

pub struct PlyAdapter;

impl FormatAdapter for PlyAdapter {
    fn name(&self) -> &'static str {
        "PLY"
    }

    fn parse<'a>(&'a self, bytes: &'a [u8]) -> ParseFuture<'a> {
        let result = parse_ply(bytes).map(|geometry| {
            let mut materials = MaterialLibrary::new();
            let material = materials.add(Material::phong_hex(DEFAULT_COLOR, DEFAULT_SHININESS));
            let mesh = SceneNode::mesh("", geometry, MaterialSlot::Single(material));
            Model::with_materials(mesh, materials)
        });
        resolved(ModelFormat::Ply, result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl ScalarType {
    fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "char" | "int8" => ScalarType::I8,
            "uchar" | "uint8" => ScalarType::U8,
            "short" | "int16" => ScalarType::I16,
            "ushort" | "uint16" => ScalarType::U16,
            "int" | "int32" => ScalarType::I32,
            "uint" | "uint32" => ScalarType::U32,
            "float" | "float32" => ScalarType::F32,
            "double" | "float64" => ScalarType::F64,
            other => bail!("Unknown PLY property type {:?}", other),
        })
    }
}

#[derive(Debug, Clone)]
enum Property {
    Scalar { name: String, ty: ScalarType },
    List { name: String, count: ScalarType, item: ScalarType },
}

impl Property {
    fn name(&self) -> &str {
        match self {
            Property::Scalar { name, .. } | Property::List { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

#[derive(Debug)]
struct Header {
    encoding: Encoding,
    elements: Vec<Element>,
}

/// Pulls successive property values out of the body, whatever its encoding
trait ValueSource {
    fn next_value(&mut self, ty: ScalarType) -> Result<f64>;
}

struct AsciiValues<'a> {
    tokens: std::str::SplitWhitespace<'a>,
}

impl ValueSource for AsciiValues<'_> {
    fn next_value(&mut self, _ty: ScalarType) -> Result<f64> {
        let token = self.tokens.next().context("PLY body ended early")?;
        token
            .parse::<f64>()
            .with_context(|| format!("invalid PLY value {:?}", token))
    }
}

struct BinaryValues<'a, B: ByteOrder> {
    cursor: Cursor<&'a [u8]>,
    order: PhantomData<B>,
}

impl<B: ByteOrder> ValueSource for BinaryValues<'_, B> {
    fn next_value(&mut self, ty: ScalarType) -> Result<f64> {
        let c = &mut self.cursor;
        let value = match ty {
            ScalarType::I8 => c.read_i8()? as f64,
            ScalarType::U8 => c.read_u8()? as f64,
            ScalarType::I16 => c.read_i16::<B>()? as f64,
            ScalarType::U16 => c.read_u16::<B>()? as f64,
            ScalarType::I32 => c.read_i32::<B>()? as f64,
            ScalarType::U32 => c.read_u32::<B>()? as f64,
            ScalarType::F32 => c.read_f32::<B>()? as f64,
            ScalarType::F64 => c.read_f64::<B>()?,
        };
        Ok(value)
    }
}

/// Parses PLY vertices (with optional normals) and faces, triangulating polygons as fans
pub fn parse_ply(bytes: &[u8]) -> Result<Geometry> {
    let (header, body) = split_header(bytes)?;
    let header = parse_header(&header)?;
    debug!("PLY {:?} with elements {:?}", header.encoding, header.elements);

    match header.encoding {
        Encoding::Ascii => {
            let text = String::from_utf8_lossy(body);
            let mut values = AsciiValues {
                tokens: text.split_whitespace(),
            };
            read_body(&header, &mut values)
        }
        Encoding::BinaryLittleEndian => read_body(
            &header,
            &mut BinaryValues::<LittleEndian> {
                cursor: Cursor::new(body),
                order: PhantomData,
            },
        ),
        Encoding::BinaryBigEndian => read_body(
            &header,
            &mut BinaryValues::<BigEndian> {
                cursor: Cursor::new(body),
                order: PhantomData,
            },
        ),
    }
}

fn split_header(bytes: &[u8]) -> Result<(String, &[u8])> {
    if !bytes.starts_with(b"ply") {
        bail!("Missing PLY magic");
    }
    const END: &[u8] = b"end_header";
    let end = bytes
        .windows(END.len())
        .position(|w| w == END)
        .context("PLY header has no end_header")?;
    let mut body_start = end + END.len();
    if bytes.get(body_start) == Some(&b'\r') {
        body_start += 1;
    }
    if bytes.get(body_start) == Some(&b'\n') {
        body_start += 1;
    }
    let header = String::from_utf8_lossy(&bytes[..end]).into_owned();
    Ok((header, &bytes[body_start..]))
}

fn parse_header(text: &str) -> Result<Header> {
    let mut encoding = None;
    let mut elements: Vec<Element> = Vec::new();

    for line in text.lines().skip(1) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["format", kind, _version] => {
                encoding = Some(match *kind {
                    "ascii" => Encoding::Ascii,
                    "binary_little_endian" => Encoding::BinaryLittleEndian,
                    "binary_big_endian" => Encoding::BinaryBigEndian,
                    other => bail!("Unknown PLY format {:?}", other),
                });
            }
            ["element", name, count] => elements.push(Element {
                name: name.to_string(),
                count: count
                    .parse()
                    .with_context(|| format!("Bad element count {:?}", count))?,
                properties: Vec::new(),
            }),
            ["property", "list", count, item, name] => {
                let element = elements.last_mut().context("PLY property before any element")?;
                element.properties.push(Property::List {
                    name: name.to_string(),
                    count: ScalarType::parse(count)?,
                    item: ScalarType::parse(item)?,
                });
            }
            ["property", ty, name] => {
                let element = elements.last_mut().context("PLY property before any element")?;
                element.properties.push(Property::Scalar {
                    name: name.to_string(),
                    ty: ScalarType::parse(ty)?,
                });
            }
            _ => {}
        }
    }

    Ok(Header {
        encoding: encoding.context("PLY header has no format line")?,
        elements,
    })
}

fn read_body(header: &Header, values: &mut impl ValueSource) -> Result<Geometry> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut has_normals = false;
    let mut indices = Vec::new();
    let mut has_faces = false;

    for element in &header.elements {
        if element.properties.is_empty() {
            continue;
        }
        let slot = |name: &str| element.properties.iter().position(|p| p.name() == name);

        match element.name.as_str() {
            "vertex" => {
                let [Some(x), Some(y), Some(z)] = [slot("x"), slot("y"), slot("z")] else {
                    bail!("PLY vertex element lacks x/y/z");
                };
                let normal_slots = [slot("nx"), slot("ny"), slot("nz")];
                has_normals = normal_slots.iter().all(Option::is_some);
                for index in [Some(x), Some(y), Some(z)].iter().chain(&normal_slots).flatten() {
                    let property = &element.properties[*index];
                    if let Property::List { name, .. } = property {
                        bail!("PLY vertex property {:?} must be a scalar, not a list", name);
                    }
                }

                // Counts come from the header, so rows are read before anything grows
                for _ in 0..element.count {
                    let row = read_row(element, values)?;
                    positions.push(Vec3::new(scalar(&row, x), scalar(&row, y), scalar(&row, z)));
                    if let [Some(nx), Some(ny), Some(nz)] = normal_slots {
                        normals.push(Vec3::new(scalar(&row, nx), scalar(&row, ny), scalar(&row, nz)));
                    }
                }
            }
            "face" => {
                let list = slot("vertex_indices")
                    .or_else(|| slot("vertex_index"))
                    .ok_or_else(|| anyhow!("PLY face element lacks vertex_indices"))?;
                has_faces = element.count > 0;
                for _ in 0..element.count {
                    let row = read_row(element, values)?;
                    let polygon = row[list]
                        .iter()
                        .map(|&i| -> Result<u32> {
                            ensure!(i >= 0.0 && i.fract() == 0.0, "PLY face holds invalid index {}", i);
                            Ok(i as u32)
                        })
                        .collect::<Result<Vec<u32>>>()?;
                    triangulate_fan(&polygon, &mut indices);
                }
            }
            _ => {
                for _ in 0..element.count {
                    read_row(element, values)?;
                }
            }
        }
    }

    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
        bail!("PLY face references missing vertex {}", bad);
    }

    let geometry = Geometry::triangles(positions, has_faces.then_some(indices));
    Ok(if has_normals {
        geometry.with_normals(normals)
    } else {
        geometry
    })
}

/// Value of a scalar property in a row read by [`read_row`]
fn scalar(row: &[Vec<f64>], index: usize) -> f32 {
    row[index].first().copied().unwrap_or_default() as f32
}

/// One row of an element; scalars come back as single-value lists
fn read_row(element: &Element, values: &mut impl ValueSource) -> Result<Vec<Vec<f64>>> {
    element
        .properties
        .iter()
        .map(|property| match property {
            Property::Scalar { ty, .. } => Ok(vec![values.next_value(*ty)?]),
            Property::List { count, item, .. } => {
                let n = values.next_value(*count)?;
                ensure!(n >= 0.0 && n.fract() == 0.0, "invalid PLY list length {}", n);
                let n = n as usize;
                (0..n).map(|_| values.next_value(*item)).collect()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASCII_QUAD: &str = "ply\nformat ascii 1.0\ncomment test\nelement vertex 4\nproperty float x\nproperty float y\nproperty float z\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n0 0 0\n1 0 0\n1 1 0\n0 1 0\n4 0 1 2 3\n";

    #[test]
    fn test_ascii_quad() {
        let geometry = parse_ply(ASCII_QUAD.as_bytes()).unwrap();
        assert_eq!(geometry.positions.len(), 4);
        assert_eq!(geometry.indices, Some(vec![0, 1, 2, 0, 2, 3]));
        assert!(geometry.normals.is_none());
    }

    #[test]
    fn test_binary_little_endian_with_normals() {
        let mut bytes = b"ply\nformat binary_little_endian 1.0\nelement vertex 3\nproperty float x\nproperty float y\nproperty float z\nproperty float nx\nproperty float ny\nproperty float nz\nelement face 1\nproperty list uchar uint vertex_indices\nend_header\n".to_vec();
        for v in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in v.iter().chain([0.0f32, 0.0, 1.0].iter()) {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
        }
        bytes.push(3);
        for i in 0u32..3 {
            bytes.extend_from_slice(&i.to_le_bytes());
        }

        let geometry = parse_ply(&bytes).unwrap();
        assert_eq!(geometry.positions[1], Vec3::X);
        assert_eq!(geometry.normals.unwrap()[2], Vec3::Z);
        assert_eq!(geometry.indices, Some(vec![0, 1, 2]));
    }

    #[test]
    fn test_point_cloud_is_unindexed() {
        let text = "ply\nformat ascii 1.0\nelement vertex 2\nproperty float x\nproperty float y\nproperty float z\nend_header\n0 0 0\n1 1 1\n";
        let geometry = parse_ply(text.as_bytes()).unwrap();
        assert_eq!(geometry.positions.len(), 2);
        assert!(geometry.indices.is_none());
    }

    #[test]
    fn test_truncated_body_fails() {
        let truncated = &ASCII_QUAD[..ASCII_QUAD.len() - 10];
        assert!(parse_ply(truncated.as_bytes()).is_err());
    }

    #[test]
    fn test_huge_vertex_count_fails_cleanly() {
        let text = "ply\nformat ascii 1.0\nelement vertex 2000000000000000000\nproperty float x\nproperty float y\nproperty float z\nend_header\n0 0 0\n";
        let err = parse_ply(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("ended early"));
    }

    #[test]
    fn test_huge_propertyless_element_is_skipped() {
        let text = "ply\nformat ascii 1.0\nelement junk 2000000000000000000\nelement vertex 1\nproperty float x\nproperty float y\nproperty float z\nend_header\n1 2 3\n";
        let geometry = parse_ply(text.as_bytes()).unwrap();
        assert_eq!(geometry.positions, vec![Vec3::new(1.0, 2.0, 3.0)]);
    }

    #[test]
    fn test_list_coordinate_is_rejected() {
        let text = "ply\nformat ascii 1.0\nelement vertex 1\nproperty list uchar float x\nproperty float y\nproperty float z\nend_header\n0 1 2\n";
        let err = parse_ply(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("\"x\""));
    }

    #[test]
    fn test_negative_face_index_fails() {
        let text = ASCII_QUAD.replace("4 0 1 2 3", "3 0 -1 2");
        assert!(parse_ply(text.as_bytes()).is_err());
    }

    #[test]
    fn test_missing_magic_fails() {
        assert!(parse_ply(b"solid nope").is_err());
    }
}
