//! Binary FBX record reader.

use anyhow::{bail, ensure, Context, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use log::debug;
use std::io::{Cursor, Read};

use super::{Node, Property, MAX_DEPTH};

pub(super) const MAGIC: &[u8] = b"Kaydara FBX Binary  \0";
const HEADER_LEN: u64 = 27;
/// From this version on, record offsets are 64-bit
const WIDE_OFFSETS_VERSION: u32 = 7500;

struct Reader<'a> {
    cursor: Cursor<&'a [u8]>,
    version: u32,
}

impl<'a> Reader<'a> {
    fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.cursor.position())
    }

    fn read_offset(&mut self) -> Result<u64> {
        Ok(if self.version >= WIDE_OFFSETS_VERSION {
            self.cursor.read_u64::<LittleEndian>()?
        } else {
            self.cursor.read_u32::<LittleEndian>()? as u64
        })
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let remaining = self.remaining();
        ensure!(
            len as u64 <= remaining,
            "FBX record wants {} bytes but only {} remain",
            len,
            remaining
        );
        let mut buf = vec![0u8; len];
        self.cursor.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads one node record; `None` for the null record closing a list.
    /// `limit` is where the enclosing record ends.
    fn read_node(&mut self, limit: u64, depth: usize) -> Result<Option<Node>> {
        ensure!(depth < MAX_DEPTH, "FBX nodes nest deeper than {}", MAX_DEPTH);

        let start = self.cursor.position();
        let end_offset = self.read_offset()?;
        let num_properties = self.read_offset()?;
        let _property_list_len = self.read_offset()?;
        let name_len = self.cursor.read_u8()? as usize;

        if end_offset == 0 {
            return Ok(None);
        }
        ensure!(
            end_offset > start && end_offset <= limit,
            "FBX node at {} claims to end at {}, outside {}..{}",
            start,
            end_offset,
            start,
            limit
        );

        let name = String::from_utf8_lossy(&self.read_bytes(name_len)?).into_owned();
        let properties = (0..num_properties)
            .map(|_| self.read_property())
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("in FBX node {:?}", name))?;
        ensure!(
            self.cursor.position() <= end_offset,
            "FBX node {:?} properties overrun its record",
            name
        );

        let mut children = Vec::new();
        while self.cursor.position() < end_offset {
            match self.read_node(end_offset, depth + 1)? {
                Some(child) => children.push(child),
                None => break,
            }
        }
        ensure!(
            self.cursor.position() <= end_offset,
            "FBX node {:?} children overrun its record",
            name
        );
        self.cursor.set_position(end_offset);

        Ok(Some(Node {
            name,
            properties,
            children,
        }))
    }

    fn read_property(&mut self) -> Result<Property> {
        let code = self.cursor.read_u8()?;
        let c = &mut self.cursor;
        Ok(match code {
            b'C' => Property::Bool(c.read_u8()? != 0),
            b'Y' => Property::I16(c.read_i16::<LittleEndian>()?),
            b'I' => Property::I32(c.read_i32::<LittleEndian>()?),
            b'L' => Property::I64(c.read_i64::<LittleEndian>()?),
            b'F' => Property::F32(c.read_f32::<LittleEndian>()?),
            b'D' => Property::F64(c.read_f64::<LittleEndian>()?),
            b'S' => {
                let len = c.read_u32::<LittleEndian>()? as usize;
                Property::String(String::from_utf8_lossy(&self.read_bytes(len)?).into_owned())
            }
            b'R' => {
                let len = c.read_u32::<LittleEndian>()? as usize;
                Property::Raw(self.read_bytes(len)?)
            }
            b'b' => Property::BoolArray(self.read_array(1)?.into_iter().map(|b| b != 0).collect()),
            b'i' => {
                let raw = self.read_array(4)?;
                let mut out = vec![0i32; raw.len() / 4];
                LittleEndian::read_i32_into(&raw, &mut out);
                Property::I32Array(out)
            }
            b'l' => {
                let raw = self.read_array(8)?;
                let mut out = vec![0i64; raw.len() / 8];
                LittleEndian::read_i64_into(&raw, &mut out);
                Property::I64Array(out)
            }
            b'f' => {
                let raw = self.read_array(4)?;
                let mut out = vec![0f32; raw.len() / 4];
                LittleEndian::read_f32_into(&raw, &mut out);
                Property::F32Array(out)
            }
            b'd' => {
                let raw = self.read_array(8)?;
                let mut out = vec![0f64; raw.len() / 8];
                LittleEndian::read_f64_into(&raw, &mut out);
                Property::F64Array(out)
            }
            other => bail!("Unknown FBX property type {:?}", other as char),
        })
    }

    /// Raw little-endian bytes of an array property, inflated when zlib encoded.
    /// Nothing is allocated from the declared length alone.
    fn read_array(&mut self, element_size: usize) -> Result<Vec<u8>> {
        let len = self.cursor.read_u32::<LittleEndian>()? as usize;
        let encoding = self.cursor.read_u32::<LittleEndian>()?;
        let stored_len = self.cursor.read_u32::<LittleEndian>()? as usize;
        let expected = len
            .checked_mul(element_size)
            .context("FBX array length overflows")?;

        let data = match encoding {
            0 => self.read_bytes(expected)?,
            1 => {
                let compressed = self.read_bytes(stored_len)?;
                let mut inflated = Vec::new();
                ZlibDecoder::new(compressed.as_slice())
                    .take(expected as u64 + 1)
                    .read_to_end(&mut inflated)
                    .context("Corrupt zlib array in FBX")?;
                inflated
            }
            other => bail!("Unknown FBX array encoding {}", other),
        };

        ensure!(
            data.len() == expected,
            "FBX array holds {} bytes, expected {}",
            data.len(),
            expected
        );
        Ok(data)
    }
}

pub(super) fn read_document(bytes: &[u8]) -> Result<Vec<Node>> {
    ensure!(bytes.starts_with(MAGIC), "Missing binary FBX magic");
    ensure!(bytes.len() as u64 > HEADER_LEN, "FBX header is truncated");

    let version = LittleEndian::read_u32(&bytes[23..27]);
    debug!("Binary FBX version {}", version);

    let mut reader = Reader {
        cursor: Cursor::new(bytes),
        version,
    };
    reader.cursor.set_position(HEADER_LEN);

    let end = reader.len();
    let mut nodes = Vec::new();
    while reader.cursor.position() < end {
        match reader.read_node(end, 0)? {
            Some(node) => nodes.push(node),
            None => break,
        }
    }
    Ok(nodes)
}
