//! Format parser adapters.
//!
//! Each adapter turns raw file bytes into a [`Model`]. Parsers that finish
//! synchronously resolve through a ready future, so callers always get the
//! same asynchronous contract regardless of how the underlying parser works.

pub mod dae;
pub mod fbx;
pub mod gltf;
pub mod obj;
pub mod ply;
pub mod stl;

use futures::future::{self, BoxFuture};
use std::borrow::Cow;

use crate::dispatch::ModelFormat;
use crate::error::LoadError;
use crate::scene::Model;

pub use self::dae::{parse_dae, DaeAdapter};
pub use self::fbx::{parse_fbx, FbxAdapter};
pub use self::gltf::{parse_gltf, GltfAdapter};
pub use self::obj::{parse_obj, ObjAdapter};
pub use self::ply::{parse_ply, PlyAdapter};
pub use self::stl::{parse_stl, StlAdapter};

pub type ParseFuture<'a> = BoxFuture<'a, Result<Model, LoadError>>;

/// Uniform "bytes in, one model out" contract over every parser
pub trait FormatAdapter: Send + Sync {
    /// Human-readable parser name for logs
    fn name(&self) -> &'static str;

    /// Parses one file. Resolves exactly once; never retries.
    fn parse<'a>(&'a self, bytes: &'a [u8]) -> ParseFuture<'a>;
}

/// Wraps the result of a synchronous parser in an already-completed future
pub(crate) fn resolved(format: ModelFormat, result: anyhow::Result<Model>) -> ParseFuture<'static> {
    Box::pin(future::ready(
        result.map_err(|reason| LoadError::parse(format, reason)),
    ))
}

/// UTF-8 decode with replacement characters, for parsers that want text
pub(crate) fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Splits a convex polygon into triangles sharing its first corner
pub(crate) fn triangulate_fan(polygon: &[u32], out: &mut Vec<u32>) {
    if polygon.len() < 3 {
        return;
    }
    for i in 1..polygon.len() - 1 {
        out.extend_from_slice(&[polygon[0], polygon[i], polygon[i + 1]]);
    }
}

/// No parser ships for 3MF; the extension is recognised and rejected here.
pub struct ThreeMfAdapter;

impl FormatAdapter for ThreeMfAdapter {
    fn name(&self) -> &'static str {
        "3MF"
    }

    fn parse<'a>(&'a self, _bytes: &'a [u8]) -> ParseFuture<'a> {
        resolved(
            ModelFormat::ThreeMf,
            Err(anyhow::anyhow!("Parser not implemented for: 3mf")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangulate_fan_quad() {
        let mut out = Vec::new();
        triangulate_fan(&[0, 1, 2, 3], &mut out);
        assert_eq!(out, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_triangulate_fan_ignores_degenerate_polygons() {
        let mut out = Vec::new();
        triangulate_fan(&[0, 1], &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_three_mf_is_rejected() {
        let result = pollster::block_on(ThreeMfAdapter.parse(b"PK\x03\x04"));
        assert!(matches!(
            result,
            Err(LoadError::Parse {
                format: ModelFormat::ThreeMf,
                ..
            })
        ));
    }
}
