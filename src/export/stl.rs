use std::fmt::{self, Write};

use super::world_meshes;
use crate::scene::Model;

/// ASCII STL of every triangle in world space, normals recomputed per face
pub fn export_stl(model: &Model) -> Result<String, fmt::Error> {
    let mut out = String::from("solid exported\n");

    for mesh in world_meshes(&model.root) {
        for [a, b, c] in mesh.triangles {
            let (pa, pb, pc) = (mesh.positions[a], mesh.positions[b], mesh.positions[c]);
            let normal = (pc - pb).cross(pa - pb).normalize_or_zero();

            writeln!(out, "\tfacet normal {} {} {}", normal.x, normal.y, normal.z)?;
            out.push_str("\t\touter loop\n");
            for p in [pa, pb, pc] {
                writeln!(out, "\t\t\tvertex {} {} {}", p.x, p.y, p.z)?;
            }
            out.push_str("\t\tendloop\n");
            out.push_str("\tendfacet\n");
        }
    }

    out.push_str("endsolid exported\n");
    Ok(out)
}
