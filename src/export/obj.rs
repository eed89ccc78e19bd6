use std::fmt::{self, Write};

use super::world_meshes;
use crate::scene::Model;

/// Wavefront OBJ with one `o` block per mesh; indices are 1-based and run
/// on across blocks
pub fn export_obj(model: &Model) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let mut offset = 1;

    for mesh in world_meshes(&model.root) {
        let name = if mesh.name.is_empty() { "mesh" } else { mesh.name.as_str() };
        writeln!(out, "o {}", name)?;
        for p in &mesh.positions {
            writeln!(out, "v {} {} {}", p.x, p.y, p.z)?;
        }
        if let Some(normals) = &mesh.normals {
            for n in normals {
                writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
            }
        }
        for [a, b, c] in &mesh.triangles {
            let (a, b, c) = (a + offset, b + offset, c + offset);
            if mesh.normals.is_some() {
                writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}")?;
            } else {
                writeln!(out, "f {a} {b} {c}")?;
            }
        }
        offset += mesh.positions.len();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::parse_obj;
    use crate::scenes::create_example_robot;

    #[test]
    fn test_robot_survives_obj_export() {
        let robot = create_example_robot();
        let text = export_obj(&robot).unwrap();
        assert_eq!(text.matches("\no ").count() + usize::from(text.starts_with("o ")), 6);

        let parsed = parse_obj(&text).unwrap();
        assert_eq!(parsed.root.children.len(), 6);
        assert_eq!(parsed.root.mesh_count(), robot.root.mesh_count());
    }

    #[test]
    fn test_face_indices_continue_across_objects() {
        let robot = create_example_robot();
        let text = export_obj(&robot).unwrap();
        // the chassis has 24 vertices, so the first wheel face starts past them
        let second_block = text.split("o wheel\n").nth(1).unwrap();
        let first_face = second_block.lines().find(|l| l.starts_with("f ")).unwrap();
        let first_index: usize = first_face[2..].split("//").next().unwrap().parse().unwrap();
        assert!(first_index > 24);
    }
}
