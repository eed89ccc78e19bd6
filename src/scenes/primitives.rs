use glam::Vec3;
use std::f32::consts::TAU;

use crate::scene::{Geometry, Shape};

/// Box centered on the origin, four vertices per face so each face keeps a flat normal
pub fn box_geometry(width: f32, height: f32, depth: f32) -> Geometry {
    let half = Vec3::new(width, height, depth) * 0.5;
    // (normal, u, v) with u x v == normal, so corners wind counter-clockwise seen from outside
    let faces = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];

    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, u, v) in faces {
        let base = positions.len() as u32;
        let (n, u, v) = (normal * half, u * half, v * half);
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            positions.push(n + u * su + v * sv);
            normals.push(normal);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    Geometry {
        shape: Shape::Box,
        ..Geometry::triangles(positions, Some(indices)).with_normals(normals)
    }
}

/// Capped cylinder along the Y axis, centered on the origin.
/// The seam column is duplicated so the side has its own smooth normals.
pub fn cylinder_geometry(
    radius_top: f32,
    radius_bottom: f32,
    height: f32,
    segments: u32,
) -> Geometry {
    let segments = segments.max(3);
    let half = height * 0.5;
    let slope = if height > 0.0 {
        (radius_bottom - radius_top) / height
    } else {
        0.0
    };

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut indices = Vec::new();

    // Side: top and bottom ring per column
    for i in 0..=segments {
        let theta = i as f32 / segments as f32 * TAU;
        let (sin, cos) = theta.sin_cos();
        let normal = Vec3::new(sin, slope, cos).normalize();
        positions.push(Vec3::new(radius_top * sin, half, radius_top * cos));
        positions.push(Vec3::new(radius_bottom * sin, -half, radius_bottom * cos));
        normals.push(normal);
        normals.push(normal);
    }
    for i in 0..segments {
        let top = 2 * i;
        let bottom = top + 1;
        let (next_top, next_bottom) = (top + 2, top + 3);
        indices.extend_from_slice(&[top, bottom, next_top, bottom, next_bottom, next_top]);
    }

    for (radius, y, normal) in [(radius_top, half, Vec3::Y), (radius_bottom, -half, Vec3::NEG_Y)] {
        if radius <= 0.0 {
            continue;
        }
        let center = positions.len() as u32;
        positions.push(Vec3::new(0.0, y, 0.0));
        normals.push(normal);
        for i in 0..=segments {
            let theta = i as f32 / segments as f32 * TAU;
            let (sin, cos) = theta.sin_cos();
            positions.push(Vec3::new(radius * sin, y, radius * cos));
            normals.push(normal);
        }
        for i in 0..segments {
            let (a, b) = (center + 1 + i, center + 2 + i);
            if normal.y > 0.0 {
                indices.extend_from_slice(&[center, a, b]);
            } else {
                indices.extend_from_slice(&[center, b, a]);
            }
        }
    }

    Geometry {
        shape: Shape::Cylinder,
        ..Geometry::triangles(positions, Some(indices)).with_normals(normals)
    }
}
