use glam::{Quat, Vec3};
use std::f32::consts::FRAC_PI_2;

use super::primitives::{box_geometry, cylinder_geometry};
use crate::material::{Material, MaterialLibrary};
use crate::scene::{MaterialSlot, Model, SceneNode, Transform};

pub const ROBOT_NAME: &str = "Example Robot";

const CHASSIS_COLOR: u32 = 0x2563eb;
const WHEEL_COLOR: u32 = 0x1f2937;
const SLIDE_COLOR: u32 = 0x6b7280;

const WHEEL_POSITIONS: [Vec3; 4] = [
    Vec3::new(-1.0, 0.4, 0.8),
    Vec3::new(1.0, 0.4, 0.8),
    Vec3::new(-1.0, 0.4, -0.8),
    Vec3::new(1.0, 0.4, -0.8),
];

/// Small wheeled robot shown when no example model can be fetched:
/// a chassis, four wheels sharing one material, and a vertical slide
pub fn create_example_robot() -> Model {
    let mut materials = MaterialLibrary::new();
    let chassis_material = materials.add(Material::phong_hex(CHASSIS_COLOR, 50.0));
    let wheel_material = materials.add(Material::phong_hex(WHEEL_COLOR, 30.0));
    let slide_material = materials.add(Material::phong_hex(SLIDE_COLOR, 30.0));

    let mut robot = SceneNode::group(ROBOT_NAME);

    let mut chassis = SceneNode::mesh(
        "chassis",
        box_geometry(2.5, 1.2, 1.8),
        MaterialSlot::Single(chassis_material),
    )
    .with_transform(Transform::from_translation(Vec3::new(0.0, 0.6, 0.0)));
    chassis.cast_shadow = true;
    chassis.receive_shadow = true;
    robot.add_child(chassis);

    let wheel = cylinder_geometry(0.4, 0.4, 0.25, 16);
    for position in WHEEL_POSITIONS {
        let mut node = SceneNode::mesh("wheel", wheel.clone(), MaterialSlot::Single(wheel_material))
            .with_transform(Transform {
                translation: position,
                rotation: Quat::from_rotation_z(FRAC_PI_2),
                scale: Vec3::ONE,
            });
        node.cast_shadow = true;
        robot.add_child(node);
    }

    let mut slide = SceneNode::mesh(
        "slide",
        box_geometry(0.4, 2.5, 0.3),
        MaterialSlot::Single(slide_material),
    )
    .with_transform(Transform::from_translation(Vec3::new(0.0, 2.5, -0.7)));
    slide.cast_shadow = true;
    robot.add_child(slide);

    Model::with_materials(robot, materials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Shape;

    #[test]
    fn test_robot_layout() {
        let model = create_example_robot();
        assert_eq!(model.root.name, ROBOT_NAME);
        assert_eq!(model.root.children.len(), 6);
        assert_eq!(model.materials.len(), 3);

        let shapes: Vec<Shape> = model
            .root
            .children
            .iter()
            .map(|c| c.mesh.as_ref().unwrap().geometry.shape)
            .collect();
        assert_eq!(shapes.iter().filter(|s| **s == Shape::Box).count(), 2);
        assert_eq!(shapes.iter().filter(|s| **s == Shape::Cylinder).count(), 4);
    }

    #[test]
    fn test_wheels_share_one_material() {
        let model = create_example_robot();
        let wheel_ids: Vec<_> = model
            .root
            .children
            .iter()
            .filter(|c| c.name == "wheel")
            .map(|c| c.mesh.as_ref().unwrap().material.clone())
            .collect();
        assert_eq!(wheel_ids.len(), 4);
        assert!(wheel_ids.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_robot_bounds() {
        let bounds = create_example_robot().root.world_bounds();
        // slide reaches 2.5 + 1.25, wheels rest on y = 0
        assert!((bounds.max.y - 3.75).abs() < 1e-5);
        assert!(bounds.min.y.abs() < 1e-5);
    }
}
