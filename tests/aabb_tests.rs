use glam::{Mat4, Quat, Vec3};
use cad_viewer::math::AABB;

#[cfg(test)]
mod aabb_tests {
    use super::*;

    #[test]
    fn test_aabb_union_creates_bounding_box() {
        let aabb1 = AABB::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 10.0, 10.0));
        let aabb2 = AABB::new(Vec3::new(5.0, 5.0, 5.0), Vec3::new(15.0, 15.0, 15.0));

        let union = aabb1.union(&aabb2);

        assert_eq!(union.min, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(union.max, Vec3::new(15.0, 15.0, 15.0));
    }

    #[test]
    fn test_union_with_empty_is_identity() {
        let aabb = AABB::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.union(&AABB::empty()), aabb);
        assert_eq!(AABB::empty().union(&aabb), aabb);
    }

    #[test]
    fn test_empty_box_has_no_size() {
        let empty = AABB::empty();
        assert!(empty.is_empty());
        assert_eq!(empty.size(), Vec3::ZERO);
        assert_eq!(empty.center(), Vec3::ZERO);
        assert_eq!(empty.max_extent(), 0.0);
    }

    #[test]
    fn test_single_point_is_degenerate_not_empty() {
        let aabb = AABB::from_points([Vec3::new(3.0, 3.0, 3.0)]);
        assert!(!aabb.is_empty());
        assert_eq!(aabb.max_extent(), 0.0);
        assert_eq!(aabb.center(), Vec3::new(3.0, 3.0, 3.0));
    }

    #[test]
    fn test_transformed_points_follow_rotation() {
        let points = [Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)];
        let matrix = Mat4::from_rotation_translation(
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::new(0.0, 0.0, 1.0),
        );
        let aabb = AABB::from_transformed_points(&points, &matrix);
        assert!((aabb.min - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-5);
        assert!((aabb.max - Vec3::new(0.0, 2.0, 1.0)).length() < 1e-5);
    }
}
