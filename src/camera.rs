use glam::Vec3;

use crate::config::CAMERA_FOV_DEGREES;
use crate::math::AABB;

pub const DEFAULT_CAMERA_POSITION: Vec3 = Vec3::new(5.0, 5.0, 5.0);
/// Extra room around the model after a fit
pub const FIT_PADDING: f32 = 1.5;

/// Perspective camera orbiting a target point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_degrees: f32,
}

impl ViewCamera {
    pub fn new(fov_degrees: f32) -> Self {
        Self {
            position: DEFAULT_CAMERA_POSITION,
            target: Vec3::ZERO,
            fov_degrees,
        }
    }

    pub fn reset(&mut self) {
        self.position = DEFAULT_CAMERA_POSITION;
        self.target = Vec3::ZERO;
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// Moves along the (1, 1, 1) diagonal from the box center until the
    /// largest side fits the vertical field of view, with padding.
    /// Empty bounds leave the camera alone.
    pub fn fit_to_bounds(&mut self, bounds: &AABB) {
        if bounds.is_empty() {
            return;
        }
        let center = bounds.center();
        let half_fov = self.fov_degrees.to_radians() / 2.0;
        let distance = (bounds.max_extent() / 2.0 / half_fov.tan()).abs() * FIT_PADDING;

        self.position = center + Vec3::splat(distance);
        self.target = center;
    }
}

impl Default for ViewCamera {
    fn default() -> Self {
        Self::new(CAMERA_FOV_DEGREES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_unit_box() {
        let mut camera = ViewCamera::default();
        camera.fit_to_bounds(&AABB::new(Vec3::splat(-2.5), Vec3::splat(2.5)));

        let expected = (2.5 / (37.5f32).to_radians().tan()) * 1.5;
        assert_eq!(camera.target, Vec3::ZERO);
        assert!((camera.position - Vec3::splat(expected)).length() < 1e-4);
    }

    #[test]
    fn test_fit_follows_center_and_reset_restores_default() {
        let mut camera = ViewCamera::default();
        camera.fit_to_bounds(&AABB::new(Vec3::new(9.0, 0.0, 0.0), Vec3::new(11.0, 0.0, 0.0)));
        assert_eq!(camera.target, Vec3::new(10.0, 0.0, 0.0));
        assert!(camera.forward().x < 0.0);

        camera.reset();
        assert_eq!(camera.position, DEFAULT_CAMERA_POSITION);
        assert_eq!(camera.target, Vec3::ZERO);
    }

    #[test]
    fn test_empty_bounds_leave_camera() {
        let mut camera = ViewCamera::default();
        camera.fit_to_bounds(&AABB::empty());
        assert_eq!(camera, ViewCamera::default());
    }
}
