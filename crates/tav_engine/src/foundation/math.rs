//! Math utilities and types
//!
//! Provides the nalgebra aliases used throughout the engine together with the
//! OpenGL-convention projection helpers (right-handed view space, clip-space
//! depth in `[-1, 1]`) that the camera and picking code build on.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix2, Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 2x2 matrix type
pub type Mat2 = Matrix2<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Linear RGB colour with components in `[0, 1]`
pub type Color = Vec3;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;

    /// Near clip distance shared by every perspective camera
    pub const NEAR_PLANE: f32 = 0.1;

    /// Values below this are treated as zero in projective divides
    pub const EPSILON: f32 = 1e-6;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Vec3};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// Clamp a value between min and max
    pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
        if value < min { min } else if value > max { max } else { value }
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Clamp every component of a colour into `[0, 1]`
    pub fn saturate(color: Vec3) -> Vec3 {
        color.map(|c| clamp(c, 0.0, 1.0))
    }

    /// True when every component is exactly zero
    pub fn is_zero_vec(v: &Vec3) -> bool {
        v.x == 0.0 && v.y == 0.0 && v.z == 0.0
    }
}

/// Extension trait for Mat4 with the projection helpers the engine needs
pub trait Mat4Ext {
    /// OpenGL-style perspective projection (`fov_y` in radians)
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Rotation of `degrees` about `axis`; identity for a zero axis or angle
    fn rotation_degrees(axis: &Vec3, degrees: f32) -> Mat4;

    /// Transform a world point to normalized device coordinates
    ///
    /// Returns `None` when the point lies on or behind the eye plane (`w <= 0`).
    fn project_point(&self, point: &Vec3) -> Option<Vec3>;

    /// Map an NDC point back to world space through this (inverse) matrix
    fn unproject_ndc(&self, ndc: &Vec3) -> Option<Vec3>;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_perspective(aspect, fov_y, near, far)
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }

    fn rotation_degrees(axis: &Vec3, degrees: f32) -> Mat4 {
        if degrees == 0.0 || utils::is_zero_vec(axis) {
            return Mat4::identity();
        }
        let axis = Unit::new_normalize(*axis);
        Mat4::from_axis_angle(&axis, utils::deg_to_rad(degrees))
    }

    fn project_point(&self, point: &Vec3) -> Option<Vec3> {
        let clip = self * Vec4::new(point.x, point.y, point.z, 1.0);
        if clip.w <= constants::EPSILON {
            return None;
        }
        Some(clip.xyz() / clip.w)
    }

    fn unproject_ndc(&self, ndc: &Vec3) -> Option<Vec3> {
        let world = self * Vec4::new(ndc.x, ndc.y, ndc.z, 1.0);
        if world.w.abs() <= constants::EPSILON {
            return None;
        }
        Some(world.xyz() / world.w)
    }
}

/// Convert a cursor position in window pixels to normalized device coordinates
///
/// Window space has its origin in the top-left corner with Y pointing down;
/// NDC has Y pointing up.
pub fn cursor_to_ndc(cursor: Vec2, width: f32, height: f32) -> Vec2 {
    Vec2::new(
        (2.0 * cursor.x) / width - 1.0,
        1.0 - (2.0 * cursor.y) / height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cursor_to_ndc_corners() {
        let center = cursor_to_ndc(Vec2::new(400.0, 300.0), 800.0, 600.0);
        assert_relative_eq!(center, Vec2::zeros(), epsilon = 1e-6);

        let top_left = cursor_to_ndc(Vec2::new(0.0, 0.0), 800.0, 600.0);
        assert_relative_eq!(top_left, Vec2::new(-1.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_rotation_with_zero_axis_is_identity() {
        let m = Mat4::rotation_degrees(&Vec3::zeros(), 45.0);
        assert_eq!(m, Mat4::identity());
    }

    #[test]
    fn test_project_unproject_round_trip() {
        let proj = Mat4::perspective(utils::deg_to_rad(60.0), 4.0 / 3.0, 0.1, 100.0);
        let view = Mat4::look_at(Vec3::new(0.0, 2.0, 5.0), Vec3::zeros(), Vec3::y());
        let pv = proj * view;
        let inv = pv.try_inverse().unwrap();

        let point = Vec3::new(0.5, -0.25, -1.0);
        let ndc = pv.project_point(&point).unwrap();
        let back = inv.unproject_ndc(&ndc).unwrap();
        assert_relative_eq!(back, point, epsilon = 1e-3);
    }

    #[test]
    fn test_point_behind_camera_does_not_project() {
        let proj = Mat4::perspective(utils::deg_to_rad(90.0), 1.0, 0.1, 100.0);
        assert!(proj.project_point(&Vec3::new(0.0, 0.0, 5.0)).is_none());
    }
}
