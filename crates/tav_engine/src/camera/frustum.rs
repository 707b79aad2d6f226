//! View frustum extraction and sphere culling
//!
//! Planes are pulled straight out of the combined `projection * view` matrix
//! (Gribb–Hartmann) and normalized, so a plane's signed distance is in world
//! units and can be compared against a bounding radius.

use crate::foundation::math::{Mat4, Vec3, Vec4};

/// Plane `dot(normal, p) + distance = 0`, normal pointing into the frustum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal
    pub normal: Vec3,
    /// Offset along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a plane from a normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    fn from_row(row: Vec4) -> Self {
        let normal = row.xyz();
        let length = normal.norm();
        if length <= f32::EPSILON {
            return Self::new(normal, row.w);
        }
        Self::new(normal / length, row.w / length)
    }

    /// Signed distance from the plane to a point (positive on the inside)
    pub fn distance_to_point(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// Index of each plane in [`Frustum::planes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrustumSide {
    /// Left clip plane
    Left = 0,
    /// Right clip plane
    Right = 1,
    /// Bottom clip plane
    Bottom = 2,
    /// Top clip plane
    Top = 3,
    /// Near clip plane
    Near = 4,
    /// Far clip plane
    Far = 5,
}

/// Six planes bounding the visible volume
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far
    pub planes: [Plane; 6],
}

impl Default for Frustum {
    fn default() -> Self {
        Self::from_matrix(&Mat4::identity())
    }
}

impl Frustum {
    /// Extract planes from a `projection * view` matrix
    pub fn from_matrix(pv: &Mat4) -> Self {
        let row = |i: usize| -> Vec4 { pv.row(i).transpose() };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        Self {
            planes: [
                Plane::from_row(r3 + r0),
                Plane::from_row(r3 - r0),
                Plane::from_row(r3 + r1),
                Plane::from_row(r3 - r1),
                Plane::from_row(r3 + r2),
                Plane::from_row(r3 - r2),
            ],
        }
    }

    /// Plane on one side
    pub fn plane(&self, side: FrustumSide) -> &Plane {
        &self.planes[side as usize]
    }

    /// Conservative sphere test
    ///
    /// A sphere lying entirely behind any one plane is culled. Large boxes
    /// approximated by their bounding sphere may be accepted when only their
    /// sphere reaches inside.
    pub fn is_visible(&self, position: &Vec3, radius: f32) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(position) > -radius)
    }

    /// Point containment
    pub fn contains_point(&self, point: &Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{utils, Mat4Ext};

    fn looking_down_negative_z() -> Frustum {
        let projection = Mat4::perspective(utils::deg_to_rad(90.0), 1.0, 0.1, 100.0);
        let view = Mat4::look_at(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0), Vec3::y());
        Frustum::from_matrix(&(projection * view))
    }

    #[test]
    fn test_sphere_inside_is_visible() {
        assert!(looking_down_negative_z().is_visible(&Vec3::new(0.0, 0.0, -50.0), 1.0));
    }

    #[test]
    fn test_sphere_beyond_far_plane_is_culled() {
        assert!(!looking_down_negative_z().is_visible(&Vec3::new(0.0, 0.0, -150.0), 1.0));
    }

    #[test]
    fn test_sphere_outside_side_planes_is_culled() {
        assert!(!looking_down_negative_z().is_visible(&Vec3::new(200.0, 0.0, -50.0), 1.0));
    }

    #[test]
    fn test_sphere_behind_camera_is_culled() {
        assert!(!looking_down_negative_z().is_visible(&Vec3::new(0.0, 0.0, 10.0), 1.0));
    }

    #[test]
    fn test_radius_lets_straddling_sphere_through() {
        let frustum = looking_down_negative_z();
        // Centre just outside the right plane (x = -z at 90 degrees).
        let center = Vec3::new(52.0, 0.0, -50.0);
        assert!(!frustum.is_visible(&center, 0.5));
        assert!(frustum.is_visible(&center, 5.0));
    }

    #[test]
    fn test_planes_are_normalized() {
        for plane in &looking_down_negative_z().planes {
            assert!((plane.normal.norm() - 1.0).abs() < 1e-5);
        }
        let near = looking_down_negative_z();
        let near = near.plane(FrustumSide::Near);
        assert!((near.distance_to_point(&Vec3::new(0.0, 0.0, -0.1))).abs() < 1e-4);
    }
}
