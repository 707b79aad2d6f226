//! World-space rays from cursor positions

use crate::foundation::math::{cursor_to_ndc, Mat4, Mat4Ext, Vec2, Vec3};

/// Half-line in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray (normalized)
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction: direction.normalize() }
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Ray under the cursor, from the near plane toward the far plane
///
/// # Arguments
/// * `view_projection` - `projection * view` of the active camera
/// * `cursor` - Cursor position in window pixels (origin top-left)
/// * `viewport` - Window size in pixels
///
/// # Returns
/// `None` when the matrix is singular or the viewport is empty
pub fn generate_ray(view_projection: &Mat4, cursor: Vec2, viewport: Vec2) -> Option<Ray> {
    if viewport.x <= 0.0 || viewport.y <= 0.0 {
        return None;
    }
    let inverse = view_projection.try_inverse()?;
    let ndc = cursor_to_ndc(cursor, viewport.x, viewport.y);
    let near = inverse.unproject_ndc(&Vec3::new(ndc.x, ndc.y, -1.0))?;
    let far = inverse.unproject_ndc(&Vec3::new(ndc.x, ndc.y, 1.0))?;
    let direction = far - near;
    (direction.norm() > f32::EPSILON).then(|| Ray::new(near, direction))
}
