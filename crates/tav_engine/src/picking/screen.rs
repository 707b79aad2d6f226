//! Screen-space containment tests
//!
//! Hover uses the screen rectangle enclosing a bounding box's projected
//! corners. That rectangle over-covers rotated boxes; it is picking for UI
//! feedback, not collision.

use crate::foundation::math::{cursor_to_ndc, Mat4, Mat4Ext, Vec2};
use crate::scene::bounds::BoundingBox;

/// Axis-aligned rectangle in normalized device coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NdcRect {
    /// Lower-left corner
    pub min: Vec2,
    /// Upper-right corner
    pub max: Vec2,
}

impl NdcRect {
    /// Whether `point` lies inside or on the edge
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }
}

/// Screen rectangle covered by a bounding box
///
/// Corners are projected through `mvp = projection * view * model`. Corners
/// on or behind the eye plane are skipped; `None` when all of them are.
pub fn project_bounds(bounds: &BoundingBox, mvp: &Mat4) -> Option<NdcRect> {
    let mut projected = bounds.corners().into_iter().filter_map(|corner| mvp.project_point(&corner));
    let first = projected.next()?.xy();
    let (min, max) = projected.fold((first, first), |(min, max), p| (min.inf(&p.xy()), max.sup(&p.xy())));
    Some(NdcRect { min, max })
}

/// Whether the cursor lies over an entity's projected bounding box
///
/// # Arguments
/// * `bounds` - Local-space box of the entity
/// * `model` - The entity's model matrix
/// * `view_projection` - `projection * view` of the active camera
/// * `cursor` - Cursor in window pixels
/// * `viewport` - Window size in pixels
pub fn is_point_inside_3d_obj(bounds: &BoundingBox, model: &Mat4, view_projection: &Mat4, cursor: Vec2, viewport: Vec2) -> bool {
    if viewport.x <= 0.0 || viewport.y <= 0.0 {
        return false;
    }
    let cursor_ndc = cursor_to_ndc(cursor, viewport.x, viewport.y);
    project_bounds(bounds, &(view_projection * model)).is_some_and(|rect| rect.contains(cursor_ndc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    fn view_projection() -> Mat4 {
        let projection = Mat4::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let view = Mat4::look_at(Vec3::zeros(), -Vec3::z(), Vec3::y());
        projection * view
    }

    fn unit_box() -> BoundingBox {
        BoundingBox::new(Vec3::repeat(-0.5), Vec3::repeat(0.5))
    }

    #[test]
    fn test_cursor_over_box_in_front() {
        let model = Mat4::new_translation(&Vec3::new(0.0, 0.0, -10.0));
        let viewport = Vec2::new(600.0, 600.0);
        assert!(is_point_inside_3d_obj(&unit_box(), &model, &view_projection(), Vec2::new(300.0, 300.0), viewport));
        assert!(!is_point_inside_3d_obj(&unit_box(), &model, &view_projection(), Vec2::new(10.0, 10.0), viewport));
    }

    #[test]
    fn test_model_matrix_moves_the_box() {
        let model = Mat4::new_translation(&Vec3::new(5.0, 0.0, -10.0));
        let viewport = Vec2::new(600.0, 600.0);
        assert!(!is_point_inside_3d_obj(&unit_box(), &model, &view_projection(), Vec2::new(300.0, 300.0), viewport));
        // x = 5 at depth 10 with a 90 degree fov lands at ndc 0.5
        assert!(is_point_inside_3d_obj(&unit_box(), &model, &view_projection(), Vec2::new(450.0, 300.0), viewport));
    }

    #[test]
    fn test_box_behind_camera_is_never_hovered() {
        let model = Mat4::new_translation(&Vec3::new(0.0, 0.0, 10.0));
        let viewport = Vec2::new(600.0, 600.0);
        assert!(!is_point_inside_3d_obj(&unit_box(), &model, &view_projection(), Vec2::new(300.0, 300.0), viewport));
    }
}
