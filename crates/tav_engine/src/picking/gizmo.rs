//! Translation gizmo axes
//!
//! The gizmo is three segments from the selected entity's position along
//! +X, +Y and +Z. A press whose ray passes within a threshold of a segment
//! grabs that axis; dragging then moves the entity along it only.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;
use crate::picking::ray::Ray;

/// One gizmo handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// World X
    X,
    /// World Y
    Y,
    /// World Z
    Z,
}

impl Axis {
    /// Test order
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Unit constraint vector
    pub fn direction(self) -> Vec3 {
        match self {
            Axis::X => Vec3::x(),
            Axis::Y => Vec3::y(),
            Axis::Z => Vec3::z(),
        }
    }
}

/// How to choose when several axes are within the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AxisTieBreak {
    /// Test X, Y, Z in order; the last match wins
    #[default]
    LastMatch,
    /// The axis closest to the ray wins
    Nearest,
}

/// How the ray-to-handle distance is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AxisDistance {
    /// Closest approach between the ray and the whole handle segment
    #[default]
    Segment,
    /// Distance from the handle's start to the nearest point on the ray
    ///
    /// Every handle starts at the gizmo origin, so all three axes measure
    /// the same and the tie-break alone decides.
    AxisStart,
}

/// Closest approach between a ray and an axis segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisHit {
    /// Distance along the ray
    pub t: f32,
    /// Perpendicular distance between ray and segment
    pub distance: f32,
}

/// Test a ray against the handle `start..end`
///
/// Accepts the axis when the distance measured by `metric` is below
/// `threshold`.
pub fn ray_intersects_axis(
    ray: &Ray,
    start: Vec3,
    end: Vec3,
    threshold: f32,
    metric: AxisDistance,
) -> Option<AxisHit> {
    let hit = match metric {
        AxisDistance::Segment => segment_approach(ray, start, end),
        AxisDistance::AxisStart => start_approach(ray, start),
    };
    (hit.distance < threshold).then_some(hit)
}

/// Nearest point on the ray (`t >= 0`) to `start`
fn start_approach(ray: &Ray, start: Vec3) -> AxisHit {
    let t = (start - ray.origin).dot(&ray.direction).max(0.0);
    AxisHit { t, distance: (ray.point_at(t) - start).norm() }
}

/// Closest pair of points, ray parameter clamped to `t >= 0` and segment
/// parameter clamped to the segment
fn segment_approach(ray: &Ray, start: Vec3, end: Vec3) -> AxisHit {
    let axis = end - start;
    let axis_len_sq = axis.norm_squared();
    let w0 = ray.origin - start;
    let d_dot_d = ray.direction.norm_squared();
    let d_dot_e = ray.direction.dot(&axis);
    let d_dot_w = ray.direction.dot(&w0);
    let e_dot_w = axis.dot(&w0);

    let segment_param = |t: f32| -> f32 {
        if axis_len_sq <= f32::EPSILON {
            0.0
        } else {
            ((e_dot_w + t * d_dot_e) / axis_len_sq).clamp(0.0, 1.0)
        }
    };

    let denom = d_dot_d * axis_len_sq - d_dot_e * d_dot_e;
    let mut u = if denom.abs() <= 1e-6 * d_dot_d * axis_len_sq {
        segment_param(0.0)
    } else {
        ((d_dot_d * e_dot_w - d_dot_e * d_dot_w) / denom).clamp(0.0, 1.0)
    };
    let t = ((u * d_dot_e - d_dot_w) / d_dot_d).max(0.0);
    u = segment_param(t);

    AxisHit { t, distance: (ray.point_at(t) - (start + axis * u)).norm() }
}

/// Pick the gizmo axis under `ray` for a gizmo at `origin`
///
/// # Arguments
/// * `ray` - Cursor ray
/// * `origin` - Gizmo position (the selected entity's position)
/// * `length` - Segment length of each handle
/// * `threshold` - Largest accepted ray-to-handle distance
/// * `metric` - How that distance is measured
/// * `tie_break` - Policy when more than one axis matches
pub fn select_axis(
    ray: &Ray,
    origin: Vec3,
    length: f32,
    threshold: f32,
    metric: AxisDistance,
    tie_break: AxisTieBreak,
) -> Option<Axis> {
    let mut selected: Option<(Axis, AxisHit)> = None;
    for axis in Axis::ALL {
        let Some(hit) = ray_intersects_axis(ray, origin, origin + axis.direction() * length, threshold, metric) else {
            continue;
        };
        selected = match (tie_break, selected) {
            (AxisTieBreak::Nearest, Some((best, best_hit))) if best_hit.distance <= hit.distance => {
                Some((best, best_hit))
            }
            _ => Some((axis, hit)),
        };
    }
    selected.map(|(axis, _)| axis)
}

/// Component of `delta` along `axis`, as a vector
pub fn constrain_to_axis(delta: Vec3, axis: Axis) -> Vec3 {
    let direction = axis.direction();
    direction * delta.dot(&direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ray_through_segment() {
        let ray = Ray::new(Vec3::new(5.0, 10.0, 0.0), -Vec3::y());
        let hit = ray_intersects_axis(&ray, Vec3::zeros(), Vec3::new(10.0, 0.0, 0.0), 0.5, AxisDistance::Segment).unwrap();
        assert_relative_eq!(hit.t, 10.0, epsilon = 1e-4);
        assert_relative_eq!(hit.distance, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_ray_past_segment_end_misses() {
        let ray = Ray::new(Vec3::new(15.0, 10.0, 0.0), -Vec3::y());
        assert!(ray_intersects_axis(&ray, Vec3::zeros(), Vec3::new(10.0, 0.0, 0.0), 0.5, AxisDistance::Segment).is_none());
    }

    #[test]
    fn test_segment_behind_ray_misses() {
        let ray = Ray::new(Vec3::new(5.0, 10.0, 0.0), Vec3::y());
        assert!(ray_intersects_axis(&ray, Vec3::zeros(), Vec3::new(10.0, 0.0, 0.0), 0.5, AxisDistance::Segment).is_none());
    }

    #[test]
    fn test_parallel_ray() {
        let ray = Ray::new(Vec3::new(-5.0, 0.2, 0.0), Vec3::x());
        let hit = ray_intersects_axis(&ray, Vec3::zeros(), Vec3::new(10.0, 0.0, 0.0), 0.5, AxisDistance::Segment).unwrap();
        assert_relative_eq!(hit.distance, 0.2, epsilon = 1e-4);
    }

    #[test]
    fn test_tie_break_policies() {
        // Straight down near the origin: X at 0.3, Z at 0.4, Y at 0.5
        let ray = Ray::new(Vec3::new(0.4, 10.0, 0.3), -Vec3::y());
        let last = select_axis(&ray, Vec3::zeros(), 10.0, 1.0, AxisDistance::Segment, AxisTieBreak::LastMatch);
        let nearest = select_axis(&ray, Vec3::zeros(), 10.0, 1.0, AxisDistance::Segment, AxisTieBreak::Nearest);
        assert_eq!(last, Some(Axis::Z));
        assert_eq!(nearest, Some(Axis::X));
    }

    #[test]
    fn test_start_metric_ignores_the_rest_of_the_handle() {
        // Straight down onto the X handle, 9 units from its start
        let ray = Ray::new(Vec3::new(9.0, 10.0, 0.0), -Vec3::y());
        let end = Vec3::new(10.0, 0.0, 0.0);

        let along = ray_intersects_axis(&ray, Vec3::zeros(), end, 0.5, AxisDistance::Segment).unwrap();
        assert_relative_eq!(along.distance, 0.0, epsilon = 1e-4);
        assert!(ray_intersects_axis(&ray, Vec3::zeros(), end, 0.5, AxisDistance::AxisStart).is_none());

        let near_start = Ray::new(Vec3::new(0.3, 10.0, 0.0), -Vec3::y());
        let hit = ray_intersects_axis(&near_start, Vec3::zeros(), end, 0.5, AxisDistance::AxisStart).unwrap();
        assert_relative_eq!(hit.t, 10.0, epsilon = 1e-4);
        assert_relative_eq!(hit.distance, 0.3, epsilon = 1e-4);
    }

    #[test]
    fn test_start_metric_leaves_the_choice_to_the_tie_break() {
        let ray = Ray::new(Vec3::new(0.4, 10.0, 0.3), -Vec3::y());
        let last = select_axis(&ray, Vec3::zeros(), 10.0, 1.0, AxisDistance::AxisStart, AxisTieBreak::LastMatch);
        let nearest = select_axis(&ray, Vec3::zeros(), 10.0, 1.0, AxisDistance::AxisStart, AxisTieBreak::Nearest);
        assert_eq!(last, Some(Axis::Z));
        assert_eq!(nearest, Some(Axis::X));
    }

    #[test]
    fn test_constrain_to_axis() {
        let moved = constrain_to_axis(Vec3::new(1.0, 2.0, 3.0), Axis::Y);
        assert_eq!(moved, Vec3::new(0.0, 2.0, 0.0));
    }
}
