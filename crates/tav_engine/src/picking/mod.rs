//! # Picking & Gizmo System
//!
//! Cursor-driven hover, click and axis-constrained translation.
//!
//! - [`ray`]: cursor to world-space ray
//! - [`screen`]: projected bounding-box containment
//! - [`gizmo`]: axis handles and ray-to-segment tests
//! - [`hover`]: smoothed hover colours
//! - [`controller`]: the press / drag / release state machine

pub mod controller;
pub mod gizmo;
pub mod hover;
pub mod ray;
pub mod screen;

use serde::{Deserialize, Serialize};

pub use controller::{DragState, PickingController};
pub use gizmo::{constrain_to_axis, ray_intersects_axis, select_axis, Axis, AxisDistance, AxisHit, AxisTieBreak};
pub use hover::{hover_target, smooth_hover_color};
pub use ray::{generate_ray, Ray};
pub use screen::{is_point_inside_3d_obj, project_bounds, NdcRect};

/// Picking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickingConfig {
    /// Largest ray-to-handle distance that grabs an axis (world units)
    pub axis_threshold: f32,
    /// Length of each gizmo handle (world units)
    pub gizmo_length: f32,
    /// Added to the base colour while hovered
    pub hover_offset: f32,
    /// Hover easing rate per second
    pub hover_rate: f32,
    /// How the ray-to-handle distance is measured
    pub axis_distance: AxisDistance,
    /// Axis arbitration when several handles match
    pub tie_break: AxisTieBreak,
    /// Cursor travel (pixels) that turns a click into a drag
    pub drag_threshold: f32,
}

impl Default for PickingConfig {
    fn default() -> Self {
        Self {
            axis_threshold: 1.0,
            gizmo_length: 10.0,
            hover_offset: 0.3,
            hover_rate: 5.0,
            axis_distance: AxisDistance::Segment,
            tie_break: AxisTieBreak::LastMatch,
            drag_threshold: 5.0,
        }
    }
}
