//! Cameras and view-frustum culling

pub mod fly_camera;
pub mod frustum;

use serde::{Deserialize, Serialize};

pub use fly_camera::{Camera, CameraMovement, PITCH_LIMIT};
pub use frustum::{Frustum, FrustumSide, Plane};

/// Defaults applied to every new camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Units per second
    pub movement_speed: f32,
    /// Degrees per pixel of cursor motion
    pub mouse_sensitivity: f32,
    /// Far plane distance
    pub render_distance: f32,
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Initial yaw in degrees
    pub yaw: f32,
    /// Initial pitch in degrees
    pub pitch: f32,
    /// Largest distance one keyboard step may move
    pub max_velocity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            movement_speed: 60.0,
            mouse_sensitivity: 0.2,
            render_distance: 1000.0,
            fov: 45.0,
            yaw: -90.0,
            pitch: 0.0,
            max_velocity: 10.0,
        }
    }
}
