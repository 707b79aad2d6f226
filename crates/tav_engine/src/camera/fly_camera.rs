//! Free-flying perspective camera
//!
//! Yaw and pitch drive the basis vectors; [`Camera::update`] derives the
//! basis, then projection and view, then the frustum, in that order so the
//! view never lags one update behind the orientation.

use std::rc::Rc;

use crate::backend::GpuDevice;
use crate::camera::frustum::Frustum;
use crate::camera::CameraConfig;
use crate::foundation::math::{constants, utils, Color, Mat4, Mat4Ext, Vec3};
use crate::render::geometry::GeometryRegistry;
use crate::render::texture::Texture;
use crate::render::RenderError;
use crate::scene::entity::{Clickable, SceneEntity, UpdateContext, Updatable};
use crate::scene::object::SceneObject;
use crate::scene::transform::Transform;
use crate::scene::primitives;

/// Largest pitch magnitude in degrees; keeps the view from flipping
pub const PITCH_LIMIT: f32 = 89.0;

/// Closest the far plane may come to the camera
pub const MIN_RENDER_DISTANCE: f32 = constants::NEAR_PLANE * 10.0;

/// Directions the keyboard can move a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMovement {
    /// Along `front`
    Forward,
    /// Against `front`
    Backward,
    /// Against `right`
    Left,
    /// Along `right`
    Right,
    /// Along `up`
    Up,
    /// Against `up`
    Down,
}

/// Perspective camera with a billboard standing in for it in the scene
#[derive(Debug)]
pub struct Camera {
    /// Eye position
    pub position: Vec3,
    /// Unit view direction
    pub front: Vec3,
    /// Unit camera up
    pub up: Vec3,
    /// Unit camera right
    pub right: Vec3,
    /// Reference up used to derive `right`
    pub world_up: Vec3,
    /// Accumulated velocity (unused by the fly controls, kept for physics)
    pub velocity: Vec3,
    /// Yaw in degrees
    pub yaw: f32,
    /// Pitch in degrees, within ±[`PITCH_LIMIT`]
    pub pitch: f32,
    /// Vertical field of view in degrees
    pub fov: f32,
    initial_fov: f32,
    /// Far plane distance
    pub render_distance: f32,
    /// Units per second
    pub movement_speed: f32,
    /// Degrees per pixel of cursor motion
    pub mouse_sensitivity: f32,
    /// Largest distance one keyboard step may move
    pub max_velocity: f32,
    aspect: f32,
    projection: Mat4,
    view: Mat4,
    frustum: Frustum,
    billboard: SceneObject,
}

impl Camera {
    /// Camera at `position` using `config` defaults
    pub fn new(position: Vec3, config: &CameraConfig) -> Self {
        let mut camera = Self {
            position,
            front: -Vec3::z(),
            up: Vec3::y(),
            right: Vec3::x(),
            world_up: Vec3::y(),
            velocity: Vec3::zeros(),
            yaw: config.yaw,
            pitch: config.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            fov: config.fov,
            initial_fov: config.fov,
            render_distance: config.render_distance.max(MIN_RENDER_DISTANCE),
            movement_speed: config.movement_speed,
            mouse_sensitivity: config.mouse_sensitivity,
            max_velocity: config.max_velocity,
            aspect: 1.0,
            projection: Mat4::identity(),
            view: Mat4::identity(),
            frustum: Frustum::default(),
            billboard: primitives::billboard(primitives::BILLBOARD_SIZE, None).with_position(position),
        };
        camera.update(1.0);
        camera
    }

    /// Builder: texture the billboard
    #[must_use]
    pub fn with_billboard_texture(mut self, texture: Rc<Texture>) -> Self {
        let position = self.position;
        self.billboard = primitives::billboard(primitives::BILLBOARD_SIZE, Some(texture)).with_position(position);
        self
    }

    /// Recompute basis, matrices and frustum for the given aspect ratio
    pub fn update(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
        self.update_vectors();
        self.projection = Mat4::perspective(
            utils::deg_to_rad(self.fov),
            self.aspect,
            constants::NEAR_PLANE,
            self.render_distance.max(MIN_RENDER_DISTANCE),
        );
        self.view = Mat4::look_at(self.position, self.position + self.front, self.up);
        self.frustum = Frustum::from_matrix(&(self.projection * self.view));
        self.billboard.transform_mut().set_position(self.position);
    }

    fn update_vectors(&mut self) {
        let yaw = utils::deg_to_rad(self.yaw);
        let pitch = utils::deg_to_rad(self.pitch);
        let front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos());
        self.front = front.normalize();
        self.right = self.front.cross(&self.world_up).normalize();
        self.up = self.right.cross(&self.front).normalize();
    }

    /// Move one step of `speed × delta_time`, capped at `max_velocity`
    pub fn process_keyboard(&mut self, direction: CameraMovement, delta_time: f32) {
        let step = (self.movement_speed * delta_time.max(0.0)).min(self.max_velocity);
        let offset = match direction {
            CameraMovement::Forward => self.front * step,
            CameraMovement::Backward => -self.front * step,
            CameraMovement::Left => -self.right * step,
            CameraMovement::Right => self.right * step,
            CameraMovement::Up => self.up * step,
            CameraMovement::Down => -self.up * step,
        };
        self.position += offset;
        self.update(self.aspect);
    }

    /// Apply a raw cursor delta (pixels; `dy` positive when moving up)
    pub fn process_mouse_offset(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.mouse_sensitivity;
        self.pitch = (self.pitch + dy * self.mouse_sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update(self.aspect);
    }

    /// Narrow or widen the field of view, within `[1, initial fov]`
    pub fn zoom(&mut self, y_offset: f32) {
        self.fov = (self.fov - y_offset).clamp(1.0, self.initial_fov.max(1.0));
        self.update(self.aspect);
    }

    /// Projection matrix from the last update
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// View matrix from the last update
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// `projection × view`
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Frustum from the last update
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Aspect ratio from the last update
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Field of view the camera was created with
    pub fn initial_fov(&self) -> f32 {
        self.initial_fov
    }

    /// Scene representation of this camera
    pub fn billboard(&self) -> &SceneObject {
        &self.billboard
    }

    /// Mutable scene representation
    pub fn billboard_mut(&mut self) -> &mut SceneObject {
        &mut self.billboard
    }

    /// Upload the billboard geometry
    pub fn register(&mut self, device: &mut dyn GpuDevice, registry: &mut GeometryRegistry) -> Result<(), RenderError> {
        self.billboard.register(device, registry)
    }

    /// Release the billboard geometry
    pub fn release(&mut self, device: &mut dyn GpuDevice, registry: &mut GeometryRegistry) {
        self.billboard.release(device, registry);
    }
}

/// A camera is picked and dragged through its billboard
impl SceneEntity for Camera {
    fn tag(&self) -> &str {
        self.billboard.tag()
    }

    fn exists(&self) -> bool {
        self.billboard.exists()
    }

    fn transform(&self) -> &Transform {
        self.billboard.transform()
    }

    fn transform_mut(&mut self) -> &mut Transform {
        self.billboard.transform_mut()
    }

    fn base_color(&self) -> Color {
        self.billboard.base_color()
    }

    fn clickable(&self) -> &Clickable {
        self.billboard.clickable()
    }

    fn clickable_mut(&mut self) -> &mut Clickable {
        self.billboard.clickable_mut()
    }
}

impl Updatable for Camera {
    /// Adopt the billboard position if something dragged it
    fn update(&mut self, _ctx: &UpdateContext) {
        let dragged = self.billboard.transform().position();
        if dragged != self.position {
            self.position = dragged;
            self.update(self.aspect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera() -> Camera {
        Camera::new(Vec3::zeros(), &CameraConfig::default())
    }

    #[test]
    fn test_defaults_look_down_negative_z() {
        let camera = camera();
        assert_relative_eq!(camera.front, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
        assert_relative_eq!(camera.right, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(camera.up, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-5);
        assert_eq!(camera.movement_speed, 60.0);
        assert_eq!(camera.render_distance, 1000.0);
    }

    #[test]
    fn test_view_follows_orientation_immediately() {
        let mut camera = camera();
        camera.process_mouse_offset(450.0, 0.0); // 90 degrees of yaw
        let ahead = camera.view().transform_point(&crate::foundation::math::Point3::new(1.0, 0.0, 0.0));
        // after turning right the +X axis is straight ahead (view -Z)
        assert_relative_eq!(ahead.z, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_render_distance_stays_beyond_near_plane() {
        let config = CameraConfig { render_distance: 0.0, ..CameraConfig::default() };
        let mut camera = Camera::new(Vec3::zeros(), &config);
        assert_relative_eq!(camera.render_distance, MIN_RENDER_DISTANCE);
        assert!(camera.projection().iter().all(|v| v.is_finite()));

        camera.render_distance = constants::NEAR_PLANE;
        camera.update(1.0);
        assert!(camera.projection().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = camera();
        camera.process_mouse_offset(0.0, 10_000.0);
        assert_eq!(camera.pitch, PITCH_LIMIT);
        camera.process_mouse_offset(0.0, -20_000.0);
        assert_eq!(camera.pitch, -PITCH_LIMIT);
    }

    #[test]
    fn test_keyboard_step_is_capped() {
        let mut camera = camera();
        camera.process_keyboard(CameraMovement::Forward, 1.0 / 60.0);
        assert_relative_eq!(camera.position.z, -1.0, epsilon = 1e-5);

        camera.process_keyboard(CameraMovement::Right, 1.0);
        assert_relative_eq!(camera.position.x, camera.max_velocity, epsilon = 1e-5);
    }

    #[test]
    fn test_zoom_clamps() {
        let mut camera = camera();
        camera.zoom(100.0);
        assert_eq!(camera.fov, 1.0);
        camera.zoom(-100.0);
        assert_eq!(camera.fov, camera.initial_fov());
    }

    #[test]
    fn test_billboard_tracks_position() {
        let mut camera = camera();
        camera.process_keyboard(CameraMovement::Up, 0.1);
        assert_relative_eq!(camera.billboard().transform().position(), camera.position);
    }

    #[test]
    fn test_dragged_billboard_moves_camera() {
        let mut camera = camera();
        camera.transform_mut().set_position(Vec3::new(5.0, 0.0, 0.0));
        Updatable::update(&mut camera, &UpdateContext { delta_time: 0.0, time: 0.0 });
        assert_eq!(camera.position, Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_frustum_culls_behind() {
        let camera = camera();
        assert!(camera.frustum().is_visible(&Vec3::new(0.0, 0.0, -50.0), 1.0));
        assert!(!camera.frustum().is_visible(&Vec3::new(0.0, 0.0, 50.0), 1.0));
    }
}
