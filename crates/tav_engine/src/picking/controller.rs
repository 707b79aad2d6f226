//! Press / drag / release state machine
//!
//! ```text
//!          press                       release
//!   Idle ─────────▶ Dragging ─────────────────▶ Idle
//!                    │  ▲   cursor move:
//!                    └──┘   look, gizmo translate, advance previous cursor
//! ```
//!
//! Hover truth is recomputed on every cursor move; hover colours are eased
//! once per update tick by [`PickingController::update_hover`]. Everything
//! runs on the main thread between frames, so the next render pass always
//! sees the state the last event produced.

use crate::camera::Camera;
use crate::foundation::math::{cursor_to_ndc, Mat4, Mat4Ext, Vec2, Vec3};
use crate::picking::gizmo::{constrain_to_axis, select_axis, Axis};
use crate::picking::hover::smooth_hover_color;
use crate::picking::ray::generate_ray;
use crate::picking::screen::is_point_inside_3d_obj;
use crate::picking::PickingConfig;
use crate::scene::directory::{EntityId, SceneDirectory};
use crate::scene::entity::ClickEvent;

/// Left-button state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    /// Button up
    #[default]
    Idle,
    /// Button held
    Dragging,
}

/// Hover, selection and gizmo drag driven by cursor events
#[derive(Debug, Default)]
pub struct PickingController {
    config: PickingConfig,
    state: DragState,
    cursor: Vec2,
    previous_cursor: Vec2,
    press_cursor: Vec2,
    look_anchor: Option<Vec2>,
    selected: Option<EntityId>,
    selected_axis: Option<Axis>,
}

impl PickingController {
    /// Create an idle controller
    pub fn new(config: PickingConfig) -> Self {
        Self { config, ..Self::default() }
    }

    /// Parameters in use
    pub fn config(&self) -> &PickingConfig {
        &self.config
    }

    /// Current button state
    pub fn state(&self) -> DragState {
        self.state
    }

    /// True while the left button is held
    pub fn is_dragging(&self) -> bool {
        self.state == DragState::Dragging
    }

    /// Last cursor position in window pixels
    pub fn cursor(&self) -> Vec2 {
        self.cursor
    }

    /// Entity the gizmo is attached to
    pub fn selected(&self) -> Option<EntityId> {
        self.selected
    }

    /// Axis grabbed by the current drag
    pub fn selected_axis(&self) -> Option<Axis> {
        self.selected_axis
    }

    /// Attach the gizmo to an entity (or detach it)
    pub fn select(&mut self, entity: Option<EntityId>) {
        self.selected = entity;
        self.selected_axis = None;
    }

    /// Handle a cursor move
    ///
    /// While dragging: turn the active camera by the raw cursor delta, move
    /// the selected entity along the grabbed axis, then advance the previous
    /// cursor. Always: recompute hover flags.
    pub fn cursor_moved(&mut self, position: Vec2, directory: &mut SceneDirectory, viewport: Vec2) {
        self.cursor = position;
        if self.is_dragging() {
            self.apply_look(position, directory);
            self.apply_gizmo(directory, viewport);
            self.previous_cursor = position;
        }
        self.refresh_hover(directory, viewport);
    }

    /// Handle a left-button press: start dragging and try to grab an axis
    pub fn mouse_pressed(&mut self, directory: &SceneDirectory, viewport: Vec2) {
        self.state = DragState::Dragging;
        self.look_anchor = None;
        self.previous_cursor = self.cursor;
        self.press_cursor = self.cursor;
        self.selected_axis = self.grab_axis(directory, viewport);
        if let Some(axis) = self.selected_axis {
            log::debug!("Grabbed gizmo axis {:?} of {:?}", axis, self.selected);
        }
    }

    /// Handle a left-button release
    ///
    /// Fires the click callback of every hovered entity exactly once. A
    /// release close to the press point is a click and moves the selection
    /// to the nearest hovered entity, or clears it.
    ///
    /// # Returns
    /// Number of callbacks fired
    pub fn mouse_released(&mut self, directory: &mut SceneDirectory) -> usize {
        let was_click = (self.cursor - self.press_cursor).norm() < self.config.drag_threshold;
        self.state = DragState::Idle;
        self.selected_axis = None;
        self.look_anchor = None;

        let mut fired = 0;
        for id in directory.pickable_ids() {
            let Some(entity) = directory.get_mut(id) else { continue };
            if !entity.clickable().is_hovered || !entity.clickable().has_on_click() {
                continue;
            }
            let event = ClickEvent { entity: id, tag: entity.tag().to_string() };
            if entity.clickable_mut().fire(&event) {
                log::debug!("Clicked '{}'", event.tag);
                fired += 1;
            }
        }

        if was_click {
            self.selected = self.nearest_hovered(directory);
        }
        fired
    }

    /// Ease every entity's hover colour one tick toward its target
    pub fn update_hover(&self, directory: &mut SceneDirectory, delta_time: f32) {
        let (offset, rate) = (self.config.hover_offset, self.config.hover_rate);
        directory.for_each_visible(|_, entity| {
            let base = entity.base_color();
            let clickable = entity.clickable_mut();
            clickable.hover_color = smooth_hover_color(clickable.hover_color, base, clickable.is_hovered, offset, rate, delta_time);
        });
    }

    fn apply_look(&mut self, position: Vec2, directory: &mut SceneDirectory) {
        // the first move after a press only sets the anchor
        let anchor = self.look_anchor.replace(position).unwrap_or(position);
        let (dx, dy) = (position.x - anchor.x, anchor.y - position.y);
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        if let Some(camera) = directory.active_camera_mut() {
            camera.process_mouse_offset(dx, dy);
        }
    }

    fn apply_gizmo(&self, directory: &mut SceneDirectory, viewport: Vec2) {
        let (Some(id), Some(axis)) = (self.selected, self.selected_axis) else { return };
        let Some(view_projection) = directory.active_camera().map(Camera::view_projection) else { return };
        let Some(entity) = directory.get_mut(id).filter(|e| e.exists()) else { return };

        let position = entity.transform().position();
        let delta = constrain_to_axis(self.world_delta(&view_projection, position, viewport), axis);
        entity.transform_mut().translate(delta);
    }

    /// World-space motion between the previous and current cursor, measured
    /// at the depth of `anchor`
    fn world_delta(&self, view_projection: &Mat4, anchor: Vec3, viewport: Vec2) -> Vec3 {
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return Vec3::zeros();
        }
        let Some(inverse) = view_projection.try_inverse() else { return Vec3::zeros() };
        let Some(depth) = view_projection.project_point(&anchor).map(|ndc| ndc.z) else { return Vec3::zeros() };

        let unproject = |cursor: Vec2| {
            let ndc = cursor_to_ndc(cursor, viewport.x, viewport.y);
            inverse.unproject_ndc(&Vec3::new(ndc.x, ndc.y, depth))
        };
        match (unproject(self.cursor), unproject(self.previous_cursor)) {
            (Some(current), Some(previous)) => current - previous,
            _ => Vec3::zeros(),
        }
    }

    fn grab_axis(&self, directory: &SceneDirectory, viewport: Vec2) -> Option<Axis> {
        let entity = directory.get(self.selected?).filter(|e| e.exists())?;
        let camera = directory.active_camera()?;
        let ray = generate_ray(&camera.view_projection(), self.cursor, viewport)?;
        select_axis(
            &ray,
            entity.transform().position(),
            self.config.gizmo_length,
            self.config.axis_threshold,
            self.config.axis_distance,
            self.config.tie_break,
        )
    }

    fn refresh_hover(&self, directory: &mut SceneDirectory, viewport: Vec2) {
        let Some(view_projection) = directory.active_camera().map(Camera::view_projection) else { return };
        let pickable = directory.pickable_ids();
        let cursor = self.cursor;
        directory.for_each_visible(|id, entity| {
            let hovered = pickable.contains(&id)
                && entity.bounding_box().is_some_and(|bounds| {
                    is_point_inside_3d_obj(bounds, &entity.transform().compute_matrix(), &view_projection, cursor, viewport)
                });
            entity.clickable_mut().is_hovered = hovered;
        });
    }

    fn nearest_hovered(&self, directory: &SceneDirectory) -> Option<EntityId> {
        let eye = directory.active_camera().map_or_else(Vec3::zeros, |c| c.position);
        directory
            .pickable_ids()
            .into_iter()
            .filter_map(|id| {
                let entity = directory.get(id)?;
                entity.clickable().is_hovered.then(|| (id, (entity.transform().position() - eye).norm()))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;
    use crate::camera::CameraConfig;
    use crate::render::geometry::GeometryRegistry;
    use crate::scene::directory::ObjectKey;
    use crate::scene::primitives;
    use std::cell::Cell;
    use std::rc::Rc;

    const VIEWPORT: Vec2 = Vec2::new(800.0, 600.0);

    struct Fixture {
        directory: SceneDirectory,
        cube: ObjectKey,
        clicks: Rc<Cell<u32>>,
    }

    fn fixture() -> Fixture {
        let mut device = HeadlessDevice::new();
        let mut registry = GeometryRegistry::new();
        let mut directory = SceneDirectory::new();
        let mut camera = Camera::new(Vec3::zeros(), &CameraConfig::default());
        camera.update(VIEWPORT.x / VIEWPORT.y);
        directory.add_camera(&mut device, &mut registry, camera).unwrap();

        let clicks = Rc::new(Cell::new(0));
        let counter = Rc::clone(&clicks);
        let cube = primitives::cube(None)
            .with_position(Vec3::new(0.0, 0.0, -50.0))
            .with_on_click(Box::new(move |_| counter.set(counter.get() + 1)));
        let cube = directory.add_object(&mut device, &mut registry, cube).unwrap();
        Fixture { directory, cube, clicks }
    }

    fn to_pixels(directory: &SceneDirectory, world: Vec3) -> Vec2 {
        let ndc = directory.active_camera().unwrap().view_projection().project_point(&world).unwrap();
        Vec2::new((ndc.x + 1.0) * 0.5 * VIEWPORT.x, (1.0 - ndc.y) * 0.5 * VIEWPORT.y)
    }

    #[test]
    fn test_hover_follows_cursor() {
        let mut fx = fixture();
        let mut picking = PickingController::new(PickingConfig::default());
        let id = EntityId::Object(fx.cube);

        picking.cursor_moved(Vec2::new(400.0, 300.0), &mut fx.directory, VIEWPORT);
        assert!(fx.directory.get(id).unwrap().clickable().is_hovered);

        picking.cursor_moved(Vec2::new(5.0, 5.0), &mut fx.directory, VIEWPORT);
        assert!(!fx.directory.get(id).unwrap().clickable().is_hovered);
    }

    #[test]
    fn test_click_fires_once_and_selects() {
        let mut fx = fixture();
        let mut picking = PickingController::new(PickingConfig::default());

        picking.cursor_moved(Vec2::new(400.0, 300.0), &mut fx.directory, VIEWPORT);
        picking.mouse_pressed(&fx.directory, VIEWPORT);
        assert_eq!(picking.mouse_released(&mut fx.directory), 1);
        assert_eq!(fx.clicks.get(), 1);
        assert_eq!(picking.selected(), Some(EntityId::Object(fx.cube)));

        // hovering on across frames does not fire again
        picking.cursor_moved(Vec2::new(401.0, 300.0), &mut fx.directory, VIEWPORT);
        picking.update_hover(&mut fx.directory, 1.0 / 60.0);
        assert_eq!(fx.clicks.get(), 1);
    }

    #[test]
    fn test_click_on_empty_space_clears_selection() {
        let mut fx = fixture();
        let mut picking = PickingController::new(PickingConfig::default());
        picking.select(Some(EntityId::Object(fx.cube)));

        picking.cursor_moved(Vec2::new(5.0, 5.0), &mut fx.directory, VIEWPORT);
        picking.mouse_pressed(&fx.directory, VIEWPORT);
        assert_eq!(picking.mouse_released(&mut fx.directory), 0);
        assert_eq!(picking.selected(), None);
    }

    #[test]
    fn test_drag_moves_selected_entity_along_axis_only() {
        let mut fx = fixture();
        let mut picking = PickingController::new(PickingConfig::default());
        let id = EntityId::Object(fx.cube);
        picking.select(Some(id));

        let handle = to_pixels(&fx.directory, Vec3::new(5.0, 0.0, -50.0));
        picking.cursor_moved(handle, &mut fx.directory, VIEWPORT);
        picking.mouse_pressed(&fx.directory, VIEWPORT);
        assert_eq!(picking.selected_axis(), Some(Axis::X));

        picking.cursor_moved(handle + Vec2::new(40.0, 25.0), &mut fx.directory, VIEWPORT);
        let position = fx.directory.get(id).unwrap().transform().position();
        assert!(position.x > 0.0);
        assert_eq!(position.y, 0.0);
        assert_eq!(position.z, -50.0);

        picking.mouse_released(&mut fx.directory);
        assert_eq!(picking.selected(), Some(id));
        assert_eq!(picking.selected_axis(), None);
        assert_eq!(picking.state(), DragState::Idle);
    }

    #[test]
    fn test_drag_turns_the_camera_after_first_move() {
        let mut fx = fixture();
        let mut picking = PickingController::new(PickingConfig::default());
        let yaw = fx.directory.active_camera().unwrap().yaw;

        picking.cursor_moved(Vec2::new(100.0, 100.0), &mut fx.directory, VIEWPORT);
        picking.mouse_pressed(&fx.directory, VIEWPORT);
        picking.cursor_moved(Vec2::new(150.0, 100.0), &mut fx.directory, VIEWPORT);
        assert_eq!(fx.directory.active_camera().unwrap().yaw, yaw);

        picking.cursor_moved(Vec2::new(160.0, 100.0), &mut fx.directory, VIEWPORT);
        approx::assert_relative_eq!(fx.directory.active_camera().unwrap().yaw, yaw + 2.0, epsilon = 1e-4);
    }
}
