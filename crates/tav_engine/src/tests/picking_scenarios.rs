use std::cell::Cell;
use std::rc::Rc;

use approx::assert_relative_eq;

use super::{headless_engine, screen_position};
use crate::foundation::math::{Color, Vec2, Vec3};
use crate::input::{Action, InputEvent, Modifiers, MouseButton};
use crate::picking::{hover_target, Axis, DragState};
use crate::scene::{primitives, EntityId};
use crate::Engine;

fn press(engine: &mut Engine) {
    let event = InputEvent::MouseButton { button: MouseButton::Left, action: Action::Press, modifiers: Modifiers::empty() };
    engine.handle_event(event).unwrap();
}

fn release(engine: &mut Engine) {
    let event = InputEvent::MouseButton { button: MouseButton::Left, action: Action::Release, modifiers: Modifiers::empty() };
    engine.handle_event(event).unwrap();
}

fn move_to(engine: &mut Engine, position: Vec2) {
    engine.handle_event(InputEvent::CursorMoved { position }).unwrap();
}

#[test]
fn click_fires_callback_once_per_release() {
    let mut engine = headless_engine();
    let clicks = Rc::new(Cell::new(0));
    let counter = Rc::clone(&clicks);
    let cube = primitives::cube(None)
        .with_position(Vec3::new(1.0, 1.0, -50.0))
        .with_on_click(Box::new(move |event| {
            assert_eq!(event.tag, "cube");
            counter.set(counter.get() + 1);
        }));
    let id = EntityId::Object(engine.add_object(cube).unwrap());

    let center = screen_position(&engine, Vec3::new(1.0, 1.0, -50.0));
    move_to(&mut engine, center);
    assert!(engine.directory().get(id).unwrap().clickable().is_hovered);

    press(&mut engine);
    release(&mut engine);
    assert_eq!(clicks.get(), 1);
    assert_eq!(engine.picking().selected(), Some(id));

    move_to(&mut engine, center + Vec2::new(1.0, 0.0));
    assert_eq!(clicks.get(), 1);
}

#[test]
fn gizmo_drag_translates_only_the_selected_entity_along_its_axis() {
    let mut engine = headless_engine();
    let origin = Vec3::new(1.0, 1.0, -50.0);
    let target = EntityId::Object(engine.add_object(primitives::cube(None).with_position(origin)).unwrap());
    let bystander_position = Vec3::new(-20.0, 1.0, -50.0);
    let bystander = EntityId::Object(engine.add_object(primitives::cube(None).with_position(bystander_position)).unwrap());
    engine.picking_mut().select(Some(target));

    let handle = screen_position(&engine, origin + Vec3::new(5.0, 0.0, 0.0));
    move_to(&mut engine, handle);
    press(&mut engine);
    assert_eq!(engine.picking().state(), DragState::Dragging);
    assert_eq!(engine.picking().selected_axis(), Some(Axis::X));

    move_to(&mut engine, handle + Vec2::new(30.0, 0.0));
    release(&mut engine);

    let moved = engine.directory().get(target).unwrap().transform().position();
    assert!(moved.x > origin.x);
    assert_relative_eq!(moved.y, origin.y);
    assert_relative_eq!(moved.z, origin.z);
    assert_eq!(engine.directory().get(bystander).unwrap().transform().position(), bystander_position);
    assert_eq!(engine.picking().selected(), Some(target));
}

#[test]
fn press_away_from_the_gizmo_grabs_no_axis() {
    let mut engine = headless_engine();
    let origin = Vec3::new(1.0, 1.0, -50.0);
    let target = EntityId::Object(engine.add_object(primitives::cube(None).with_position(origin)).unwrap());
    engine.picking_mut().select(Some(target));

    move_to(&mut engine, Vec2::new(10.0, 10.0));
    press(&mut engine);
    assert_eq!(engine.picking().selected_axis(), None);
    move_to(&mut engine, Vec2::new(60.0, 10.0));
    release(&mut engine);

    assert_eq!(engine.directory().get(target).unwrap().transform().position(), origin);
}

#[test]
fn hover_colour_eases_toward_target_over_update_ticks() {
    let mut engine = headless_engine();
    let mut app = super::CountingApp::default();
    let origin = Vec3::new(1.0, 1.0, -50.0);
    let cube = primitives::cube(None).with_position(origin).with_color(Color::new(0.2, 0.4, 0.6));
    let id = EntityId::Object(engine.add_object(cube).unwrap());
    let base = engine.directory().get(id).unwrap().base_color();
    let target = hover_target(base, true, engine.config().picking.hover_offset);

    let center = screen_position(&engine, origin);
    move_to(&mut engine, center);
    let mut previous_gap = (target - base).norm();
    for tick in 0..90 {
        engine.frame(f64::from(tick) / 60.0, &mut app).unwrap();
        let color = engine.directory().get(id).unwrap().clickable().hover_color;
        let gap = (target - color).norm();
        assert!(gap <= previous_gap + 1e-6);
        assert!(color.iter().all(|c| *c <= 1.0 + 1e-6));
        previous_gap = gap;
    }
    assert!(previous_gap < 1e-2, "gap after 90 ticks: {}", previous_gap);
}

#[test]
fn active_camera_billboard_is_never_hovered() {
    let mut engine = headless_engine();
    let key = engine.directory().active_camera_key().unwrap();
    move_to(&mut engine, Vec2::new(400.0, 300.0));
    let camera = engine.directory().get(EntityId::Camera(key)).unwrap();
    assert!(!camera.clickable().is_hovered);
}
