//! Input events delivered by the window layer
//!
//! The window layer polls the OS and translates its events into
//! [`InputEvent`]s; the engine consumes them synchronously between frames.
//! [`KeyState`] keeps which keys are held so camera movement can run once per
//! update tick rather than once per repeat event.

use std::collections::HashSet;

use bitflags::bitflags;

use crate::foundation::math::Vec2;

/// A discrete event from the window layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Keyboard key changed state
    Key {
        /// Which key
        key: KeyCode,
        /// Press, release or repeat
        action: Action,
        /// Modifier keys held at the time
        modifiers: Modifiers,
    },
    /// Mouse button changed state
    MouseButton {
        /// Which button
        button: MouseButton,
        /// Press or release
        action: Action,
        /// Modifier keys held at the time
        modifiers: Modifiers,
    },
    /// Cursor moved, in window pixels from the top-left corner
    CursorMoved {
        /// New position
        position: Vec2,
    },
    /// Scroll wheel
    Scroll {
        /// Horizontal offset
        x: f32,
        /// Vertical offset
        y: f32,
    },
    /// Framebuffer size changed
    Resized {
        /// New width in pixels
        width: u32,
        /// New height in pixels
        height: u32,
    },
    /// Window close requested
    CloseRequested,
}

/// Key or button transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Went down
    Press,
    /// Went up
    Release,
    /// Held long enough to auto-repeat
    Repeat,
}

bitflags! {
    /// Modifier keys
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        /// Either shift key
        const SHIFT = 1 << 0;
        /// Either control key
        const CONTROL = 1 << 1;
        /// Either alt key
        const ALT = 1 << 2;
        /// Super / command key
        const SUPER = 1 << 3;
    }
}

/// Key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A key
    A,
    /// C key
    C,
    /// D key
    D,
    /// E key
    E,
    /// F key
    F,
    /// Q key
    Q,
    /// R key
    R,
    /// S key
    S,
    /// W key
    W,
    /// Space key
    Space,
    /// Enter key
    Enter,
    /// Escape key
    Escape,
    /// Backtick / tilde key
    GraveAccent,
    /// Left shift
    LeftShift,
    /// Left control
    LeftControl,
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
    /// Anything the engine has no binding for
    Unknown,
}

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button
    Left,
    /// Right mouse button
    Right,
    /// Middle mouse button
    Middle,
}

/// Set of keys currently held down
#[derive(Debug, Clone, Default)]
pub struct KeyState {
    held: HashSet<KeyCode>,
}

impl KeyState {
    /// Create with nothing held
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key transition; repeats keep the key held
    pub fn apply(&mut self, key: KeyCode, action: Action) {
        match action {
            Action::Press | Action::Repeat => {
                self.held.insert(key);
            }
            Action::Release => {
                self.held.remove(&key);
            }
        }
    }

    /// True while `key` is down
    pub fn is_held(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }

    /// Forget every held key (focus loss, cursor release)
    pub fn clear(&mut self) {
        self.held.clear();
    }

    /// Keys currently held, in no particular order
    pub fn held(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.held.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_state_tracks_press_and_release() {
        let mut keys = KeyState::new();
        keys.apply(KeyCode::W, Action::Press);
        keys.apply(KeyCode::W, Action::Repeat);
        assert!(keys.is_held(KeyCode::W));

        keys.apply(KeyCode::W, Action::Release);
        assert!(!keys.is_held(KeyCode::W));
        assert_eq!(keys.held().count(), 0);
    }

    #[test]
    fn test_release_of_unheld_key_is_ignored() {
        let mut keys = KeyState::new();
        keys.apply(KeyCode::Space, Action::Release);
        assert!(!keys.is_held(KeyCode::Space));
    }

    #[test]
    fn test_modifier_flags_combine() {
        let mods = Modifiers::CONTROL | Modifiers::SHIFT;
        assert!(mods.contains(Modifiers::CONTROL));
        assert!(!mods.contains(Modifiers::ALT));
    }
}
