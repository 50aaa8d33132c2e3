//! Per-frame input snapshot

use glam::Vec2;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use winit::event::{ElementState, MouseButton};
use winit::keyboard::{KeyCode, ModifiersState};

/// What happened to a key or button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAction {
    /// Went down this frame
    Press,
    /// Went up this frame
    Release,
    /// Held long enough to auto-repeat
    Repeat,
}

impl KeyAction {
    /// Translate a platform element state, taking key repeat into account
    pub fn from_state(state: ElementState, repeat: bool) -> Self {
        match (state, repeat) {
            (ElementState::Pressed, true) => Self::Repeat,
            (ElementState::Pressed, false) => Self::Press,
            (ElementState::Released, _) => Self::Release,
        }
    }
}

/// Last keyboard callback for a key this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Platform scan code (0 when unavailable)
    pub scancode: u32,
    /// Action reported
    pub action: KeyAction,
    /// Modifier keys held at the time
    pub mods: ModifiersState,
}

/// Last callback for a mouse button this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonRecord {
    /// Action reported
    pub action: KeyAction,
    /// Modifier keys held at the time
    pub mods: ModifiersState,
}

/// Cursor position and hover state
///
/// Position is continuous state and survives the end-of-frame clear.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MouseCursor {
    /// Latest position in window coordinates
    pub current: Vec2,
    /// Position before the latest move
    pub previous: Vec2,
    /// `current - previous`, zero when hover continuity was broken
    pub delta: Vec2,
    /// Cursor is inside the window now
    pub on_window: bool,
    /// The previous sample was taken inside the window, with no leave since
    pub previous_on_window: bool,
    /// Changed since the last publish
    pub updated: bool,
}

impl MouseCursor {
    /// Record a new cursor sample.
    ///
    /// A delta is only produced when this sample and the previous one were
    /// both taken inside the window. Otherwise `previous` snaps to the new
    /// position so re-entering the window never yields a jump.
    pub fn move_to(&mut self, position: Vec2) {
        self.updated = true;

        if self.on_window && self.previous_on_window {
            self.previous = self.current;
            self.current = position;
            self.delta = self.current - self.previous;
        } else {
            self.previous = position;
            self.current = position;
            self.delta = Vec2::ZERO;
        }

        self.previous_on_window = self.on_window;
    }

    /// Cursor entered the window
    pub fn enter(&mut self) {
        self.on_window = true;
        self.updated = true;
    }

    /// Cursor left the window; breaks hover continuity
    pub fn leave(&mut self) {
        self.on_window = false;
        self.previous_on_window = false;
        self.delta = Vec2::ZERO;
        self.updated = true;
    }
}

/// Scroll wheel offset for the frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MouseScroll {
    /// Latest reported offset
    pub offset: Vec2,
    /// Changed since the last publish
    pub updated: bool,
}

/// Everything the input layer observed since the last publish.
///
/// This is the payload of the `input` channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSnapshot {
    /// Keys reported this frame, latest callback wins
    pub keyboard: FxHashMap<KeyCode, KeyRecord>,
    /// Mouse buttons reported this frame, latest callback wins
    pub mouse_button: FxHashMap<MouseButton, ButtonRecord>,
    /// Cursor state
    pub mouse_cursor: MouseCursor,
    /// Scroll state
    pub mouse_scroll: MouseScroll,
}

impl InputSnapshot {
    /// Create an empty snapshot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything was recorded since the last clear
    #[must_use]
    pub fn has_activity(&self) -> bool {
        !self.keyboard.is_empty()
            || !self.mouse_button.is_empty()
            || self.mouse_cursor.updated
            || self.mouse_scroll.updated
    }

    /// Action last reported for `key` this frame
    #[must_use]
    pub fn check_key(&self, key: KeyCode) -> Option<KeyAction> {
        self.keyboard.get(&key).map(|record| record.action)
    }

    /// Whether `key` reported exactly `action` this frame
    #[must_use]
    pub fn check_key_action(&self, key: KeyCode, action: KeyAction) -> bool {
        self.check_key(key) == Some(action)
    }

    /// Action last reported for `button` this frame
    #[must_use]
    pub fn check_button(&self, button: MouseButton) -> Option<KeyAction> {
        self.mouse_button.get(&button).map(|record| record.action)
    }

    /// Whether `button` reported exactly `action` this frame
    #[must_use]
    pub fn check_button_action(&self, button: MouseButton, action: KeyAction) -> bool {
        self.check_button(button) == Some(action)
    }

    /// Drop discrete events and reset update flags.
    ///
    /// Cursor position and hover state are kept.
    pub fn clear_frame(&mut self) {
        self.keyboard.clear();
        self.mouse_button.clear();
        self.mouse_cursor.updated = false;
        self.mouse_scroll.updated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inside_at(x: f32, y: f32) -> MouseCursor {
        let mut cursor = MouseCursor::default();
        cursor.enter();
        cursor.move_to(Vec2::new(x, y));
        cursor
    }

    #[test]
    fn test_cursor_delta_with_hover_continuity() {
        let mut cursor = inside_at(10.0, 10.0);
        assert_eq!(cursor.delta, Vec2::ZERO, "First sample has no predecessor");

        cursor.move_to(Vec2::new(15.0, 12.0));
        assert_eq!(cursor.delta, Vec2::new(5.0, 2.0));
        assert_eq!(cursor.previous, Vec2::new(10.0, 10.0));
        assert_eq!(cursor.current, Vec2::new(15.0, 12.0));
    }

    #[test]
    fn test_cursor_reentry_resets_previous() {
        let mut cursor = inside_at(10.0, 10.0);
        cursor.move_to(Vec2::new(15.0, 12.0));

        cursor.leave();
        cursor.enter();
        cursor.move_to(Vec2::new(300.0, 200.0));

        assert_eq!(cursor.delta, Vec2::ZERO);
        assert_eq!(cursor.previous, Vec2::new(300.0, 200.0));

        cursor.move_to(Vec2::new(301.0, 199.0));
        assert_eq!(cursor.delta, Vec2::new(1.0, -1.0));
    }

    #[test]
    fn test_clear_frame_keeps_position() {
        let mut snapshot = InputSnapshot::new();
        snapshot.mouse_cursor = inside_at(4.0, 2.0);
        snapshot.keyboard.insert(
            KeyCode::KeyW,
            KeyRecord {
                scancode: 17,
                action: KeyAction::Press,
                mods: ModifiersState::empty(),
            },
        );
        assert!(snapshot.has_activity());

        snapshot.clear_frame();
        assert!(!snapshot.has_activity());
        assert_eq!(snapshot.mouse_cursor.current, Vec2::new(4.0, 2.0));
        assert!(snapshot.mouse_cursor.on_window);
    }

    #[test]
    fn test_check_key_and_button() {
        let mut snapshot = InputSnapshot::new();
        snapshot.keyboard.insert(
            KeyCode::Escape,
            KeyRecord {
                scancode: 1,
                action: KeyAction::Release,
                mods: ModifiersState::SHIFT,
            },
        );
        snapshot.mouse_button.insert(
            MouseButton::Left,
            ButtonRecord {
                action: KeyAction::Press,
                mods: ModifiersState::empty(),
            },
        );

        assert_eq!(snapshot.check_key(KeyCode::Escape), Some(KeyAction::Release));
        assert!(snapshot.check_key_action(KeyCode::Escape, KeyAction::Release));
        assert!(!snapshot.check_key_action(KeyCode::Escape, KeyAction::Press));
        assert_eq!(snapshot.check_key(KeyCode::Space), None);
        assert!(snapshot.check_button_action(MouseButton::Left, KeyAction::Press));
        assert_eq!(snapshot.check_button(MouseButton::Right), None);
    }

    #[test]
    fn test_key_action_from_state() {
        assert_eq!(
            KeyAction::from_state(ElementState::Pressed, false),
            KeyAction::Press
        );
        assert_eq!(
            KeyAction::from_state(ElementState::Pressed, true),
            KeyAction::Repeat
        );
        assert_eq!(
            KeyAction::from_state(ElementState::Released, true),
            KeyAction::Release
        );
    }
}
