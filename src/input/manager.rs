//! Input polling and per-frame publishing
//!
//! Platform callbacks write into a single `InputSnapshot` as they arrive.
//! Once per frame `InputManager::update` publishes that snapshot on the
//! `input` channel and clears the discrete parts of it.

use glam::Vec2;
use winit::event::{MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};

use super::state::{ButtonRecord, InputSnapshot, KeyAction, KeyRecord};
use crate::core::events::{self, EventError, EventRegistry};

/// Collects platform input and publishes it once per frame
#[derive(Debug)]
pub struct InputManager {
    registry: EventRegistry,
    snapshot: InputSnapshot,
    /// Modifiers currently held, stamped onto key and button records
    modifiers: ModifiersState,
    /// Frames in which a snapshot was actually published
    published_frames: u64,
}

impl InputManager {
    /// Create an input manager publishing through `registry`
    pub fn new(registry: EventRegistry) -> Self {
        Self {
            registry,
            snapshot: InputSnapshot::new(),
            modifiers: ModifiersState::empty(),
            published_frames: 0,
        }
    }

    /// Publish this frame's snapshot, then clear it.
    ///
    /// Frames without any key, button, cursor or scroll activity publish
    /// nothing. Returns whether a snapshot was published.
    ///
    /// # Errors
    ///
    /// Propagates a failing `input` subscriber. The snapshot is cleared
    /// either way, so a failure never replays stale input.
    pub fn update(&mut self) -> Result<bool, EventError> {
        if !self.snapshot.has_activity() {
            return Ok(false);
        }

        log::trace!(
            "Publishing input: {} key(s), {} button(s)",
            self.snapshot.keyboard.len(),
            self.snapshot.mouse_button.len()
        );
        let result = self.registry.invoke(events::INPUT, &self.snapshot);
        self.snapshot.clear_frame();
        self.published_frames += 1;

        result.map(|()| true)
    }

    /// Keyboard callback
    pub fn on_key(&mut self, key: KeyCode, scancode: u32, action: KeyAction) {
        self.snapshot.keyboard.insert(
            key,
            KeyRecord {
                scancode,
                action,
                mods: self.modifiers,
            },
        );
    }

    /// Mouse button callback
    pub fn on_mouse_button(&mut self, button: MouseButton, action: KeyAction) {
        self.snapshot.mouse_button.insert(
            button,
            ButtonRecord {
                action,
                mods: self.modifiers,
            },
        );
    }

    /// Cursor position callback
    pub fn on_cursor_moved(&mut self, position: Vec2) {
        self.snapshot.mouse_cursor.move_to(position);
    }

    /// Cursor entered the window
    pub fn on_cursor_entered(&mut self) {
        self.snapshot.mouse_cursor.enter();
    }

    /// Cursor left the window
    pub fn on_cursor_left(&mut self) {
        self.snapshot.mouse_cursor.leave();
    }

    /// Scroll callback; the latest offset of the frame wins
    pub fn on_scroll(&mut self, offset: Vec2) {
        let scroll = &mut self.snapshot.mouse_scroll;
        scroll.offset = offset;
        scroll.updated = true;
    }

    /// Modifier state changed
    pub fn on_modifiers_changed(&mut self, modifiers: ModifiersState) {
        self.modifiers = modifiers;
    }

    /// Feed a winit window event. Returns whether it was an input event.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    let action = KeyAction::from_state(event.state, event.repeat);
                    self.on_key(key, scancode(event.physical_key), action);
                }
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.on_modifiers_changed(modifiers.state());
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.on_mouse_button(*button, KeyAction::from_state(*state, false));
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.on_cursor_moved(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorEntered { .. } => self.on_cursor_entered(),
            WindowEvent::CursorLeft { .. } => self.on_cursor_left(),
            WindowEvent::MouseWheel { delta, .. } => {
                let offset = match delta {
                    MouseScrollDelta::LineDelta(x, y) => Vec2::new(*x, *y),
                    MouseScrollDelta::PixelDelta(pos) => Vec2::new(pos.x as f32, pos.y as f32),
                };
                self.on_scroll(offset);
            }
            _ => return false,
        }
        true
    }

    /// The snapshot being accumulated for the current frame
    pub fn snapshot(&self) -> &InputSnapshot {
        &self.snapshot
    }

    /// Action last reported for `key` this frame
    pub fn check_key(&self, key: KeyCode) -> Option<KeyAction> {
        self.snapshot.check_key(key)
    }

    /// Whether `key` reported exactly `action` this frame
    pub fn check_key_action(&self, key: KeyCode, action: KeyAction) -> bool {
        self.snapshot.check_key_action(key, action)
    }

    /// Action last reported for `button` this frame
    pub fn check_button(&self, button: MouseButton) -> Option<KeyAction> {
        self.snapshot.check_button(button)
    }

    /// Whether `button` reported exactly `action` this frame
    pub fn check_button_action(&self, button: MouseButton, action: KeyAction) -> bool {
        self.snapshot.check_button_action(button, action)
    }

    /// Number of frames that published a snapshot
    pub fn published_frames(&self) -> u64 {
        self.published_frames
    }

    /// Registry this manager publishes through
    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }
}

#[cfg(any(
    target_os = "windows",
    target_os = "macos",
    target_os = "linux",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
fn scancode(key: PhysicalKey) -> u32 {
    use winit::platform::scancode::PhysicalKeyExtScancode;
    key.to_scancode().unwrap_or(0)
}

#[cfg(not(any(
    target_os = "windows",
    target_os = "macos",
    target_os = "linux",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
fn scancode(_key: PhysicalKey) -> u32 {
    0
}
