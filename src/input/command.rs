//! Logical Actions for Physical Keys
//!
//! Controllers react to what the player wants to do, not to which key was
//! pressed. `InputMapper` translates the keys reported in an
//! `InputSnapshot` into `InputAction`s and supports runtime rebinding.
//!
//! # Example
//!
//! ```ignore
//! let mapper = InputMapper::with_defaults();
//!
//! for (action, key_action) in mapper.actions(snapshot) {
//!     match (action, key_action) {
//!         (InputAction::MoveForward, KeyAction::Press) => self.forward = true,
//!         (InputAction::MoveForward, KeyAction::Release) => self.forward = false,
//!         _ => {}
//!     }
//! }
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use winit::keyboard::KeyCode;

use super::state::{InputSnapshot, KeyAction};

/// What the player wants to do, independent of the key that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum InputAction {
    /// Move along the view direction
    MoveForward,
    /// Move against the view direction
    MoveBackward,
    /// Strafe left
    MoveLeft,
    /// Strafe right
    MoveRight,
    /// Move up in world space
    MoveUp,
    /// Move down in world space
    MoveDown,
    /// Speed multiplier while held
    Sprint,
    /// Release the controller / open the menu
    Pause,
}

/// Rebindable map from physical keys to logical actions.
#[derive(Debug, Clone, Default)]
pub struct InputMapper {
    /// Key to action bindings
    key_bindings: FxHashMap<KeyCode, InputAction>,
    /// Reverse lookup for displaying bindings
    action_keys: FxHashMap<InputAction, Vec<KeyCode>>,
}

impl InputMapper {
    /// Create an empty mapper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mapper with WASD fly-camera bindings.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut mapper = Self::new();

        mapper.bind(KeyCode::KeyW, InputAction::MoveForward);
        mapper.bind(KeyCode::KeyS, InputAction::MoveBackward);
        mapper.bind(KeyCode::KeyA, InputAction::MoveLeft);
        mapper.bind(KeyCode::KeyD, InputAction::MoveRight);

        mapper.bind(KeyCode::ArrowUp, InputAction::MoveForward);
        mapper.bind(KeyCode::ArrowDown, InputAction::MoveBackward);
        mapper.bind(KeyCode::ArrowLeft, InputAction::MoveLeft);
        mapper.bind(KeyCode::ArrowRight, InputAction::MoveRight);

        mapper.bind(KeyCode::Space, InputAction::MoveUp);
        mapper.bind(KeyCode::ControlLeft, InputAction::MoveDown);
        mapper.bind(KeyCode::ShiftLeft, InputAction::Sprint);
        mapper.bind(KeyCode::Escape, InputAction::Pause);

        mapper
    }

    /// Bind a key to an action, replacing any previous binding of the key.
    pub fn bind(&mut self, key: KeyCode, action: InputAction) {
        self.unbind(key);
        self.key_bindings.insert(key, action);
        self.action_keys.entry(action).or_default().push(key);
    }

    /// Remove a key's binding.
    pub fn unbind(&mut self, key: KeyCode) {
        if let Some(action) = self.key_bindings.remove(&key) {
            if let Some(keys) = self.action_keys.get_mut(&action) {
                keys.retain(|k| *k != key);
            }
        }
    }

    /// Action bound to `key`, if any.
    #[must_use]
    pub fn get_action(&self, key: KeyCode) -> Option<InputAction> {
        self.key_bindings.get(&key).copied()
    }

    /// Keys bound to `action`.
    #[must_use]
    pub fn get_keys(&self, action: InputAction) -> &[KeyCode] {
        self.action_keys
            .get(&action)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Mapped actions reported in `snapshot`, with what happened to each.
    pub fn actions<'a>(
        &'a self,
        snapshot: &'a InputSnapshot,
    ) -> impl Iterator<Item = (InputAction, KeyAction)> + 'a {
        snapshot
            .keyboard
            .iter()
            .filter_map(|(key, record)| self.get_action(*key).map(|a| (a, record.action)))
    }

    /// Whether any key bound to `action` reported `key_action` this frame.
    #[must_use]
    pub fn triggered(
        &self,
        action: InputAction,
        key_action: KeyAction,
        snapshot: &InputSnapshot,
    ) -> bool {
        self.get_keys(action)
            .iter()
            .any(|key| snapshot.check_key_action(*key, key_action))
    }
}

#[cfg(test)]
mod tests {
    use winit::keyboard::ModifiersState;

    use super::*;
    use crate::input::KeyRecord;

    fn snapshot_with(keys: &[(KeyCode, KeyAction)]) -> InputSnapshot {
        let mut snapshot = InputSnapshot::new();
        for &(key, action) in keys {
            snapshot.keyboard.insert(
                key,
                KeyRecord {
                    scancode: 0,
                    action,
                    mods: ModifiersState::empty(),
                },
            );
        }
        snapshot
    }

    #[test]
    fn test_input_mapper_rebind() {
        let mut mapper = InputMapper::with_defaults();
        assert_eq!(
            mapper.get_action(KeyCode::KeyW),
            Some(InputAction::MoveForward)
        );

        mapper.bind(KeyCode::KeyW, InputAction::MoveUp);
        assert_eq!(mapper.get_action(KeyCode::KeyW), Some(InputAction::MoveUp));
        assert!(
            !mapper
                .get_keys(InputAction::MoveForward)
                .contains(&KeyCode::KeyW)
        );
        assert!(
            mapper
                .get_keys(InputAction::MoveForward)
                .contains(&KeyCode::ArrowUp)
        );
    }

    #[test]
    fn test_input_mapper_unbind() {
        let mut mapper = InputMapper::with_defaults();

        mapper.unbind(KeyCode::Escape);
        assert!(mapper.get_action(KeyCode::Escape).is_none());
        assert!(mapper.get_keys(InputAction::Pause).is_empty());
    }

    #[test]
    fn test_actions_from_snapshot() {
        let mapper = InputMapper::with_defaults();
        let snapshot = snapshot_with(&[
            (KeyCode::KeyW, KeyAction::Press),
            (KeyCode::KeyQ, KeyAction::Press),
        ]);

        let actions: Vec<_> = mapper.actions(&snapshot).collect();
        assert_eq!(actions, vec![(InputAction::MoveForward, KeyAction::Press)]);
    }

    #[test]
    fn test_triggered_checks_every_bound_key() {
        let mapper = InputMapper::with_defaults();
        let snapshot = snapshot_with(&[(KeyCode::ArrowLeft, KeyAction::Release)]);

        assert!(mapper.triggered(InputAction::MoveLeft, KeyAction::Release, &snapshot));
        assert!(!mapper.triggered(InputAction::MoveLeft, KeyAction::Press, &snapshot));
        assert!(!mapper.triggered(InputAction::MoveRight, KeyAction::Release, &snapshot));
    }
}
