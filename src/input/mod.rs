//! Input handling module
//!
//! Accumulates platform input into a per-frame snapshot, publishes it on the
//! `input` channel and defines the controller contract for its consumers.

mod command;
mod controller;
mod manager;
mod state;

pub use command::{InputAction, InputMapper};
pub use controller::{Controller, PlayerController};
pub use manager::InputManager;
pub use state::{ButtonRecord, InputSnapshot, KeyAction, KeyRecord, MouseCursor, MouseScroll};
