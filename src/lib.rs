//! An event-driven frame engine built in Rust
//!
//! This engine provides:
//! - Named, typed event channels with ordered subscriber lists
//! - Per-frame input snapshots published on the `input` channel
//! - Controllers that subscribe and unsubscribe as they toggle
//! - A winit main loop publishing update and render phases

pub mod core;
pub mod input;
pub mod math;
pub mod renderer;

// Re-exports for convenience
pub use glam;
pub use winit;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::core::events;
    pub use crate::core::{
        DispatchPolicy, Engine, EngineConfig, EngineContext, EventRegistry, FrameDriver, Game,
        QuitHandle, SubscriberId, Time, WindowSize,
    };
    pub use crate::input::{
        Controller, InputAction, InputMapper, InputSnapshot, KeyAction, PlayerController,
    };
    pub use crate::math::VectorExt;
    pub use crate::renderer::{Camera, FreeFlightCamera, Projection};
    pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
    pub use winit::keyboard::KeyCode;
}
