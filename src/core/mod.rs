//! Core engine module
//!
//! Contains the event registry, the frame driver and the main Engine struct

pub mod config;
pub mod events;
mod engine;
mod time;

pub use config::{ConfigError, EngineConfig};
pub use engine::{Engine, EngineContext, FrameDriver, Game, QuitHandle};
pub use events::{
    DispatchPolicy, EventChannel, EventError, EventKey, EventRegistry, SubscriberId, WindowSize,
};
pub use time::Time;
