//! Rendering module
//!
//! Cameras that follow the window through `onWindowResize` and fly on input.

mod camera;

pub use camera::{Camera, FreeFlightCamera, Projection};
