//! Cameras as event consumers

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashSet;
use winit::keyboard::KeyCode;

use crate::core::events::{self, EventRegistry, SubscriberId, WindowSize};
use crate::input::{InputAction, InputMapper, InputSnapshot, KeyAction, PlayerController};

/// Projection model of a camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Field-of-view based perspective
    Perspective,
    /// Parallel projection covering `Camera::ortho_size` world units
    Orthographic,
}

/// Camera with cached view and projection matrices
#[derive(Debug, Clone)]
pub struct Camera {
    /// Projection model
    pub projection_kind: Projection,
    /// Color the render target is cleared to
    pub clear_color: Vec4,
    /// Camera position in world space
    pub position: Vec3,
    /// Direction the camera is looking at
    pub direction: Vec3,
    /// Up vector
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov: f32,
    /// Near clipping plane
    pub near: f32,
    /// Far clipping plane
    pub far: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    /// Visible extent for orthographic projection
    pub ortho_size: Vec2,
    /// Yaw angle (rotation around Y axis)
    yaw: f32,
    /// Pitch angle (rotation around X axis)
    pitch: f32,
    view: Mat4,
    projection: Mat4,
    view_projection: Mat4,
}

impl Camera {
    /// Create a camera looking down -Z from `(0, 0, 5)`
    pub fn new(projection_kind: Projection, clear_color: Vec4, fov: f32) -> Self {
        let mut camera = Self {
            projection_kind,
            clear_color,
            position: Vec3::new(0.0, 0.0, 5.0),
            direction: Vec3::NEG_Z,
            up: Vec3::Y,
            fov,
            near: 0.1,
            far: 100.0,
            aspect: 16.0 / 9.0,
            ortho_size: Vec2::new(16.0, 9.0),
            yaw: -90.0_f32.to_radians(),
            pitch: 0.0,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
        };
        camera.calculate_projection();
        camera.update();
        camera
    }

    /// Perspective camera with a 45 degree field of view
    pub fn perspective() -> Self {
        Self::new(
            Projection::Perspective,
            Vec4::new(0.0, 0.0, 0.0, 1.0),
            std::f32::consts::FRAC_PI_4,
        )
    }

    /// Orthographic camera covering `size` world units
    pub fn orthographic(size: Vec2) -> Self {
        let mut camera = Self::new(Projection::Orthographic, Vec4::new(0.0, 0.0, 0.0, 1.0), 0.0);
        camera.ortho_size = size;
        camera.calculate_projection();
        camera.update();
        camera
    }

    /// Place the camera at `position` looking at `target`
    ///
    /// Pitch is clamped like `rotate`, so a target straight above or below
    /// leaves the camera just short of vertical.
    pub fn look_at(mut self, position: Vec3, target: Vec3) -> Self {
        let direction = (target - position).normalize_or(self.direction);
        self.position = position;
        self.yaw = direction.z.atan2(direction.x);
        self.pitch = direction.y.clamp(-1.0, 1.0).asin();
        self.apply_angles();
        self.update();
        self
    }

    /// Recompute the view and combined matrices from the current transform
    pub fn update(&mut self) {
        self.view = Mat4::look_at_rh(self.position, self.position + self.direction, self.up);
        self.view_projection = self.projection * self.view;
    }

    /// Adopt the new framebuffer aspect ratio
    pub fn on_window_resize(&mut self, size: &WindowSize) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.aspect = size.aspect_ratio();
        self.calculate_projection();
        self.view_projection = self.projection * self.view;
    }

    /// Keep `camera` in sync with `onWindowResize`
    pub fn bind_resize(camera: &Rc<RefCell<Camera>>, registry: &EventRegistry) -> SubscriberId {
        registry.subscribe_method(events::ON_WINDOW_RESIZE, camera, Camera::on_window_resize)
    }

    fn calculate_projection(&mut self) {
        self.projection = match self.projection_kind {
            Projection::Perspective => {
                Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
            }
            Projection::Orthographic => {
                let half = self.ortho_size * 0.5;
                Mat4::orthographic_rh(-half.x, half.x, -half.y, half.y, self.near, self.far)
            }
        };
    }

    /// View matrix as of the last `update`
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// Projection matrix
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Projection times view
    pub fn view_projection(&self) -> Mat4 {
        self.view_projection
    }

    /// Rotate camera by a cursor delta
    pub fn rotate(&mut self, delta_x: f32, delta_y: f32, sensitivity: f32) {
        self.yaw += delta_x * sensitivity;
        self.pitch -= delta_y * sensitivity;
        self.apply_angles();
    }

    fn apply_angles(&mut self) {
        // Clamp pitch to avoid gimbal lock
        let max_pitch = 89.0_f32.to_radians();
        self.pitch = self.pitch.clamp(-max_pitch, max_pitch);

        self.direction = Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize();
    }

    /// Right vector
    pub fn right(&self) -> Vec3 {
        self.direction.cross(self.up).normalize_or_zero()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective()
    }
}

/// Free-flight camera driven by mouse look and mapped movement keys.
#[derive(Debug)]
pub struct FreeFlightCamera {
    /// The camera being flown
    pub camera: Camera,
    /// Key bindings
    pub mapper: InputMapper,
    /// World units per second
    pub speed: f32,
    /// Radians per pixel of cursor movement
    pub sensitivity: f32,
    /// Multiplier applied while `Sprint` is held
    pub sprint_multiplier: f32,
    /// Physical keys currently down
    held: FxHashSet<KeyCode>,
}

impl FreeFlightCamera {
    /// Create a fly camera around `camera`
    pub fn new(camera: Camera, speed: f32, sensitivity: f32) -> Self {
        Self {
            camera,
            mapper: InputMapper::with_defaults(),
            speed,
            sensitivity,
            sprint_multiplier: 3.0,
            held: FxHashSet::default(),
        }
    }

    /// Whether any key bound to `action` is currently held
    pub fn is_held(&self, action: InputAction) -> bool {
        self.held
            .iter()
            .any(|key| self.mapper.get_action(*key) == Some(action))
    }

    fn movement(&self) -> Vec3 {
        let axis = |positive, negative| {
            (self.is_held(positive) as i32 - self.is_held(negative) as i32) as f32
        };

        let forward = axis(InputAction::MoveForward, InputAction::MoveBackward);
        let right = axis(InputAction::MoveRight, InputAction::MoveLeft);
        let up = axis(InputAction::MoveUp, InputAction::MoveDown);

        self.camera.direction * forward + self.camera.right() * right + Vec3::Y * up
    }
}

impl PlayerController for FreeFlightCamera {
    fn input(&mut self, input: &InputSnapshot) {
        for (key, record) in &input.keyboard {
            match record.action {
                KeyAction::Press => {
                    self.held.insert(*key);
                }
                KeyAction::Release => {
                    self.held.remove(key);
                }
                KeyAction::Repeat => {}
            }
        }

        if self
            .mapper
            .triggered(InputAction::Pause, KeyAction::Press, input)
        {
            log::debug!("Fly camera paused, releasing held keys");
            self.held.clear();
        }

        let cursor = &input.mouse_cursor;
        if cursor.updated && cursor.delta != Vec2::ZERO {
            self.camera
                .rotate(cursor.delta.x, cursor.delta.y, self.sensitivity);
        }
    }

    fn update(&mut self, delta_time: f32) {
        let movement = self.movement();
        if movement != Vec3::ZERO {
            let speed = if self.is_held(InputAction::Sprint) {
                self.speed * self.sprint_multiplier
            } else {
                self.speed
            };
            self.camera.position += movement.normalize() * speed * delta_time;
        }
        self.camera.update();
    }
}

#[cfg(test)]
mod tests {
    use winit::keyboard::ModifiersState;

    use super::*;
    use crate::input::{Controller, KeyRecord};

    fn press(snapshot: &mut InputSnapshot, key: KeyCode, action: KeyAction) {
        snapshot.keyboard.insert(
            key,
            KeyRecord {
                scancode: 0,
                action,
                mods: ModifiersState::empty(),
            },
        );
    }

    #[test]
    fn test_resize_updates_aspect() {
        let mut camera = Camera::perspective();
        camera.on_window_resize(&WindowSize::new(800, 400));
        assert!((camera.aspect - 2.0).abs() < f32::EPSILON);

        camera.on_window_resize(&WindowSize::new(800, 0));
        assert!((camera.aspect - 2.0).abs() < f32::EPSILON, "Zero size is ignored");
    }

    #[test]
    fn test_bind_resize_through_registry() {
        let registry = EventRegistry::new();
        let camera = Rc::new(RefCell::new(Camera::perspective()));
        Camera::bind_resize(&camera, &registry);

        registry
            .invoke(events::ON_WINDOW_RESIZE, &WindowSize::new(1000, 500))
            .unwrap();
        assert!((camera.borrow().aspect - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_look_at_direction() {
        let camera = Camera::perspective().look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        assert!((camera.direction - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_free_flight_moves_while_held() {
        let mut fly = FreeFlightCamera::new(Camera::perspective(), 2.0, 0.01);
        let start = fly.camera.position;

        let mut snapshot = InputSnapshot::new();
        press(&mut snapshot, KeyCode::KeyW, KeyAction::Press);
        fly.input(&snapshot);
        fly.update(0.5);

        let moved = fly.camera.position - start;
        assert!((moved - Vec3::NEG_Z).length() < 1e-5, "moved {moved:?}");

        let mut snapshot = InputSnapshot::new();
        press(&mut snapshot, KeyCode::KeyW, KeyAction::Release);
        fly.input(&snapshot);
        let before = fly.camera.position;
        fly.update(0.5);
        assert_eq!(fly.camera.position, before);
    }

    #[test]
    fn test_look_at_straight_down_stays_finite() {
        let camera = Camera::perspective().look_at(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO);
        assert!(camera.direction.is_finite());
        assert!(camera.right().is_finite());
        assert!(camera.view_projection().is_finite());

        let mut fly = FreeFlightCamera::new(camera, 1.0, 0.01);
        let mut snapshot = InputSnapshot::new();
        press(&mut snapshot, KeyCode::KeyD, KeyAction::Press);
        fly.input(&snapshot);
        fly.update(0.1);

        assert!(fly.camera.position.is_finite(), "{:?}", fly.camera.position);
    }

    #[test]
    fn test_releasing_alias_key_keeps_action_held() {
        let mut fly = FreeFlightCamera::new(Camera::perspective(), 1.0, 0.01);
        let start = fly.camera.position;

        let mut snapshot = InputSnapshot::new();
        press(&mut snapshot, KeyCode::KeyW, KeyAction::Press);
        fly.input(&snapshot);

        let mut snapshot = InputSnapshot::new();
        press(&mut snapshot, KeyCode::ArrowUp, KeyAction::Press);
        fly.input(&snapshot);

        let mut snapshot = InputSnapshot::new();
        press(&mut snapshot, KeyCode::ArrowUp, KeyAction::Release);
        fly.input(&snapshot);

        assert!(fly.is_held(InputAction::MoveForward));
        fly.update(1.0);
        assert!((fly.camera.position - (start + Vec3::NEG_Z)).length() < 1e-5);
    }

    #[test]
    fn test_pause_releases_held_keys() {
        let mut fly = FreeFlightCamera::new(Camera::perspective(), 1.0, 0.01);

        let mut snapshot = InputSnapshot::new();
        press(&mut snapshot, KeyCode::KeyW, KeyAction::Press);
        fly.input(&snapshot);

        let mut snapshot = InputSnapshot::new();
        press(&mut snapshot, KeyCode::Escape, KeyAction::Press);
        fly.input(&snapshot);

        assert!(!fly.is_held(InputAction::MoveForward));
        assert!(!fly.is_held(InputAction::Pause));
    }

    #[test]
    fn test_free_flight_rotates_from_cursor_delta() {
        let mut fly = FreeFlightCamera::new(Camera::perspective(), 1.0, 0.01);
        let before = fly.camera.direction;

        let mut snapshot = InputSnapshot::new();
        snapshot.mouse_cursor.updated = true;
        snapshot.mouse_cursor.delta = Vec2::new(20.0, 0.0);
        fly.input(&snapshot);

        assert!((fly.camera.direction - before).length() > 0.1);
    }

    #[test]
    fn test_free_flight_as_controller() {
        let registry = EventRegistry::new();
        let mut controller = Controller::new(
            &registry,
            FreeFlightCamera::new(Camera::perspective(), 1.0, 0.01),
        );
        controller.set_active(true);
        controller.bind_update();

        let mut snapshot = InputSnapshot::new();
        press(&mut snapshot, KeyCode::Space, KeyAction::Press);
        registry.invoke(events::INPUT, &snapshot).unwrap();
        registry.invoke(events::UPDATE, &1.0).unwrap();

        assert!((controller.borrow().camera.position.y - 1.0).abs() < 1e-5);
    }
}
