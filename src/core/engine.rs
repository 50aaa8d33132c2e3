//! Frame driver and main loop

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{CursorGrabMode, Window, WindowId},
};

use super::config::EngineConfig;
use super::events::{self, EventError, EventRegistry, WindowSize};
use super::time::Time;
use crate::input::InputManager;

/// Publishes the per-frame channels in a fixed order.
///
/// One frame is: `input` (only if something happened), `update`,
/// `render3D`, `render2D`, `imgui`.
#[derive(Debug)]
pub struct FrameDriver {
    registry: EventRegistry,
    input: InputManager,
    time: Time,
}

impl FrameDriver {
    /// Create a driver publishing through `registry`
    pub fn new(registry: EventRegistry) -> Self {
        Self {
            input: InputManager::new(registry.clone()),
            registry,
            time: Time::new(),
        }
    }

    /// Run one frame timed by the wall clock.
    ///
    /// # Errors
    ///
    /// Returns the first subscriber failure; the rest of the frame is skipped.
    pub fn frame(&mut self) -> Result<(), EventError> {
        self.time.update();
        self.run_frame()
    }

    /// Run one frame with an explicit delta.
    ///
    /// # Errors
    ///
    /// Returns the first subscriber failure; the rest of the frame is skipped.
    pub fn frame_with_delta(&mut self, delta: Duration) -> Result<(), EventError> {
        self.time.advance(delta);
        self.run_frame()
    }

    fn run_frame(&mut self) -> Result<(), EventError> {
        self.input.update()?;
        self.registry
            .invoke(events::UPDATE, &self.time.delta_seconds())?;
        self.registry.invoke(events::RENDER_3D, &())?;
        self.registry.invoke(events::RENDER_2D, &())?;
        self.registry.invoke(events::DEBUG_UI, &())
    }

    /// Publish a framebuffer size change.
    ///
    /// # Errors
    ///
    /// Returns a failing `onWindowResize` subscriber.
    pub fn resize(&self, size: WindowSize) -> Result<(), EventError> {
        log::debug!("Window resized to {}x{}", size.width, size.height);
        self.registry.invoke(events::ON_WINDOW_RESIZE, &size)
    }

    /// Release every channel of the registry.
    pub fn shutdown(&self) {
        self.registry.clear();
    }

    /// Registry the driver publishes through
    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Input poller
    pub fn input(&self) -> &InputManager {
        &self.input
    }

    /// Input poller, for feeding platform callbacks
    pub fn input_mut(&mut self) -> &mut InputManager {
        &mut self.input
    }

    /// Frame timing
    pub fn time(&self) -> &Time {
        &self.time
    }
}

/// Cloneable request flag, usable from inside subscribers.
#[derive(Debug, Clone, Default)]
pub struct QuitHandle(Rc<Cell<bool>>);

impl QuitHandle {
    /// Ask the engine to stop after the current frame
    pub fn quit(&self) {
        self.0.set(true);
    }

    /// Whether a quit was requested
    pub fn is_requested(&self) -> bool {
        self.0.get()
    }
}

/// Game trait that users implement
///
/// Per-frame work is done by subscribing to the registry's channels in
/// `init`, not by overriding methods here.
pub trait Game: 'static {
    /// Called once the window exists, before the first frame
    fn init(&mut self, engine: &mut EngineContext);

    /// Called when the game is shutting down, before the registry is cleared
    fn shutdown(&mut self, _engine: &mut EngineContext) {}
}

/// Context passed to game callbacks
pub struct EngineContext {
    /// Engine configuration
    pub config: EngineConfig,
    registry: EventRegistry,
    window_size: WindowSize,
    quit: QuitHandle,
}

impl EngineContext {
    fn new(config: EngineConfig, registry: EventRegistry) -> Self {
        Self {
            window_size: WindowSize::new(config.width, config.height),
            config,
            registry,
            quit: QuitHandle::default(),
        }
    }

    /// Registry shared by every subsystem
    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Current window size
    pub fn window_size(&self) -> WindowSize {
        self.window_size
    }

    /// Handle for requesting shutdown from a subscriber
    pub fn quit_handle(&self) -> QuitHandle {
        self.quit.clone()
    }

    /// Request engine shutdown
    pub fn quit(&self) {
        self.quit.quit();
    }

    /// Check if engine should quit
    pub fn should_quit(&self) -> bool {
        self.quit.is_requested()
    }
}

/// Main engine struct
pub struct Engine<G: Game> {
    game: G,
    driver: FrameDriver,
    context: EngineContext,
    window: Option<Arc<Window>>,
    initialized: bool,
    last_frame: Instant,
    failure: Option<EventError>,
}

impl<G: Game> Engine<G> {
    /// Create a new engine with the given game
    pub fn new(config: EngineConfig, game: G) -> Self {
        let registry = EventRegistry::with_policy(config.dispatch_policy);
        Self {
            game,
            driver: FrameDriver::new(registry.clone()),
            context: EngineContext::new(config, registry),
            window: None,
            initialized: false,
            last_frame: Instant::now(),
            failure: None,
        }
    }

    /// Registry shared by every subsystem
    pub fn registry(&self) -> &EventRegistry {
        self.driver.registry()
    }

    /// Run the engine
    ///
    /// # Errors
    ///
    /// Returns an error if the event loop cannot start or a subscriber fails
    /// under the fail-fast policy.
    pub fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        env_logger::init();
        log::info!("Starting engine: {}", self.context.config.title);

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self)?;

        match self.failure.take() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    fn frame_budget(&self) -> Option<Duration> {
        let fps = self.context.config.target_fps;
        (fps > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(fps)))
    }

    fn stop(&mut self, event_loop: &ActiveEventLoop) {
        if self.initialized {
            self.game.shutdown(&mut self.context);
            self.initialized = false;
        }
        self.driver.shutdown();
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: EventError) {
        log::error!("Frame aborted: {error}");
        self.failure = Some(error);
        self.stop(event_loop);
    }
}

impl<G: Game> ApplicationHandler for Engine<G> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let config = &self.context.config;
        let window_attrs = Window::default_attributes()
            .with_title(&config.title)
            .with_inner_size(PhysicalSize::new(config.width, config.height));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        if config.capture_cursor {
            let grabbed = window
                .set_cursor_grab(CursorGrabMode::Confined)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked));
            if let Err(e) = grabbed {
                log::warn!("Cursor capture unavailable: {e}");
            }
            window.set_cursor_visible(false);
        }

        self.window = Some(window);

        if !self.initialized {
            self.game.init(&mut self.context);
            self.initialized = true;
            log::info!("Engine initialized successfully");

            if let Err(e) = self.driver.resize(self.context.window_size) {
                self.fail(event_loop, e);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.driver.input_mut().handle_window_event(&event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down");
                self.stop(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                if new_size.width > 0 && new_size.height > 0 {
                    let size = WindowSize::new(new_size.width, new_size.height);
                    self.context.window_size = size;
                    if let Err(e) = self.driver.resize(size) {
                        self.fail(event_loop, e);
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                self.last_frame = Instant::now();

                if let Err(e) = self.driver.frame() {
                    self.fail(event_loop, e);
                    return;
                }

                if self.context.should_quit() {
                    self.stop(event_loop);
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(budget) = self.frame_budget() {
            let next = self.last_frame + budget;
            if Instant::now() < next {
                event_loop.set_control_flow(ControlFlow::WaitUntil(next));
                return;
            }
        }

        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use glam::Vec2;
    use winit::keyboard::KeyCode;

    use super::*;
    use crate::core::events::SubscriberId;
    use crate::input::{InputSnapshot, KeyAction};

    fn log_channel<A: 'static>(
        registry: &EventRegistry,
        key: events::EventKey<A>,
        log: &Rc<RefCell<Vec<&'static str>>>,
    ) {
        let log = Rc::clone(log);
        let name = key.name();
        registry.subscribe(key, SubscriberId::token(), move |_: &A| {
            log.borrow_mut().push(name);
        });
    }

    fn logging_driver() -> (FrameDriver, Rc<RefCell<Vec<&'static str>>>) {
        let driver = FrameDriver::new(EventRegistry::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = driver.registry();

        log_channel(registry, events::DEBUG_UI, &log);
        log_channel(registry, events::RENDER_2D, &log);
        log_channel(registry, events::RENDER_3D, &log);
        log_channel(registry, events::UPDATE, &log);
        log_channel(registry, events::INPUT, &log);

        (driver, log)
    }

    #[test]
    fn test_frame_order() {
        let (mut driver, log) = logging_driver();

        driver.input_mut().on_key(KeyCode::KeyA, 30, KeyAction::Press);
        driver.frame_with_delta(Duration::from_millis(16)).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["input", "update", "render3D", "render2D", "imgui"]
        );
    }

    #[test]
    fn test_quiet_frame_skips_input() {
        let (mut driver, log) = logging_driver();

        driver.frame_with_delta(Duration::from_millis(16)).unwrap();
        assert_eq!(*log.borrow(), vec!["update", "render3D", "render2D", "imgui"]);
    }

    #[test]
    fn test_update_receives_delta() {
        let driver_registry = EventRegistry::new();
        let mut driver = FrameDriver::new(driver_registry.clone());
        let seen = Rc::new(Cell::new(0.0_f32));

        let sink = Rc::clone(&seen);
        driver_registry.subscribe(events::UPDATE, SubscriberId::token(), move |dt: &f32| {
            sink.set(*dt);
        });

        driver.frame_with_delta(Duration::from_millis(250)).unwrap();
        assert!((seen.get() - 0.25).abs() < 1e-6);
        assert_eq!(driver.time().frame_count(), 1);
    }

    #[test]
    fn test_failing_input_subscriber_aborts_frame() {
        let registry = EventRegistry::new();
        let mut driver = FrameDriver::new(registry.clone());
        let rendered = Rc::new(Cell::new(false));

        registry.subscribe(
            events::INPUT,
            SubscriberId::token(),
            |_: &InputSnapshot| -> Result<(), &'static str> { Err("bad input") },
        );
        let flag = Rc::clone(&rendered);
        registry.subscribe(events::RENDER_3D, SubscriberId::token(), move |_: &()| {
            flag.set(true);
        });

        driver.input_mut().on_cursor_entered();
        driver.input_mut().on_cursor_moved(Vec2::new(1.0, 1.0));
        assert!(driver.frame_with_delta(Duration::from_millis(16)).is_err());
        assert!(!rendered.get());
    }

    #[test]
    fn test_resize_and_shutdown() {
        let registry = EventRegistry::new();
        let driver = FrameDriver::new(registry.clone());
        let seen = Rc::new(Cell::new(None));

        let sink = Rc::clone(&seen);
        registry.subscribe(
            events::ON_WINDOW_RESIZE,
            SubscriberId::token(),
            move |size: &WindowSize| sink.set(Some(*size)),
        );

        driver.resize(WindowSize::new(640, 360)).unwrap();
        assert_eq!(seen.get(), Some(WindowSize::new(640, 360)));

        driver.shutdown();
        assert_eq!(registry.channel_count(), 0);
    }

    #[test]
    fn test_quit_handle_shared() {
        let context = EngineContext::new(EngineConfig::default(), EventRegistry::new());
        let handle = context.quit_handle();

        assert!(!context.should_quit());
        handle.quit();
        assert!(context.should_quit());
    }
}
