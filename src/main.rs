//! Example game demonstrating engine features

use std::path::Path;

use df_engine::prelude::*;

const CONFIG_PATH: &str = "engine.ron";

/// Demo game flying a camera through the event channels
struct DemoGame {
    fly: Option<Controller<FreeFlightCamera>>,
    bindings: Vec<(&'static str, SubscriberId)>,
}

impl DemoGame {
    fn new() -> Self {
        Self {
            fly: None,
            bindings: Vec::new(),
        }
    }
}

impl Game for DemoGame {
    fn init(&mut self, ctx: &mut EngineContext) {
        log::info!("Initializing demo game");
        let registry = ctx.registry().clone();

        let camera = Camera::perspective().look_at(Vec3::new(0.0, 3.0, 10.0), Vec3::ZERO);
        let fly = FreeFlightCamera::new(
            camera,
            ctx.config.camera_speed,
            ctx.config.camera_sensitivity,
        );

        let mut controller = Controller::new(&registry, fly);
        controller.set_active(true);
        controller.bind_update();

        let id = registry.subscribe_method(
            events::ON_WINDOW_RESIZE,
            controller.shared(),
            |fly: &mut FreeFlightCamera, size: &WindowSize| fly.camera.on_window_resize(size),
        );
        self.bindings.push((events::ON_WINDOW_RESIZE.name(), id));

        let id = registry.subscribe_method(
            events::RENDER_3D,
            controller.shared(),
            |fly: &mut FreeFlightCamera, _: &()| {
                log::trace!(
                    "Camera at {} looking {}",
                    fly.camera.position,
                    fly.camera.direction
                );
            },
        );
        self.bindings.push((events::RENDER_3D.name(), id));

        // Escape quits
        let quit = ctx.quit_handle();
        let id = SubscriberId::token();
        registry.subscribe(events::INPUT, id, move |input: &InputSnapshot| {
            if input.check_key_action(KeyCode::Escape, KeyAction::Press) {
                log::info!("Escape pressed, quitting");
                quit.quit();
            }
        });
        self.bindings.push((events::INPUT.name(), id));

        self.fly = Some(controller);
        log::info!("Demo game initialized");
    }

    fn shutdown(&mut self, ctx: &mut EngineContext) {
        for (channel, id) in self.bindings.drain(..) {
            ctx.registry().unsubscribe(channel, id);
        }
        self.fly = None;
    }
}

fn load_config() -> EngineConfig {
    let defaults = EngineConfig::default()
        .with_title("Engine Demo")
        .with_size(1280, 720)
        .with_captured_cursor(true);

    if !Path::new(CONFIG_PATH).exists() {
        return defaults;
    }

    match EngineConfig::load_ron(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Ignoring {CONFIG_PATH}: {e}");
            defaults
        }
    }
}

fn main() {
    let game = DemoGame::new();
    let engine = Engine::new(load_config(), game);

    if let Err(e) = engine.run() {
        eprintln!("Engine error: {}", e);
    }
}
