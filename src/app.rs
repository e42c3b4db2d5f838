//! Window, input and frame loop
//!
//! [`UmbraApp`] owns the winit event loop. On `resumed` it opens the window,
//! brings up the [`RenderEngine`], compiles the scene programs and hands a
//! [`SceneContext`] to the user's setup closure. Each redraw then runs one
//! `update`, `draw`, `finish_frame` cycle.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{CursorGrabMode, Fullscreen, Window, WindowAttributes, WindowId},
};

use crate::config::EngineConfig;
use crate::gfx::{
    camera::CameraController,
    device::GpuDevice,
    rendering::RenderEngine,
    resources::{program::ScenePrograms, texture_cache::TextureCache},
    scene::Scene,
};

/// Initialises `env_logger`, `info` unless `RUST_LOG` says otherwise
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// What the setup closure gets to populate the scene with
pub struct SceneContext<'a> {
    pub device: &'a mut dyn GpuDevice,
    pub scene: &'a mut Scene,
    pub textures: &'a mut TextureCache,
    pub config: &'a EngineConfig,
}

pub type SetupFn = Box<dyn FnOnce(&mut SceneContext) -> anyhow::Result<()>>;

pub struct UmbraApp {
    event_loop: Option<EventLoop<()>>,
    app_state: AppState,
}

struct AppState {
    config: EngineConfig,
    setup: Option<SetupFn>,
    window: Option<Arc<Window>>,
    render_engine: Option<RenderEngine>,
    scene: Option<Scene>,
    textures: TextureCache,
    controller: CameraController,
    last_frame: Option<Instant>,
    error: Option<anyhow::Error>,
}

impl UmbraApp {
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid engine config")?;
        let event_loop = EventLoop::new().context("failed to create event loop")?;
        let textures = TextureCache::new(config.resources.textures.clone());

        Ok(Self {
            event_loop: Some(event_loop),
            app_state: AppState {
                config,
                setup: None,
                window: None,
                render_engine: None,
                scene: None,
                textures,
                controller: CameraController::new(),
                last_frame: None,
                error: None,
            },
        })
    }

    /// Registers the closure that fills the scene once the GPU is up
    pub fn with_setup<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut SceneContext) -> anyhow::Result<()> + 'static,
    {
        self.app_state.setup = Some(Box::new(setup));
        self
    }

    /// Runs until the window closes; returns the error that ended the loop, if any
    pub fn run(mut self) -> anyhow::Result<()> {
        let event_loop = self
            .event_loop
            .take()
            .context("event loop already consumed")?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop
            .run_app(&mut self.app_state)
            .context("event loop failed")?;

        match self.app_state.error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl AppState {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let mut attributes = WindowAttributes::default()
            .with_title(self.config.app_name.clone())
            .with_inner_size(PhysicalSize::new(self.config.window_width, self.config.window_height));
        if self.config.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("failed to create window")?,
        );

        if window
            .set_cursor_grab(CursorGrabMode::Confined)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
            .is_err()
        {
            log::warn!("Cursor grab unsupported on this platform");
        }
        window.set_cursor_visible(false);

        let (width, height) = window.inner_size().into();
        let vsync = self.config.vsync;
        let window_handle = window.clone();
        let mut engine = pollster::block_on(async move {
            RenderEngine::new(window_handle, width, height, vsync).await
        })
        .context("failed to initialise renderer")?;
        if self.config.sampling_level > 1 {
            log::info!(
                "sampling_level {} requested; rendering without multisampling",
                self.config.sampling_level
            );
        }

        let programs = ScenePrograms::builtin(&mut engine).context("failed to compile scene programs")?;
        let mut scene = Scene::new(&mut engine, &self.config, programs).context("failed to create scene")?;
        scene.resize(width, height);

        if let Some(setup) = self.setup.take() {
            let mut context = SceneContext {
                device: &mut engine,
                scene: &mut scene,
                textures: &mut self.textures,
                config: &self.config,
            };
            setup(&mut context).context("scene setup failed")?;
        }
        log::info!("Scene ready with {} objects", scene.objects().len());

        self.window = Some(window);
        self.render_engine = Some(engine);
        self.scene = Some(scene);
        Ok(())
    }

    fn frame(&mut self) -> anyhow::Result<()> {
        let (Some(engine), Some(scene)) = (self.render_engine.as_mut(), self.scene.as_mut()) else {
            return Ok(());
        };

        let now = Instant::now();
        let dt = self
            .last_frame
            .replace(now)
            .map_or(0.0, |last| (now - last).as_secs_f32());

        let input = self.controller.take_frame_input();
        scene.update(dt, &input);

        let (_, height) = scene.viewport();
        if height == 0 {
            // minimised
            return Ok(());
        }
        scene.draw(&mut *engine).context("failed to draw scene")?;
        engine.finish_frame().context("failed to present frame")?;
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(error) = self.init(event_loop) {
            self.fail(event_loop, error);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                self.controller.process_keyed_events(&event);
                if self.controller.quit_requested() {
                    event_loop.exit();
                }
            }
            WindowEvent::Focused(focused) => self.controller.focus_changed(focused),
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if let Some(engine) = self.render_engine.as_mut() {
                    engine.resize(width, height);
                }
                if let Some(scene) = self.scene.as_mut() {
                    scene.resize(width, height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(error) = self.frame() {
                    self.fail(event_loop, error);
                }
            }
            _ => (),
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        self.controller.process_events(&event);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(engine) = self.render_engine.as_mut() {
            if let Some(scene) = self.scene.take() {
                scene.release(&mut *engine);
            }
            self.textures.release_all(engine);
            log::info!("Released GPU resources");
        }
    }
}
