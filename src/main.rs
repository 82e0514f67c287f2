// Vulkan ray tracing bootstrap
//
// main owns the window and the event loop; everything Vulkan lives in the
// backend module and is built once, in sequence, on this thread.

mod backend;
mod config;

use std::sync::Arc;

use anyhow::Result;
use backend::RenderContext;
use config::Config;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowAttributes};

fn main() -> Result<()> {
    let config = Config::load();

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    log::info!(
        "Starting {} ({}x{}, validation: {})",
        config.window.title,
        config.window.width,
        config.window.height,
        config.debug.validation_layers
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    // Initialization failures surface here so the process exits non-zero.
    if let Some(err) = app.fatal_error.take() {
        return Err(err);
    }
    Ok(())
}

struct App {
    config: Config,
    // Context is declared before the window: Vulkan teardown must complete
    // before the window is destroyed.
    context: Option<RenderContext>,
    window: Option<Arc<Window>>,
    needs_resize: bool,
    is_minimized: bool,
    fatal_error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            context: None,
            window: None,
            needs_resize: false,
            is_minimized: false,
            fatal_error: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {err}");
                self.fatal_error = Some(err.into());
                event_loop.exit();
                return;
            }
        };

        match RenderContext::new(&window, &self.config) {
            Ok(context) => {
                self.context = Some(context);
                self.window = Some(window);
            }
            Err(err) => {
                log::error!("Vulkan initialization failed: {err}");
                self.fatal_error = Some(err.into());
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if size.width == 0 || size.height == 0 {
                    self.is_minimized = true;
                } else {
                    self.is_minimized = false;
                    self.needs_resize = true;
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};
                if event.state.is_pressed() {
                    if let PhysicalKey::Code(KeyCode::Escape) = event.physical_key {
                        log::info!("Escape pressed, exiting");
                        event_loop.exit();
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                if self.needs_resize && !self.is_minimized {
                    if let (Some(context), Some(window)) =
                        (self.context.as_mut(), self.window.as_ref())
                    {
                        let size = window.inner_size();
                        if let Err(err) = context.recreate_swapchain(size.width, size.height) {
                            log::error!("Swapchain recreation failed: {err}");
                            self.fatal_error = Some(err.into());
                            event_loop.exit();
                            return;
                        }
                    }
                    self.needs_resize = false;
                }
                // Frame rendering starts here once the pipeline exists.
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
