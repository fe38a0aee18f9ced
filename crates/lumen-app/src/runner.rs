//! Application runner and event loop.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ash::vk;
use lumen_core::FrameClock;
use lumen_gpu::GpuContextBuilder;
use lumen_render::WindowTarget;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::config::AppConfig;
use crate::context::AppContext;

/// Trait for Lumen applications.
///
/// The framework handles window creation, GPU initialization, the frame
/// scheduler, and the event loop; implementors record rendering commands
/// and react to events.
pub trait LumenApp: Sized {
    /// Called once after the GPU context and window have been created.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Per-frame simulation step, before any rendering.
    ///
    /// `dt` is the capped delta time in seconds.
    fn update(&mut self, ctx: &mut AppContext, dt: f32);

    /// Record one frame into `cmd`.
    ///
    /// The frame has begun but the render pass has not; implementors call
    /// `ctx.scheduler.begin_render_pass` / `end_render_pass` around their
    /// draws. Submission and presentation happen after this returns.
    fn render(&mut self, ctx: &mut AppContext, cmd: vk::CommandBuffer, dt: f32)
        -> anyhow::Result<()>;

    /// Handle a window event. Return `true` to stop default processing.
    #[allow(unused_variables)]
    fn on_event(&mut self, event: &WindowEvent) -> bool {
        false
    }

    /// Destroy app-owned GPU resources. The device is idle when called.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext) {}
}

/// Run a [`LumenApp`] with the given configuration.
///
/// Initializes logging, creates the window and GPU context, and runs the
/// event loop until the application exits.
pub fn run_app<A: LumenApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        config,
        state: None,
    };

    if let Err(e) = event_loop.run_app(&mut runner) {
        error!("Event loop error: {e}");
    }

    Ok(())
}

/// Internal application runner that implements winit's ApplicationHandler.
struct AppRunner<A: LumenApp> {
    config: AppConfig,
    state: Option<AppState<A>>,
}

struct AppState<A: LumenApp> {
    ctx: AppContext,
    app: A,
    clock: FrameClock,
    target_frame_time: Option<Duration>,
}

impl<A: LumenApp + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        // Let the app handle the event first
        if let Some(state) = &mut self.state {
            if state.app.on_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(state) = self.state.take() {
                    state.shutdown();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let Some(state) = &mut self.state else { return };
                match state.render_frame() {
                    Ok(()) => {
                        state.ctx.scheduler.window_mut().window().request_redraw();
                    }
                    Err(e) => {
                        // Recoverable failures are absorbed by the
                        // scheduler; anything surfacing here is fatal.
                        error!("Render error: {e:#}");
                        if let Some(state) = self.state.take() {
                            state.shutdown();
                        }
                        event_loop.exit();
                    }
                }
            }
            WindowEvent::Resized(_) => {
                if let Some(state) = &mut self.state {
                    state.ctx.scheduler.window_mut().notify_resized();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &mut self.state {
            state.ctx.scheduler.window_mut().window().request_redraw();
        }
    }
}

impl<A: LumenApp + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let gpu = Arc::new(
            GpuContextBuilder::new()
                .app_name(&self.config.title)
                .validation(self.config.validation)
                .build()?,
        );
        info!("GPU: {}", gpu.capabilities().summary());

        let mut ctx = unsafe { AppContext::new(window, gpu, &self.config)? };
        let app = A::init(&mut ctx)?;

        let target_frame_time = self
            .config
            .target_fps
            .map(|fps| Duration::from_nanos(1_000_000_000 / u64::from(fps)));

        Ok(AppState {
            ctx,
            app,
            clock: FrameClock::start(),
            target_frame_time,
        })
    }
}

impl<A: LumenApp> AppState<A> {
    fn render_frame(&mut self) -> anyhow::Result<()> {
        let frame_start = Instant::now();
        let dt = self.clock.tick();

        self.app.update(&mut self.ctx, dt);

        // Skip rendering while minimized; the scheduler would otherwise
        // stall inside recreation waiting for a non-zero extent.
        let extent = self.ctx.scheduler.window_mut().drawable_extent();
        if extent.width == 0 || extent.height == 0 {
            return Ok(());
        }

        if let Some(cmd) = self.ctx.scheduler.begin_frame()? {
            self.app.render(&mut self.ctx, cmd, dt)?;
            self.ctx.scheduler.end_frame()?;
        }

        if let Some(target) = self.target_frame_time {
            let elapsed = frame_start.elapsed();
            if elapsed < target {
                thread::sleep(target - elapsed);
            }
        }

        Ok(())
    }

    fn shutdown(mut self) {
        info!("Starting cleanup...");
        if let Err(e) = self.ctx.gpu.wait_idle() {
            error!("Failed to wait idle: {e}");
        }

        self.app.cleanup(&mut self.ctx);
        unsafe {
            self.ctx.destroy();
        }
        info!("Cleanup complete");
    }
}
