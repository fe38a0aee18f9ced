//! Window target adapter for the frame scheduler.

use ash::vk;
use lumen_render::WindowTarget;
use std::sync::Arc;
use std::time::Duration;
use winit::window::Window;

/// Wraps a winit window behind the scheduler's [`WindowTarget`] seam.
///
/// The resize flag is set by the event loop and consumed by the scheduler
/// at the end of the frame that observed it.
pub struct WindowState {
    window: Arc<Window>,
    resized: bool,
}

impl WindowState {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            resized: false,
        }
    }

    /// Record that the window was resized. Called from the event loop.
    pub fn notify_resized(&mut self) {
        self.resized = true;
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

impl WindowTarget for WindowState {
    fn drawable_extent(&self) -> vk::Extent2D {
        let size = self.window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }

    fn wait_events(&mut self) {
        // winit 0.30 pumps events outside our control; the scheduler's
        // minimized stall just needs to back off until the size changes.
        std::thread::sleep(Duration::from_millis(10));
    }
}
