//! The frame scheduler.
//!
//! Owns the per-frame state machine: acquire an image, record into the
//! current slot's command buffer, submit, present, advance the slot. All
//! platform work goes through the [`crate::backend`] seams, which keeps the
//! state machine testable without a device.

use crate::backend::{CommandRecorder, PresentationEngine, WindowTarget};
use crate::error::Result;
use ash::vk;
use lumen_core::Severity;
use lumen_gpu::{SurfaceStatus, MAX_FRAMES_IN_FLIGHT};
use tracing::{debug, error};

/// Drives one frame at a time through acquire, record, submit, present.
///
/// At most one frame is ever being recorded; the slot index cycles through
/// `[0, MAX_FRAMES_IN_FLIGHT)` so CPU recording for slot `n` overlaps GPU
/// execution of slot `n - 1`.
pub struct FrameScheduler<P, W, R> {
    presentation: P,
    window: W,
    recorder: R,

    command_buffers: Vec<vk::CommandBuffer>,
    current_image_index: u32,
    current_slot: usize,
    frame_started: bool,
}

impl<P, W, R> FrameScheduler<P, W, R>
where
    P: PresentationEngine,
    W: WindowTarget,
    R: CommandRecorder,
{
    /// Create a scheduler, allocating one command buffer per frame slot.
    pub fn new(presentation: P, window: W, mut recorder: R) -> Result<Self> {
        let command_buffers = recorder.allocate_command_buffers(MAX_FRAMES_IN_FLIGHT)?;
        Ok(Self {
            presentation,
            window,
            recorder,
            command_buffers,
            current_image_index: 0,
            current_slot: 0,
            frame_started: false,
        })
    }

    /// Begin a frame.
    ///
    /// Returns the command buffer to record into, or `None` when the surface
    /// was stale and got recreated; the caller skips this iteration.
    ///
    /// Panics if a frame is already in progress.
    pub fn begin_frame(&mut self) -> Result<Option<vk::CommandBuffer>> {
        assert!(
            !self.frame_started,
            "begin_frame called while a frame is in progress"
        );

        let (image_index, status) = match self.presentation.acquire_next_image(self.current_slot) {
            Ok(acquired) => acquired,
            Err(e) if e.severity() == Severity::Recoverable => {
                debug!("surface stale on acquire, recreating swapchain");
                self.recreate_swapchain()?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if status == SurfaceStatus::Stale {
            // An image was acquired but the surface no longer matches the
            // window. Recreation rebuilds the sync objects, so the acquire
            // semaphore is not left dangling.
            debug!("suboptimal surface on acquire, recreating swapchain");
            self.recreate_swapchain()?;
            return Ok(None);
        }

        self.current_image_index = image_index;
        let cmd = self.command_buffers[self.current_slot];
        self.recorder.begin(cmd)?;
        self.frame_started = true;
        Ok(Some(cmd))
    }

    /// Finish the current frame: end recording, submit, present.
    ///
    /// The slot advances on every completed frame regardless of whether the
    /// surface was reported stale afterwards.
    ///
    /// Panics if no frame is in progress.
    pub fn end_frame(&mut self) -> Result<()> {
        assert!(self.frame_started, "end_frame called with no frame started");

        let cmd = self.command_buffers[self.current_slot];
        self.recorder.end(cmd)?;

        let status =
            self.presentation
                .submit_and_present(cmd, self.current_image_index, self.current_slot)?;

        self.frame_started = false;
        self.current_slot = (self.current_slot + 1) % MAX_FRAMES_IN_FLIGHT;

        if status == SurfaceStatus::Stale || self.window.was_resized() {
            self.window.reset_resized_flag();
            self.recreate_swapchain()?;
        }

        Ok(())
    }

    /// Record the render pass begin for the current frame.
    ///
    /// Panics if no frame is in progress or `cmd` is not the buffer handed
    /// out by `begin_frame`.
    pub fn begin_render_pass(&mut self, cmd: vk::CommandBuffer) {
        assert!(self.frame_started, "render pass outside of a frame");
        assert!(
            cmd == self.command_buffers[self.current_slot],
            "render pass on a command buffer from a different frame"
        );
        self.recorder.begin_render_pass(
            cmd,
            self.presentation.render_pass(),
            self.presentation.framebuffer(self.current_image_index),
            self.presentation.extent(),
        );
    }

    /// Record the render pass end for the current frame.
    pub fn end_render_pass(&mut self, cmd: vk::CommandBuffer) {
        assert!(self.frame_started, "render pass outside of a frame");
        assert!(
            cmd == self.command_buffers[self.current_slot],
            "render pass on a command buffer from a different frame"
        );
        self.recorder.end_render_pass(cmd);
    }

    /// Replace the swapchain after a resize or stale surface.
    ///
    /// Stalls while the drawable extent has zero area (minimized window),
    /// then waits for the device and rebuilds the surface and the per-slot
    /// command buffers.
    pub fn recreate_swapchain(&mut self) -> Result<()> {
        assert!(
            !self.frame_started,
            "cannot recreate the swapchain mid-frame"
        );

        let mut extent = self.window.drawable_extent();
        while extent.width == 0 || extent.height == 0 {
            self.window.wait_events();
            extent = self.window.drawable_extent();
        }

        self.presentation.wait_idle()?;

        self.recorder.free_command_buffers(&self.command_buffers);
        self.command_buffers.clear();

        let formats_match = self.presentation.recreate(extent)?;
        if !formats_match {
            // Pipelines were built against the old render pass formats.
            // Rendering continues but may be wrong until they are rebuilt.
            error!("swapchain format changed across recreation");
        }

        self.command_buffers = self
            .recorder
            .allocate_command_buffers(MAX_FRAMES_IN_FLIGHT)?;

        debug!(width = extent.width, height = extent.height, "swapchain recreated");
        Ok(())
    }

    /// Index of the slot currently being recorded.
    ///
    /// Panics when no frame is in progress.
    pub fn frame_index(&self) -> usize {
        assert!(self.frame_started, "frame_index outside of a frame");
        self.current_slot
    }

    /// Whether a frame is currently being recorded.
    pub fn is_frame_in_progress(&self) -> bool {
        self.frame_started
    }

    /// The command buffer of the frame being recorded.
    ///
    /// Panics when no frame is in progress.
    pub fn current_command_buffer(&self) -> vk::CommandBuffer {
        assert!(
            self.frame_started,
            "current_command_buffer outside of a frame"
        );
        self.command_buffers[self.current_slot]
    }

    /// Width over height of the current surface extent.
    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.presentation.extent();
        extent.width as f32 / extent.height as f32
    }

    /// The presentation engine, for render pass access at setup time.
    pub fn presentation(&self) -> &P {
        &self.presentation
    }

    /// The window target.
    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    /// Tear down in dependency order: recorder buffers before presentation.
    pub fn into_parts(self) -> (P, W, R, Vec<vk::CommandBuffer>) {
        (
            self.presentation,
            self.window,
            self.recorder,
            self.command_buffers,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use ash::vk::Handle;
    use lumen_gpu::GpuError;
    use std::collections::VecDeque;

    /// Scripted acquire outcomes for the fake engine.
    enum Acquire {
        Image(u32),
        Suboptimal(u32),
        OutOfDate,
    }

    struct FakeEngine {
        script: VecDeque<Acquire>,
        next_image: u32,
        submissions: Vec<(u32, usize)>,
        recreations: usize,
        present_status: SurfaceStatus,
        formats_match: bool,
    }

    impl FakeEngine {
        fn new() -> Self {
            Self {
                script: VecDeque::new(),
                next_image: 0,
                submissions: Vec::new(),
                recreations: 0,
                present_status: SurfaceStatus::Optimal,
                formats_match: true,
            }
        }
    }

    impl PresentationEngine for FakeEngine {
        fn acquire_next_image(&mut self, _slot: usize) -> Result<(u32, SurfaceStatus)> {
            match self.script.pop_front() {
                Some(Acquire::Image(i)) => Ok((i, SurfaceStatus::Optimal)),
                Some(Acquire::Suboptimal(i)) => Ok((i, SurfaceStatus::Stale)),
                Some(Acquire::OutOfDate) => Err(RenderError::Gpu(GpuError::Vulkan(
                    vk::Result::ERROR_OUT_OF_DATE_KHR,
                ))),
                None => {
                    let i = self.next_image;
                    self.next_image = (self.next_image + 1) % 3;
                    Ok((i, SurfaceStatus::Optimal))
                }
            }
        }

        fn submit_and_present(
            &mut self,
            _cmd: vk::CommandBuffer,
            image_index: u32,
            slot: usize,
        ) -> Result<SurfaceStatus> {
            self.submissions.push((image_index, slot));
            Ok(self.present_status)
        }

        fn recreate(&mut self, _extent: vk::Extent2D) -> Result<bool> {
            self.recreations += 1;
            self.present_status = SurfaceStatus::Optimal;
            Ok(self.formats_match)
        }

        fn wait_idle(&self) -> Result<()> {
            Ok(())
        }

        fn render_pass(&self) -> vk::RenderPass {
            vk::RenderPass::null()
        }

        fn framebuffer(&self, _image_index: u32) -> vk::Framebuffer {
            vk::Framebuffer::null()
        }

        fn extent(&self) -> vk::Extent2D {
            vk::Extent2D {
                width: 800,
                height: 600,
            }
        }
    }

    struct FakeWindow {
        extents: VecDeque<vk::Extent2D>,
        last_extent: vk::Extent2D,
        resized: bool,
        wait_events_calls: usize,
    }

    impl FakeWindow {
        fn fixed(width: u32, height: u32) -> Self {
            Self {
                extents: VecDeque::new(),
                last_extent: vk::Extent2D { width, height },
                resized: false,
                wait_events_calls: 0,
            }
        }

        fn scripted(extents: &[(u32, u32)]) -> Self {
            let mut queue: VecDeque<vk::Extent2D> = extents
                .iter()
                .map(|&(width, height)| vk::Extent2D { width, height })
                .collect();
            let last = queue.pop_front().unwrap();
            let mut window = Self::fixed(last.width, last.height);
            window.extents = queue;
            window
        }
    }

    impl WindowTarget for FakeWindow {
        fn drawable_extent(&self) -> vk::Extent2D {
            self.last_extent
        }

        fn was_resized(&self) -> bool {
            self.resized
        }

        fn reset_resized_flag(&mut self) {
            self.resized = false;
        }

        fn wait_events(&mut self) {
            self.wait_events_calls += 1;
            if let Some(extent) = self.extents.pop_front() {
                self.last_extent = extent;
            }
        }
    }

    #[derive(Default)]
    struct FakeRecorder {
        next_handle: u64,
        allocations: usize,
        live: Vec<vk::CommandBuffer>,
        begun: Vec<vk::CommandBuffer>,
        ended: Vec<vk::CommandBuffer>,
        passes_begun: usize,
        passes_ended: usize,
    }

    impl CommandRecorder for FakeRecorder {
        fn allocate_command_buffers(&mut self, count: usize) -> Result<Vec<vk::CommandBuffer>> {
            self.allocations += 1;
            let buffers: Vec<_> = (0..count)
                .map(|_| {
                    self.next_handle += 1;
                    vk::CommandBuffer::from_raw(self.next_handle)
                })
                .collect();
            self.live.extend(&buffers);
            Ok(buffers)
        }

        fn free_command_buffers(&mut self, buffers: &[vk::CommandBuffer]) {
            self.live.retain(|b| !buffers.contains(b));
        }

        fn begin(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
            self.begun.push(cmd);
            Ok(())
        }

        fn end(&mut self, cmd: vk::CommandBuffer) -> Result<()> {
            self.ended.push(cmd);
            Ok(())
        }

        fn begin_render_pass(
            &mut self,
            _cmd: vk::CommandBuffer,
            _render_pass: vk::RenderPass,
            _framebuffer: vk::Framebuffer,
            _extent: vk::Extent2D,
        ) {
            self.passes_begun += 1;
        }

        fn end_render_pass(&mut self, _cmd: vk::CommandBuffer) {
            self.passes_ended += 1;
        }
    }

    fn scheduler_with(
        engine: FakeEngine,
        window: FakeWindow,
    ) -> FrameScheduler<FakeEngine, FakeWindow, FakeRecorder> {
        FrameScheduler::new(engine, window, FakeRecorder::default()).unwrap()
    }

    #[test]
    fn slot_cycles_mod_frames_in_flight() {
        let mut scheduler = scheduler_with(FakeEngine::new(), FakeWindow::fixed(800, 600));

        let mut observed = Vec::new();
        for _ in 0..5 {
            let cmd = scheduler.begin_frame().unwrap().unwrap();
            observed.push(scheduler.frame_index());
            scheduler.begin_render_pass(cmd);
            scheduler.end_render_pass(cmd);
            scheduler.end_frame().unwrap();
        }

        assert_eq!(observed, [0, 1, 0, 1, 0]);
    }

    #[test]
    #[should_panic(expected = "begin_frame called while a frame is in progress")]
    fn double_begin_frame_panics() {
        let mut scheduler = scheduler_with(FakeEngine::new(), FakeWindow::fixed(800, 600));
        let _ = scheduler.begin_frame().unwrap();
        let _ = scheduler.begin_frame();
    }

    #[test]
    #[should_panic(expected = "end_frame called with no frame started")]
    fn end_frame_without_begin_panics() {
        let mut scheduler = scheduler_with(FakeEngine::new(), FakeWindow::fixed(800, 600));
        let _ = scheduler.end_frame();
    }

    #[test]
    #[should_panic(expected = "different frame")]
    fn render_pass_checks_command_buffer_identity() {
        let mut scheduler = scheduler_with(FakeEngine::new(), FakeWindow::fixed(800, 600));
        let _ = scheduler.begin_frame().unwrap().unwrap();
        scheduler.begin_render_pass(vk::CommandBuffer::from_raw(0xdead));
    }

    #[test]
    fn stale_acquire_skips_iteration_and_recovers() {
        let mut engine = FakeEngine::new();
        // Iterations 1, 2 succeed; 3 is out-of-date; the rest succeed.
        engine.script.extend([
            Acquire::Image(0),
            Acquire::Image(1),
            Acquire::OutOfDate,
        ]);
        let mut scheduler = scheduler_with(engine, FakeWindow::fixed(800, 600));

        let mut skipped = Vec::new();
        for iteration in 0..10 {
            match scheduler.begin_frame().unwrap() {
                Some(cmd) => {
                    scheduler.begin_render_pass(cmd);
                    scheduler.end_render_pass(cmd);
                    scheduler.end_frame().unwrap();
                }
                None => skipped.push(iteration),
            }
            assert!(!scheduler.is_frame_in_progress());
        }

        assert_eq!(skipped, [2]);
        let (engine, _, recorder, buffers) = scheduler.into_parts();
        assert_eq!(engine.submissions.len(), 9);
        assert_eq!(engine.recreations, 1);
        // Initial allocation plus the post-recreation one
        assert_eq!(recorder.allocations, 2);
        assert_eq!(buffers.len(), MAX_FRAMES_IN_FLIGHT);
    }

    #[test]
    fn suboptimal_acquire_also_recreates() {
        let mut engine = FakeEngine::new();
        engine.script.push_back(Acquire::Suboptimal(0));
        let mut scheduler = scheduler_with(engine, FakeWindow::fixed(800, 600));

        assert!(scheduler.begin_frame().unwrap().is_none());
        let (engine, _, _, _) = scheduler.into_parts();
        assert_eq!(engine.recreations, 1);
        assert!(engine.submissions.is_empty());
    }

    #[test]
    fn zero_extent_stalls_until_window_reappears() {
        let window = FakeWindow::scripted(&[(0, 0), (0, 0), (1024, 768)]);
        let mut scheduler = scheduler_with(FakeEngine::new(), window);

        scheduler.recreate_swapchain().unwrap();

        let (engine, window, _, _) = scheduler.into_parts();
        // Two zero-area polls before the window came back
        assert_eq!(window.wait_events_calls, 2);
        assert_eq!(engine.recreations, 1);
        assert!(engine.submissions.is_empty());
    }

    #[test]
    fn resize_flag_triggers_recreation_at_end_of_frame() {
        let mut scheduler = scheduler_with(FakeEngine::new(), FakeWindow::fixed(800, 600));

        let cmd = scheduler.begin_frame().unwrap().unwrap();
        scheduler.begin_render_pass(cmd);
        scheduler.end_render_pass(cmd);
        scheduler.window_mut().resized = true;
        scheduler.end_frame().unwrap();

        assert!(!scheduler.window_mut().was_resized());
        let (engine, _, _, _) = scheduler.into_parts();
        assert_eq!(engine.recreations, 1);
        assert_eq!(engine.submissions.len(), 1);
    }

    #[test]
    fn stale_present_recreates_but_frame_still_counts() {
        let mut engine = FakeEngine::new();
        engine.present_status = SurfaceStatus::Stale;
        let mut scheduler = scheduler_with(engine, FakeWindow::fixed(800, 600));

        let cmd = scheduler.begin_frame().unwrap().unwrap();
        scheduler.begin_render_pass(cmd);
        scheduler.end_render_pass(cmd);
        scheduler.end_frame().unwrap();

        // Slot advanced despite the stale present
        let cmd = scheduler.begin_frame().unwrap().unwrap();
        assert_eq!(scheduler.frame_index(), 1);
        scheduler.end_render_pass(cmd);
        scheduler.end_frame().unwrap();

        let (engine, _, _, _) = scheduler.into_parts();
        assert_eq!(engine.recreations, 1);
        assert_eq!(engine.submissions.len(), 2);
    }

    #[test]
    fn format_mismatch_is_logged_not_fatal() {
        let mut engine = FakeEngine::new();
        engine.formats_match = false;
        let mut scheduler = scheduler_with(engine, FakeWindow::fixed(800, 600));

        // Recreation succeeds even when formats change
        scheduler.recreate_swapchain().unwrap();
        let cmd = scheduler.begin_frame().unwrap().unwrap();
        scheduler.begin_render_pass(cmd);
        scheduler.end_render_pass(cmd);
        scheduler.end_frame().unwrap();
    }
}
