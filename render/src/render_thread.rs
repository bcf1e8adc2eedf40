//! The render thread.
//!
//! The game thread produces [`FrameSnapshot`]s and render commands; a
//! dedicated thread consumes them in order and is the only place that talks
//! to the device. The channel is bounded by `max_frames_in_flight`, so a game
//! thread running ahead blocks in [`RenderThread::submit_frame`].

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use crate::config::RenderSettings;
use crate::error::RenderError;
use crate::registry::RenderRegistry;
use crate::rhi::{DeviceContextRhi, DeviceContextRhiRef, Rhi};
use crate::scene::{FrameSnapshot, FrameStats, SceneRenderer};

/// What a render command can reach.
pub struct RenderThreadContext<'a> {
    pub rhi: &'a dyn Rhi,
    pub context: &'a DeviceContextRhi,
    pub registry: &'a RenderRegistry,
    pub renderer: &'a mut SceneRenderer,
}

pub type RenderCommand = Box<dyn FnOnce(&mut RenderThreadContext<'_>) + Send>;

enum RenderMessage {
    Frame(Box<FrameSnapshot>),
    Command(RenderCommand),
    Flush(mpsc::Sender<()>),
    Shutdown,
}

/// Totals over the lifetime of a render thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames_rendered: u64,
    pub commands_executed: u64,
    pub mesh_batches: u64,
    pub dynamic_meshes: u64,
    pub lines: u64,
    pub skipped_batches: u64,
    /// Frames discarded because the device was lost.
    pub frames_dropped: u64,
    /// Draw calls recorded by the immediate context.
    pub draw_calls: u64,
}

impl RenderStats {
    fn add_frame(&mut self, frame: FrameStats) {
        self.frames_rendered += 1;
        self.mesh_batches += frame.mesh_batches as u64;
        self.dynamic_meshes += frame.dynamic_meshes as u64;
        self.lines += frame.lines as u64;
        self.skipped_batches += frame.skipped_batches as u64;
    }
}

/// Handle to the render thread.
pub struct RenderThread {
    rhi: Arc<dyn Rhi>,
    sender: Option<SyncSender<RenderMessage>>,
    handle: Option<JoinHandle<RenderStats>>,
}

impl std::fmt::Debug for RenderThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderThread")
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl RenderThread {
    /// Start the render thread on an initialized device.
    pub fn spawn(
        rhi: Arc<dyn Rhi>,
        registry: Arc<RenderRegistry>,
        settings: &RenderSettings,
    ) -> Result<Self, RenderError> {
        if !rhi.is_initialize() {
            return Err(RenderError::InitializationFailed(format!(
                "{} device is not initialized",
                rhi.name()
            )));
        }
        settings.validate()?;
        rhi.check_device()?;
        let context = rhi.immediate_context().ok_or_else(|| {
            RenderError::InitializationFailed(format!("{} has no immediate context", rhi.name()))
        })?;

        let (sender, receiver) = mpsc::sync_channel(settings.max_frames_in_flight);
        let loop_rhi = rhi.clone();
        let handle = thread::Builder::new()
            .name("RenderThread".into())
            .spawn(move || render_loop(loop_rhi, context, registry, receiver))
            .map_err(|e| {
                RenderError::InitializationFailed(format!("failed to spawn render thread: {e}"))
            })?;

        log::info!(
            "Render thread started ({} frames in flight)",
            settings.max_frames_in_flight
        );
        Ok(Self {
            rhi,
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Queue a frame. Blocks while `max_frames_in_flight` frames are queued.
    ///
    /// Fails with [`RenderError::DeviceLost`] once the device is gone.
    pub fn submit_frame(&self, frame: FrameSnapshot) -> Result<(), RenderError> {
        self.rhi.check_device()?;
        self.send(RenderMessage::Frame(Box::new(frame)))
    }

    /// Run `command` on the render thread, after everything queued before it.
    pub fn enqueue_command<F>(&self, command: F) -> Result<(), RenderError>
    where
        F: FnOnce(&mut RenderThreadContext<'_>) + Send + 'static,
    {
        self.send(RenderMessage::Command(Box::new(command)))
    }

    /// Wait until everything queued so far has been processed.
    pub fn flush(&self) -> Result<(), RenderError> {
        let (done, wait) = mpsc::channel();
        self.send(RenderMessage::Flush(done))?;
        wait.recv().map_err(|_| disconnected())
    }

    /// Process the remaining queue, stop the thread and return its totals.
    pub fn shutdown(mut self) -> Result<RenderStats, RenderError> {
        self.stop()
    }

    fn send(&self, message: RenderMessage) -> Result<(), RenderError> {
        self.sender
            .as_ref()
            .ok_or_else(disconnected)?
            .send(message)
            .map_err(|_| disconnected())
    }

    fn stop(&mut self) -> Result<RenderStats, RenderError> {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(RenderMessage::Shutdown);
        }
        let handle = self.handle.take().ok_or_else(disconnected)?;
        let stats = handle
            .join()
            .map_err(|_| RenderError::Internal("render thread panicked".into()))?;
        log::info!(
            "Render thread stopped after {} frames, {} draw calls",
            stats.frames_rendered,
            stats.draw_calls
        );
        Ok(stats)
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        if self.handle.is_some()
            && let Err(e) = self.stop()
        {
            log::error!("Render thread shutdown failed: {e}");
        }
    }
}

fn disconnected() -> RenderError {
    RenderError::Internal("render thread has exited".into())
}

fn render_loop(
    rhi: Arc<dyn Rhi>,
    context: DeviceContextRhiRef,
    registry: Arc<RenderRegistry>,
    receiver: Receiver<RenderMessage>,
) -> RenderStats {
    redlilium_core::set_thread_name!("RenderThread");

    let mut renderer = SceneRenderer::new();
    let mut stats = RenderStats::default();
    while let Ok(message) = receiver.recv() {
        match message {
            RenderMessage::Frame(frame) => {
                if let Err(e) = rhi.check_device() {
                    log::warn!("Dropping frame {}: {e}", frame.frame_number);
                    stats.frames_dropped += 1;
                    continue;
                }
                let frame_stats = renderer.render(rhi.as_ref(), &context, &registry, *frame);
                stats.add_frame(frame_stats);
                renderer.collect_garbage();
                redlilium_core::frame_mark!();
            }
            RenderMessage::Command(command) => {
                command(&mut RenderThreadContext {
                    rhi: rhi.as_ref(),
                    context: &context,
                    registry: &registry,
                    renderer: &mut renderer,
                });
                stats.commands_executed += 1;
            }
            RenderMessage::Flush(done) => {
                let _ = done.send(());
            }
            RenderMessage::Shutdown => break,
        }
    }
    stats.draw_calls = context.stats().draw_calls;
    stats
}
