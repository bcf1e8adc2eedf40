//! Dummy RHI backend for testing and headless runs.
//!
//! Performs no GPU work. It validates arguments the way a real device
//! would, keeps the same per-context state, and records every state change
//! and draw as an [`RhiCommand`] so tests can inspect what was submitted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, RawWindowHandle,
    WebWindowHandle, WindowHandle,
};

use super::resources::{
    BoundShaderState, BufferRhi, BufferRhiRef, BufferUsage, DeviceContextRhi,
    DeviceContextRhiRef, GpuBuffer, GpuShader, GpuTexture, GpuViewport, ShaderRhi, ShaderRhiRef,
    StreamSource, TextureRhi, TextureRhiRef, VertexDeclarationRhi, VertexDeclarationRhiRef,
    ViewportRhi, ViewportRhiRef, ViewportWindow,
};
use super::types::{PixelFormat, PrimitiveType, RasterizerState, ShaderFrequency, ViewportRect};
use super::vertex_declaration::{MAX_VERTEX_STREAMS, VertexElement, validate_elements};
use super::Rhi;
use crate::error::RenderError;
#[cfg(feature = "editor")]
use crate::overlay::OverlayFrame;

/// One recorded call on the dummy device.
#[derive(Debug, Clone, PartialEq)]
pub enum RhiCommand {
    BeginDrawingViewport {
        viewport: u64,
    },
    EndDrawingViewport {
        viewport: u64,
        present: bool,
        lock_to_vsync: bool,
    },
    SetViewport(ViewportRect),
    SetBoundShaderState {
        declaration_hash: u32,
        vertex_shader: u32,
        pixel_shader: Option<u32>,
    },
    SetRasterizerState(RasterizerState),
    SetStreamSource {
        stream_index: u32,
        buffer: String,
        stride: u32,
        offset: u32,
    },
    SetShaderParameter {
        frequency: ShaderFrequency,
        buffer_index: u32,
        base_index: u32,
        value: Vec<u8>,
    },
    SetTextureParameter {
        frequency: ShaderFrequency,
        texture_index: u32,
        texture: String,
    },
    DrawPrimitive {
        primitive_type: PrimitiveType,
        base_vertex_index: u32,
        num_primitives: u32,
        num_instances: u32,
    },
    DrawIndexedPrimitive {
        index_buffer: String,
        primitive_type: PrimitiveType,
        base_vertex_index: i32,
        start_index: u32,
        num_primitives: u32,
        num_instances: u32,
    },
    BeginDrawingOverlay {
        viewport: u64,
    },
    EndDrawingOverlay {
        viewport: u64,
        primitives: usize,
    },
}

impl RhiCommand {
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::DrawPrimitive { .. } | Self::DrawIndexedPrimitive { .. }
        )
    }
}

/// Window stand-in for headless runs.
///
/// Reports a web handle with a fixed id; nothing ever dereferences it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessWindow {
    id: u32,
}

impl HeadlessWindow {
    pub fn new(id: u32) -> Self {
        Self { id }
    }
}

impl HasWindowHandle for HeadlessWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        let raw = RawWindowHandle::Web(WebWindowHandle::new(self.id));
        // SAFETY: a web handle is a plain id and borrows no native resource.
        Ok(unsafe { WindowHandle::borrow_raw(raw) })
    }
}

impl HasDisplayHandle for HeadlessWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        Ok(DisplayHandle::web())
    }
}

/// Headless device.
#[derive(Debug)]
pub struct DummyRhi {
    initialized: AtomicBool,
    is_editor: AtomicBool,
    overlay_initialized: AtomicBool,
    device_lost: AtomicBool,
    immediate_context: DeviceContextRhiRef,
    commands: Mutex<Vec<RhiCommand>>,
    shaders_created: AtomicUsize,
}

impl DummyRhi {
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            is_editor: AtomicBool::new(false),
            overlay_initialized: AtomicBool::new(false),
            device_lost: AtomicBool::new(false),
            immediate_context: Arc::new(DeviceContextRhi::new(true)),
            commands: Mutex::new(Vec::new()),
            shaders_created: AtomicUsize::new(0),
        }
    }

    /// Mark the device as lost, the way a driver reset would.
    pub fn lose_device(&self) {
        if !self.device_lost.swap(true, Ordering::AcqRel) {
            log::error!("DummyRhi: device lost");
        }
    }

    /// Recorded commands since the last call, oldest first.
    pub fn take_commands(&self) -> Vec<RhiCommand> {
        std::mem::take(&mut *self.commands.lock())
    }

    /// Copy of the recorded commands, without clearing them.
    pub fn commands(&self) -> Vec<RhiCommand> {
        self.commands.lock().clone()
    }

    /// Number of stage programs created so far.
    pub fn shaders_created(&self) -> usize {
        self.shaders_created.load(Ordering::Relaxed)
    }

    fn record(&self, command: RhiCommand) {
        log::trace!("DummyRhi: {:?}", command);
        self.commands.lock().push(command);
    }

    fn assert_initialized(&self, operation: &str) {
        assert!(
            self.initialized.load(Ordering::Acquire),
            "DummyRhi: {operation} on an uninitialized device"
        );
    }

    fn create_shader(&self, frequency: ShaderFrequency, code: &[u8]) -> Option<ShaderRhiRef> {
        if code.is_empty() {
            log::warn!("DummyRhi: rejecting empty {frequency} shader bytecode");
            return None;
        }
        self.shaders_created.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "DummyRhi: created {} shader ({} bytes)",
            frequency,
            code.len()
        );
        Some(Arc::new(ShaderRhi::new(frequency, code, GpuShader::Dummy)))
    }

    fn check_draw_state(&self, context: &DeviceContextRhi) {
        self.assert_initialized("draw");
        let state = context.state();
        let Some(bound) = state.bound_shader_state.as_ref() else {
            panic!("DummyRhi: draw issued without a bound shader state");
        };
        for element in bound.declaration.elements() {
            assert!(
                state.streams[element.stream_index as usize].is_some(),
                "DummyRhi: draw reads stream {} which has no vertex buffer bound",
                element.stream_index
            );
        }
    }
}

impl Default for DummyRhi {
    fn default() -> Self {
        Self::new()
    }
}

impl Rhi for DummyRhi {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn init(&self, is_editor: bool) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            log::debug!("DummyRhi: already initialized");
            return;
        }
        self.is_editor.store(is_editor, Ordering::Release);
        log::info!("DummyRhi initialized (editor: {is_editor})");
    }

    fn destroy(&self) {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return;
        }
        self.overlay_initialized.store(false, Ordering::Release);
        self.immediate_context.state().reset_bindings();
        log::info!("DummyRhi destroyed");
    }

    fn is_initialize(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn is_editor(&self) -> bool {
        self.is_editor.load(Ordering::Acquire)
    }

    fn check_device(&self) -> Result<(), RenderError> {
        if self.device_lost.load(Ordering::Acquire) {
            return Err(RenderError::DeviceLost);
        }
        Ok(())
    }

    fn immediate_context(&self) -> Option<DeviceContextRhiRef> {
        Some(self.immediate_context.clone())
    }

    fn create_viewport(
        &self,
        window: Arc<dyn ViewportWindow>,
        width: u32,
        height: u32,
    ) -> Option<ViewportRhiRef> {
        if let Err(e) = window.window_handle() {
            log::warn!("DummyRhi: invalid window handle: {e}");
            return None;
        }
        if width == 0 || height == 0 {
            log::warn!("DummyRhi: refusing zero-sized viewport {width}x{height}");
            return None;
        }
        let viewport = Arc::new(ViewportRhi::new(width, height, GpuViewport::Dummy));
        log::trace!(
            "DummyRhi: created viewport {} ({}x{})",
            viewport.id(),
            width,
            height
        );
        Some(viewport)
    }

    fn resize_viewport(&self, viewport: &ViewportRhiRef, width: u32, height: u32) {
        viewport.set_size(width, height);
    }

    fn create_vertex_shader(&self, code: &[u8]) -> Option<ShaderRhiRef> {
        self.create_shader(ShaderFrequency::Vertex, code)
    }

    fn create_hull_shader(&self, code: &[u8]) -> Option<ShaderRhiRef> {
        self.create_shader(ShaderFrequency::Hull, code)
    }

    fn create_domain_shader(&self, code: &[u8]) -> Option<ShaderRhiRef> {
        self.create_shader(ShaderFrequency::Domain, code)
    }

    fn create_pixel_shader(&self, code: &[u8]) -> Option<ShaderRhiRef> {
        self.create_shader(ShaderFrequency::Pixel, code)
    }

    fn create_geometry_shader(&self, code: &[u8]) -> Option<ShaderRhiRef> {
        self.create_shader(ShaderFrequency::Geometry, code)
    }

    fn create_vertex_declaration(
        &self,
        elements: &[VertexElement],
    ) -> Option<VertexDeclarationRhiRef> {
        if let Err(e) = validate_elements(elements) {
            log::warn!("DummyRhi: invalid vertex declaration: {e}");
            return None;
        }
        Some(Arc::new(VertexDeclarationRhi::new(elements)))
    }

    fn create_vertex_buffer(&self, name: &str, data: &[u8]) -> Option<BufferRhiRef> {
        if data.is_empty() {
            log::warn!("DummyRhi: refusing empty vertex buffer '{name}'");
            return None;
        }
        log::trace!("DummyRhi: created vertex buffer '{}' ({} bytes)", name, data.len());
        Some(Arc::new(BufferRhi::new(
            name,
            BufferUsage::Vertex,
            data.len() as u64,
            GpuBuffer::Dummy,
        )))
    }

    fn create_index_buffer(&self, name: &str, stride: u32, data: &[u8]) -> Option<BufferRhiRef> {
        if stride != 2 && stride != 4 {
            log::warn!("DummyRhi: index buffer '{name}' has unsupported stride {stride}");
            return None;
        }
        if data.is_empty() || data.len() % stride as usize != 0 {
            log::warn!(
                "DummyRhi: index buffer '{}' size {} is not a multiple of {}",
                name,
                data.len(),
                stride
            );
            return None;
        }
        Some(Arc::new(BufferRhi::new(
            name,
            BufferUsage::Index { stride },
            data.len() as u64,
            GpuBuffer::Dummy,
        )))
    }

    fn create_texture_2d(
        &self,
        name: &str,
        width: u32,
        height: u32,
        format: PixelFormat,
        data: &[u8],
    ) -> Option<TextureRhiRef> {
        let expected = width as usize * height as usize * format.bytes_per_pixel() as usize;
        if width == 0 || height == 0 || (!data.is_empty() && data.len() != expected) {
            log::warn!(
                "DummyRhi: texture '{}' {}x{} {:?} got {} bytes, expected {}",
                name,
                width,
                height,
                format,
                data.len(),
                expected
            );
            return None;
        }
        Some(Arc::new(TextureRhi::new(
            name,
            width,
            height,
            format,
            GpuTexture::Dummy,
        )))
    }

    fn begin_drawing_viewport(&self, context: &DeviceContextRhi, viewport: &ViewportRhiRef) {
        self.assert_initialized("BeginDrawingViewport");
        viewport.mark_begin_drawing();
        {
            let mut state = context.state();
            state.current_viewport = Some(viewport.clone());
            state.stats.frames_begun += 1;
        }
        self.record(RhiCommand::BeginDrawingViewport {
            viewport: viewport.id(),
        });
    }

    fn end_drawing_viewport(
        &self,
        context: &DeviceContextRhi,
        viewport: &ViewportRhiRef,
        present: bool,
        lock_to_vsync: bool,
    ) {
        viewport.mark_end_drawing();
        {
            let mut state = context.state();
            state.current_viewport = None;
            state.reset_bindings();
            if present {
                state.stats.frames_presented += 1;
            }
        }
        self.record(RhiCommand::EndDrawingViewport {
            viewport: viewport.id(),
            present,
            lock_to_vsync,
        });
    }

    fn set_viewport(
        &self,
        context: &DeviceContextRhi,
        min_x: u32,
        min_y: u32,
        min_z: f32,
        max_x: u32,
        max_y: u32,
        max_z: f32,
    ) {
        let rect = ViewportRect {
            min_x,
            min_y,
            min_z,
            max_x,
            max_y,
            max_z,
        };
        context.state().viewport = Some(rect);
        self.record(RhiCommand::SetViewport(rect));
    }

    fn set_bound_shader_state(&self, context: &DeviceContextRhi, state: &BoundShaderState) {
        context.state().bound_shader_state = Some(state.clone());
        self.record(RhiCommand::SetBoundShaderState {
            declaration_hash: state.declaration.hash(),
            vertex_shader: state.vertex_shader.code_hash(),
            pixel_shader: state.pixel_shader.as_ref().map(|ps| ps.code_hash()),
        });
    }

    fn set_rasterizer_state(&self, context: &DeviceContextRhi, state: &RasterizerState) {
        context.state().rasterizer = *state;
        self.record(RhiCommand::SetRasterizerState(*state));
    }

    fn set_stream_source(
        &self,
        context: &DeviceContextRhi,
        stream_index: u32,
        buffer: &BufferRhiRef,
        stride: u32,
        offset: u32,
    ) {
        assert!(
            (stream_index as usize) < MAX_VERTEX_STREAMS,
            "DummyRhi: stream index {stream_index} out of range"
        );
        context.state().streams[stream_index as usize] = Some(StreamSource {
            buffer: buffer.clone(),
            stride,
            offset,
        });
        self.record(RhiCommand::SetStreamSource {
            stream_index,
            buffer: buffer.name().to_string(),
            stride,
            offset,
        });
    }

    fn set_shader_parameter(
        &self,
        context: &DeviceContextRhi,
        frequency: ShaderFrequency,
        buffer_index: u32,
        base_index: u32,
        value: &[u8],
    ) {
        context
            .state()
            .write_constant(frequency, buffer_index, base_index, value);
        self.record(RhiCommand::SetShaderParameter {
            frequency,
            buffer_index,
            base_index,
            value: value.to_vec(),
        });
    }

    fn set_texture_parameter(
        &self,
        context: &DeviceContextRhi,
        frequency: ShaderFrequency,
        texture_index: u32,
        texture: &TextureRhiRef,
    ) {
        context.state().textures[frequency.index()].insert(texture_index, texture.clone());
        self.record(RhiCommand::SetTextureParameter {
            frequency,
            texture_index,
            texture: texture.name().to_string(),
        });
    }

    fn draw_primitive(
        &self,
        context: &DeviceContextRhi,
        primitive_type: PrimitiveType,
        base_vertex_index: u32,
        num_primitives: u32,
        num_instances: u32,
    ) {
        self.check_draw_state(context);
        {
            let mut state = context.state();
            state.stats.draw_calls += 1;
            state.stats.primitives += num_primitives as u64 * num_instances.max(1) as u64;
        }
        self.record(RhiCommand::DrawPrimitive {
            primitive_type,
            base_vertex_index,
            num_primitives,
            num_instances,
        });
    }

    fn draw_indexed_primitive(
        &self,
        context: &DeviceContextRhi,
        index_buffer: &BufferRhiRef,
        primitive_type: PrimitiveType,
        base_vertex_index: i32,
        start_index: u32,
        num_primitives: u32,
        num_instances: u32,
    ) {
        self.check_draw_state(context);
        assert!(
            matches!(index_buffer.usage(), BufferUsage::Index { .. }),
            "DummyRhi: '{}' is not an index buffer",
            index_buffer.name()
        );
        {
            let mut state = context.state();
            state.stats.draw_calls += 1;
            state.stats.primitives += num_primitives as u64 * num_instances.max(1) as u64;
        }
        self.record(RhiCommand::DrawIndexedPrimitive {
            index_buffer: index_buffer.name().to_string(),
            primitive_type,
            base_vertex_index,
            start_index,
            num_primitives,
            num_instances,
        });
    }

    #[cfg(feature = "editor")]
    fn init_imgui(&self, _overlay: &egui::Context) -> bool {
        if !self.is_editor() {
            log::warn!("DummyRhi: UI overlay requested on a non-editor device");
            return false;
        }
        self.overlay_initialized.store(true, Ordering::Release);
        true
    }

    #[cfg(feature = "editor")]
    fn shutdown_imgui(&self) {
        self.overlay_initialized.store(false, Ordering::Release);
    }

    #[cfg(feature = "editor")]
    fn begin_drawing_imgui(&self, _context: &DeviceContextRhi, viewport: &ViewportRhiRef) {
        assert!(
            self.overlay_initialized.load(Ordering::Acquire),
            "DummyRhi: BeginDrawingImGUI before InitImGUI"
        );
        assert!(
            viewport.is_drawing(),
            "DummyRhi: UI overlay pass opened outside a viewport frame"
        );
        self.record(RhiCommand::BeginDrawingOverlay {
            viewport: viewport.id(),
        });
    }

    #[cfg(feature = "editor")]
    fn end_drawing_imgui(
        &self,
        _context: &DeviceContextRhi,
        viewport: &ViewportRhiRef,
        frame: &OverlayFrame,
    ) {
        assert!(
            viewport.is_drawing(),
            "DummyRhi: UI overlay pass closed outside a viewport frame"
        );
        self.record(RhiCommand::EndDrawingOverlay {
            viewport: viewport.id(),
            primitives: frame.primitives.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> DummyRhi {
        let rhi = DummyRhi::new();
        rhi.init(false);
        rhi
    }

    #[test]
    fn lifecycle_is_idempotent() {
        let rhi = DummyRhi::new();
        assert!(!rhi.is_initialize());
        rhi.init(true);
        rhi.init(false);
        assert!(rhi.is_initialize());
        assert!(rhi.is_editor());
        rhi.destroy();
        rhi.destroy();
        assert!(!rhi.is_initialize());
    }

    #[test]
    fn empty_bytecode_yields_no_stage() {
        let rhi = ready();
        assert!(rhi.create_vertex_shader(&[]).is_none());
        assert!(rhi.create_pixel_shader(&[]).is_none());
        assert_eq!(rhi.shaders_created(), 0);
    }

    #[test]
    fn stage_handles_carry_frequency() {
        let rhi = ready();
        let stages = [
            (rhi.create_vertex_shader(b"v"), ShaderFrequency::Vertex),
            (rhi.create_hull_shader(b"h"), ShaderFrequency::Hull),
            (rhi.create_domain_shader(b"d"), ShaderFrequency::Domain),
            (rhi.create_geometry_shader(b"g"), ShaderFrequency::Geometry),
            (rhi.create_pixel_shader(b"p"), ShaderFrequency::Pixel),
        ];
        for (stage, frequency) in stages {
            assert_eq!(stage.unwrap().frequency(), frequency);
        }
        assert_eq!(rhi.shaders_created(), 5);
    }

    #[test]
    fn index_buffer_validation() {
        let rhi = ready();
        assert!(rhi.create_index_buffer("ib", 2, &[0; 6]).is_some());
        assert!(rhi.create_index_buffer("ib", 4, &[0; 6]).is_none());
        assert!(rhi.create_index_buffer("ib", 3, &[0; 6]).is_none());
    }

    #[test]
    fn texture_size_validation() {
        let rhi = ready();
        assert!(
            rhi.create_texture_2d("t", 2, 2, PixelFormat::Rgba8Unorm, &[0; 16])
                .is_some()
        );
        assert!(
            rhi.create_texture_2d("t", 2, 2, PixelFormat::Rgba8Unorm, &[0; 15])
                .is_none()
        );
        assert!(
            rhi.create_texture_2d("t", 0, 2, PixelFormat::Rgba8Unorm, &[])
                .is_none()
        );
    }

    #[test]
    fn set_viewport_updates_context() {
        let rhi = ready();
        let context = rhi.immediate_context().unwrap();
        rhi.set_viewport(&context, 0, 0, 0.0, 640, 480, 1.0);
        let rect = context.viewport_rect().unwrap();
        assert_eq!((rect.width(), rect.height()), (640, 480));
        assert_eq!(rhi.take_commands(), vec![RhiCommand::SetViewport(rect)]);
        assert!(rhi.commands().is_empty());
    }

    #[test]
    #[should_panic(expected = "without a bound shader state")]
    fn draw_without_shaders_panics() {
        let rhi = ready();
        let context = rhi.immediate_context().unwrap();
        rhi.draw_primitive(&context, PrimitiveType::TriangleList, 0, 1, 1);
    }

    #[test]
    #[should_panic(expected = "uninitialized device")]
    fn draw_before_init_panics() {
        let rhi = DummyRhi::new();
        let context = rhi.immediate_context().unwrap();
        rhi.draw_primitive(&context, PrimitiveType::TriangleList, 0, 1, 1);
    }

    #[test]
    fn lost_device_reports_device_lost() {
        let rhi = ready();
        assert_eq!(rhi.check_device(), Ok(()));
        rhi.lose_device();
        rhi.lose_device();
        assert_eq!(rhi.check_device(), Err(RenderError::DeviceLost));
    }
}
