//! Render hardware interface.
//!
//! [`Rhi`] is the single boundary between engine code and a graphics API.
//! Every method has a harmless default (no-op, `None` or `false`), so a
//! backend only overrides what it supports and callers never need to know
//! which backend is active.
//!
//! # Backends
//!
//! - [`DummyRhi`] - headless backend that validates calls and records them
//! - `WgpuRhi` - GPU backend (requires the `wgpu-backend` feature)
//!
//! # Lifecycle
//!
//! A backend is created with [`create_rhi`], initialized with
//! [`Rhi::init`] and released with [`Rhi::destroy`]. The process-wide handle
//! ([`install`], [`global`], [`shutdown`]) wraps that bracket.

#[cfg(feature = "dummy")]
pub mod dummy;
mod global;
pub mod resources;
pub mod types;
pub mod vertex_declaration;
#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

use std::sync::Arc;

use crate::config::{BackendKind, RenderSettings};
use crate::error::RenderError;

#[cfg(feature = "dummy")]
pub use dummy::{DummyRhi, HeadlessWindow, RhiCommand};
pub use global::{global, install, shutdown, try_global};
pub use resources::{
    BoundShaderState, BufferRhi, BufferRhiRef, BufferUsage, DeviceContextRhi,
    DeviceContextRhiRef, DomainShaderRhiRef, DrawStats, GeometryShaderRhiRef, HullShaderRhiRef,
    PixelShaderRhiRef, ShaderRhi, ShaderRhiRef, StreamSource, TextureRhi, TextureRhiRef,
    VertexDeclarationRhi, VertexDeclarationRhiRef, VertexShaderRhiRef, ViewportRhi,
    ViewportRhiRef, ViewportWindow,
};
pub use types::{
    CullMode, FillMode, PixelFormat, PrimitiveType, RasterizerState, ShaderFrequency,
    ShaderFrequencyFlags, ViewportRect,
};
pub use vertex_declaration::{
    MAX_VERTEX_STREAMS, VertexDeclarationElementList, VertexElement, VertexElementType,
    VertexElementUsage,
};
#[cfg(feature = "wgpu-backend")]
pub use wgpu_backend::WgpuRhi;

#[cfg(feature = "editor")]
use crate::overlay::OverlayFrame;

/// The graphics device abstraction.
///
/// Methods take `&self`; backends keep their mutable state behind locks so a
/// single `Arc<dyn Rhi>` can be shared by the game and render threads.
/// Resource creation is synchronous and may stall; do it at load time.
pub trait Rhi: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str {
        "Null"
    }

    /// Make the device usable. Calling it again on an initialized device does nothing.
    fn init(&self, _is_editor: bool) {}

    /// Release all device resources. Calling it again does nothing.
    fn destroy(&self) {}

    fn is_initialize(&self) -> bool {
        false
    }

    /// Whether the device was initialized for editor use.
    fn is_editor(&self) -> bool {
        false
    }

    /// `Err(RenderError::DeviceLost)` once the device is gone for good.
    fn check_device(&self) -> Result<(), RenderError> {
        Ok(())
    }

    /// The default context, distinct from any deferred contexts.
    fn immediate_context(&self) -> Option<DeviceContextRhiRef> {
        None
    }

    /// Bind a platform window to a drawable swap target.
    ///
    /// Returns `None` if the window handle is invalid or the swap target cannot be created.
    fn create_viewport(
        &self,
        _window: Arc<dyn ViewportWindow>,
        _width: u32,
        _height: u32,
    ) -> Option<ViewportRhiRef> {
        None
    }

    fn resize_viewport(&self, _viewport: &ViewportRhiRef, _width: u32, _height: u32) {}

    /// Load a vertex stage program. Returns `None` on malformed bytecode.
    fn create_vertex_shader(&self, _code: &[u8]) -> Option<VertexShaderRhiRef> {
        None
    }

    /// Load a hull stage program. Returns `None` on malformed bytecode.
    fn create_hull_shader(&self, _code: &[u8]) -> Option<HullShaderRhiRef> {
        None
    }

    /// Load a domain stage program. Returns `None` on malformed bytecode.
    fn create_domain_shader(&self, _code: &[u8]) -> Option<DomainShaderRhiRef> {
        None
    }

    /// Load a pixel stage program. Returns `None` on malformed bytecode.
    fn create_pixel_shader(&self, _code: &[u8]) -> Option<PixelShaderRhiRef> {
        None
    }

    /// Load a geometry stage program. Returns `None` on malformed bytecode.
    fn create_geometry_shader(&self, _code: &[u8]) -> Option<GeometryShaderRhiRef> {
        None
    }

    fn create_vertex_declaration(
        &self,
        _elements: &[VertexElement],
    ) -> Option<VertexDeclarationRhiRef> {
        None
    }

    fn create_vertex_buffer(&self, _name: &str, _data: &[u8]) -> Option<BufferRhiRef> {
        None
    }

    /// `stride` is the index size in bytes, 2 or 4.
    fn create_index_buffer(&self, _name: &str, _stride: u32, _data: &[u8]) -> Option<BufferRhiRef> {
        None
    }

    fn create_texture_2d(
        &self,
        _name: &str,
        _width: u32,
        _height: u32,
        _format: PixelFormat,
        _data: &[u8],
    ) -> Option<TextureRhiRef> {
        None
    }

    /// Open one frame of rendering into `viewport`.
    ///
    /// Nesting two Begins on the same viewport is a fatal precondition violation.
    fn begin_drawing_viewport(&self, _context: &DeviceContextRhi, _viewport: &ViewportRhiRef) {}

    /// Close the frame, optionally presenting and optionally waiting for vertical sync.
    ///
    /// Ending a viewport that was not begun is a fatal precondition violation.
    fn end_drawing_viewport(
        &self,
        _context: &DeviceContextRhi,
        _viewport: &ViewportRhiRef,
        _present: bool,
        _lock_to_vsync: bool,
    ) {
    }

    /// Set the active rasterizer viewport rectangle and depth range.
    #[allow(clippy::too_many_arguments)]
    fn set_viewport(
        &self,
        _context: &DeviceContextRhi,
        _min_x: u32,
        _min_y: u32,
        _min_z: f32,
        _max_x: u32,
        _max_y: u32,
        _max_z: f32,
    ) {
    }

    fn set_bound_shader_state(&self, _context: &DeviceContextRhi, _state: &BoundShaderState) {}

    fn set_rasterizer_state(&self, _context: &DeviceContextRhi, _state: &RasterizerState) {}

    fn set_stream_source(
        &self,
        _context: &DeviceContextRhi,
        _stream_index: u32,
        _buffer: &BufferRhiRef,
        _stride: u32,
        _offset: u32,
    ) {
    }

    /// Upload `value` at byte `base_index` of constant buffer `buffer_index` of a stage.
    fn set_shader_parameter(
        &self,
        _context: &DeviceContextRhi,
        _frequency: ShaderFrequency,
        _buffer_index: u32,
        _base_index: u32,
        _value: &[u8],
    ) {
    }

    fn set_texture_parameter(
        &self,
        _context: &DeviceContextRhi,
        _frequency: ShaderFrequency,
        _texture_index: u32,
        _texture: &TextureRhiRef,
    ) {
    }

    fn draw_primitive(
        &self,
        _context: &DeviceContextRhi,
        _primitive_type: PrimitiveType,
        _base_vertex_index: u32,
        _num_primitives: u32,
        _num_instances: u32,
    ) {
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_indexed_primitive(
        &self,
        _context: &DeviceContextRhi,
        _index_buffer: &BufferRhiRef,
        _primitive_type: PrimitiveType,
        _base_vertex_index: i32,
        _start_index: u32,
        _num_primitives: u32,
        _num_instances: u32,
    ) {
    }

    /// Prepare the UI overlay pass. Returns `false` if unsupported.
    #[cfg(feature = "editor")]
    fn init_imgui(&self, _overlay: &egui::Context) -> bool {
        false
    }

    #[cfg(feature = "editor")]
    fn shutdown_imgui(&self) {}

    /// Open the UI overlay pass inside an already-open viewport frame.
    #[cfg(feature = "editor")]
    fn begin_drawing_imgui(&self, _context: &DeviceContextRhi, _viewport: &ViewportRhiRef) {}

    /// Submit and close the UI overlay pass.
    #[cfg(feature = "editor")]
    fn end_drawing_imgui(
        &self,
        _context: &DeviceContextRhi,
        _viewport: &ViewportRhiRef,
        _frame: &OverlayFrame,
    ) {
    }
}

/// Create the device backend requested by `settings`.
///
/// `BackendKind::Auto` tries the GPU backend first and falls back to the
/// dummy backend. The returned device is not yet initialized.
pub fn create_rhi(settings: &RenderSettings) -> Result<Arc<dyn Rhi>, RenderError> {
    match settings.backend {
        BackendKind::Wgpu => create_wgpu(settings),
        BackendKind::Dummy => create_dummy(),
        BackendKind::Auto => match create_wgpu(settings) {
            Ok(rhi) => Ok(rhi),
            Err(e) => {
                log::warn!("GPU backend unavailable ({e}), falling back to dummy backend");
                create_dummy()
            }
        },
    }
}

#[cfg(feature = "wgpu-backend")]
fn create_wgpu(settings: &RenderSettings) -> Result<Arc<dyn Rhi>, RenderError> {
    let rhi = WgpuRhi::new(settings)?;
    log::info!("Using wgpu backend");
    Ok(Arc::new(rhi))
}

#[cfg(not(feature = "wgpu-backend"))]
fn create_wgpu(_settings: &RenderSettings) -> Result<Arc<dyn Rhi>, RenderError> {
    Err(RenderError::FeatureNotSupported(
        "wgpu backend not compiled in (enable the `wgpu-backend` feature)".into(),
    ))
}

#[cfg(feature = "dummy")]
fn create_dummy() -> Result<Arc<dyn Rhi>, RenderError> {
    log::info!("Using dummy backend");
    Ok(Arc::new(DummyRhi::new()))
}

#[cfg(not(feature = "dummy"))]
fn create_dummy() -> Result<Arc<dyn Rhi>, RenderError> {
    Err(RenderError::FeatureNotSupported(
        "dummy backend not compiled in (enable the `dummy` feature)".into(),
    ))
}
