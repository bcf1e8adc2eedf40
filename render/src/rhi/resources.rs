//! Reference-counted RHI resources.
//!
//! Every handle is an `Arc`; the last owner to drop it releases the backend
//! object, on whatever thread that happens. Backend payloads live in the
//! `Gpu*` enums, one variant per compiled backend.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use static_assertions::assert_impl_all;

use super::types::{RasterizerState, ShaderFrequency, ViewportRect};
use super::vertex_declaration::{MAX_VERTEX_STREAMS, VertexElement};
use crate::rhi::types::PixelFormat;

/// A platform window a viewport can present into.
pub trait ViewportWindow: HasWindowHandle + HasDisplayHandle + Send + Sync {}

impl<T: HasWindowHandle + HasDisplayHandle + Send + Sync> ViewportWindow for T {}

// ---------------------------------------------------------------------------
// Backend payloads
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) enum GpuShader {
    Dummy,
    #[cfg(feature = "wgpu-backend")]
    Wgpu(wgpu::ShaderModule),
}

#[derive(Debug)]
pub(crate) enum GpuBuffer {
    Dummy,
    #[cfg(feature = "wgpu-backend")]
    Wgpu(wgpu::Buffer),
}

#[derive(Debug)]
pub(crate) enum GpuTexture {
    Dummy,
    #[cfg(feature = "wgpu-backend")]
    Wgpu {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

#[derive(Debug)]
pub(crate) enum GpuViewport {
    Dummy,
    #[cfg(feature = "wgpu-backend")]
    Wgpu(Box<super::wgpu_backend::WgpuViewport>),
}

// ---------------------------------------------------------------------------
// Shader stage handles
// ---------------------------------------------------------------------------

/// Compiled program for one pipeline stage.
#[derive(Debug)]
pub struct ShaderRhi {
    frequency: ShaderFrequency,
    code_hash: u32,
    code_size: usize,
    pub(crate) gpu: GpuShader,
}

impl ShaderRhi {
    pub(crate) fn new(frequency: ShaderFrequency, code: &[u8], gpu: GpuShader) -> Self {
        Self {
            frequency,
            code_hash: redlilium_core::hash::fnv1a_hash(code),
            code_size: code.len(),
            gpu,
        }
    }

    pub fn frequency(&self) -> ShaderFrequency {
        self.frequency
    }

    /// FNV-1a hash of the bytecode the stage was created from.
    pub fn code_hash(&self) -> u32 {
        self.code_hash
    }

    pub fn code_size(&self) -> usize {
        self.code_size
    }
}

pub type ShaderRhiRef = Arc<ShaderRhi>;
pub type VertexShaderRhiRef = ShaderRhiRef;
pub type HullShaderRhiRef = ShaderRhiRef;
pub type DomainShaderRhiRef = ShaderRhiRef;
pub type GeometryShaderRhiRef = ShaderRhiRef;
pub type PixelShaderRhiRef = ShaderRhiRef;

// ---------------------------------------------------------------------------
// Geometry resources
// ---------------------------------------------------------------------------

/// Device-side copy of a vertex declaration.
#[derive(Debug)]
pub struct VertexDeclarationRhi {
    elements: Vec<VertexElement>,
    hash: u32,
}

impl VertexDeclarationRhi {
    pub(crate) fn new(elements: &[VertexElement]) -> Self {
        Self {
            elements: elements.to_vec(),
            hash: super::vertex_declaration::hash_elements(elements),
        }
    }

    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }
}

pub type VertexDeclarationRhiRef = Arc<VertexDeclarationRhi>;

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    /// Index buffer with 2- or 4-byte indices.
    Index { stride: u32 },
}

#[derive(Debug)]
pub struct BufferRhi {
    name: String,
    usage: BufferUsage,
    size: u64,
    pub(crate) gpu: GpuBuffer,
}

impl BufferRhi {
    pub(crate) fn new(name: &str, usage: BufferUsage, size: u64, gpu: GpuBuffer) -> Self {
        Self {
            name: name.to_string(),
            usage,
            size,
            gpu,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

pub type BufferRhiRef = Arc<BufferRhi>;

#[derive(Debug)]
pub struct TextureRhi {
    name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    pub(crate) gpu: GpuTexture,
}

impl TextureRhi {
    pub(crate) fn new(
        name: &str,
        width: u32,
        height: u32,
        format: PixelFormat,
        gpu: GpuTexture,
    ) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            format,
            gpu,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }
}

pub type TextureRhiRef = Arc<TextureRhi>;

// ---------------------------------------------------------------------------
// Viewport
// ---------------------------------------------------------------------------

static NEXT_VIEWPORT_ID: AtomicU64 = AtomicU64::new(1);

/// A drawable swap target bound to a platform window.
///
/// Tracks the Begin/End drawing bracket itself, so every backend gets the
/// same precondition checks.
#[derive(Debug)]
pub struct ViewportRhi {
    id: u64,
    width: AtomicU32,
    height: AtomicU32,
    drawing: AtomicBool,
    pub(crate) gpu: GpuViewport,
}

impl ViewportRhi {
    pub(crate) fn new(width: u32, height: u32, gpu: GpuViewport) -> Self {
        Self {
            id: NEXT_VIEWPORT_ID.fetch_add(1, Ordering::Relaxed),
            width: AtomicU32::new(width),
            height: AtomicU32::new(height),
            drawing: AtomicBool::new(false),
            gpu,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        (
            self.width.load(Ordering::Acquire),
            self.height.load(Ordering::Acquire),
        )
    }

    pub(crate) fn set_size(&self, width: u32, height: u32) {
        self.width.store(width, Ordering::Release);
        self.height.store(height, Ordering::Release);
    }

    /// Whether a frame is open on this viewport.
    pub fn is_drawing(&self) -> bool {
        self.drawing.load(Ordering::Acquire)
    }

    /// Open the frame bracket.
    ///
    /// # Panics
    ///
    /// Panics if a frame is already open on this viewport.
    pub fn mark_begin_drawing(&self) {
        let was_drawing = self.drawing.swap(true, Ordering::AcqRel);
        assert!(
            !was_drawing,
            "BeginDrawingViewport called twice on viewport {} without EndDrawingViewport",
            self.id
        );
    }

    /// Close the frame bracket.
    ///
    /// # Panics
    ///
    /// Panics if no frame is open on this viewport.
    pub fn mark_end_drawing(&self) {
        let was_drawing = self.drawing.swap(false, Ordering::AcqRel);
        assert!(
            was_drawing,
            "EndDrawingViewport called on viewport {} without BeginDrawingViewport",
            self.id
        );
    }
}

pub type ViewportRhiRef = Arc<ViewportRhi>;

// ---------------------------------------------------------------------------
// Bound shader state
// ---------------------------------------------------------------------------

/// Vertex declaration plus the stage programs of one draw.
#[derive(Debug, Clone)]
pub struct BoundShaderState {
    pub declaration: VertexDeclarationRhiRef,
    pub vertex_shader: VertexShaderRhiRef,
    pub hull_shader: Option<HullShaderRhiRef>,
    pub domain_shader: Option<DomainShaderRhiRef>,
    pub geometry_shader: Option<GeometryShaderRhiRef>,
    pub pixel_shader: Option<PixelShaderRhiRef>,
}

impl BoundShaderState {
    pub fn new(declaration: VertexDeclarationRhiRef, vertex_shader: VertexShaderRhiRef) -> Self {
        Self {
            declaration,
            vertex_shader,
            hull_shader: None,
            domain_shader: None,
            geometry_shader: None,
            pixel_shader: None,
        }
    }

    pub fn with_pixel_shader(mut self, pixel_shader: Option<PixelShaderRhiRef>) -> Self {
        self.pixel_shader = pixel_shader;
        self
    }

    pub fn with_geometry_shader(mut self, geometry_shader: Option<GeometryShaderRhiRef>) -> Self {
        self.geometry_shader = geometry_shader;
        self
    }

    pub fn with_tessellation(
        mut self,
        hull_shader: Option<HullShaderRhiRef>,
        domain_shader: Option<DomainShaderRhiRef>,
    ) -> Self {
        self.hull_shader = hull_shader;
        self.domain_shader = domain_shader;
        self
    }

    /// Identity key: declaration hash plus the address of every bound stage.
    pub fn key(&self) -> [usize; 6] {
        fn addr(stage: &Option<ShaderRhiRef>) -> usize {
            stage.as_ref().map_or(0, |s| Arc::as_ptr(s) as usize)
        }
        [
            self.declaration.hash() as usize,
            Arc::as_ptr(&self.vertex_shader) as usize,
            addr(&self.hull_shader),
            addr(&self.domain_shader),
            addr(&self.geometry_shader),
            addr(&self.pixel_shader),
        ]
    }
}

// ---------------------------------------------------------------------------
// Device context
// ---------------------------------------------------------------------------

/// Counters accumulated by a device context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub draw_calls: u64,
    pub primitives: u64,
    pub frames_begun: u64,
    pub frames_presented: u64,
}

/// Vertex buffer bound to a stream slot.
#[derive(Debug, Clone)]
pub struct StreamSource {
    pub buffer: BufferRhiRef,
    pub stride: u32,
    pub offset: u32,
}

/// State every backend tracks per context.
#[derive(Debug, Default)]
pub(crate) struct ContextState {
    pub viewport: Option<ViewportRect>,
    pub current_viewport: Option<ViewportRhiRef>,
    pub bound_shader_state: Option<BoundShaderState>,
    pub rasterizer: RasterizerState,
    pub streams: [Option<StreamSource>; MAX_VERTEX_STREAMS],
    pub constants: [BTreeMap<u32, Vec<u8>>; ShaderFrequency::COUNT],
    pub textures: [BTreeMap<u32, TextureRhiRef>; ShaderFrequency::COUNT],
    pub stats: DrawStats,
}

impl ContextState {
    /// Write `value` at byte `base_index` of constant buffer `buffer_index`.
    pub fn write_constant(
        &mut self,
        frequency: ShaderFrequency,
        buffer_index: u32,
        base_index: u32,
        value: &[u8],
    ) {
        let buffer = self.constants[frequency.index()]
            .entry(buffer_index)
            .or_default();
        let start = base_index as usize;
        let end = start + value.len();
        if buffer.len() < end {
            buffer.resize(end, 0);
        }
        buffer[start..end].copy_from_slice(value);
    }

    /// Drop per-draw bindings at frame boundaries.
    pub fn reset_bindings(&mut self) {
        self.bound_shader_state = None;
        self.streams = Default::default();
        for constants in &mut self.constants {
            constants.clear();
        }
        for textures in &mut self.textures {
            textures.clear();
        }
    }
}

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Command context the RHI records draws into.
///
/// The immediate context always exists; backends may add deferred ones.
#[derive(Debug)]
pub struct DeviceContextRhi {
    id: u64,
    immediate: bool,
    state: Mutex<ContextState>,
}

impl DeviceContextRhi {
    pub(crate) fn new(immediate: bool) -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            immediate,
            state: Mutex::new(ContextState::default()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_immediate(&self) -> bool {
        self.immediate
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock()
    }

    /// Viewport rectangle set by the last `set_viewport`.
    pub fn viewport_rect(&self) -> Option<ViewportRect> {
        self.state.lock().viewport
    }

    pub fn rasterizer_state(&self) -> RasterizerState {
        self.state.lock().rasterizer
    }

    pub fn bound_shader_state(&self) -> Option<BoundShaderState> {
        self.state.lock().bound_shader_state.clone()
    }

    /// Contents of one constant buffer as uploaded so far.
    pub fn constant_buffer(&self, frequency: ShaderFrequency, buffer_index: u32) -> Option<Vec<u8>> {
        self.state.lock().constants[frequency.index()]
            .get(&buffer_index)
            .cloned()
    }

    pub fn bound_texture(&self, frequency: ShaderFrequency, texture_index: u32) -> Option<TextureRhiRef> {
        self.state.lock().textures[frequency.index()]
            .get(&texture_index)
            .cloned()
    }

    pub fn stats(&self) -> DrawStats {
        self.state.lock().stats
    }
}

pub type DeviceContextRhiRef = Arc<DeviceContextRhi>;

assert_impl_all!(ShaderRhi: Send, Sync);
assert_impl_all!(VertexDeclarationRhi: Send, Sync);
assert_impl_all!(BufferRhi: Send, Sync);
assert_impl_all!(TextureRhi: Send, Sync);
assert_impl_all!(ViewportRhi: Send, Sync);
assert_impl_all!(DeviceContextRhi: Send, Sync);
