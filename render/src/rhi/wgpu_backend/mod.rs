//! wgpu GPU backend.
//!
//! Stage bytecode is WGSL text, validated with naga before it reaches the
//! device. Vertex programs use the `vs_main` entry point and pixel programs
//! `fs_main`. wgpu has no hull, domain or geometry stages, so those
//! creation calls return `None`.
//!
//! Draws issued between `begin_drawing_viewport` and `end_drawing_viewport`
//! are recorded against the viewport and encoded into a single render pass
//! when the frame ends. Under `editor`, the UI overlay is encoded into the
//! same pass after the scene draws.

mod conversion;
#[cfg(feature = "editor")]
mod overlay;
mod pipeline;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use wgpu::util::DeviceExt;

use self::conversion::{
    convert_clear_color, convert_index_format, convert_pixel_format, convert_present_mode,
};
use self::pipeline::{
    BindingSignature, CachedPipeline, DEPTH_FORMAT, MAX_CONSTANT_BUFFERS, MAX_TEXTURES,
    PIXEL_ENTRY_POINT, PipelineCache, VERTEX_ENTRY_POINT, constant_binding, stage_visibility,
    texture_binding,
};
use super::Rhi;
use super::resources::{
    BoundShaderState, BufferRhi, BufferRhiRef, BufferUsage, DeviceContextRhi,
    DeviceContextRhiRef, GpuBuffer, GpuShader, GpuTexture, GpuViewport, ShaderRhi, ShaderRhiRef,
    StreamSource, TextureRhi, TextureRhiRef, VertexDeclarationRhi, VertexDeclarationRhiRef,
    ViewportRhi, ViewportRhiRef, ViewportWindow,
};
use super::types::{PixelFormat, PrimitiveType, RasterizerState, ShaderFrequency, ViewportRect};
use super::vertex_declaration::{MAX_VERTEX_STREAMS, VertexElement, validate_elements};
use crate::config::{AdapterPower, RenderSettings};
use crate::error::RenderError;
#[cfg(feature = "editor")]
use crate::overlay::OverlayFrame;
#[cfg(feature = "editor")]
use self::overlay::{OverlayBatch, OverlayRenderer};

/// One draw captured during a viewport frame.
struct RecordedDraw {
    pipeline: Arc<CachedPipeline>,
    constants: wgpu::BindGroup,
    textures: wgpu::BindGroup,
    streams: Vec<(u32, StreamSource)>,
    index_buffer: Option<BufferRhiRef>,
    viewport: Option<ViewportRect>,
    primitive_type: PrimitiveType,
    base_vertex_index: i32,
    /// First index when indexed, first vertex otherwise.
    first: u32,
    count: u32,
    num_instances: u32,
}

struct DepthTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Swap target of one platform window.
pub struct WgpuViewport {
    surface: wgpu::Surface<'static>,
    config: Mutex<wgpu::SurfaceConfiguration>,
    depth: Mutex<DepthTarget>,
    draws: Mutex<Vec<RecordedDraw>>,
    #[cfg(feature = "editor")]
    overlay: Mutex<Option<OverlayBatch>>,
    _window: Arc<dyn ViewportWindow>,
}

impl std::fmt::Debug for WgpuViewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = self.config.lock();
        f.debug_struct("WgpuViewport")
            .field("format", &config.format)
            .field("width", &config.width)
            .field("height", &config.height)
            .finish()
    }
}

fn create_depth_target(device: &wgpu::Device, width: u32, height: u32) -> DepthTarget {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Viewport Depth"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    DepthTarget {
        _texture: texture,
        view,
    }
}

/// wgpu-based device.
pub struct WgpuRhi {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    sampler: wgpu::Sampler,
    line_mode_supported: bool,
    clear_color: wgpu::Color,
    vsync: bool,
    initialized: AtomicBool,
    is_editor: AtomicBool,
    device_lost: Arc<AtomicBool>,
    immediate_context: DeviceContextRhiRef,
    pipelines: PipelineCache,
    #[cfg(feature = "editor")]
    overlay: Mutex<Option<OverlayRenderer>>,
}

impl std::fmt::Debug for WgpuRhi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuRhi")
            .field("adapter", &self.adapter.get_info().name)
            .field("pipelines", &self.pipelines.len())
            .finish()
    }
}

impl WgpuRhi {
    /// Open an adapter and device. The device is not initialized yet.
    pub fn new(settings: &RenderSettings) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            backend_options: wgpu::BackendOptions::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        });

        let power_preference = match settings.adapter_power {
            AdapterPower::HighPerformance => wgpu::PowerPreference::HighPerformance,
            AdapterPower::LowPower => wgpu::PowerPreference::LowPower,
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| RenderError::InitializationFailed(format!("No compatible GPU adapter: {e}")))?;

        log::info!("wgpu adapter: {:?}", adapter.get_info());

        let line_mode_supported = adapter
            .features()
            .contains(wgpu::Features::POLYGON_MODE_LINE);
        let required_features = if line_mode_supported {
            wgpu::Features::POLYGON_MODE_LINE
        } else {
            log::warn!("Adapter lacks line polygon mode; wireframe draws render solid");
            wgpu::Features::empty()
        };

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("RedLilium Device"),
            required_features,
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| RenderError::InitializationFailed(format!("Device creation failed: {e}")))?;

        let device_lost = Arc::new(AtomicBool::new(false));
        let lost = device_lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            lost.store(true, Ordering::Release);
            log::error!("wgpu device lost ({reason:?}): {message}");
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("RHI Default Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            sampler,
            line_mode_supported,
            clear_color: convert_clear_color(settings.clear_color),
            vsync: settings.vsync,
            initialized: AtomicBool::new(false),
            is_editor: AtomicBool::new(false),
            device_lost,
            immediate_context: Arc::new(DeviceContextRhi::new(true)),
            pipelines: PipelineCache::new(),
            #[cfg(feature = "editor")]
            overlay: Mutex::new(None),
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Number of distinct pipelines built so far.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn create_shader(&self, frequency: ShaderFrequency, code: &[u8]) -> Option<ShaderRhiRef> {
        let (naga_stage, entry_point) = match frequency {
            ShaderFrequency::Vertex => (naga::ShaderStage::Vertex, VERTEX_ENTRY_POINT),
            ShaderFrequency::Pixel => (naga::ShaderStage::Fragment, PIXEL_ENTRY_POINT),
            other => {
                log::warn!("WgpuRhi: {other} shaders are not supported");
                return None;
            }
        };
        let source = match validate_wgsl(code, naga_stage, entry_point) {
            Ok(source) => source,
            Err(e) => {
                log::warn!("WgpuRhi: rejecting {frequency} shader: {e}");
                return None;
            }
        };
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(frequency.name()),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        Some(Arc::new(ShaderRhi::new(
            frequency,
            code,
            GpuShader::Wgpu(module),
        )))
    }

    #[allow(clippy::too_many_arguments)]
    fn record_draw(
        &self,
        context: &DeviceContextRhi,
        index_buffer: Option<&BufferRhiRef>,
        primitive_type: PrimitiveType,
        base_vertex_index: i32,
        first: u32,
        num_primitives: u32,
        num_instances: u32,
    ) {
        assert!(
            self.is_initialize(),
            "WgpuRhi: draw on an uninitialized device"
        );
        let mut state = context.state();
        let Some(bound) = state.bound_shader_state.clone() else {
            panic!("WgpuRhi: draw issued without a bound shader state");
        };
        let Some(viewport) = state.current_viewport.clone() else {
            panic!("WgpuRhi: draw issued outside BeginDrawingViewport");
        };
        let GpuViewport::Wgpu(target) = &viewport.gpu else {
            log::warn!("WgpuRhi: viewport was not created by this device");
            return;
        };

        let signature = binding_signature(&state.constants, &state.textures);
        let color_format = target.config.lock().format;
        let Some(pipeline) = self.pipelines.get_or_create(
            &self.device,
            &bound,
            &state.rasterizer,
            primitive_type,
            color_format,
            &signature,
            self.line_mode_supported,
        ) else {
            return;
        };

        let uniforms: Vec<(u32, wgpu::Buffer)> = ShaderFrequency::ALL
            .iter()
            .flat_map(|&frequency| {
                state.constants[frequency.index()]
                    .iter()
                    .filter(|(index, _)| **index < MAX_CONSTANT_BUFFERS)
                    .map(move |(&index, data)| (frequency, index, data))
            })
            .map(|(frequency, index, data)| {
                let mut contents = data.clone();
                contents.resize(data.len().div_ceil(16).max(1) * 16, 0);
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("RHI Constants"),
                        contents: &contents,
                        usage: wgpu::BufferUsages::UNIFORM,
                    });
                (constant_binding(frequency, index), buffer)
            })
            .collect();
        let constant_entries: Vec<wgpu::BindGroupEntry> = uniforms
            .iter()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();

        let mut texture_entries = Vec::new();
        for frequency in ShaderFrequency::ALL {
            for (&index, texture) in &state.textures[frequency.index()] {
                let GpuTexture::Wgpu { view, .. } = &texture.gpu else {
                    continue;
                };
                if index >= MAX_TEXTURES {
                    continue;
                }
                let binding = texture_binding(frequency, index);
                texture_entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::TextureView(view),
                });
                texture_entries.push(wgpu::BindGroupEntry {
                    binding: binding + 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                });
            }
        }

        let constants = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("RHI Constants Group"),
            layout: &pipeline.constant_layout,
            entries: &constant_entries,
        });
        let textures = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("RHI Textures Group"),
            layout: &pipeline.texture_layout,
            entries: &texture_entries,
        });

        let streams = state
            .streams
            .iter()
            .enumerate()
            .filter_map(|(slot, stream)| stream.clone().map(|s| (slot as u32, s)))
            .collect();

        let draw = RecordedDraw {
            pipeline,
            constants,
            textures,
            streams,
            index_buffer: index_buffer.cloned(),
            viewport: state.viewport,
            primitive_type,
            base_vertex_index,
            first,
            count: primitive_type.vertex_count(num_primitives),
            num_instances: num_instances.max(1),
        };
        state.stats.draw_calls += 1;
        state.stats.primitives += num_primitives as u64 * num_instances.max(1) as u64;
        drop(state);
        target.draws.lock().push(draw);
    }

    fn submit_frame(&self, target: &WgpuViewport, present: bool, lock_to_vsync: bool) {
        let draws = std::mem::take(&mut *target.draws.lock());
        #[cfg(feature = "editor")]
        let overlay = target.overlay.lock().take();

        {
            let mut config = target.config.lock();
            let present_mode = convert_present_mode(lock_to_vsync);
            if config.present_mode != present_mode {
                config.present_mode = present_mode;
                target.surface.configure(&self.device, &config);
            }
        }

        let surface_texture = match target.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(e) => {
                log::warn!("WgpuRhi: failed to acquire surface texture: {e}");
                let config = target.config.lock();
                target.surface.configure(&self.device, &config);
                return;
            }
        };
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let depth = target.depth.lock();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Viewport Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Viewport Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for draw in &draws {
                encode_draw(&mut render_pass, draw);
            }
            #[cfg(feature = "editor")]
            {
                if let Some(overlay) = &overlay {
                    overlay.encode(&mut render_pass);
                }
            }
        }

        let submission_index = self.queue.submit(std::iter::once(encoder.finish()));
        if present {
            surface_texture.present();
        }
        if lock_to_vsync {
            let _ = self.device.poll(wgpu::PollType::Wait {
                submission_index: Some(submission_index),
                timeout: Some(std::time::Duration::from_secs(10)),
            });
        }
    }
}

fn encode_draw(render_pass: &mut wgpu::RenderPass<'_>, draw: &RecordedDraw) {
    render_pass.set_pipeline(&draw.pipeline.pipeline);
    render_pass.set_bind_group(0, &draw.constants, &[]);
    render_pass.set_bind_group(1, &draw.textures, &[]);
    if let Some(rect) = draw.viewport {
        render_pass.set_viewport(
            rect.min_x as f32,
            rect.min_y as f32,
            rect.width() as f32,
            rect.height() as f32,
            rect.min_z,
            rect.max_z,
        );
    }
    for (slot, stream) in &draw.streams {
        if let GpuBuffer::Wgpu(buffer) = &stream.buffer.gpu {
            render_pass.set_vertex_buffer(*slot, buffer.slice(stream.offset as u64..));
        }
    }
    let instances = 0..draw.num_instances;
    match &draw.index_buffer {
        Some(index_buffer) => {
            let (GpuBuffer::Wgpu(buffer), BufferUsage::Index { stride }) =
                (&index_buffer.gpu, index_buffer.usage())
            else {
                return;
            };
            render_pass.set_index_buffer(buffer.slice(..), convert_index_format(stride));
            render_pass.draw_indexed(
                draw.first..draw.first + draw.count,
                draw.base_vertex_index,
                instances,
            );
        }
        None => {
            render_pass.draw(draw.first..draw.first + draw.count, instances);
        }
    }
    log::trace!(
        "WgpuRhi: encoded {:?} draw of {} vertices",
        draw.primitive_type,
        draw.count
    );
}

fn binding_signature(
    constants: &[std::collections::BTreeMap<u32, Vec<u8>>; ShaderFrequency::COUNT],
    textures: &[std::collections::BTreeMap<u32, TextureRhiRef>; ShaderFrequency::COUNT],
) -> BindingSignature {
    let mut signature = BindingSignature::default();
    for frequency in ShaderFrequency::ALL {
        let visibility = stage_visibility(frequency);
        for &index in constants[frequency.index()].keys() {
            if index < MAX_CONSTANT_BUFFERS {
                signature
                    .constants
                    .push((constant_binding(frequency, index), visibility));
            }
        }
        for &index in textures[frequency.index()].keys() {
            if index < MAX_TEXTURES {
                signature
                    .textures
                    .push((texture_binding(frequency, index), visibility));
            }
        }
    }
    signature
}

/// Check that `code` is WGSL with an entry point for `stage`.
fn validate_wgsl<'a>(
    code: &'a [u8],
    stage: naga::ShaderStage,
    entry_point: &str,
) -> Result<&'a str, String> {
    if code.is_empty() {
        return Err("empty bytecode".into());
    }
    let source = std::str::from_utf8(code).map_err(|e| format!("invalid UTF-8: {e}"))?;
    let module = naga::front::wgsl::parse_str(source).map_err(|e| format!("WGSL parse error: {e}"))?;
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| format!("validation error: {e}"))?;
    if !module
        .entry_points
        .iter()
        .any(|ep| ep.name == entry_point && ep.stage == stage)
    {
        return Err(format!("entry point '{entry_point}' not found for {stage:?}"));
    }
    Ok(source)
}

impl Rhi for WgpuRhi {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn init(&self, is_editor: bool) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return;
        }
        self.is_editor.store(is_editor, Ordering::Release);
        log::info!(
            "WgpuRhi initialized on {} (editor: {})",
            self.adapter.get_info().name,
            is_editor
        );
    }

    fn destroy(&self) {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return;
        }
        self.immediate_context.state().reset_bindings();
        self.pipelines.clear();
        #[cfg(feature = "editor")]
        self.overlay.lock().take();
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        log::info!("WgpuRhi destroyed");
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
        if width == 0 || height == 0 {
            log::warn!("WgpuRhi: refusing zero-sized viewport {width}x{height}");
            return None;
        }
        let surface = match self.instance.create_surface(window.clone()) {
            Ok(surface) => surface,
            Err(e) => {
                log::warn!("WgpuRhi: failed to create surface: {e}");
                return None;
            }
        };
        let caps = surface.get_capabilities(&self.adapter);
        let Some(format) = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
        else {
            log::warn!("WgpuRhi: surface is not compatible with the adapter");
            return None;
        };
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: convert_present_mode(self.vsync),
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&self.device, &config);
        log::info!("WgpuRhi: configured {width}x{height} viewport ({format:?})");

        let target = WgpuViewport {
            surface,
            config: Mutex::new(config),
            depth: Mutex::new(create_depth_target(&self.device, width, height)),
            draws: Mutex::new(Vec::new()),
            #[cfg(feature = "editor")]
            overlay: Mutex::new(None),
            _window: window,
        };
        Some(Arc::new(ViewportRhi::new(
            width,
            height,
            GpuViewport::Wgpu(Box::new(target)),
        )))
    }

    fn resize_viewport(&self, viewport: &ViewportRhiRef, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        viewport.set_size(width, height);
        if let GpuViewport::Wgpu(target) = &viewport.gpu {
            let mut config = target.config.lock();
            config.width = width;
            config.height = height;
            target.surface.configure(&self.device, &config);
            *target.depth.lock() = create_depth_target(&self.device, width, height);
        }
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
            log::warn!("WgpuRhi: invalid vertex declaration: {e}");
            return None;
        }
        Some(Arc::new(VertexDeclarationRhi::new(elements)))
    }

    fn create_vertex_buffer(&self, name: &str, data: &[u8]) -> Option<BufferRhiRef> {
        if data.is_empty() {
            log::warn!("WgpuRhi: refusing empty vertex buffer '{name}'");
            return None;
        }
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(name),
                contents: data,
                usage: wgpu::BufferUsages::VERTEX,
            });
        Some(Arc::new(BufferRhi::new(
            name,
            BufferUsage::Vertex,
            data.len() as u64,
            GpuBuffer::Wgpu(buffer),
        )))
    }

    fn create_index_buffer(&self, name: &str, stride: u32, data: &[u8]) -> Option<BufferRhiRef> {
        if (stride != 2 && stride != 4) || data.is_empty() || data.len() % stride as usize != 0 {
            log::warn!(
                "WgpuRhi: invalid index buffer '{}' (stride {}, {} bytes)",
                name,
                stride,
                data.len()
            );
            return None;
        }
        // wgpu requires buffer sizes aligned to 4 bytes.
        let mut contents = data.to_vec();
        contents.resize(data.len().next_multiple_of(4), 0);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(name),
                contents: &contents,
                usage: wgpu::BufferUsages::INDEX,
            });
        Some(Arc::new(BufferRhi::new(
            name,
            BufferUsage::Index { stride },
            data.len() as u64,
            GpuBuffer::Wgpu(buffer),
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
        let bytes_per_row = width * format.bytes_per_pixel();
        if width == 0 || height == 0 || (!data.is_empty() && data.len() != (bytes_per_row * height) as usize) {
            log::warn!("WgpuRhi: invalid texture '{name}' {width}x{height} {format:?}");
            return None;
        }
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(name),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: convert_pixel_format(format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        if !data.is_empty() {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
                size,
            );
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Some(Arc::new(TextureRhi::new(
            name,
            width,
            height,
            format,
            GpuTexture::Wgpu { texture, view },
        )))
    }

    fn begin_drawing_viewport(&self, context: &DeviceContextRhi, viewport: &ViewportRhiRef) {
        assert!(
            self.is_initialize(),
            "WgpuRhi: BeginDrawingViewport on an uninitialized device"
        );
        viewport.mark_begin_drawing();
        if let GpuViewport::Wgpu(target) = &viewport.gpu {
            target.draws.lock().clear();
            #[cfg(feature = "editor")]
            target.overlay.lock().take();
        }
        let mut state = context.state();
        state.current_viewport = Some(viewport.clone());
        state.stats.frames_begun += 1;
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
        if let GpuViewport::Wgpu(target) = &viewport.gpu {
            self.submit_frame(target, present, lock_to_vsync);
        }
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
        context.state().viewport = Some(ViewportRect {
            min_x,
            min_y,
            min_z,
            max_x,
            max_y,
            max_z,
        });
    }

    fn set_bound_shader_state(&self, context: &DeviceContextRhi, state: &BoundShaderState) {
        context.state().bound_shader_state = Some(state.clone());
    }

    fn set_rasterizer_state(&self, context: &DeviceContextRhi, state: &RasterizerState) {
        context.state().rasterizer = *state;
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
            "WgpuRhi: stream index {stream_index} out of range"
        );
        context.state().streams[stream_index as usize] = Some(StreamSource {
            buffer: buffer.clone(),
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
    }

    fn set_texture_parameter(
        &self,
        context: &DeviceContextRhi,
        frequency: ShaderFrequency,
        texture_index: u32,
        texture: &TextureRhiRef,
    ) {
        context.state().textures[frequency.index()].insert(texture_index, texture.clone());
    }

    fn draw_primitive(
        &self,
        context: &DeviceContextRhi,
        primitive_type: PrimitiveType,
        base_vertex_index: u32,
        num_primitives: u32,
        num_instances: u32,
    ) {
        self.record_draw(
            context,
            None,
            primitive_type,
            0,
            base_vertex_index,
            num_primitives,
            num_instances,
        );
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
        self.record_draw(
            context,
            Some(index_buffer),
            primitive_type,
            base_vertex_index,
            start_index,
            num_primitives,
            num_instances,
        );
    }

    #[cfg(feature = "editor")]
    fn init_imgui(&self, _overlay: &egui::Context) -> bool {
        if !self.is_editor() {
            log::warn!("WgpuRhi: UI overlay requested on a non-editor device");
            return false;
        }
        let mut overlay = self.overlay.lock();
        if overlay.is_none() {
            *overlay = Some(OverlayRenderer::new(&self.device));
            log::info!("WgpuRhi: UI overlay initialized");
        }
        true
    }

    #[cfg(feature = "editor")]
    fn shutdown_imgui(&self) {
        if self.overlay.lock().take().is_some() {
            log::info!("WgpuRhi: UI overlay shut down");
        }
    }

    #[cfg(feature = "editor")]
    fn begin_drawing_imgui(&self, _context: &DeviceContextRhi, viewport: &ViewportRhiRef) {
        assert!(
            self.overlay.lock().is_some(),
            "WgpuRhi: BeginDrawingImGUI before InitImGUI"
        );
        assert!(
            viewport.is_drawing(),
            "WgpuRhi: UI overlay pass opened outside a viewport frame"
        );
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
            "WgpuRhi: UI overlay pass closed outside a viewport frame"
        );
        let overlay = self.overlay.lock();
        let Some(renderer) = overlay.as_ref() else {
            log::warn!("WgpuRhi: overlay frame submitted before InitImGUI");
            return;
        };
        let GpuViewport::Wgpu(target) = &viewport.gpu else {
            log::warn!("WgpuRhi: viewport was not created by this device");
            return;
        };
        let (format, width, height) = {
            let config = target.config.lock();
            (config.format, config.width, config.height)
        };
        let batch = renderer.prepare(&self.device, &self.queue, frame, format, width, height);
        log::trace!(
            "WgpuRhi: {} overlay draws for viewport {} ({} textures)",
            batch.len(),
            viewport.id(),
            renderer.texture_count()
        );
        *target.overlay.lock() = (!batch.is_empty()).then_some(batch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX_WGSL: &str = "@vertex fn vs_main(@location(0) p: vec4<f32>) -> @builtin(position) vec4<f32> { return p; }";

    #[test]
    fn wgsl_validation_requires_entry_point() {
        assert!(validate_wgsl(VERTEX_WGSL.as_bytes(), naga::ShaderStage::Vertex, "vs_main").is_ok());
        assert!(
            validate_wgsl(VERTEX_WGSL.as_bytes(), naga::ShaderStage::Fragment, "fs_main").is_err()
        );
    }

    #[test]
    fn wgsl_validation_rejects_garbage() {
        assert!(validate_wgsl(b"", naga::ShaderStage::Vertex, "vs_main").is_err());
        assert!(validate_wgsl(&[0xff, 0xfe], naga::ShaderStage::Vertex, "vs_main").is_err());
        assert!(validate_wgsl(b"fn (", naga::ShaderStage::Vertex, "vs_main").is_err());
    }
}
