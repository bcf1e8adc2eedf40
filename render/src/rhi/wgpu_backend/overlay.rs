//! egui overlay rendering for the wgpu backend.
//!
//! `end_drawing_imgui` applies the frame's texture delta, uploads one
//! vertex/index buffer pair per mesh and stores the resulting batch on the
//! viewport. The batch is encoded after the scene draws, in the same pass,
//! with one scissored draw per clipped primitive.

use std::collections::HashMap;
use std::sync::Arc;

use egui::epaint::{ImageDelta, Primitive, Vertex};
use egui::TextureId;
use parking_lot::Mutex;
use wgpu::util::DeviceExt;

use super::pipeline::{DEPTH_FORMAT, PIXEL_ENTRY_POINT, VERTEX_ENTRY_POINT};
use crate::overlay::OverlayFrame;

const OVERLAY_WGSL: &str = r#"
struct OverlayUniforms {
    screen_size: vec2<f32>,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> uniforms: OverlayUniforms;
@group(1) @binding(0) var overlay_texture: texture_2d<f32>;
@group(1) @binding(1) var overlay_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
}

@vertex
fn vs_main(
    @location(0) pos: vec2<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) color: vec4<f32>,
) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(
        2.0 * pos.x / uniforms.screen_size.x - 1.0,
        1.0 - 2.0 * pos.y / uniforms.screen_size.y,
        0.0,
        1.0,
    );
    out.uv = uv;
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color * textureSample(overlay_texture, overlay_sampler, in.uv);
}
"#;

/// egui vertex as uploaded to the GPU.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct OverlayVertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl From<&Vertex> for OverlayVertex {
    fn from(v: &Vertex) -> Self {
        Self {
            pos: [v.pos.x, v.pos.y],
            uv: [v.uv.x, v.uv.y],
            color: [
                v.color.r() as f32 / 255.0,
                v.color.g() as f32 / 255.0,
                v.color.b() as f32 / 255.0,
                v.color.a() as f32 / 255.0,
            ],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct OverlayUniforms {
    screen_size: [f32; 2],
    _padding: [f32; 2],
}

/// Scissor rectangle in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Convert a clip rectangle in points to a scissor clamped to the target.
///
/// Returns `None` when nothing of the clip rectangle is on screen.
pub fn scissor_rect(
    clip_rect: egui::Rect,
    pixels_per_point: f32,
    width: u32,
    height: u32,
) -> Option<ScissorRect> {
    let to_pixels = |points: f32, limit: u32| ((points * pixels_per_point).round().max(0.0) as u32).min(limit);
    let min_x = to_pixels(clip_rect.min.x, width);
    let min_y = to_pixels(clip_rect.min.y, height);
    let max_x = to_pixels(clip_rect.max.x, width);
    let max_y = to_pixels(clip_rect.max.y, height);
    (max_x > min_x && max_y > min_y).then(|| ScissorRect {
        x: min_x,
        y: min_y,
        width: max_x - min_x,
        height: max_y - min_y,
    })
}

struct OverlayTexture {
    texture: wgpu::Texture,
    bind_group: Arc<wgpu::BindGroup>,
    width: u32,
    height: u32,
}

struct OverlayDraw {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
    texture: Arc<wgpu::BindGroup>,
    scissor: ScissorRect,
}

/// UI draws of one viewport frame, ready to encode.
pub struct OverlayBatch {
    pipeline: Arc<wgpu::RenderPipeline>,
    uniforms: wgpu::BindGroup,
    draws: Vec<OverlayDraw>,
}

impl OverlayBatch {
    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Encode after the scene draws of the same pass.
    pub fn encode(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.uniforms, &[]);
        for draw in &self.draws {
            let scissor = draw.scissor;
            render_pass.set_scissor_rect(scissor.x, scissor.y, scissor.width, scissor.height);
            render_pass.set_bind_group(1, draw.texture.as_ref(), &[]);
            render_pass.set_vertex_buffer(0, draw.vertices.slice(..));
            render_pass.set_index_buffer(draw.indices.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..draw.index_count, 0, 0..1);
        }
        log::trace!("WgpuRhi: encoded {} overlay draws", self.draws.len());
    }
}

/// GPU resources of the UI overlay.
pub struct OverlayRenderer {
    module: wgpu::ShaderModule,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    pipelines: Mutex<HashMap<wgpu::TextureFormat, Arc<wgpu::RenderPipeline>>>,
    textures: Mutex<HashMap<TextureId, OverlayTexture>>,
}

impl std::fmt::Debug for OverlayRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRenderer")
            .field("pipelines", &self.pipelines.lock().len())
            .field("textures", &self.textures.lock().len())
            .finish()
    }
}

impl OverlayRenderer {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Overlay Shader"),
            source: wgpu::ShaderSource::Wgsl(OVERLAY_WGSL.into()),
        });
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Overlay Uniforms Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Overlay Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Overlay Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            immediate_size: 0,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Overlay Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            module,
            uniform_layout,
            texture_layout,
            pipeline_layout,
            sampler,
            pipelines: Mutex::new(HashMap::new()),
            textures: Mutex::new(HashMap::new()),
        }
    }

    pub fn texture_count(&self) -> usize {
        self.textures.lock().len()
    }

    /// Apply the texture delta and upload the frame's meshes.
    ///
    /// `width` and `height` are the viewport size in physical pixels.
    pub fn prepare(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame: &OverlayFrame,
        color_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> OverlayBatch {
        for (id, delta) in &frame.textures_delta.set {
            self.set_texture(device, queue, *id, delta);
        }

        let pixels_per_point = if frame.pixels_per_point > 0.0 {
            frame.pixels_per_point
        } else {
            1.0
        };
        let uniforms = OverlayUniforms {
            screen_size: [
                width as f32 / pixels_per_point,
                height as f32 / pixels_per_point,
            ],
            _padding: [0.0; 2],
        };
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Overlay Uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let uniforms = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Overlay Uniforms Group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let mut draws = Vec::new();
        {
            let textures = self.textures.lock();
            for clipped in &frame.primitives {
                let mesh = match &clipped.primitive {
                    Primitive::Mesh(mesh) => mesh,
                    Primitive::Callback(_) => {
                        log::warn!("WgpuRhi: overlay paint callbacks are not supported");
                        continue;
                    }
                };
                if mesh.vertices.is_empty() || mesh.indices.is_empty() {
                    continue;
                }
                let Some(texture) = textures.get(&mesh.texture_id) else {
                    log::warn!("WgpuRhi: missing overlay texture {:?}", mesh.texture_id);
                    continue;
                };
                let Some(scissor) = scissor_rect(clipped.clip_rect, pixels_per_point, width, height)
                else {
                    continue;
                };

                let vertices: Vec<OverlayVertex> = mesh.vertices.iter().map(OverlayVertex::from).collect();
                let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Overlay Vertices"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Overlay Indices"),
                    contents: bytemuck::cast_slice(&mesh.indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                draws.push(OverlayDraw {
                    vertices,
                    indices,
                    index_count: mesh.indices.len() as u32,
                    texture: texture.bind_group.clone(),
                    scissor,
                });
            }
        }

        // Draws hold their bind groups, so freed textures can go now.
        if !frame.textures_delta.free.is_empty() {
            let mut textures = self.textures.lock();
            for id in &frame.textures_delta.free {
                textures.remove(id);
            }
        }

        OverlayBatch {
            pipeline: self.pipeline(device, color_format),
            uniforms,
            draws,
        }
    }

    fn set_texture(&self, device: &wgpu::Device, queue: &wgpu::Queue, id: TextureId, delta: &ImageDelta) {
        let region_width = delta.image.width() as u32;
        let region_height = delta.image.height() as u32;
        if region_width == 0 || region_height == 0 {
            return;
        }
        let pixels: Vec<u8> = match &delta.image {
            egui::ImageData::Color(image) => image.pixels.iter().flat_map(|c| c.to_array()).collect(),
        };

        let mut textures = self.textures.lock();
        if let Some(pos) = delta.pos {
            let [x, y] = [pos[0] as u32, pos[1] as u32];
            match textures.get(&id) {
                Some(texture)
                    if x + region_width <= texture.width && y + region_height <= texture.height =>
                {
                    write_region(queue, &texture.texture, x, y, region_width, region_height, &pixels);
                }
                Some(_) => log::warn!("WgpuRhi: overlay texture {id:?} update out of bounds"),
                None => log::warn!("WgpuRhi: partial update for unknown overlay texture {id:?}"),
            }
            return;
        }

        // Gamma-space colors go straight to the non-sRGB swap target.
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Overlay Texture"),
            size: wgpu::Extent3d {
                width: region_width,
                height: region_height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        write_region(queue, &texture, 0, 0, region_width, region_height, &pixels);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Overlay Texture Group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        textures.insert(
            id,
            OverlayTexture {
                texture,
                bind_group: Arc::new(bind_group),
                width: region_width,
                height: region_height,
            },
        );
    }

    fn pipeline(&self, device: &wgpu::Device, color_format: wgpu::TextureFormat) -> Arc<wgpu::RenderPipeline> {
        let mut pipelines = self.pipelines.lock();
        if let Some(pipeline) = pipelines.get(&color_format) {
            return pipeline.clone();
        }

        let attributes = [
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 0,
                shader_location: 0,
            },
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 8,
                shader_location: 1,
            },
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x4,
                offset: 16,
                shader_location: 2,
            },
        ];
        let color_targets = [Some(wgpu::ColorTargetState {
            format: color_format,
            blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Overlay Pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.module,
                entry_point: Some(VERTEX_ENTRY_POINT),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<OverlayVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.module,
                entry_point: Some(PIXEL_ENTRY_POINT),
                targets: &color_targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            // The viewport pass carries a depth target; the overlay ignores it.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });
        log::debug!("WgpuRhi: created overlay pipeline for {color_format:?}");

        let pipeline = Arc::new(pipeline);
        pipelines.insert(color_format, pipeline.clone());
        pipeline
    }
}

fn write_region(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    pixels: &[u8],
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}
