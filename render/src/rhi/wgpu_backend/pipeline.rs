//! Render pipeline and bind group layout caching.
//!
//! The immediate-mode RHI sets shaders, rasterizer state and parameters one
//! call at a time; wgpu wants them baked into a pipeline. Pipelines are
//! built on first use for each distinct combination and reused after that.
//!
//! Binding model:
//! - group 0: constant buffers, `binding = stage * 4 + buffer_index`
//! - group 1: textures, `binding = (stage * 8 + texture_index) * 2`, with the
//!   shared sampler at the next binding

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::conversion::{
    convert_cull_mode, convert_fill_mode, convert_topology, convert_vertex_format,
};
use crate::rhi::resources::{BoundShaderState, GpuShader};
use crate::rhi::types::{CullMode, FillMode, PrimitiveType, RasterizerState, ShaderFrequency};
use crate::rhi::vertex_declaration::stream_count;

pub const VERTEX_ENTRY_POINT: &str = "vs_main";
pub const PIXEL_ENTRY_POINT: &str = "fs_main";
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub const MAX_CONSTANT_BUFFERS: u32 = 4;
pub const MAX_TEXTURES: u32 = 8;

const DEPTH_BIAS_SCALE: f32 = 16_777_216.0;

pub fn constant_binding(frequency: ShaderFrequency, buffer_index: u32) -> u32 {
    frequency.index() as u32 * MAX_CONSTANT_BUFFERS + buffer_index
}

pub fn texture_binding(frequency: ShaderFrequency, texture_index: u32) -> u32 {
    (frequency.index() as u32 * MAX_TEXTURES + texture_index) * 2
}

pub fn stage_visibility(frequency: ShaderFrequency) -> wgpu::ShaderStages {
    match frequency {
        ShaderFrequency::Pixel => wgpu::ShaderStages::FRAGMENT,
        _ => wgpu::ShaderStages::VERTEX,
    }
}

/// Which bindings a draw uses. Part of the pipeline key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BindingSignature {
    pub constants: Vec<(u32, wgpu::ShaderStages)>,
    pub textures: Vec<(u32, wgpu::ShaderStages)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    shaders: [usize; 6],
    rasterizer: (FillMode, CullMode, u32, u32),
    primitive_type: PrimitiveType,
    color_format: wgpu::TextureFormat,
    signature: BindingSignature,
}

/// Layouts and pipeline for one key.
#[derive(Debug)]
pub struct CachedPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub constant_layout: wgpu::BindGroupLayout,
    pub texture_layout: wgpu::BindGroupLayout,
}

/// Pipelines keyed by everything baked into them.
#[derive(Debug, Default)]
pub struct PipelineCache {
    pipelines: Mutex<HashMap<PipelineKey, Arc<CachedPipeline>>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pipelines.lock().len()
    }

    pub fn clear(&self) {
        self.pipelines.lock().clear();
    }

    /// Find or build the pipeline for this draw.
    ///
    /// Returns `None` if the bound stages are not wgpu modules.
    #[allow(clippy::too_many_arguments)]
    pub fn get_or_create(
        &self,
        device: &wgpu::Device,
        bound: &BoundShaderState,
        rasterizer: &RasterizerState,
        primitive_type: PrimitiveType,
        color_format: wgpu::TextureFormat,
        signature: &BindingSignature,
        line_mode_supported: bool,
    ) -> Option<Arc<CachedPipeline>> {
        let key = PipelineKey {
            shaders: bound.key(),
            rasterizer: rasterizer.key(),
            primitive_type,
            color_format,
            signature: signature.clone(),
        };
        if let Some(cached) = self.pipelines.lock().get(&key) {
            return Some(cached.clone());
        }

        let cached = Arc::new(build_pipeline(
            device,
            bound,
            rasterizer,
            primitive_type,
            color_format,
            signature,
            line_mode_supported,
        )?);
        log::debug!(
            "WgpuRhi: created pipeline #{} ({:?}, {:?})",
            self.len() + 1,
            primitive_type,
            rasterizer.key()
        );
        self.pipelines.lock().insert(key, cached.clone());
        Some(cached)
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    bound: &BoundShaderState,
    rasterizer: &RasterizerState,
    primitive_type: PrimitiveType,
    color_format: wgpu::TextureFormat,
    signature: &BindingSignature,
    line_mode_supported: bool,
) -> Option<CachedPipeline> {
    let vertex_module = match &bound.vertex_shader.gpu {
        GpuShader::Wgpu(module) => module,
        _ => {
            log::warn!("WgpuRhi: vertex shader was not created by this device");
            return None;
        }
    };
    let pixel_module = match bound.pixel_shader.as_ref().map(|ps| &ps.gpu) {
        Some(GpuShader::Wgpu(module)) => Some(module),
        Some(_) => {
            log::warn!("WgpuRhi: pixel shader was not created by this device");
            return None;
        }
        None => None,
    };

    let constant_entries: Vec<wgpu::BindGroupLayoutEntry> = signature
        .constants
        .iter()
        .map(|&(binding, visibility)| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        })
        .collect();
    let texture_entries: Vec<wgpu::BindGroupLayoutEntry> = signature
        .textures
        .iter()
        .flat_map(|&(binding, visibility)| {
            [
                wgpu::BindGroupLayoutEntry {
                    binding,
                    visibility,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: binding + 1,
                    visibility,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ]
        })
        .collect();

    let constant_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("RHI Constants Layout"),
        entries: &constant_entries,
    });
    let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("RHI Textures Layout"),
        entries: &texture_entries,
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("RHI Pipeline Layout"),
        bind_group_layouts: &[&constant_layout, &texture_layout],
        immediate_size: 0,
    });

    // One layout per stream slot; wgpu needs the slots contiguous.
    let elements = bound.declaration.elements();
    let streams = stream_count(elements);
    let attributes: Vec<Vec<wgpu::VertexAttribute>> = (0..streams)
        .map(|stream| {
            elements
                .iter()
                .filter(|element| element.stream_index as usize == stream)
                .map(|element| wgpu::VertexAttribute {
                    format: convert_vertex_format(element.element_type),
                    offset: element.offset as u64,
                    shader_location: element.usage.location(element.usage_index),
                })
                .collect()
        })
        .collect();
    let buffer_layouts: Vec<wgpu::VertexBufferLayout> = (0..streams)
        .map(|stream| wgpu::VertexBufferLayout {
            array_stride: elements
                .iter()
                .find(|element| element.stream_index as usize == stream)
                .map_or(0, |element| element.stride as u64),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes[stream],
        })
        .collect();

    let is_triangles = matches!(
        primitive_type,
        PrimitiveType::TriangleList | PrimitiveType::TriangleStrip
    );
    let bias = if is_triangles {
        wgpu::DepthBiasState {
            constant: (rasterizer.depth_bias * DEPTH_BIAS_SCALE) as i32,
            slope_scale: rasterizer.slope_scale_depth_bias,
            clamp: 0.0,
        }
    } else {
        wgpu::DepthBiasState::default()
    };

    let color_targets = [Some(wgpu::ColorTargetState {
        format: color_format,
        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
        write_mask: wgpu::ColorWrites::ALL,
    })];

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("RHI Pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: vertex_module,
            entry_point: Some(VERTEX_ENTRY_POINT),
            buffers: &buffer_layouts,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: pixel_module.map(|module| wgpu::FragmentState {
            module,
            entry_point: Some(PIXEL_ENTRY_POINT),
            targets: &color_targets,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: convert_topology(primitive_type),
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: if is_triangles {
                convert_cull_mode(rasterizer.cull_mode)
            } else {
                None
            },
            polygon_mode: if is_triangles {
                convert_fill_mode(rasterizer.fill_mode, line_mode_supported)
            } else {
                wgpu::PolygonMode::Fill
            },
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias,
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    });

    Some(CachedPipeline {
        pipeline,
        constant_layout,
        texture_layout,
    })
}
