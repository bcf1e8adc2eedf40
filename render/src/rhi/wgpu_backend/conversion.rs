//! Type conversions between RHI types and wgpu types.

use crate::rhi::types::{CullMode, FillMode, PixelFormat, PrimitiveType};
use crate::rhi::vertex_declaration::VertexElementType;

pub fn convert_pixel_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        PixelFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
        PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        PixelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
    }
}

pub fn convert_vertex_format(element_type: VertexElementType) -> wgpu::VertexFormat {
    match element_type {
        VertexElementType::Float1 => wgpu::VertexFormat::Float32,
        VertexElementType::Float2 => wgpu::VertexFormat::Float32x2,
        VertexElementType::Float3 => wgpu::VertexFormat::Float32x3,
        VertexElementType::Float4 => wgpu::VertexFormat::Float32x4,
        VertexElementType::UByte4 => wgpu::VertexFormat::Uint8x4,
        VertexElementType::UByte4N => wgpu::VertexFormat::Unorm8x4,
        VertexElementType::UInt1 => wgpu::VertexFormat::Uint32,
    }
}

pub fn convert_topology(primitive_type: PrimitiveType) -> wgpu::PrimitiveTopology {
    match primitive_type {
        PrimitiveType::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveType::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        PrimitiveType::LineList => wgpu::PrimitiveTopology::LineList,
        PrimitiveType::PointList => wgpu::PrimitiveTopology::PointList,
    }
}

/// Faces culled for a cull mode, with counter-clockwise front faces.
pub fn convert_cull_mode(cull_mode: CullMode) -> Option<wgpu::Face> {
    match cull_mode {
        CullMode::None => None,
        CullMode::Clockwise => Some(wgpu::Face::Back),
        CullMode::CounterClockwise => Some(wgpu::Face::Front),
    }
}

pub fn convert_fill_mode(fill_mode: FillMode, line_supported: bool) -> wgpu::PolygonMode {
    match fill_mode {
        FillMode::Solid => wgpu::PolygonMode::Fill,
        FillMode::Wireframe if line_supported => wgpu::PolygonMode::Line,
        FillMode::Wireframe => wgpu::PolygonMode::Fill,
    }
}

pub fn convert_index_format(stride: u32) -> wgpu::IndexFormat {
    if stride == 4 {
        wgpu::IndexFormat::Uint32
    } else {
        wgpu::IndexFormat::Uint16
    }
}

pub fn convert_present_mode(lock_to_vsync: bool) -> wgpu::PresentMode {
    if lock_to_vsync {
        wgpu::PresentMode::AutoVsync
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}

pub fn convert_clear_color(color: [f32; 4]) -> wgpu::Color {
    wgpu::Color {
        r: color[0] as f64,
        g: color[1] as f64,
        b: color[2] as f64,
        a: color[3] as f64,
    }
}
