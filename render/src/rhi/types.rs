//! Plain value types shared by the RHI and its callers.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShaderFrequency {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
}

impl ShaderFrequency {
    /// Number of frequencies; the length of every per-frequency table.
    pub const COUNT: usize = 5;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Vertex,
        Self::Hull,
        Self::Domain,
        Self::Geometry,
        Self::Pixel,
    ];

    /// Slot of this frequency in per-frequency tables.
    pub const fn index(self) -> usize {
        match self {
            Self::Vertex => 0,
            Self::Hull => 1,
            Self::Domain => 2,
            Self::Geometry => 3,
            Self::Pixel => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Hull => "hull",
            Self::Domain => "domain",
            Self::Geometry => "geometry",
            Self::Pixel => "pixel",
        }
    }

    pub fn flag(self) -> ShaderFrequencyFlags {
        match self {
            Self::Vertex => ShaderFrequencyFlags::VERTEX,
            Self::Hull => ShaderFrequencyFlags::HULL,
            Self::Domain => ShaderFrequencyFlags::DOMAIN,
            Self::Geometry => ShaderFrequencyFlags::GEOMETRY,
            Self::Pixel => ShaderFrequencyFlags::PIXEL,
        }
    }
}

impl fmt::Display for ShaderFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Set of shader frequencies, e.g. the stages a vertex factory requires.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderFrequencyFlags: u32 {
        const VERTEX = 1 << 0;
        const HULL = 1 << 1;
        const DOMAIN = 1 << 2;
        const GEOMETRY = 1 << 3;
        const PIXEL = 1 << 4;
        const VERTEX_PIXEL = Self::VERTEX.bits() | Self::PIXEL.bits();
    }
}

impl ShaderFrequencyFlags {
    pub fn frequencies(self) -> impl Iterator<Item = ShaderFrequency> {
        ShaderFrequency::ALL
            .into_iter()
            .filter(move |frequency| self.contains(frequency.flag()))
    }
}

/// Primitive topology of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    #[default]
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

impl PrimitiveType {
    /// Vertices (or indices) consumed by `num_primitives` primitives.
    pub fn vertex_count(self, num_primitives: u32) -> u32 {
        match self {
            Self::TriangleList => num_primitives * 3,
            Self::TriangleStrip => {
                if num_primitives == 0 {
                    0
                } else {
                    num_primitives + 2
                }
            }
            Self::LineList => num_primitives * 2,
            Self::PointList => num_primitives,
        }
    }
}

/// Polygon fill mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    #[default]
    Solid,
    Wireframe,
}

/// Which winding gets culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Draw both faces.
    None,
    #[default]
    Clockwise,
    CounterClockwise,
}

/// Fixed-function rasterizer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RasterizerState {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub depth_bias: f32,
    pub slope_scale_depth_bias: f32,
}

impl RasterizerState {
    pub fn new(fill_mode: FillMode, cull_mode: CullMode) -> Self {
        Self {
            fill_mode,
            cull_mode,
            ..Default::default()
        }
    }

    pub fn with_depth_bias(mut self, depth_bias: f32) -> Self {
        self.depth_bias = depth_bias;
        self
    }

    /// Bit-exact key, usable in hashed pipeline caches.
    pub fn key(&self) -> (FillMode, CullMode, u32, u32) {
        (
            self.fill_mode,
            self.cull_mode,
            self.depth_bias.to_bits(),
            self.slope_scale_depth_bias.to_bits(),
        )
    }
}

/// Active rasterizer viewport rectangle and depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub min_x: u32,
    pub min_y: u32,
    pub min_z: f32,
    pub max_x: u32,
    pub max_y: u32,
    pub max_z: f32,
}

impl ViewportRect {
    pub fn width(&self) -> u32 {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> u32 {
        self.max_y.saturating_sub(self.min_y)
    }
}

/// Texel format of RHI textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    #[default]
    Rgba8Unorm,
    Bgra8Unorm,
    R8Unorm,
    Rgba16Float,
    Rgba32Float,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::Rgba8Unorm | Self::Bgra8Unorm => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}
