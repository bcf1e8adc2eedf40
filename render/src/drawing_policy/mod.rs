//! Drawing policies.
//!
//! A drawing policy binds one `(material, vertex factory)` pair to device
//! state and submits mesh batches with it. Per draw list the protocol is:
//!
//! ```text
//! create -> set_render_state -> set_shader_parameters -> draw (N times)
//! ```
//!
//! [`MeshDrawingPolicy`] holds the state every policy shares and implements
//! the first two steps. Concrete policies implement [`DrawingPolicy::draw`].
//! Policies are looked up through a [`DrawingPolicyCache`] so the shader
//! resolution happens once per combination, not once per batch.

mod base_pass;
mod cache;
mod depth_only;

use crate::materials::MaterialRef;
use crate::rhi::{
    BoundShaderState, CullMode, DeviceContextRhi, FillMode, RasterizerState, Rhi, ShaderFrequency,
};
use crate::scene::{MeshBatch, SceneView};
use crate::shader::ShaderRef;
use crate::vertex_factory::VertexFactoryRef;

pub use base_pass::BasePassDrawingPolicy;
pub use cache::DrawingPolicyCache;
pub use depth_only::DepthOnlyDrawingPolicy;

/// State shared by every drawing policy: the pair it draws plus the shaders
/// resolved for that pair.
#[derive(Debug, Clone)]
pub struct MeshDrawingPolicy {
    material: MaterialRef,
    vertex_factory: VertexFactoryRef,
    vertex_shader: Option<ShaderRef>,
    pixel_shader: Option<ShaderRef>,
    depth_bias: f32,
}

impl MeshDrawingPolicy {
    /// Resolve the vertex and pixel shaders of `material` for the layout of
    /// `vertex_factory`.
    pub fn new(vertex_factory: VertexFactoryRef, material: MaterialRef, depth_bias: f32) -> Self {
        let hash = vertex_factory.hash();
        let vertex_shader = material.get_shader(hash, ShaderFrequency::Vertex);
        let pixel_shader = material.get_shader(hash, ShaderFrequency::Pixel);
        Self::with_shaders(vertex_factory, material, vertex_shader, pixel_shader, depth_bias)
    }

    /// Resolve only the vertex shader.
    pub fn vertex_only(vertex_factory: VertexFactoryRef, material: MaterialRef, depth_bias: f32) -> Self {
        let vertex_shader = material.get_shader(vertex_factory.hash(), ShaderFrequency::Vertex);
        Self::with_shaders(vertex_factory, material, vertex_shader, None, depth_bias)
    }

    fn with_shaders(
        vertex_factory: VertexFactoryRef,
        material: MaterialRef,
        vertex_shader: Option<ShaderRef>,
        pixel_shader: Option<ShaderRef>,
        depth_bias: f32,
    ) -> Self {
        if vertex_shader.is_none() {
            log::warn!(
                "Material '{}' has no vertex shader for {} ({:#010x})",
                material.name(),
                vertex_factory.ty().name,
                vertex_factory.hash()
            );
        }
        Self {
            material,
            vertex_factory,
            vertex_shader,
            pixel_shader,
            depth_bias,
        }
    }

    pub fn material(&self) -> &MaterialRef {
        &self.material
    }

    pub fn vertex_factory(&self) -> &VertexFactoryRef {
        &self.vertex_factory
    }

    pub fn vertex_shader(&self) -> Option<&ShaderRef> {
        self.vertex_shader.as_ref()
    }

    pub fn pixel_shader(&self) -> Option<&ShaderRef> {
        self.pixel_shader.as_ref()
    }

    pub fn depth_bias(&self) -> f32 {
        self.depth_bias
    }

    /// Device pipeline state for this policy, or `None` if the vertex stage
    /// or the device declaration is missing.
    pub fn bound_shader_state(&self) -> Option<BoundShaderState> {
        let declaration = self.vertex_factory.declaration_rhi()?.clone();
        let vertex_shader = self.vertex_shader.as_ref()?.vertex_shader()?;
        let pixel_shader = self.pixel_shader.as_ref().and_then(|shader| shader.pixel_shader());
        Some(BoundShaderState::new(declaration, vertex_shader).with_pixel_shader(pixel_shader))
    }

    /// Whether draws through this policy reach the device.
    pub fn is_drawable(&self) -> bool {
        self.bound_shader_state().is_some()
    }

    /// Fill and cull mode from the material flags, plus the depth bias.
    pub fn rasterizer_state(&self) -> RasterizerState {
        let fill_mode = if self.material.is_wireframe() {
            FillMode::Wireframe
        } else {
            FillMode::Solid
        };
        let cull_mode = if self.material.is_two_sided() {
            CullMode::None
        } else {
            CullMode::Clockwise
        };
        RasterizerState::new(fill_mode, cull_mode).with_depth_bias(self.depth_bias)
    }

    /// Bind shaders, rasterizer state and vertex streams.
    ///
    /// Returns `false` and binds nothing if the policy is not drawable.
    pub fn set_render_state(&self, rhi: &dyn Rhi, context: &DeviceContextRhi) -> bool {
        let Some(bound_shader_state) = self.bound_shader_state() else {
            log::trace!(
                "Skipping render state of '{}': no drawable shaders",
                self.material.name()
            );
            return false;
        };
        rhi.set_bound_shader_state(context, &bound_shader_state);
        rhi.set_rasterizer_state(context, &self.rasterizer_state());
        self.vertex_factory.set_streams(rhi, context);
        true
    }

    /// Upload material constants through every resolved shader.
    pub fn set_shader_parameters(&self, rhi: &dyn Rhi, context: &DeviceContextRhi) {
        for shader in [&self.vertex_shader, &self.pixel_shader].into_iter().flatten() {
            shader.set_constant_parameters(rhi, context, &self.vertex_factory, &self.material);
        }
    }

    /// Upload per-element data and submit every element of `mesh`.
    pub(crate) fn draw_elements(
        &self,
        rhi: &dyn Rhi,
        context: &DeviceContextRhi,
        mesh: &MeshBatch,
        view: &SceneView,
        shaders: &[&ShaderRef],
    ) {
        for (index, element) in mesh.elements.iter().enumerate() {
            let indexed = match &element.index_buffer {
                Some(index_buffer) => match i32::try_from(element.base_vertex_index) {
                    Ok(base_vertex_index) => Some((index_buffer, base_vertex_index)),
                    Err(_) => {
                        log::warn!(
                            "Skipping indexed element {} of '{}': base vertex {} exceeds i32",
                            index,
                            self.material.name(),
                            element.base_vertex_index
                        );
                        continue;
                    }
                },
                None => None,
            };
            for shader in shaders {
                shader.set_mesh(rhi, context, mesh, index, view);
            }
            match indexed {
                Some((index_buffer, base_vertex_index)) => rhi.draw_indexed_primitive(
                    context,
                    index_buffer,
                    mesh.primitive_type,
                    base_vertex_index,
                    element.first_index,
                    element.num_primitives,
                    element.num_instances,
                ),
                None => rhi.draw_primitive(
                    context,
                    mesh.primitive_type,
                    element.base_vertex_index,
                    element.num_primitives,
                    element.num_instances,
                ),
            }
        }
    }
}

/// A concrete way of drawing mesh batches.
///
/// Implementors hold a [`MeshDrawingPolicy`] and decide in [`draw`](Self::draw)
/// which shaders receive per-element data and how geometry is submitted.
pub trait DrawingPolicy: Send + Sync {
    /// Resolve shaders for the pair.
    fn create(vertex_factory: VertexFactoryRef, material: MaterialRef, depth_bias: f32) -> Self
    where
        Self: Sized;

    fn base(&self) -> &MeshDrawingPolicy;

    /// Bind pipeline state. Must run before any [`draw`](Self::draw) in a context.
    fn set_render_state(&self, rhi: &dyn Rhi, context: &DeviceContextRhi) -> bool {
        self.base().set_render_state(rhi, context)
    }

    fn set_shader_parameters(&self, rhi: &dyn Rhi, context: &DeviceContextRhi) {
        self.base().set_shader_parameters(rhi, context);
    }

    /// Submit one mesh batch for one view.
    fn draw(&self, rhi: &dyn Rhi, context: &DeviceContextRhi, mesh: &MeshBatch, view: &SceneView);
}

/// Run the whole policy protocol for a list of batches sharing one policy.
///
/// Returns the number of batches submitted; zero if the policy is not drawable.
pub fn draw_batches<P: DrawingPolicy>(
    policy: &P,
    rhi: &dyn Rhi,
    context: &DeviceContextRhi,
    batches: &[&MeshBatch],
    view: &SceneView,
) -> usize {
    if !policy.set_render_state(rhi, context) {
        return 0;
    }
    policy.set_shader_parameters(rhi, context);
    for batch in batches {
        policy.draw(rhi, context, batch, view);
    }
    batches.len()
}
