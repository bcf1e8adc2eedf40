//! Per-vertex-factory shader parameters.

use redlilium_core::math::mat4_to_cols_array_2d;

use crate::rhi::{DeviceContextRhi, Rhi, ShaderFrequency};
use crate::scene::{MeshBatch, SceneView};
use crate::shader::{ShaderParameter, ShaderParameterMap};

/// Parameter name of the element transform.
pub const LOCAL_TO_WORLD_PARAMETER: &str = "LocalToWorldMatrix";
/// Parameter name of the view-projection transform.
pub const VIEW_PROJECTION_PARAMETER: &str = "ViewProjectionMatrix";

/// Shader parameters a vertex factory type contributes to the shaders
/// compiled against it.
pub trait VertexFactoryShaderParameters: Send + Sync {
    /// Resolve parameter names against a compiled shader.
    fn bind(&mut self, parameter_map: &ShaderParameterMap);

    /// Upload the data of one mesh batch element.
    fn set_mesh(
        &self,
        rhi: &dyn Rhi,
        context: &DeviceContextRhi,
        frequency: ShaderFrequency,
        mesh: &MeshBatch,
        element_index: usize,
        view: &SceneView,
    );
}

/// Local-to-world and view-projection matrices.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneralVertexShaderParameters {
    local_to_world: ShaderParameter,
    view_projection: ShaderParameter,
}

impl VertexFactoryShaderParameters for GeneralVertexShaderParameters {
    fn bind(&mut self, parameter_map: &ShaderParameterMap) {
        self.local_to_world = ShaderParameter::bind(parameter_map, LOCAL_TO_WORLD_PARAMETER);
        self.view_projection = ShaderParameter::bind(parameter_map, VIEW_PROJECTION_PARAMETER);
    }

    fn set_mesh(
        &self,
        rhi: &dyn Rhi,
        context: &DeviceContextRhi,
        frequency: ShaderFrequency,
        mesh: &MeshBatch,
        element_index: usize,
        view: &SceneView,
    ) {
        let Some(element) = mesh.elements.get(element_index) else {
            log::warn!(
                "GeneralVertexShaderParameters: element {} out of range ({} elements)",
                element_index,
                mesh.elements.len()
            );
            return;
        };
        self.local_to_world.set(
            rhi,
            context,
            frequency,
            &mat4_to_cols_array_2d(&element.local_to_world),
        );
        self.view_projection.set(
            rhi,
            context,
            frequency,
            &mat4_to_cols_array_2d(&view.view_projection()),
        );
    }
}

/// Constructor for types whose vertex stage needs the general parameters only.
pub fn general_vertex_parameters(
    frequency: ShaderFrequency,
) -> Option<Box<dyn VertexFactoryShaderParameters>> {
    (frequency == ShaderFrequency::Vertex)
        .then(|| Box::new(GeneralVertexShaderParameters::default()) as Box<dyn VertexFactoryShaderParameters>)
}

/// Constructor for types without vertex factory parameters.
pub fn no_parameters(_frequency: ShaderFrequency) -> Option<Box<dyn VertexFactoryShaderParameters>> {
    None
}
