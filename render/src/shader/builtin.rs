//! Built-in shader types.

use std::sync::Arc;

use redlilium_core::math::mat4_to_cols_array_2d;

use super::parameters::{ShaderParameter, set_material_parameters};
use super::{Shader, ShaderCore, ShaderMetaType, ShaderRef};
use crate::materials::Material;
use crate::rhi::{DeviceContextRhi, Rhi, ShaderFrequency};
use crate::scene::{MeshBatch, SceneView};
use crate::vertex_factory::{
    GeneralVertexShaderParameters, VertexFactory, VertexFactoryShaderParameters, VertexFactoryType,
};

pub static BASE_PASS_VERTEX_SHADER_TYPE: ShaderMetaType = ShaderMetaType {
    name: "BasePassVertexShader",
    source_file: "BasePassShader.wgsl",
    function_name: "vs_main",
    frequency: ShaderFrequency::Vertex,
    construct: BasePassVertexShader::construct,
};

pub static BASE_PASS_PIXEL_SHADER_TYPE: ShaderMetaType = ShaderMetaType {
    name: "BasePassPixelShader",
    source_file: "BasePassShader.wgsl",
    function_name: "fs_main",
    frequency: ShaderFrequency::Pixel,
    construct: BasePassPixelShader::construct,
};

pub static SIMPLE_ELEMENT_VERTEX_SHADER_TYPE: ShaderMetaType = ShaderMetaType {
    name: "SimpleElementVertexShader",
    source_file: "SimpleElementShader.wgsl",
    function_name: "vs_main",
    frequency: ShaderFrequency::Vertex,
    construct: SimpleElementVertexShader::construct,
};

pub static SIMPLE_ELEMENT_PIXEL_SHADER_TYPE: ShaderMetaType = ShaderMetaType {
    name: "SimpleElementPixelShader",
    source_file: "SimpleElementShader.wgsl",
    function_name: "fs_main",
    frequency: ShaderFrequency::Pixel,
    construct: SimpleElementPixelShader::construct,
};

pub static BUILTIN_SHADER_TYPES: [&ShaderMetaType; 4] = [
    &BASE_PASS_VERTEX_SHADER_TYPE,
    &BASE_PASS_PIXEL_SHADER_TYPE,
    &SIMPLE_ELEMENT_VERTEX_SHADER_TYPE,
    &SIMPLE_ELEMENT_PIXEL_SHADER_TYPE,
];

/// Parameter name of the simple element transform.
pub const SIMPLE_ELEMENT_TRANSFORM_PARAMETER: &str = "Transform";

/// Vertex stage of the base pass: vertex factory transforms plus material constants.
pub struct BasePassVertexShader {
    core: ShaderCore,
    vertex_factory_parameters: Box<dyn VertexFactoryShaderParameters>,
}

impl BasePassVertexShader {
    fn construct(core: ShaderCore, vertex_factory_type: Option<&'static VertexFactoryType>) -> ShaderRef {
        let mut vertex_factory_parameters = vertex_factory_type
            .and_then(|ty| ty.construct_shader_parameters(ShaderFrequency::Vertex))
            .unwrap_or_else(|| Box::new(GeneralVertexShaderParameters::default()));
        vertex_factory_parameters.bind(core.parameter_map());
        Arc::new(Self {
            core,
            vertex_factory_parameters,
        })
    }
}

impl Shader for BasePassVertexShader {
    fn core(&self) -> &ShaderCore {
        &self.core
    }

    fn meta_type(&self) -> &'static ShaderMetaType {
        &BASE_PASS_VERTEX_SHADER_TYPE
    }

    fn set_constant_parameters(
        &self,
        rhi: &dyn Rhi,
        context: &DeviceContextRhi,
        _vertex_factory: &VertexFactory,
        material: &Material,
    ) {
        set_material_parameters(
            rhi,
            context,
            ShaderFrequency::Vertex,
            self.core.parameter_map(),
            material,
        );
    }

    fn set_mesh(
        &self,
        rhi: &dyn Rhi,
        context: &DeviceContextRhi,
        mesh: &MeshBatch,
        element_index: usize,
        view: &SceneView,
    ) {
        self.vertex_factory_parameters.set_mesh(
            rhi,
            context,
            ShaderFrequency::Vertex,
            mesh,
            element_index,
            view,
        );
    }
}

/// Pixel stage of the base pass: material constants and textures.
pub struct BasePassPixelShader {
    core: ShaderCore,
}

impl BasePassPixelShader {
    fn construct(core: ShaderCore, _: Option<&'static VertexFactoryType>) -> ShaderRef {
        Arc::new(Self { core })
    }
}

impl Shader for BasePassPixelShader {
    fn core(&self) -> &ShaderCore {
        &self.core
    }

    fn meta_type(&self) -> &'static ShaderMetaType {
        &BASE_PASS_PIXEL_SHADER_TYPE
    }

    fn set_constant_parameters(
        &self,
        rhi: &dyn Rhi,
        context: &DeviceContextRhi,
        _vertex_factory: &VertexFactory,
        material: &Material,
    ) {
        set_material_parameters(
            rhi,
            context,
            ShaderFrequency::Pixel,
            self.core.parameter_map(),
            material,
        );
    }
}

/// Vertex stage of batched lines: one world-to-clip transform.
pub struct SimpleElementVertexShader {
    core: ShaderCore,
    transform: ShaderParameter,
}

impl SimpleElementVertexShader {
    fn construct(core: ShaderCore, _: Option<&'static VertexFactoryType>) -> ShaderRef {
        let transform = ShaderParameter::bind(core.parameter_map(), SIMPLE_ELEMENT_TRANSFORM_PARAMETER);
        Arc::new(Self { core, transform })
    }
}

impl Shader for SimpleElementVertexShader {
    fn core(&self) -> &ShaderCore {
        &self.core
    }

    fn meta_type(&self) -> &'static ShaderMetaType {
        &SIMPLE_ELEMENT_VERTEX_SHADER_TYPE
    }

    fn set_mesh(
        &self,
        rhi: &dyn Rhi,
        context: &DeviceContextRhi,
        mesh: &MeshBatch,
        element_index: usize,
        view: &SceneView,
    ) {
        let Some(element) = mesh.elements.get(element_index) else {
            return;
        };
        let transform = view.view_projection() * element.local_to_world;
        self.transform.set(
            rhi,
            context,
            ShaderFrequency::Vertex,
            &mat4_to_cols_array_2d(&transform),
        );
    }
}

/// Pixel stage of batched lines: passes the vertex color through.
pub struct SimpleElementPixelShader {
    core: ShaderCore,
}

impl SimpleElementPixelShader {
    fn construct(core: ShaderCore, _: Option<&'static VertexFactoryType>) -> ShaderRef {
        Arc::new(Self { core })
    }
}

impl Shader for SimpleElementPixelShader {
    fn core(&self) -> &ShaderCore {
        &self.core
    }

    fn meta_type(&self) -> &'static ShaderMetaType {
        &SIMPLE_ELEMENT_PIXEL_SHADER_TYPE
    }
}
