//! Gizmo and world grid drawn through the scene renderer on the dummy device.

use std::sync::Arc;

use redlilium_core::asset::{AssetReference, AssetRegistry, AssetType};
use redlilium_core::math::{Vec3, look_at_rh, perspective_rh};
use redlilium_gizmo::{AXIS_MATERIAL_PATHS, Gizmo, GizmoAxis, GizmoType, WorldGrid};
use redlilium_render::rhi::{
    DeviceContextRhiRef, DummyRhi, HeadlessWindow, PrimitiveType, Rhi, RhiCommand,
    ShaderFrequency, ViewportRhiRef,
};
use redlilium_render::scene::FrameStats;
use redlilium_render::shader::builtin::SIMPLE_ELEMENT_TRANSFORM_PARAMETER;
use redlilium_render::shader::{
    BASE_PASS_PIXEL_SHADER_TYPE, BASE_PASS_VERTEX_SHADER_TYPE, SIMPLE_ELEMENT_PIXEL_SHADER_TYPE,
    SIMPLE_ELEMENT_VERTEX_SHADER_TYPE, ShaderCache, ShaderCacheItem, ShaderParameterMap,
};
use redlilium_render::vertex_factory::world_grid_vertex_factory;
use redlilium_render::{FrameSnapshot, Material, MaterialRef, RenderRegistry, SceneRenderer, SceneView};
use rstest::rstest;

struct Editor {
    rhi: Arc<DummyRhi>,
    context: DeviceContextRhiRef,
    registry: Arc<RenderRegistry>,
    viewport: ViewportRhiRef,
    materials: AssetRegistry<Material>,
}

fn shader_cache(registry: &RenderRegistry) -> ShaderCache {
    let dynamic_mesh = registry.dynamic_mesh_factory();
    let simple_element = registry.simple_element_factory();
    let world_grid = world_grid_vertex_factory();

    [
        ShaderCacheItem::new(BASE_PASS_VERTEX_SHADER_TYPE.name, ShaderFrequency::Vertex, b"vs-dynamic".to_vec())
            .with_vertex_factory(dynamic_mesh.ty().name, dynamic_mesh.hash()),
        ShaderCacheItem::new(BASE_PASS_VERTEX_SHADER_TYPE.name, ShaderFrequency::Vertex, b"vs-grid".to_vec())
            .with_vertex_factory(world_grid.ty().name, world_grid.hash()),
        ShaderCacheItem::new(BASE_PASS_PIXEL_SHADER_TYPE.name, ShaderFrequency::Pixel, b"ps".to_vec()),
        ShaderCacheItem::new(
            SIMPLE_ELEMENT_VERTEX_SHADER_TYPE.name,
            ShaderFrequency::Vertex,
            b"vs-lines".to_vec(),
        )
        .with_vertex_factory(simple_element.ty().name, simple_element.hash())
        .with_parameter_map(ShaderParameterMap::new().with(SIMPLE_ELEMENT_TRANSFORM_PARAMETER, 0, 0, 64)),
        ShaderCacheItem::new(SIMPLE_ELEMENT_PIXEL_SHADER_TYPE.name, ShaderFrequency::Pixel, b"ps-lines".to_vec()),
    ]
    .into_iter()
    .collect()
}

impl Editor {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let rhi = Arc::new(DummyRhi::new());
        rhi.init(true);
        let context = rhi.immediate_context().expect("dummy device has a context");

        let registry = Arc::new(RenderRegistry::new());
        assert_eq!(registry.load_shader_cache(rhi.as_ref(), &shader_cache(&registry)), 5);

        let viewport = rhi
            .create_viewport(Arc::new(HeadlessWindow::new(7)), 800, 600)
            .expect("dummy viewport");

        Self {
            rhi,
            context,
            registry,
            viewport,
            materials: AssetRegistry::new(AssetType::Material),
        }
    }

    fn material(&self, name: &str) -> MaterialRef {
        let material = Material::new(name, self.registry.clone());
        material.set_shader(&BASE_PASS_VERTEX_SHADER_TYPE);
        material.set_shader(&BASE_PASS_PIXEL_SHADER_TYPE);
        Arc::new(material)
    }

    fn register_axis_materials(&self) {
        for path in AXIS_MATERIAL_PATHS {
            let reference = AssetReference::parse(path).expect("valid axis material path");
            self.materials.register(&reference, self.material(path));
        }
    }

    fn render(&self, renderer: &mut SceneRenderer, frame: FrameSnapshot) -> FrameStats {
        renderer.render(self.rhi.as_ref(), &self.context, &self.registry, frame)
    }

    fn frame(&self) -> FrameSnapshot {
        FrameSnapshot::new(0, self.viewport.clone(), view())
    }
}

fn view() -> SceneView {
    SceneView::new(
        look_at_rh(&Vec3::new(0.0, 0.0, 500.0), &Vec3::zeros(), &Vec3::y()),
        perspective_rh(std::f32::consts::FRAC_PI_2, 800.0 / 600.0, 1.0, 10_000.0),
        800.0,
        600.0,
    )
}

#[rstest]
#[case::translate(GizmoType::Translate, 3, 9)]
#[case::scale(GizmoType::Scale, 3, 9)]
#[case::rotate(GizmoType::Rotate, 0, 0)]
fn test_gizmo_frame(#[case] ty: GizmoType, #[case] heads: usize, #[case] lines: usize) {
    let editor = Editor::new();
    editor.register_axis_materials();

    let mut gizmo = Gizmo::new();
    assert_eq!(gizmo.init(&editor.materials), 3);
    gizmo.set_type(ty);
    gizmo.set_enabled(true);

    let proxy = gizmo.proxy().expect("enabled gizmo has a proxy");
    let mut renderer = SceneRenderer::new();
    let stats = editor.render(&mut renderer, editor.frame().with_proxy(Arc::new(proxy)));

    assert_eq!(stats.dynamic_meshes, heads);
    assert_eq!(stats.lines, lines);
    let draws = editor.rhi.take_commands().into_iter().filter(RhiCommand::is_draw).count();
    assert_eq!(draws, heads + usize::from(lines > 0));
}

#[test]
fn test_missing_materials_skip_heads() {
    let editor = Editor::new();
    let mut gizmo = Gizmo::new();
    assert_eq!(gizmo.init(&editor.materials), 0);
    assert!(gizmo.axis_material(GizmoAxis::X).is_none());

    gizmo.set_type(GizmoType::Translate);
    gizmo.set_enabled(true);
    let mut renderer = SceneRenderer::new();
    let stats = editor.render(&mut renderer, editor.frame().with_proxy(Arc::new(gizmo.proxy().unwrap())));

    assert_eq!(stats.dynamic_meshes, 0);
    assert_eq!(stats.lines, 9);
}

#[test]
fn test_screen_state_follows_axes() {
    let editor = Editor::new();
    let mut gizmo = Gizmo::new();
    gizmo.set_type(GizmoType::Translate);
    gizmo.set_enabled(true);
    assert_eq!(gizmo.screen_state().location, None);

    let mut renderer = SceneRenderer::new();
    editor.render(&mut renderer, editor.frame().with_proxy(Arc::new(gizmo.proxy().unwrap())));

    let state = gizmo.screen_state();
    let center = state.location.expect("origin is in front of the camera");
    assert!((center.x - 400.0).abs() < 1e-3);
    assert!((center.y - 300.0).abs() < 1e-3);

    let x_end = state.axis_x_end.unwrap();
    assert!(x_end.x > center.x + 1.0);
    assert!((x_end.y - center.y).abs() < 1e-3);

    let y_end = state.axis_y_end.unwrap();
    assert!(y_end.y < center.y - 1.0);
    assert!((y_end.x - center.x).abs() < 1e-3);
}

#[test]
fn test_grid_draws_one_line_list() {
    let editor = Editor::new();
    let grid = WorldGrid::new(-500.0, 500.0, 100.0);
    let proxy = grid
        .build(editor.rhi.as_ref(), &editor.registry, editor.material("Grid"))
        .expect("grid uploads on the dummy device");

    let mut renderer = SceneRenderer::new();
    let stats = editor.render(&mut renderer, editor.frame().with_proxy(Arc::new(proxy)));
    assert_eq!(stats.mesh_batches, 1);
    assert_eq!(stats.skipped_batches, 0);

    let commands = editor.rhi.take_commands();
    let draws: Vec<_> = commands.iter().filter(|command| command.is_draw()).collect();
    assert_eq!(draws.len(), 1);
    assert!(matches!(
        draws[0],
        RhiCommand::DrawPrimitive { primitive_type: PrimitiveType::LineList, num_primitives: 22, .. }
    ));
}

#[test]
fn test_grid_draws_before_gizmo() {
    let editor = Editor::new();
    editor.register_axis_materials();

    let grid = WorldGrid::new(-100.0, 100.0, 100.0)
        .build(editor.rhi.as_ref(), &editor.registry, editor.material("Grid"))
        .unwrap();
    let mut gizmo = Gizmo::new();
    gizmo.init(&editor.materials);
    gizmo.set_type(GizmoType::Scale);
    gizmo.set_enabled(true);

    // Gizmo proxy first: depth groups, not proxy order, decide draw order.
    let frame = editor
        .frame()
        .with_proxy(Arc::new(gizmo.proxy().unwrap()))
        .with_proxy(Arc::new(grid));
    let mut renderer = SceneRenderer::new();
    editor.render(&mut renderer, frame);

    let commands = editor.rhi.take_commands();
    let first_draw = commands.iter().find(|command| command.is_draw()).unwrap();
    assert!(matches!(
        first_draw,
        RhiCommand::DrawPrimitive { primitive_type: PrimitiveType::LineList, num_primitives: 6, .. }
    ));
}
