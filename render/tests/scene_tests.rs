//! Scene renderer frame tests.

mod common;

use std::sync::Arc;

use redlilium_core::color::Color;
use redlilium_core::math::{Mat4, Vec3};
use rstest::rstest;

use common::{TestContext, duplicate_layout, scene_view, triangle_batch};
use redlilium_render::rhi::{PrimitiveType, Rhi, RhiCommand};
use redlilium_render::scene::{DynamicMeshBuilder, FrameStats, SceneDepthGroups};
use redlilium_render::vertex_factory::DynamicMeshVertex;
use redlilium_render::{
    FrameSnapshot, Material, MeshDrawElement, SceneDepthGroupKind, SceneProxy, SceneRenderer,
    SceneView,
};

fn render(ctx: &TestContext, renderer: &mut SceneRenderer, frame: FrameSnapshot) -> FrameStats {
    renderer.render(ctx.rhi(), &ctx.context, &ctx.registry, frame)
}

fn quad() -> DynamicMeshBuilder {
    let mut builder = DynamicMeshBuilder::new();
    let white = [1.0; 4];
    let a = builder.add_vertex(DynamicMeshVertex::new([0.0, 0.0, 0.0], [0.0, 0.0], white));
    let b = builder.add_vertex(DynamicMeshVertex::new([1.0, 0.0, 0.0], [1.0, 0.0], white));
    let c = builder.add_vertex(DynamicMeshVertex::new([1.0, 1.0, 0.0], [1.0, 1.0], white));
    let d = builder.add_vertex(DynamicMeshVertex::new([0.0, 1.0, 0.0], [0.0, 1.0], white));
    builder.add_triangle(a, b, c);
    builder.add_triangle(a, c, d);
    builder
}

#[test]
fn test_empty_frame_brackets_viewport() {
    let ctx = TestContext::new();
    let mut renderer = SceneRenderer::new();
    let stats = render(&ctx, &mut renderer, FrameSnapshot::new(0, ctx.viewport.clone(), scene_view()));
    assert_eq!(stats, FrameStats::default());

    let commands = ctx.take_commands();
    assert_eq!(commands.len(), 3);
    assert!(matches!(commands[0], RhiCommand::BeginDrawingViewport { .. }));
    assert!(matches!(
        &commands[1],
        RhiCommand::SetViewport(rect) if rect.width() == 640 && rect.height() == 480
    ));
    assert!(matches!(
        commands[2],
        RhiCommand::EndDrawingViewport { present: true, lock_to_vsync: false, .. }
    ));
    assert!(!ctx.viewport.is_drawing());

    let device_stats = ctx.context.stats();
    assert_eq!(device_stats.frames_begun, 1);
    assert_eq!(device_stats.frames_presented, 1);
}

#[test]
fn test_batches_sharing_a_policy_bind_once() {
    let ctx = TestContext::new();
    let factory = ctx.static_mesh_factory();
    let material = ctx.material("Shared");

    let mut frame = FrameSnapshot::new(1, ctx.viewport.clone(), scene_view());
    let world = frame.depth_groups.get_mut(SceneDepthGroupKind::World);
    for _ in 0..3 {
        world.add_mesh(MeshDrawElement::new(factory.clone(), material.clone(), triangle_batch()));
    }

    let mut renderer = SceneRenderer::new();
    let stats = render(&ctx, &mut renderer, frame);
    assert_eq!(stats.mesh_batches, 3);
    assert_eq!(renderer.base_pass_policies().len(), 1);

    let commands = ctx.take_commands();
    let bound = commands
        .iter()
        .filter(|c| matches!(c, RhiCommand::SetBoundShaderState { .. }))
        .count();
    assert_eq!(bound, 1);
    assert_eq!(commands.iter().filter(|c| c.is_draw()).count(), 3);
}

#[test]
fn test_distinct_buffers_get_distinct_policies() {
    let ctx = TestContext::new();
    let material = ctx.material("TwoMeshes");
    let first = ctx.static_mesh_factory();
    let mut second = duplicate_layout(&ctx);
    assert!(second.init_rhi(ctx.rhi()));
    let second = Arc::new(second);
    assert_eq!(first.hash(), second.hash());

    let mut frame = FrameSnapshot::new(1, ctx.viewport.clone(), scene_view());
    let world = frame.depth_groups.get_mut(SceneDepthGroupKind::World);
    world.add_mesh(MeshDrawElement::new(first, material.clone(), triangle_batch()));
    world.add_mesh(MeshDrawElement::new(second, material, triangle_batch()));

    let mut renderer = SceneRenderer::new();
    render(&ctx, &mut renderer, frame);
    assert_eq!(renderer.base_pass_policies().len(), 2);

    let buffers: Vec<_> = ctx
        .take_commands()
        .into_iter()
        .filter_map(|c| match c {
            RhiCommand::SetStreamSource { stream_index: 0, buffer, .. } => Some(buffer),
            _ => None,
        })
        .collect();
    assert_eq!(buffers, vec!["Positions".to_string(), "OtherPositions".to_string()]);
}

#[test]
fn test_undrawable_batches_are_counted() {
    let ctx = TestContext::new();
    let empty = Arc::new(Material::new("NoShaders", ctx.registry.clone()));
    let mut frame = FrameSnapshot::new(1, ctx.viewport.clone(), scene_view());
    frame
        .depth_groups
        .get_mut(SceneDepthGroupKind::World)
        .add_mesh(MeshDrawElement::new(ctx.static_mesh_factory(), empty, triangle_batch()));

    let stats = render(&ctx, &mut SceneRenderer::new(), frame);
    assert_eq!(stats.mesh_batches, 0);
    assert_eq!(stats.skipped_batches, 1);
    assert_eq!(ctx.draw_count(), 0);
}

#[test]
fn test_policies_are_reused_across_frames() {
    let ctx = TestContext::new();
    let factory = ctx.static_mesh_factory();
    let material = ctx.material("Persistent");
    let mut renderer = SceneRenderer::new();

    for frame_number in 0..4 {
        let mut frame = FrameSnapshot::new(frame_number, ctx.viewport.clone(), scene_view());
        frame
            .depth_groups
            .get_mut(SceneDepthGroupKind::World)
            .add_mesh(MeshDrawElement::new(factory.clone(), material.clone(), triangle_batch()));
        render(&ctx, &mut renderer, frame);
    }
    assert_eq!(renderer.base_pass_policies().created_count(), 1);

    drop(material);
    assert_eq!(renderer.collect_garbage(), 1);
    assert!(renderer.base_pass_policies().is_empty());
}

#[test]
fn test_dynamic_mesh_is_drawn_indexed() {
    let ctx = TestContext::new();
    let mut frame = FrameSnapshot::new(1, ctx.viewport.clone(), scene_view());
    frame.depth_groups.get_mut(SceneDepthGroupKind::World).add_dynamic_mesh(
        quad(),
        ctx.material("Dynamic"),
        Mat4::identity(),
    );

    let stats = render(&ctx, &mut SceneRenderer::new(), frame);
    assert_eq!(stats.dynamic_meshes, 1);
    let draws: Vec<_> = ctx.take_commands().into_iter().filter(RhiCommand::is_draw).collect();
    assert!(matches!(
        draws.as_slice(),
        [RhiCommand::DrawIndexedPrimitive { num_primitives: 2, primitive_type: PrimitiveType::TriangleList, .. }]
    ));
}

#[test]
fn test_lines_are_drawn_as_one_list() {
    let ctx = TestContext::new();
    let mut frame = FrameSnapshot::new(1, ctx.viewport.clone(), scene_view());
    let lines = &mut frame.depth_groups.get_mut(SceneDepthGroupKind::World).simple_elements;
    lines.add_line(&Vec3::zeros(), &Vec3::x(), Color::RED);
    lines.add_line(&Vec3::zeros(), &Vec3::y(), Color::GREEN);
    lines.add_line(&Vec3::zeros(), &Vec3::z(), Color::BLUE);

    let stats = render(&ctx, &mut SceneRenderer::new(), frame);
    assert_eq!(stats.lines, 3);
    let draws: Vec<_> = ctx.take_commands().into_iter().filter(RhiCommand::is_draw).collect();
    assert_eq!(
        draws,
        vec![RhiCommand::DrawPrimitive {
            primitive_type: PrimitiveType::LineList,
            base_vertex_index: 0,
            num_primitives: 3,
            num_instances: 1,
        }]
    );
}

struct MarkerProxy {
    material: redlilium_render::MaterialRef,
    factory: redlilium_render::vertex_factory::VertexFactoryRef,
}

impl SceneProxy for MarkerProxy {
    fn get_dynamic_elements(&self, _view: &SceneView, depth_groups: &mut SceneDepthGroups) {
        depth_groups
            .get_mut(SceneDepthGroupKind::WorldEdForeground)
            .add_mesh(MeshDrawElement::new(
                self.factory.clone(),
                self.material.clone(),
                triangle_batch(),
            ));
    }
}

#[test]
fn test_foreground_group_draws_after_world() {
    let ctx = TestContext::new();
    let factory = ctx.static_mesh_factory();
    let world_material = ctx.material("World");
    let foreground_material = ctx.material("Foreground");
    foreground_material.set_wireframe(true);

    let proxy = Arc::new(MarkerProxy {
        material: foreground_material,
        factory: factory.clone(),
    });
    let mut frame = FrameSnapshot::new(1, ctx.viewport.clone(), scene_view()).with_proxy(proxy);
    frame
        .depth_groups
        .get_mut(SceneDepthGroupKind::World)
        .add_mesh(MeshDrawElement::new(factory, world_material, triangle_batch()));

    let stats = render(&ctx, &mut SceneRenderer::new(), frame);
    assert_eq!(stats.mesh_batches, 2);

    let fill_modes: Vec<_> = ctx
        .take_commands()
        .into_iter()
        .filter_map(|c| match c {
            RhiCommand::SetRasterizerState(state) => Some(state.fill_mode),
            _ => None,
        })
        .collect();
    assert_eq!(
        fill_modes,
        vec![
            redlilium_render::rhi::FillMode::Solid,
            redlilium_render::rhi::FillMode::Wireframe
        ]
    );
}

#[rstest]
#[case::without_prepass(false, 1)]
#[case::with_prepass(true, 2)]
fn test_depth_prepass_draws_world_twice(#[case] prepass: bool, #[case] expected_draws: usize) {
    let ctx = TestContext::new();
    let mut frame = FrameSnapshot::new(1, ctx.viewport.clone(), scene_view());
    frame
        .depth_groups
        .get_mut(SceneDepthGroupKind::World)
        .add_mesh(MeshDrawElement::new(ctx.static_mesh_factory(), ctx.material("Prepass"), triangle_batch()));

    let mut renderer = SceneRenderer::new().with_depth_prepass(prepass);
    let stats = render(&ctx, &mut renderer, frame);
    assert_eq!(stats.mesh_batches, 1);
    assert_eq!(ctx.draw_count(), expected_draws);
    assert_eq!(renderer.depth_only_policies().len(), usize::from(prepass));
}

#[test]
fn test_vsync_and_present_flags_reach_the_device() {
    let ctx = TestContext::new();
    let mut frame = FrameSnapshot::new(7, ctx.viewport.clone(), scene_view()).with_vsync(true);
    frame.present = false;
    render(&ctx, &mut SceneRenderer::new(), frame);

    assert!(matches!(
        ctx.take_commands().last(),
        Some(RhiCommand::EndDrawingViewport { present: false, lock_to_vsync: true, .. })
    ));
    assert_eq!(ctx.context.stats().frames_presented, 0);
}

#[test]
#[should_panic(expected = "called twice")]
fn test_double_begin_panics() {
    let ctx = TestContext::new();
    ctx.rhi.begin_drawing_viewport(&ctx.context, &ctx.viewport);
    ctx.rhi.begin_drawing_viewport(&ctx.context, &ctx.viewport);
}
