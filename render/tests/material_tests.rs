//! Material shader-map integration tests.
//!
//! These run against a registry loaded with a small shader archive and
//! check how materials resolve shaders per vertex factory layout.

mod common;

use std::sync::Arc;

use redlilium_core::hash::INVALID_HASH;
use rstest::rstest;

use common::{TestContext, duplicate_layout, shader_cache};
use redlilium_render::rhi::ShaderFrequency;
use redlilium_render::shader::{
    BASE_PASS_PIXEL_SHADER_TYPE, BASE_PASS_VERTEX_SHADER_TYPE, ShaderCache, ShaderCacheItem,
};
use redlilium_render::vertex_factory::world_grid_vertex_factory;
use redlilium_render::{Material, MaterialUsage, RenderRegistry};

#[test]
fn test_static_mesh_permutation_is_resolved() {
    let ctx = TestContext::new();
    let factory = ctx.static_mesh_factory();
    let material = ctx.material("Static");
    material.set_usage_flags(MaterialUsage::STATIC_MESH);

    let vs = material
        .get_shader(factory.hash(), ShaderFrequency::Vertex)
        .expect("vertex permutation for the static mesh layout");
    assert_eq!(vs.name(), BASE_PASS_VERTEX_SHADER_TYPE.name);
    assert_eq!(vs.vertex_factory_hash(), factory.hash());
    assert!(vs.vertex_shader().is_some());

    let ps = material
        .get_shader(factory.hash(), ShaderFrequency::Pixel)
        .expect("layout independent pixel shader");
    assert_eq!(ps.name(), BASE_PASS_PIXEL_SHADER_TYPE.name);
    assert_eq!(ps.vertex_factory_hash(), INVALID_HASH);
    assert!(ps.pixel_shader().is_some());
}

#[test]
fn test_lookups_do_not_rebuild() {
    let ctx = TestContext::new();
    let factory = ctx.static_mesh_factory();
    let material = ctx.material("Idempotent");

    let first = material.get_shader(factory.hash(), ShaderFrequency::Vertex);
    for _ in 0..8 {
        let again = material.get_shader(factory.hash(), ShaderFrequency::Vertex);
        assert!(Arc::ptr_eq(first.as_ref().unwrap(), again.as_ref().unwrap()));
    }
    assert_eq!(material.shader_map_rebuild_count(), 1);
    assert!(!material.is_shader_map_dirty());
}

#[test]
fn test_shader_change_rebuilds_once() {
    let ctx = TestContext::new();
    let factory = ctx.static_mesh_factory();
    let material = ctx.material("Dirty");
    material.get_shader(factory.hash(), ShaderFrequency::Vertex);

    material.clear_shader(ShaderFrequency::Pixel);
    assert!(material.is_shader_map_dirty());
    assert!(material.get_shader(factory.hash(), ShaderFrequency::Pixel).is_none());
    assert!(material.get_shader(factory.hash(), ShaderFrequency::Vertex).is_some());
    assert_eq!(material.shader_map_rebuild_count(), 2);
}

#[test]
fn test_usage_excludes_static_mesh_layouts() {
    let ctx = TestContext::new();
    let factory = ctx.static_mesh_factory();
    let material = ctx.material("DynamicOnly");
    material.usage_on_static_mesh(false);

    assert!(material.get_shader(factory.hash(), ShaderFrequency::Vertex).is_none());
    let dynamic_hash = ctx.registry.dynamic_mesh_factory().hash();
    assert!(material.get_shader(dynamic_hash, ShaderFrequency::Vertex).is_some());

    material.usage_on_static_mesh(true);
    assert!(material.get_shader(factory.hash(), ShaderFrequency::Vertex).is_some());
}

#[test]
fn test_new_layout_triggers_rebuild() {
    let ctx = TestContext::new();
    let material = ctx.material("Late");
    let hash = ctx.registry.dynamic_mesh_factory().hash();
    material.get_shader(hash, ShaderFrequency::Vertex);
    assert_eq!(material.shader_map_rebuild_count(), 1);

    let factory = ctx.static_mesh_factory();
    assert!(material.get_shader(factory.hash(), ShaderFrequency::Vertex).is_some());
    assert_eq!(material.shader_map_rebuild_count(), 2);

    // Same layout again: no new generation, no rebuild.
    let again = Arc::new(duplicate_layout(&ctx));
    ctx.registry.register_vertex_factory(&again);
    material.get_shader(again.hash(), ShaderFrequency::Vertex);
    assert_eq!(material.shader_map_rebuild_count(), 2);
}

#[test]
fn test_reloaded_layout_is_resolved_again() {
    let ctx = TestContext::new();
    let material = ctx.material("Streamed");

    let factory = ctx.static_mesh_factory();
    let hash = factory.hash();
    assert!(material.get_shader(hash, ShaderFrequency::Vertex).is_some());

    // Rebuilt while the layout is unloaded: the entry goes away.
    drop(factory);
    material.usage_on_static_mesh(true);
    assert!(material.get_shader(hash, ShaderFrequency::Vertex).is_none());

    let reloaded = ctx.static_mesh_factory();
    assert_eq!(reloaded.hash(), hash);
    assert!(material.is_shader_map_dirty());
    let vs = material
        .get_shader(hash, ShaderFrequency::Vertex)
        .expect("permutation for the reloaded layout");
    assert_eq!(vs.vertex_factory_hash(), hash);
}

#[test]
fn test_shader_cache_loaded_after_lookup() {
    let ctx = TestContext::new();
    let registry = Arc::new(RenderRegistry::new());
    let material = Material::new("Early", registry.clone());
    material.set_shader(&BASE_PASS_VERTEX_SHADER_TYPE);
    material.set_shader(&BASE_PASS_PIXEL_SHADER_TYPE);

    let hash = registry.dynamic_mesh_factory().hash();
    assert!(material.get_shader(hash, ShaderFrequency::Pixel).is_none());
    assert_eq!(material.shader_map_rebuild_count(), 1);

    assert_eq!(registry.load_shader_cache(ctx.rhi(), &shader_cache(&registry)), 5);
    assert!(material.get_shader(hash, ShaderFrequency::Pixel).is_some());
    assert!(material.get_shader(hash, ShaderFrequency::Vertex).is_some());
    assert_eq!(material.shader_map_rebuild_count(), 2);

    registry.shaders.clear_instances();
    assert!(material.get_shader(hash, ShaderFrequency::Pixel).is_none());
}

#[rstest]
#[case::unknown_layout(0x1234_5678)]
#[case::invalid_hash(INVALID_HASH)]
fn test_unknown_layout_has_no_shaders(#[case] hash: u32) {
    let ctx = TestContext::new();
    let material = ctx.material("Unknown");
    assert!(material.get_shader(hash, ShaderFrequency::Vertex).is_none());
    assert!(material.get_shader(hash, ShaderFrequency::Pixel).is_none());
}

#[test]
fn test_layout_without_permutation_is_skipped() {
    let ctx = TestContext::new();
    let grid = Arc::new(world_grid_vertex_factory());
    ctx.registry.register_vertex_factory(&grid);
    let material = ctx.material("Grid");

    // No vertex permutation for the grid layout; only the pixel stage resolves.
    assert!(material.get_shader(grid.hash(), ShaderFrequency::Vertex).is_none());
    assert!(material.get_shader(grid.hash(), ShaderFrequency::Pixel).is_some());
}

#[test]
fn test_rejected_bytecode_keeps_shader_identity() {
    let ctx = TestContext::new();
    let grid = Arc::new(world_grid_vertex_factory());
    ctx.registry.register_vertex_factory(&grid);
    let cache: ShaderCache = [ShaderCacheItem::new(
        BASE_PASS_VERTEX_SHADER_TYPE.name,
        ShaderFrequency::Vertex,
        Vec::new(),
    )
    .with_vertex_factory(grid.ty().name, grid.hash())]
    .into_iter()
    .collect();
    assert_eq!(ctx.registry.load_shader_cache(ctx.rhi(), &cache), 1);

    let material = ctx.material("Rejected");
    let vs = material
        .get_shader(grid.hash(), ShaderFrequency::Vertex)
        .expect("instance exists without a stage handle");
    assert_eq!(vs.name(), BASE_PASS_VERTEX_SHADER_TYPE.name);
    assert!(vs.vertex_shader().is_none());
}

#[test]
fn test_materials_share_shader_instances() {
    let ctx = TestContext::new();
    let factory = ctx.static_mesh_factory();
    let a = ctx.material("A");
    let b = Arc::new(Material::new("B", ctx.registry.clone()));
    b.set_shader(&BASE_PASS_VERTEX_SHADER_TYPE);

    let from_a = a.get_shader(factory.hash(), ShaderFrequency::Vertex).unwrap();
    let from_b = b.get_shader(factory.hash(), ShaderFrequency::Vertex).unwrap();
    assert!(Arc::ptr_eq(&from_a, &from_b));
    assert!(b.get_shader(factory.hash(), ShaderFrequency::Pixel).is_none());
}
