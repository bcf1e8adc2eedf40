//! Scene-side inputs of a frame.
//!
//! The game thread fills [`SceneDepthGroups`] with mesh batches, dynamic
//! meshes and lines, collects [`SceneProxy`] snapshots, and hands the lot to
//! the render thread as a [`FrameSnapshot`]. There a [`SceneRenderer`]
//! turns it into drawing policy calls.

mod depth_group;
mod dynamic_mesh;
mod mesh_batch;
mod proxy;
mod renderer;
mod simple_elements;
mod view;

pub use depth_group::{DynamicMeshDraw, SceneDepthGroup, SceneDepthGroupKind, SceneDepthGroups};
pub use dynamic_mesh::DynamicMeshBuilder;
pub use mesh_batch::{MeshBatch, MeshBatchElement, MeshDrawElement};
pub use proxy::{SceneProxy, SceneProxyRef};
pub use renderer::{FrameSnapshot, FrameStats, SceneRenderer, render_draw_list};
pub use simple_elements::SimpleElements;
pub use view::SceneView;
