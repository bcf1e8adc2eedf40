//! Editor widgets for the RedLilium render core.
//!
//! Both widgets are plain [`SceneProxy`](redlilium_render::SceneProxy)
//! producers: the game thread snapshots them into a
//! [`FrameSnapshot`](redlilium_render::FrameSnapshot) and the render thread
//! expands them into depth group contents.
//!
//! - [`Gizmo`] - Translate / rotate / scale handle drawn over the world
//! - [`WorldGrid`] - Line grid on the world-grid vertex factory
//!
//! # Usage
//!
//! ```ignore
//! let mut gizmo = Gizmo::new();
//! gizmo.init(&material_assets);
//! gizmo.set_type(GizmoType::Translate);
//! gizmo.set_location(selection_center);
//! gizmo.set_enabled(true);
//!
//! // Each frame:
//! let mut frame = FrameSnapshot::new(frame_number, viewport.clone(), view);
//! if let Some(proxy) = gizmo.proxy() {
//!     frame = frame.with_proxy(Arc::new(proxy));
//! }
//! render_thread.submit_frame(frame)?;
//!
//! // Later, for picking:
//! let axis_x_end = gizmo.screen_state().axis_x_end;
//! ```

mod gizmo;
mod grid;

pub use gizmo::{
    AXIS_MATERIAL_PATHS, Gizmo, GizmoAxis, GizmoProxy, GizmoScreenState, GizmoType,
};
pub use grid::{WorldGrid, WorldGridProxy};
