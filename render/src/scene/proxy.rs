//! Scene proxies: game-side objects contributing primitives to a frame.

use std::sync::Arc;

use super::{SceneDepthGroups, SceneView};

/// Render-thread view of a game object.
///
/// A proxy is an immutable snapshot taken on the game thread. The renderer
/// asks it for its primitives once per frame, after the static draw lists
/// are in place.
pub trait SceneProxy: Send + Sync {
    /// Add this frame's primitives to `depth_groups`.
    fn get_dynamic_elements(&self, view: &SceneView, depth_groups: &mut SceneDepthGroups);
}

pub type SceneProxyRef = Arc<dyn SceneProxy>;
