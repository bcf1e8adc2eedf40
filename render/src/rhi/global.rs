//! Process-wide device handle.
//!
//! One device is installed at startup and removed at shutdown; it is never
//! swapped while frames are in flight.

use std::sync::Arc;

use parking_lot::RwLock;

use super::Rhi;

static GLOBAL_RHI: RwLock<Option<Arc<dyn Rhi>>> = RwLock::new(None);

/// Initialize `rhi` and make it the process-wide device.
///
/// # Panics
///
/// Panics if a device is already installed.
pub fn install(rhi: Arc<dyn Rhi>, is_editor: bool) {
    let mut slot = GLOBAL_RHI.write();
    assert!(
        slot.is_none(),
        "a global RHI is already installed; call rhi::shutdown first"
    );
    rhi.init(is_editor);
    log::info!(
        "Installed global RHI: {} (editor: {})",
        rhi.name(),
        is_editor
    );
    *slot = Some(rhi);
}

/// The installed device.
///
/// # Panics
///
/// Panics if no device is installed.
pub fn global() -> Arc<dyn Rhi> {
    match try_global() {
        Some(rhi) => rhi,
        None => panic!("global RHI used before rhi::install"),
    }
}

pub fn try_global() -> Option<Arc<dyn Rhi>> {
    GLOBAL_RHI.read().clone()
}

/// Destroy and remove the installed device. Does nothing if none is installed.
pub fn shutdown() {
    let rhi = GLOBAL_RHI.write().take();
    if let Some(rhi) = rhi {
        rhi.destroy();
        log::info!("Global RHI {} shut down", rhi.name());
    }
}
