//! Process-wide device handle.
//!
//! Kept in its own test binary: the handle is global state, so these tests
//! must not share a process with tests that install their own device.

use std::sync::{Arc, Mutex};

use redlilium_render::config::BackendKind;
use redlilium_render::rhi::{self, DummyRhi, Rhi};
use redlilium_render::{RenderSettings, create_rhi};

static SERIAL: Mutex<()> = Mutex::new(());

#[test]
fn test_install_initializes_and_shutdown_destroys() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let device = Arc::new(DummyRhi::new());
    rhi::install(device.clone(), true);

    let global = rhi::global();
    assert_eq!(global.name(), "Dummy");
    assert!(global.is_initialize());
    assert!(global.is_editor());

    rhi::shutdown();
    assert!(rhi::try_global().is_none());
    assert!(!device.is_initialize());

    // A second shutdown is a no-op.
    rhi::shutdown();
}

#[test]
#[should_panic(expected = "already installed")]
fn test_double_install_panics() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    rhi::install(Arc::new(DummyRhi::new()), false);
    let result = std::panic::catch_unwind(|| rhi::install(Arc::new(DummyRhi::new()), false));
    rhi::shutdown();
    if let Err(panic) = result {
        std::panic::resume_unwind(panic);
    }
}

#[test]
fn test_settings_select_dummy_backend() {
    let settings = RenderSettings {
        backend: BackendKind::Dummy,
        ..RenderSettings::default()
    };
    let device = create_rhi(&settings).unwrap();
    assert_eq!(device.name(), "Dummy");
    assert!(!device.is_initialize());
}
