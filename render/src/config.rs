//! Render settings loaded from `render.toml`.
//!
//! ```toml
//! backend = "auto"        # "auto", "wgpu" or "dummy"
//! vsync = true
//! editor = false
//! max_frames_in_flight = 2
//! clear_color = [0.1, 0.1, 0.1, 1.0]
//! adapter_power = "high-performance"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Which device backend to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Try the GPU backend first, fall back to the dummy backend.
    #[default]
    Auto,
    Wgpu,
    Dummy,
}

/// GPU adapter preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterPower {
    #[default]
    HighPerformance,
    LowPower,
}

/// Top-level render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub backend: BackendKind,
    /// Block presentation on vertical sync.
    pub vsync: bool,
    /// Initialize the device with editor support (UI overlay hooks).
    pub editor: bool,
    /// Frames the game thread may queue ahead of the render thread.
    pub max_frames_in_flight: usize,
    /// Viewport clear color, linear RGBA.
    pub clear_color: [f32; 4],
    pub adapter_power: AdapterPower,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            vsync: true,
            editor: false,
            max_frames_in_flight: 2,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            adapter_power: AdapterPower::HighPerformance,
        }
    }
}

impl RenderSettings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, RenderError> {
        let settings: Self = toml::from_str(text).map_err(|e| RenderError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RenderError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&content).map_err(|e| match e {
            RenderError::Config(msg) => {
                RenderError::Config(format!("failed to parse {}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Load settings, falling back to defaults if the file is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => {
                log::info!("Loaded render settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("{e}; using default render settings");
                Self::default()
            }
        }
    }

    pub fn to_toml(&self) -> Result<String, RenderError> {
        toml::to_string_pretty(self).map_err(|e| RenderError::Config(e.to_string()))
    }

    /// Check values that parse but cannot be used.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.max_frames_in_flight == 0 {
            return Err(RenderError::InvalidParameter(
                "max_frames_in_flight must be at least 1".into(),
            ));
        }
        if !self.clear_color.iter().all(|c| c.is_finite()) {
            return Err(RenderError::InvalidParameter(format!(
                "clear_color must be finite, got {:?}",
                self.clear_color
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = RenderSettings::from_toml("").unwrap();
        assert_eq!(settings, RenderSettings::default());
    }

    #[test]
    fn parses_all_fields() {
        let settings = RenderSettings::from_toml(
            r#"
            backend = "dummy"
            vsync = false
            editor = true
            max_frames_in_flight = 3
            clear_color = [0.5, 0.25, 0.0, 1.0]
            adapter_power = "low-power"
            "#,
        )
        .unwrap();
        assert_eq!(settings.backend, BackendKind::Dummy);
        assert!(!settings.vsync);
        assert!(settings.editor);
        assert_eq!(settings.max_frames_in_flight, 3);
        assert_eq!(settings.clear_color, [0.5, 0.25, 0.0, 1.0]);
        assert_eq!(settings.adapter_power, AdapterPower::LowPower);
    }

    #[test]
    fn rejects_zero_frames_in_flight() {
        let err = RenderSettings::from_toml("max_frames_in_flight = 0").unwrap_err();
        assert!(matches!(err, RenderError::InvalidParameter(_)));
    }

    #[test]
    fn rejects_non_finite_clear_color() {
        let settings = RenderSettings {
            clear_color: [0.0, f32::NAN, 0.0, 1.0],
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(RenderError::InvalidParameter(_))));
        assert_eq!(RenderSettings::default().validate(), Ok(()));
    }

    #[test]
    fn invalid_file_keeps_error_kind() {
        let path = std::env::temp_dir().join(format!("redlilium-render-{}.toml", std::process::id()));
        std::fs::write(&path, "max_frames_in_flight = 0").unwrap();
        let result = RenderSettings::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(RenderError::InvalidParameter(_))));
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(RenderSettings::from_toml(r#"backend = "metal""#).is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = RenderSettings::load_or_default(Path::new("/nonexistent/render.toml"));
        assert_eq!(settings, RenderSettings::default());
    }

    #[test]
    fn toml_roundtrip() {
        let settings = RenderSettings {
            backend: BackendKind::Wgpu,
            vsync: false,
            ..Default::default()
        };
        let text = settings.to_toml().unwrap();
        assert_eq!(RenderSettings::from_toml(&text).unwrap(), settings);
    }
}
