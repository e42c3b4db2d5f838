//! Engine configuration
//!
//! Loaded from TOML. Every key is optional; missing keys take the defaults
//! below.
//!
//! ```toml
//! app_name = "Umbra"
//! window_width = 1280
//! window_height = 720
//! near_plane = 0.1
//! far_plane = 1000.0
//!
//! [shadow]
//! resolution = 2048
//!
//! [resources]
//! textures = "resources/textures"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub resolution: u32,
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            resolution: 2048,
            half_extent: 10.0,
            near: 1.0,
            far: 200.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcePaths {
    pub textures: PathBuf,
    pub skybox: PathBuf,
    pub models: PathBuf,
}

impl Default for ResourcePaths {
    fn default() -> Self {
        Self {
            textures: PathBuf::from("resources/textures"),
            skybox: PathBuf::from("resources/skybox"),
            models: PathBuf::from("resources/models"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub app_name: String,
    pub window_width: u32,
    pub window_height: u32,
    pub fullscreen: bool,
    /// Requested MSAA sample count; recorded but not applied by the wgpu backend
    pub sampling_level: u32,
    pub vsync: bool,
    pub near_plane: f32,
    pub far_plane: f32,
    /// Vertical field of view in degrees
    pub field_of_view: f32,
    pub camera_speed: f32,
    pub mouse_sensitivity: f32,
    pub light_position: [f32; 3],
    pub clear_color: [f32; 4],
    pub shadow: ShadowConfig,
    pub resources: ResourcePaths,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_name: "Umbra".to_string(),
            window_width: 1280,
            window_height: 720,
            fullscreen: false,
            sampling_level: 4,
            vsync: true,
            near_plane: 0.1,
            far_plane: 1000.0,
            field_of_view: 45.0,
            camera_speed: 10.0,
            mouse_sensitivity: 0.25,
            light_position: [10.0, 100.0, 0.0],
            clear_color: [0.1, 0.2, 0.8, 1.0],
            shadow: ShadowConfig::default(),
            resources: ResourcePaths::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise falls back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(ConfigError::Invalid {
                key: "window_width/window_height",
                reason: "window dimensions must be non-zero".to_string(),
            });
        }
        if !(self.near_plane > 0.0 && self.far_plane > self.near_plane) {
            return Err(ConfigError::Invalid {
                key: "near_plane/far_plane",
                reason: format!("need 0 < near < far, got {} and {}", self.near_plane, self.far_plane),
            });
        }
        if !(self.field_of_view > 0.0 && self.field_of_view < 180.0) {
            return Err(ConfigError::Invalid {
                key: "field_of_view",
                reason: format!("{} is outside (0, 180)", self.field_of_view),
            });
        }
        if self.shadow.resolution == 0 {
            return Err(ConfigError::Invalid {
                key: "shadow.resolution",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.light_position, [10.0, 100.0, 0.0]);
        assert_eq!(config.shadow.half_extent, 10.0);
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            app_name = "Crypt"
            fullscreen = true
            far_plane = 250.0

            [shadow]
            resolution = 4096

            [resources]
            textures = "assets/tex"
            "#,
        )
        .unwrap();
        assert_eq!(config.app_name, "Crypt");
        assert!(config.fullscreen);
        assert_eq!(config.far_plane, 250.0);
        assert_eq!(config.shadow.resolution, 4096);
        assert_eq!(config.shadow.far, 200.0);
        assert_eq!(config.resources.textures, PathBuf::from("assets/tex"));
        assert_eq!(config.resources.skybox, PathBuf::from("resources/skybox"));
    }

    #[test]
    fn test_invalid_planes_rejected() {
        let err = EngineConfig::from_toml_str("near_plane = 5.0\nfar_plane = 1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_type_mismatch_is_parse_error() {
        let err = EngineConfig::from_toml_str("window_width = \"wide\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = EngineConfig::load_or_default("definitely/not/here.toml").unwrap();
        assert_eq!(config.window_width, 1280);
        assert!(EngineConfig::load("definitely/not/here.toml").is_err());
    }
}
