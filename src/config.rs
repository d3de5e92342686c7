//! Startup configuration, read from an optional JSON file. Every field has a
//! default, so `{}` is a complete config.

use crate::editor::ERASE_RADIUS;
use crate::locomotion::{CameraStrategy, FirstPersonSettings, OrbitSettings};
use crate::scene::terrain::{TerrainLayout, TerrainSource};
use glam::Vec3;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Longest simulation step per frame, in seconds.
    pub max_frame_dt: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Meadow".to_string(),
            width: 1280,
            height: 720,
            max_frame_dt: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub strategy: CameraStrategy,
    pub position: Vec3,
    pub look_at: Vec3,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            strategy: CameraStrategy::Orbit,
            position: Vec3::new(6.0, 2.0, 10.0),
            look_at: Vec3::new(0.0, 0.0, 1.0),
            fov_degrees: 60.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub erase_radius: f32,
    /// Scale change per `[` / `]` press.
    pub scale_step: f32,
    /// Degrees per `,` / `.` press.
    pub rotate_step: f32,
    /// Pointer travel, in pixels, beyond which a press counts as a drag.
    pub click_slop: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            erase_radius: ERASE_RADIUS,
            scale_step: 0.1,
            rotate_step: 15.0,
            click_slop: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub source: TerrainSource,
    pub tiles: u32,
    pub scale: Vec3,
    /// Clouds and sun.
    pub ambient: bool,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        let layout = TerrainLayout::default();
        Self {
            source: TerrainSource::default(),
            tiles: layout.tiles,
            scale: layout.scale,
            ambient: true,
        }
    }
}

impl TerrainConfig {
    pub fn layout(&self) -> TerrainLayout {
        TerrainLayout {
            tiles: self.tiles,
            scale: self.scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub flower_image: PathBuf,
    /// Decode on a worker thread; off decodes inline on the frame thread.
    pub background_loading: bool,
    /// Fixed seed for flower yaw and cloud placement.
    pub seed: Option<u64>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            flower_image: PathBuf::from("assets/flower.png"),
            background_loading: true,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub editor: EditorConfig,
    pub locomotion: FirstPersonSettings,
    pub orbit: OrbitSettings,
    pub terrain: TerrainConfig,
    pub assets: AssetConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Missing or broken files are logged and replaced by defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::Read { path, source })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                log::info!("No config at {}, using defaults", path);
                Self::default()
            }
            Err(err) => {
                log::warn!("{}. Falling back to defaults.", err);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_object_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.locomotion.eye_height, 1.6);
        assert_eq!(config.orbit.max_distance, 15.0);
        assert_eq!(config.editor.erase_radius, 0.1);
        assert_eq!(config.camera.strategy, CameraStrategy::Orbit);
    }

    #[test]
    fn partial_sections_override_fields() {
        let json = r#"{
            "camera": { "strategy": "first_person", "position": [1.0, 2.0, 3.0] },
            "locomotion": { "gravity": 9.8 },
            "terrain": { "source": { "kind": "procedural", "size": 8.0, "resolution": 16, "amplitude": 0.0 }, "tiles": 1 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.camera.strategy, CameraStrategy::FirstPerson);
        assert_eq!(config.camera.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(config.camera.fov_degrees, 60.0);
        assert_eq!(config.locomotion.gravity, 9.8);
        assert_eq!(config.locomotion.move_speed, 3.0);
        assert_eq!(config.terrain.layout().tiles, 1);
        assert_eq!(config.terrain.scale, Vec3::new(1.2, 1.2, 1.6));
    }

    #[test]
    fn load_reads_file_and_reports_errors() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("meadow.json");
        fs::write(&path, r#"{ "window": { "title": "Test" } }"#).expect("write config");
        let config = Config::load(&path).expect("load config");
        assert_eq!(config.window.title, "Test");

        let missing = dir.path().join("missing.json");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Read { .. })));
        assert_eq!(Config::load_or_default(&missing), Config::default());

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").expect("write config");
        assert!(matches!(Config::load(&broken), Err(ConfigError::Parse { .. })));
        assert_eq!(Config::load_or_default(&broken), Config::default());
    }
}
