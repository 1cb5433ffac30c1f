//! Viewer configuration.
//!
//! Every field has a default, so an empty or partial TOML file is valid.
//! Natively the config is read from `viewer.toml` in the working directory or
//! from the file named by `FLOW_VIEWER_CONFIG`. The web build always uses the
//! defaults.

use serde::Deserialize;

#[cfg(not(target_arch = "wasm32"))]
use anyhow::Context as _;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "FLOW_VIEWER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "viewer.toml";

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub scene: SceneConfig,
    pub camera: CameraConfig,
    pub assets: AssetConfig,
    pub models: ModelsConfig,
    pub dom: DomConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "flow-viewer".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// sRGB `0xRRGGBB`.
    pub background: u32,
    pub floor_size: f32,
    /// sRGB `0xRRGGBB`.
    pub floor_color: u32,
    /// Strength of the flat sky/ground environment term.
    pub environment_intensity: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: 0xbfe3dd,
            floor_size: 20.0,
            floor_color: 0xaaaaaa,
            environment_intensity: 0.4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 40.0,
            near: 1.0,
            far: 100.0,
            position: [5.0, 2.0, 8.0],
            target: [0.0, 0.5, 0.0],
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory (native) or URL path below the page origin (web) that model
    /// paths are resolved against.
    pub root: String,
    /// URL path below the page origin holding `draco_decoder.js`, used by the
    /// web build for Draco-compressed meshes.
    pub draco_decoder: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: "assets".to_string(),
            draco_decoder: "draco/".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ModelEntry {
    pub path: String,
    pub scale: f32,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub littlest_tokyo: ModelEntry,
    pub soldier: ModelEntry,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            littlest_tokyo: ModelEntry {
                path: "LittlestTokyo.glb".to_string(),
                scale: 0.01,
            },
            soldier: ModelEntry {
                path: "Soldier.glb".to_string(),
                scale: 1.0,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DomConfig {
    /// Id of the button that switches between the two models.
    pub switch_button: String,
    /// Id of the element that shows the selected light panel row. The page
    /// title is used when the page has no such element.
    pub light_panel: String,
}

impl Default for DomConfig {
    fn default() -> Self {
        Self {
            switch_button: "switchModel".to_string(),
            light_panel: "lightPanel".to_string(),
        }
    }
}

impl ViewerConfig {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Reads the config file if there is one.
    ///
    /// A missing `viewer.toml` yields the defaults; a missing file named by
    /// `FLOW_VIEWER_CONFIG` is an error.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_from(std::path::Path::new(&path)),
            None => {
                let path = std::path::Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load_from(path)
                } else {
                    log::info!("No {} found, using default configuration", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self::default())
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ViewerConfig::from_toml("").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.models.littlest_tokyo.scale, 0.01);
        assert_eq!(config.dom.switch_button, "switchModel");
        assert_eq!(config.dom.light_panel, "lightPanel");
        assert_eq!(config.assets.draco_decoder, "draco/");
    }

    #[test]
    fn page_element_ids_can_be_renamed() {
        let config = ViewerConfig::from_toml(
            r#"
            [dom]
            light_panel = "status"
            "#,
        )
        .unwrap();
        assert_eq!(config.dom.light_panel, "status");
        assert_eq!(config.dom.switch_button, "switchModel");
    }

    #[test]
    fn sections_can_be_overridden_partially() {
        let config = ViewerConfig::from_toml(
            r#"
            [scene]
            background = 0x000000

            [camera]
            fov = 60.0

            [models.soldier]
            path = "characters/Soldier.glb"
            scale = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(config.scene.background, 0);
        assert_eq!(config.scene.floor_size, 20.0);
        assert_eq!(config.camera.fov, 60.0);
        assert_eq!(config.camera.near, 1.0);
        assert_eq!(config.models.soldier.path, "characters/Soldier.glb");
        assert_eq!(config.models.littlest_tokyo.path, "LittlestTokyo.glb");
    }
}
