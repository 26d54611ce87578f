//! Engine configuration
//!
//! [`EngineConfig`] carries the window, frame pacing, buffer capacities,
//! asset paths and validation settings. Every field has a default, so a
//! config file only needs the values it overrides. Files are read and
//! written through the [`Config`] trait in TOML or RON, chosen by extension.
//!
//! Asset paths are resolved at startup: a path that does not exist relative
//! to the working directory is retried under each of [`SEARCH_ROOTS`], so the
//! binary runs from the workspace root or from its own crate directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a config file to load instead of the defaults
pub const CONFIG_ENV_VAR: &str = "CUBE_ENGINE_CONFIG";

/// Directories tried, in order, when an asset path does not exist as given
pub const SEARCH_ROOTS: [&str; 3] = [".", "cube_app", ".."];

/// Upper bound on frames in flight
pub const MAX_FRAMES_IN_FLIGHT_LIMIT: usize = 8;

/// Load and save support for serde-backed config types
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a `.toml` or `.ron` file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match extension_of(path) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Save configuration to a `.toml` or `.ron` file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match extension_of(path) {
            Some("toml") => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents)?;
        Ok(())
    }
}

fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is outside its allowed range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Find `path` as given or under one of [`SEARCH_ROOTS`]
///
/// Returns the path unchanged when nothing matches, so the caller's load
/// error names the configured location.
pub fn resolve_asset_path(path: &Path) -> PathBuf {
    if path.exists() || path.is_absolute() {
        return path.to_path_buf();
    }
    SEARCH_ROOTS
        .iter()
        .map(|root| Path::new(root).join(path))
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Window creation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title, also used as the Vulkan application name
    pub title: String,
    /// Initial framebuffer width in pixels
    pub width: u32,
    /// Initial framebuffer height in pixels
    pub height: u32,
    /// Whether the user may resize the window
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan".to_string(),
            width: 800,
            height: 600,
            resizable: true,
        }
    }
}

/// Precompiled SPIR-V locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Vertex shader SPIR-V file
    pub vertex_shader_path: PathBuf,
    /// Fragment shader SPIR-V file
    pub fragment_shader_path: PathBuf,
}

impl ShaderConfig {
    /// Create a shader configuration from two paths
    pub fn new(vertex_path: impl Into<PathBuf>, fragment_path: impl Into<PathBuf>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Vertex shader path after search-root resolution
    pub fn resolved_vertex(&self) -> PathBuf {
        resolve_asset_path(&self.vertex_shader_path)
    }

    /// Fragment shader path after search-root resolution
    pub fn resolved_fragment(&self) -> PathBuf {
        resolve_asset_path(&self.fragment_shader_path)
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::new("target/shaders/cube.vert.spv", "target/shaders/cube.frag.spv")
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window settings
    pub window: WindowConfig,
    /// Frame slots cycled by the synchronizer
    pub max_frames_in_flight: usize,
    /// Capacity of the dynamic vertex buffer, in vertices
    pub max_vertices: usize,
    /// Capacity of the dynamic index buffer, in indices
    pub max_indices: usize,
    /// Shader binaries
    pub shaders: ShaderConfig,
    /// Texture sampled by the cube
    pub texture_path: PathBuf,
    /// Force validation on or off; `None` enables it in debug builds
    pub enable_validation: Option<bool>,
    /// Validation errors tolerated before the loop aborts
    pub validation_error_threshold: u32,
}

impl EngineConfig {
    /// Defaults: 800x600 "Vulkan" window, two frames in flight, 10000-element buffers
    pub fn new() -> Self {
        Self {
            window: WindowConfig::default(),
            max_frames_in_flight: 2,
            max_vertices: 10_000,
            max_indices: 10_000,
            shaders: ShaderConfig::default(),
            texture_path: PathBuf::from("resources/textures/texture.png"),
            enable_validation: None,
            validation_error_threshold: 50,
        }
    }

    /// Defaults, or the file named by [`CONFIG_ENV_VAR`] when it is set
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => {
                log::info!("Loading configuration from {}", Path::new(&path).display());
                Self::load_from_file(path)
            }
            None => Ok(Self::new()),
        }
    }

    /// Set window title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.window.title = title.into();
        self
    }

    /// Set initial window size
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window.width = width;
        self.window.height = height;
        self
    }

    /// Set maximum frames in flight
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Set dynamic buffer capacities
    pub fn with_buffer_capacity(mut self, max_vertices: usize, max_indices: usize) -> Self {
        self.max_vertices = max_vertices;
        self.max_indices = max_indices;
        self
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set texture path
    pub fn with_texture(mut self, path: impl Into<PathBuf>) -> Self {
        self.texture_path = path.into();
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Whether validation should be enabled for this build
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Texture path after search-root resolution
    pub fn resolved_texture(&self) -> PathBuf {
        resolve_asset_path(&self.texture_path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.title.is_empty() {
            return Err(ConfigError::Invalid("window title cannot be empty".to_string()));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size {}x{} must be non-zero",
                self.window.width, self.window.height
            )));
        }
        if !(1..=MAX_FRAMES_IN_FLIGHT_LIMIT).contains(&self.max_frames_in_flight) {
            return Err(ConfigError::Invalid(format!(
                "max_frames_in_flight must be in 1..={MAX_FRAMES_IN_FLIGHT_LIMIT}, got {}",
                self.max_frames_in_flight
            )));
        }
        if self.max_vertices == 0 || self.max_indices == 0 {
            return Err(ConfigError::Invalid("buffer capacities must be non-zero".to_string()));
        }
        if self.validation_error_threshold == 0 {
            return Err(ConfigError::Invalid("validation_error_threshold must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for EngineConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cube_engine_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window.title, "Vulkan");
        assert_eq!((config.window.width, config.window.height), (800, 600));
        assert_eq!(config.max_frames_in_flight, 2);
        assert_eq!(config.max_vertices, 10_000);
        assert_eq!(config.max_indices, 10_000);
        assert_eq!(config.validation_error_threshold, 50);
    }

    #[test]
    fn test_frames_in_flight_range() {
        assert!(EngineConfig::new().with_max_frames_in_flight(0).validate().is_err());
        assert!(EngineConfig::new().with_max_frames_in_flight(1).validate().is_ok());
        assert!(EngineConfig::new().with_max_frames_in_flight(8).validate().is_ok());
        assert!(EngineConfig::new().with_max_frames_in_flight(9).validate().is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = EngineConfig::new().with_buffer_capacity(0, 36);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_explicit_validation_overrides_build_default() {
        assert!(EngineConfig::new().with_validation(true).validation_enabled());
        assert!(!EngineConfig::new().with_validation(false).validation_enabled());
        assert_eq!(EngineConfig::new().validation_enabled(), cfg!(debug_assertions));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            max_frames_in_flight = 3

            [window]
            width = 1024
            "#,
        )
        .unwrap();

        assert_eq!(config.max_frames_in_flight, 3);
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.window.title, "Vulkan");
        assert_eq!(config.max_indices, 10_000);
    }

    #[test]
    fn test_ron_file_round_trip() {
        let path = temp_path("config.ron");
        let config = EngineConfig::new().with_title("Cube").with_window_size(400, 300);

        config.save_to_file(&path).unwrap();
        let loaded = EngineConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let path = temp_path("config.json");
        std::fs::write(&path, "{}").unwrap();
        let result = EngineConfig::load_from_file(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_asset_path_is_returned_unchanged() {
        let path = Path::new("definitely/not/here.spv");
        assert_eq!(resolve_asset_path(path), path.to_path_buf());
    }
}
