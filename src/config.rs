//! Engine configuration
//!
//! Configuration is loaded from multiple sources with the following priority
//! (lowest to highest):
//! 1. `config/default.toml` (version controlled)
//! 2. `config/user.toml` (gitignored, user overrides)
//! 3. Environment variables (`VIB4_SECTION__KEY`)

use std::fmt;
use std::path::Path;
use std::time::Duration;

use figment::{Figment, providers::{Format, Toml, Env}};
use serde::{Serialize, Deserialize};

use vib4_core::ResourceManagerConfig;
use vib4_render::SortMode;

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Resource manager configuration
    #[serde(default)]
    pub resources: ResourcesConfig,
    /// Memory pool configuration
    #[serde(default)]
    pub pools: PoolsConfig,
    /// Command buffer configuration
    #[serde(default)]
    pub render: RenderConfig,
}

impl EngineConfig {
    /// Load configuration from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::new();

        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }
        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // Environment variables override everything:
        // VIB4_RESOURCES__MEMORY_LIMIT_MB=64 -> resources.memory_limit_mb = 64
        figment = figment.merge(Env::prefixed("VIB4_").split("__"));

        figment.extract().map_err(ConfigError::from)
    }
}

/// Resource manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// Dispose resources as soon as their refcount reaches zero
    pub auto_dispose: bool,
    /// Total estimated-bytes budget in megabytes (0 = unlimited)
    pub memory_limit_mb: usize,
    /// Fraction of the budget that triggers a synchronous GC on register
    pub gc_trigger_fraction: f32,
    /// Idle seconds before an unreferenced resource is eligible for GC
    pub min_idle_secs: u64,
    /// Maximum resources disposed per GC sweep
    pub max_dispose_per_gc: usize,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            auto_dispose: false,
            memory_limit_mb: 0,
            gc_trigger_fraction: 0.9,
            min_idle_secs: 30,
            max_dispose_per_gc: 16,
        }
    }
}

impl ResourcesConfig {
    /// Convert into the core manager configuration
    pub fn to_manager_config(&self) -> ResourceManagerConfig {
        ResourceManagerConfig {
            auto_dispose: self.auto_dispose,
            memory_limit: self.memory_limit_mb * 1024 * 1024,
            gc_trigger_fraction: self.gc_trigger_fraction,
            min_idle: Duration::from_secs(self.min_idle_secs),
            max_dispose_per_gc: self.max_dispose_per_gc,
        }
    }
}

/// Memory pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolsConfig {
    /// Maximum idle instances an object pool retains
    pub object_pool_max: usize,
    /// Maximum idle buffers a buffer pool retains per size bucket
    pub buffers_per_bucket: usize,
}

impl Default for PoolsConfig {
    fn default() -> Self {
        Self {
            object_pool_max: 64,
            buffers_per_bucket: 8,
        }
    }
}

/// Command buffer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Default sort mode: "none", "state", "front_to_back", or "back_to_front"
    pub sort_mode: String,
    /// Use profiled execution in the demo loop
    pub profiling: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sort_mode: "state".to_string(),
            profiling: false,
        }
    }
}

impl RenderConfig {
    /// Parse the configured sort mode, falling back to the state sort
    pub fn sort_mode(&self) -> SortMode {
        match self.sort_mode.as_str() {
            "none" => SortMode::None,
            "state" => SortMode::State,
            "front_to_back" => SortMode::FrontToBack,
            "back_to_front" => SortMode::BackToFront,
            other => {
                log::warn!("Unknown sort mode '{}'; using state sort", other);
                SortMode::State
            }
        }
    }
}

/// Error loading configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Extraction or merge failure from any provider
    Figment(figment::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Figment(e) => write!(f, "Config error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Figment(e)
    }
}
