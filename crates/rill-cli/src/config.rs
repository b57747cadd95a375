use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rill_core::{BridgeConfig, HttpConfig};
use rill_runtime::{EngineConfig, ModuleCache};
use serde::Deserialize;

const CONFIG_FILE: &str = "rill.toml";

/// Contents of `rill.toml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct RillConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputConfig {
    pub path: Option<PathBuf>,
}

impl RillConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.apply_env();
        Ok(config)
    }

    /// Load from `explicit`, else `./rill.toml`, else
    /// `~/.config/rill/rill.toml`, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Using config file");
                Self::from_file(&path)
            }
            None => {
                tracing::debug!("No config file found, using defaults");
                let mut config = Self::default();
                config.apply_env();
                Ok(config)
            }
        }
    }

    pub fn module_cache(&self) -> ModuleCache {
        let dir = self
            .engine
            .cache_dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(ModuleCache::default_path);
        ModuleCache::new(dir)
    }

    fn apply_env(&mut self) {
        if let Some(module) = std::env::var_os("RILL_ENGINE_MODULE") {
            self.engine.module = Some(PathBuf::from(module));
        }
    }
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("rill").join(CONFIG_FILE));
    }
    paths
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
