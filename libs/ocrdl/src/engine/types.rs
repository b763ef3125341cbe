use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::loader::LoaderConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub loader: LoaderConfig,
    pub max_threads: i32,
    /// Device node whose presence marks a usable Vulkan GPU.
    pub gpu_device_node: PathBuf,
    pub gpu_device_id: i32,
    pub default_language: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            loader: LoaderConfig::default(),
            max_threads: Self::get_default_max_threads(),
            gpu_device_node: PathBuf::from("/dev/mtgpu.0"),
            gpu_device_id: 0,
            default_language: None,
        }
    }
}

impl EngineConfig {
    pub fn get_default_max_threads() -> i32 {
        2
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }
}

/// Outcome of probing for an accelerator.
#[derive(Debug)]
pub enum HardwareProbe {
    Supported,
    Unsupported,
    Error(std::io::Error),
}
