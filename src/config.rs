//! Host configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rbpf::hook::{HookPolicy, HookTrigger};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub vm: VmConfig,
    pub store: StoreConfig,
    pub hooks: Vec<HookConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VmConfig {
    /// Overrides the profile's branch budget.
    pub branch_budget: Option<u32>,
    pub allow_no_return: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Overrides the profile's pool size.
    pub capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookConfig {
    /// Image path, relative to the configuration file.
    pub image: PathBuf,
    pub trigger: String,
    #[serde(default = "default_policy")]
    pub policy: String,
}

fn default_policy() -> String {
    HookPolicy::Continue.name().to_string()
}

impl HookConfig {
    pub fn trigger(&self) -> Result<HookTrigger> {
        self.trigger
            .parse()
            .with_context(|| format!("Invalid trigger '{}' for {}", self.trigger, self.image.display()))
    }

    pub fn policy(&self) -> Result<HookPolicy> {
        self.policy
            .parse()
            .with_context(|| format!("Invalid policy '{}' for {}", self.policy, self.image.display()))
    }
}

impl Config {
    /// Load a configuration file, resolving hook image paths against its
    /// directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let mut config: Config =
            toml::from_str(&text).with_context(|| format!("Failed to parse config: {}", path.display()))?;

        if let Some(dir) = path.parent() {
            for hook in &mut config.hooks {
                if hook.image.is_relative() {
                    hook.image = dir.join(&hook.image);
                }
            }
        }
        Ok(config)
    }
}
