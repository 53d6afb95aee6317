use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::time::Duration;

use crate::RootLayout;

pub const DEFAULT_HOOK_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallerConfig {
    #[serde(default)]
    pub hook: HookConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookConfig {
    #[serde(default)]
    pub mode: HookMode,
    #[serde(default = "default_hook_timeout_secs")]
    pub timeout_secs: u64,
    /// Program names a hook may invoke. Empty means unrestricted.
    #[serde(default)]
    pub allowed_programs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookMode {
    /// Hand the command line to the platform shell.
    #[default]
    Shell,
    /// Split on whitespace and exec the first token directly.
    Direct,
}

fn default_hook_timeout_secs() -> u64 {
    DEFAULT_HOOK_TIMEOUT_SECS
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            mode: HookMode::default(),
            timeout_secs: DEFAULT_HOOK_TIMEOUT_SECS,
            allowed_programs: Vec::new(),
        }
    }
}

impl HookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl InstallerConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse installer config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `rollgate.toml` from the root, falling back to defaults when absent.
    pub fn load(layout: &RootLayout) -> Result<Self> {
        let path = layout.config_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read installer config: {}", path.display()));
            }
        };
        Self::from_toml_str(&raw)
            .with_context(|| format!("invalid installer config: {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.hook.timeout_secs == 0 {
            return Err(anyhow!("hook.timeout_secs must be greater than zero"));
        }
        if let Some(program) = self
            .hook
            .allowed_programs
            .iter()
            .find(|program| program.trim().is_empty())
        {
            return Err(anyhow!(
                "hook.allowed_programs must not contain blank entries: '{program}'"
            ));
        }
        Ok(())
    }
}
