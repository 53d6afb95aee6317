use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootLayout {
    root: PathBuf,
}

impl RootLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.versions_dir().join(version)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    pub fn staging_version_dir(&self, version: &str) -> PathBuf {
        self.staging_dir().join(version)
    }

    pub fn current_path(&self) -> PathBuf {
        self.root.join("current.txt")
    }

    pub fn last_known_good_path(&self) -> PathBuf {
        self.root.join("last_known_good.txt")
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join("install_history.log")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join("update.lock")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("rollgate.toml")
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.versions_dir(), self.staging_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_user_root() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows user root")?;
        return Ok(PathBuf::from(app_data).join("Rollgate"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve user root")?;
    Ok(PathBuf::from(home).join(".rollgate"))
}
