use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::fs_utils::write_atomic;
use crate::RootLayout;

/// Durable `current` / `last-known-good` pointers plus the per-version tree.
#[derive(Debug, Clone)]
pub struct VersionStore {
    layout: RootLayout,
}

impl VersionStore {
    pub fn new(layout: RootLayout) -> Self {
        Self { layout }
    }

    pub fn get_current(&self) -> Result<Option<String>> {
        read_pointer(&self.layout.current_path())
    }

    pub fn get_last_known_good(&self) -> Result<Option<String>> {
        read_pointer(&self.layout.last_known_good_path())
    }

    pub fn set_current(&self, version: &str) -> Result<PathBuf> {
        write_pointer(&self.layout.current_path(), version)
    }

    pub fn set_last_known_good(&self, version: &str) -> Result<PathBuf> {
        write_pointer(&self.layout.last_known_good_path(), version)
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.layout.version_dir(version)
    }

    pub fn installed_versions(&self) -> Result<Vec<String>> {
        let dir = self.layout.versions_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("failed to read versions directory: {}", dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            versions.push(name);
        }

        versions.sort();
        Ok(versions)
    }
}

fn read_pointer(path: &Path) -> Result<Option<String>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read version pointer: {}", path.display()));
        }
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(trimmed.to_string()))
}

fn write_pointer(path: &Path, version: &str) -> Result<PathBuf> {
    write_atomic(path, version.as_bytes())
        .with_context(|| format!("failed to write version pointer: {}", path.display()))?;
    Ok(path.to_path_buf())
}
