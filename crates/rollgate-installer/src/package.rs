use anyhow::{Context, Result};
use rollgate_core::{Manifest, MANIFEST_FILE_NAME};
use std::fs;
use std::path::{Path, PathBuf};

use crate::UpdateError;

pub const FILES_DIR_NAME: &str = "files";
pub const PREINSTALL_FILE_NAME: &str = "preinstall.txt";

/// A validated package directory on local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    root: PathBuf,
    manifest: Manifest,
}

impl Package {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn files_dir(&self) -> PathBuf {
        self.root.join(FILES_DIR_NAME)
    }

    pub fn preinstall_path(&self) -> PathBuf {
        preinstall_path(&self.root)
    }
}

pub fn preinstall_path(package_root: &Path) -> PathBuf {
    package_root.join(PREINSTALL_FILE_NAME)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PackageReader;

impl PackageReader {
    pub fn load(&self, package_path: &Path) -> Result<Package> {
        if !package_path.is_dir() {
            return Err(UpdateError::PackageNotFound(package_path.to_path_buf()).into());
        }

        let manifest_path = package_path.join(MANIFEST_FILE_NAME);
        if !manifest_path.is_file() {
            return Err(UpdateError::ManifestMissing(manifest_path).into());
        }

        let bytes = fs::read(&manifest_path)
            .with_context(|| format!("failed to read manifest: {}", manifest_path.display()))?;
        let raw = String::from_utf8(bytes).map_err(|_| UpdateError::ManifestInvalid {
            path: manifest_path.clone(),
            reason: "manifest is not valid UTF-8".to_string(),
        })?;
        // Editors on Windows commonly prepend a byte-order mark.
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);
        let manifest = Manifest::from_json_str(raw).map_err(|err| UpdateError::ManifestInvalid {
            path: manifest_path.clone(),
            reason: format!("{err:#}"),
        })?;

        Ok(Package {
            root: package_path.to_path_buf(),
            manifest,
        })
    }
}
