use anyhow::{Context, Result};
use std::path::Path;

use crate::fs_utils::{copy_dir_recursive, move_dir_or_copy, remove_dir_if_exists};
use crate::UpdateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployReport {
    pub files_copied: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileDeployer;

impl FileDeployer {
    /// Replaces `dest` with a recursive copy of `source`. Any previous content
    /// at `dest` is removed first; nothing is merged.
    pub fn deploy(&self, source: &Path, dest: &Path) -> Result<DeployReport> {
        if !source.is_dir() {
            return Err(UpdateError::SourceMissing(source.to_path_buf()).into());
        }

        remove_dir_if_exists(dest)
            .with_context(|| format!("failed to clear previous deployment: {}", dest.display()))?;
        let files_copied = copy_dir_recursive(source, dest).with_context(|| {
            format!(
                "failed to deploy {} into {}",
                source.display(),
                dest.display()
            )
        })?;
        tracing::debug!(
            source = %source.display(),
            dest = %dest.display(),
            files_copied,
            "deployed package files"
        );

        Ok(DeployReport { files_copied })
    }

    /// Moves a fully staged tree to its final location, replacing whatever was
    /// there.
    pub fn promote(&self, staged: &Path, dest: &Path) -> Result<()> {
        remove_dir_if_exists(dest)
            .with_context(|| format!("failed to replace version directory: {}", dest.display()))?;
        move_dir_or_copy(staged, dest).with_context(|| {
            format!(
                "failed to promote {} to {}",
                staged.display(),
                dest.display()
            )
        })
    }
}
