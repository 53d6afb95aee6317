use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{RootLayout, UpdateError};

/// Exclusive claim on an update root, released when dropped.
#[derive(Debug)]
pub struct RootLock {
    path: PathBuf,
}

impl RootLock {
    pub fn acquire(layout: &RootLayout) -> Result<Self> {
        let path = layout.lock_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                let holder = read_lock_holder(layout)
                    .ok()
                    .flatten()
                    .filter(|holder| !holder.is_empty())
                    .unwrap_or_else(|| "holder unknown".to_string());
                return Err(UpdateError::Locked { path, holder }.into());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to claim update lock: {}", path.display()));
            }
        };

        let lock = Self { path };
        let payload = format!(
            "pid={}\nstarted_at_unix={}\n",
            std::process::id(),
            current_unix_timestamp()?
        );
        file.write_all(payload.as_bytes())
            .with_context(|| format!("failed to write update lock: {}", lock.path.display()))?;
        file.flush()
            .with_context(|| format!("failed to flush update lock: {}", lock.path.display()))?;

        Ok(lock)
    }
}

impl Drop for RootLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to release update lock");
            }
        }
    }
}

/// Describes the current lock owner as `pid=<n> started_at_unix=<t>`.
pub fn read_lock_holder(layout: &RootLayout) -> Result<Option<String>> {
    let path = layout.lock_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read update lock: {}", path.display()));
        }
    };

    let holder = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Ok(Some(holder))
}

/// Removes a lock left behind by an attempt that did not exit cleanly.
pub fn break_lock(layout: &RootLayout) -> Result<bool> {
    let path = layout.lock_path();
    if !path.exists() {
        return Ok(false);
    }

    fs::remove_file(&path)
        .with_context(|| format!("failed to remove update lock: {}", path.display()))?;
    Ok(true)
}

fn current_unix_timestamp() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time is before unix epoch")?
        .as_secs())
}
