use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::version::validate_version_id;

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Package metadata declaring the version a package installs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    #[serde(rename = "Version", alias = "version")]
    pub version: String,
}

impl Manifest {
    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        let manifest: Self =
            serde_json::from_str(input).context("failed to parse package manifest")?;
        validate_version_id(&manifest.version)
            .with_context(|| format!("manifest version '{}' is unusable", manifest.version))?;
        Ok(manifest)
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize package manifest")
    }
}
