use anyhow::anyhow;

/// Checks that `version` can name both a directory under `versions/` and a
/// single-line pointer file.
pub fn validate_version_id(version: &str) -> anyhow::Result<()> {
    let trimmed = version.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("version must not be empty"));
    }
    if trimmed != version {
        return Err(anyhow!(
            "version must not have surrounding whitespace: '{version}'"
        ));
    }
    if version == "." || version == ".." {
        return Err(anyhow!("version must not be a relative path marker: {version}"));
    }
    if version.chars().any(|ch| ch == '/' || ch == '\\') {
        return Err(anyhow!("version must not contain path separators: {version}"));
    }
    if version.chars().any(char::is_control) {
        return Err(anyhow!(
            "version contains control character(s): {}",
            version.escape_debug()
        ));
    }

    Ok(())
}
