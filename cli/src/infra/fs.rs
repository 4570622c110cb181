//! Filesystem helpers shared by the file-backed stores.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// `$CISTACK_HOME`, or `~/.cistack` when unset.
///
/// # Errors
///
/// Returns an error if neither is available.
pub fn cistack_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("CISTACK_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.join(".cistack"))
}

/// Write `content` to `path` via a temp file and rename, mode 0600 on unix.
///
/// # Errors
///
/// Returns an error if any filesystem operation fails.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    std::fs::write(&temp_path, content)
        .with_context(|| format!("writing temp file {}", temp_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("setting permissions on {}", temp_path.display()))?;
    }

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("finalizing {}", path.display()))?;
    Ok(())
}
