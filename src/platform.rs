use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

fn file_manager() -> &'static str {
    if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

/// Shows the finished videos in the desktop file manager.
pub fn open_folder(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    let dir = path
        .canonicalize()
        .with_context(|| format!("No such folder: {}", path.display()))?;

    Command::new(file_manager())
        .arg(&dir)
        .spawn()
        .with_context(|| format!("Failed to launch {} for {}", file_manager(), dir.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_folder(&dir.path().join("nope")).is_err());
        assert!(open_folder(Path::new("")).is_ok());
    }
}
