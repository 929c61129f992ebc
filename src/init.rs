use crate::config::Config;
use crate::{logi, logw};
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

fn required_dirs(cfg: &Config) -> [&str; 3] {
    [
        cfg.output_dir.as_str(),
        cfg.reaction_gif_dir.as_str(),
        cfg.reaction_audio_dir.as_str(),
    ]
}

pub async fn ensure_directories(cfg: &Config) -> Result<()> {
    for dir in required_dirs(cfg) {
        if !Path::new(dir).exists() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir))?;
            logi(format!("Created directory: {}", dir));
        }
    }

    if let Some(parent) = Path::new(&cfg.temp_png_dir).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    if !Path::new(&cfg.csv_file_path).is_file() {
        logw(format!("Puzzle CSV not found: {}", cfg.csv_file_path));
    }
    Ok(())
}

async fn tool_available(tool: &str) -> bool {
    match tokio::process::Command::new(tool)
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// Both `ffmpeg` and `ffprobe` must be runnable from `PATH`.
pub async fn check_ffmpeg() -> bool {
    tool_available("ffmpeg").await && tool_available("ffprobe").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_output_and_media_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let cfg = Config::from_lookup(move |k| match k {
            "CSV_FILE_PATH" => Some(format!("{}/puzzles.csv", root)),
            "TEMP_PNG_DIR_NAME" => Some(format!("{}/tmp/pngs", root)),
            "OUTPUT_DIR_NAME" => Some(format!("{}/out", root)),
            "REACTION_GIF_DIR" => Some(format!("{}/gifs", root)),
            "REACTION_AUDIO_DIR" => Some(format!("{}/audio", root)),
            _ => None,
        })
        .unwrap();

        ensure_directories(&cfg).await.unwrap();
        for name in ["out", "gifs", "audio", "tmp"] {
            assert!(dir.path().join(name).is_dir(), "{name} missing");
        }
    }
}
