use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which of the video pipelines to run for each puzzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoMode {
    /// One reaction GIF over the whole video plus a random MP3 playlist.
    Legacy,
    /// Per-frame reactions picked from the puzzle's themes.
    Enhanced,
    /// Magnus/Hikaru story beats.
    Story,
    /// Per-move reactions recommended by Gemini.
    Analyzed,
}

impl FromStr for VideoMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "enhanced" => Ok(Self::Enhanced),
            "story" => Ok(Self::Story),
            "analyzed" | "analysed" => Ok(Self::Analyzed),
            other => anyhow::bail!("unknown video mode {:?}", other),
        }
    }
}

impl fmt::Display for VideoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Legacy => "legacy",
            Self::Enhanced => "enhanced",
            Self::Story => "story",
            Self::Analyzed => "analyzed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub csv_file_path: String,
    pub temp_png_dir: String,
    pub output_dir: String,
    pub video_fps: u32,
    pub reaction_gif_dir: String,
    pub reaction_audio_dir: String,
    pub num_videos: usize,
    pub start_index: usize,
    pub max_workers: usize,
    pub target_width: u32,
    pub target_height: u32,
    pub board_size: u32,
    pub mode: VideoMode,
    pub target_video_duration: f64,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_log_path: String,
    pub elevenlabs_key: Option<String>,
    pub eleven_voice_id: String,
    pub eleven_model_id: String,
    pub font_path: Option<String>,
    pub narrate_hook: bool,
}

fn default_voice_id() -> String {
    "JBFqnCBsd6RMkjVDRZzb".to_string()
}

fn default_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_max_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8);
    (cpus / 2).max(1)
}

fn parse_var<T>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}={:?}: {}", name, value, e)),
        _ => Ok(default),
    }
}

fn parse_flag(raw: Option<String>) -> bool {
    matches!(
        raw.as_deref().map(str::trim).map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Reads `.env` (if any) and the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            non_empty(lookup(key)).unwrap_or_else(|| default.to_string())
        };

        let csv_file_path = non_empty(lookup("CSV_FILE_PATH"))
            .context("CSV_FILE_PATH environment variable is required")?;

        let config = Config {
            csv_file_path,
            temp_png_dir: get("TEMP_PNG_DIR_NAME", "temp_media/temp_pngs"),
            output_dir: get("OUTPUT_DIR_NAME", "temp_media/outputs"),
            video_fps: parse_var("VIDEO_FPS", lookup("VIDEO_FPS"), 1)?,
            reaction_gif_dir: get("REACTION_GIF_DIR", "reaction_gifs"),
            reaction_audio_dir: get("REACTION_AUDIO_DIR", "reaction_audios"),
            num_videos: parse_var("NUM_VIDEOS", lookup("NUM_VIDEOS"), 100)?,
            start_index: parse_var("START_INDEX", lookup("START_INDEX"), 0)?,
            max_workers: parse_var("MAX_WORKERS", lookup("MAX_WORKERS"), default_max_workers())?,
            target_width: parse_var("TARGET_WIDTH", lookup("TARGET_WIDTH"), 1080)?,
            target_height: parse_var("TARGET_HEIGHT", lookup("TARGET_HEIGHT"), 1920)?,
            board_size: parse_var("BOARD_SIZE", lookup("BOARD_SIZE"), 1080)?,
            mode: parse_var("VIDEO_MODE", lookup("VIDEO_MODE"), VideoMode::Enhanced)?,
            target_video_duration: parse_var(
                "TARGET_VIDEO_DURATION",
                lookup("TARGET_VIDEO_DURATION"),
                60.0,
            )?,
            gemini_api_key: non_empty(lookup("GEMINI_API_KEY")),
            gemini_model: get("GEMINI_MODEL", "gemini-2.0-flash"),
            gemini_log_path: get("GEMINI_LOG_PATH", "gemini.out"),
            elevenlabs_key: non_empty(lookup("ELEVENLABS_API_KEY")),
            eleven_voice_id: non_empty(lookup("ELEVEN_VOICE_ID")).unwrap_or_else(default_voice_id),
            eleven_model_id: non_empty(lookup("ELEVEN_MODEL_ID")).unwrap_or_else(default_model_id),
            font_path: non_empty(lookup("FONT_PATH")),
            narrate_hook: parse_flag(lookup("NARRATE_HOOK")),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.video_fps == 0 {
            anyhow::bail!("VIDEO_FPS must be at least 1");
        }
        if self.max_workers == 0 {
            anyhow::bail!("MAX_WORKERS must be at least 1");
        }
        if self.target_width < 2 || self.target_height < 2 {
            anyhow::bail!(
                "target size {}x{} is too small",
                self.target_width,
                self.target_height
            );
        }
        if self.board_size == 0 {
            anyhow::bail!("BOARD_SIZE must be positive");
        }
        if self.target_video_duration <= 0.0 {
            anyhow::bail!("TARGET_VIDEO_DURATION must be positive");
        }
        if self.narrate_hook && self.elevenlabs_key.is_none() {
            anyhow::bail!("NARRATE_HOOK needs ELEVENLABS_API_KEY");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_fill_unset_keys() {
        let cfg = Config::from_lookup(lookup_from(&[("CSV_FILE_PATH", "puzzles.csv")])).unwrap();
        assert_eq!(cfg.temp_png_dir, "temp_media/temp_pngs");
        assert_eq!(cfg.output_dir, "temp_media/outputs");
        assert_eq!(cfg.video_fps, 1);
        assert_eq!(cfg.num_videos, 100);
        assert_eq!(cfg.target_width, 1080);
        assert_eq!(cfg.target_height, 1920);
        assert_eq!(cfg.mode, VideoMode::Enhanced);
        assert!(cfg.max_workers >= 1);
        assert!(cfg.gemini_api_key.is_none());
        assert!(!cfg.narrate_hook);
    }

    #[test]
    fn blank_paths_fall_back_to_defaults() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("CSV_FILE_PATH", "p.csv"),
            ("TEMP_PNG_DIR_NAME", ""),
            ("OUTPUT_DIR_NAME", "  "),
            ("REACTION_GIF_DIR", ""),
        ]))
        .unwrap();
        assert_eq!(cfg.temp_png_dir, "temp_media/temp_pngs");
        assert_eq!(cfg.output_dir, "temp_media/outputs");
        assert_eq!(cfg.reaction_gif_dir, "reaction_gifs");
    }

    #[test]
    fn csv_path_is_required() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("CSV_FILE_PATH"));
    }

    #[test]
    fn bad_number_names_the_variable() {
        let err = Config::from_lookup(lookup_from(&[
            ("CSV_FILE_PATH", "p.csv"),
            ("VIDEO_FPS", "fast"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("VIDEO_FPS"));
    }

    #[test]
    fn zero_workers_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("CSV_FILE_PATH", "p.csv"),
            ("MAX_WORKERS", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("MAX_WORKERS"));
    }

    #[test]
    fn mode_and_keys_are_read() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("CSV_FILE_PATH", "p.csv"),
            ("VIDEO_MODE", "Story"),
            ("GEMINI_API_KEY", "abc"),
            ("ELEVENLABS_API_KEY", ""),
        ]))
        .unwrap();
        assert_eq!(cfg.mode, VideoMode::Story);
        assert_eq!(cfg.gemini_api_key.as_deref(), Some("abc"));
        assert!(cfg.elevenlabs_key.is_none());
    }

    #[test]
    fn narration_requires_tts_key() {
        let err = Config::from_lookup(lookup_from(&[
            ("CSV_FILE_PATH", "p.csv"),
            ("NARRATE_HOOK", "true"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("ELEVENLABS_API_KEY"));
    }
}
