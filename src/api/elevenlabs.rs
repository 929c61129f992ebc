use crate::config::Config;
use crate::{logi, logw};
use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use tokio::fs;

fn tts_url(voice_id: &str) -> String {
    format!(
        "https://api.elevenlabs.io/v1/text-to-speech/{}?output_format=mp3_44100_128",
        voice_id
    )
}

/// Speaks `text` into `out_mp3_path`. `Ok(false)` means no key is configured or the API refused.
pub async fn tts_to_mp3(
    client: &Client,
    cfg: &Config,
    text: &str,
    out_mp3_path: &Path,
) -> Result<bool> {
    let Some(key) = cfg.elevenlabs_key.as_deref().filter(|k| !k.trim().is_empty()) else {
        logw("ElevenLabs key not set; skipping narration.");
        return Ok(false);
    };

    let body = serde_json::json!({
        "text": text,
        "model_id": cfg.eleven_model_id,
    });

    let resp = client
        .post(tts_url(&cfg.eleven_voice_id))
        .header("Content-Type", "application/json")
        .header("xi-api-key", key)
        .json(&body)
        .timeout(std::time::Duration::from_secs(120))
        .send()
        .await
        .context("ElevenLabs request failed")?;

    if !resp.status().is_success() {
        logw(format!("ElevenLabs TTS failed HTTP {}", resp.status().as_u16()));
        return Ok(false);
    }

    let bytes = resp.bytes().await.context("ElevenLabs response read failed")?;
    if let Some(parent) = out_mp3_path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }
    fs::write(out_mp3_path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", out_mp3_path.display()))?;

    logi(format!("Narration saved: {}", out_mp3_path.display()));
    Ok(fs::metadata(out_mp3_path).await.is_ok())
}
