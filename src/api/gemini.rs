use crate::api::TextGenerator;
use crate::config::Config;
use crate::logw;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub fn gemini_extract_text(resp_json: &str) -> Option<String> {
    let root: serde_json::Value = serde_json::from_str(resp_json).ok()?;

    if let Some(msg) = root
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
    {
        logw(format!("Gemini error message: {}", msg));
        return None;
    }

    root.get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?
        .first()?
        .get("text")?
        .as_str()
        .map(str::to_string)
}

pub async fn generate_content(
    client: &Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    prompt: &str,
) -> Result<String> {
    let body = json!({
        "contents": [
            {"role": "user", "parts": [{"text": prompt}]}
        ],
        "generationConfig": {
            "temperature": 0.9,
            "response_mime_type": "application/json"
        }
    });

    let url = format!(
        "{}/v1beta/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    );

    let resp = client
        .post(url)
        .query(&[("key", api_key)])
        .json(&body)
        .timeout(std::time::Duration::from_secs(120))
        .send()
        .await
        .context("Gemini generateContent request failed")?;

    let status = resp.status();
    let raw = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        let snippet = raw.chars().take(800).collect::<String>();
        return Err(anyhow!("Gemini HTTP {}: {}", status.as_u16(), snippet));
    }

    gemini_extract_text(&raw).ok_or_else(|| {
        anyhow!("unexpected Gemini response shape (missing candidates[0].content.parts[0].text)")
    })
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(client: Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// `None` when no API key is configured.
    pub fn from_config(client: &Client, cfg: &Config) -> Option<Self> {
        let key = cfg.gemini_api_key.as_deref().filter(|k| !k.trim().is_empty())?;
        Some(Self::new(client.clone(), key, cfg.gemini_model.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        generate_content(
            &self.client,
            &self.base_url,
            &self.api_key,
            &self.model,
            prompt,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_candidate_text() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"{\"title\":\"x\"}"}],"role":"model"}}]}"#;
        assert_eq!(gemini_extract_text(raw).as_deref(), Some(r#"{"title":"x"}"#));
    }

    #[test]
    fn error_body_yields_none() {
        let raw = r#"{"error":{"code":400,"message":"API key not valid"}}"#;
        assert!(gemini_extract_text(raw).is_none());
        assert!(gemini_extract_text("not json").is_none());
        assert!(gemini_extract_text(r#"{"candidates":[]}"#).is_none());
    }
}
