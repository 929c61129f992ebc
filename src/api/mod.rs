pub mod elevenlabs;
pub mod gemini;

use anyhow::Result;
use async_trait::async_trait;

/// A prompt-in, text-out language model. Implemented by [`gemini::GeminiClient`].
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
