use crate::api::TextGenerator;
use crate::ffmpeg::ffprobe_duration_seconds;
use crate::puzzle::Puzzle;
use crate::reaction::stem_lower;
use crate::story::strip_code_fence;
use crate::{logi, logw};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

const DEFAULT_REACTION_SECONDS: f64 = 2.0;
const FALLBACK_REACTION: &str = "vine-boom";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveReaction {
    pub move_number: u32,
    pub move_notation: String,
    pub tactical_type: String,
    pub gif_choice: String,
    pub audio_choice: String,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoAnalysis {
    pub move_reactions: Vec<MoveReaction>,
    pub total_duration: f64,
}

#[derive(Debug, Deserialize)]
struct RawMove {
    move_number: u32,
    move_notation: String,
    tactical_type: String,
    gif_choice: String,
    audio_choice: String,
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    moves: Vec<RawMove>,
}

/// Duration of each audio file keyed by lowercase stem; unreadable files are skipped.
pub async fn probe_audio_durations(audio: &[PathBuf]) -> HashMap<String, f64> {
    let mut out = HashMap::new();
    for file in audio {
        match ffprobe_duration_seconds(file).await {
            Ok(d) if d > 0.0 => {
                out.insert(stem_lower(file), d);
            }
            Ok(_) => {}
            Err(e) => logw(format!("Could not probe {}: {:#}", file.display(), e)),
        }
    }
    out
}

/// File whose stem equals `choice`, else the first whose stem contains it.
pub fn resolve_media(choice: &str, files: &[PathBuf]) -> Option<PathBuf> {
    let want = choice.trim().to_ascii_lowercase();
    if want.is_empty() {
        return None;
    }
    files
        .iter()
        .find(|f| stem_lower(f) == want)
        .or_else(|| files.iter().find(|f| stem_lower(f).contains(&want)))
        .cloned()
}

pub fn build_analysis_prompt(puzzle: &Puzzle, gifs: &[PathBuf], audio: &[PathBuf]) -> String {
    let names = |files: &[PathBuf]| {
        files
            .iter()
            .map(|f| format!("'{}'", stem_lower(f)))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        r#"You are a chess expert analyzing moves for YouTube shorts. For each chess move, recommend the best reaction GIF and audio.

CHESS PUZZLE:
- Position: {fen}
- Moves: {moves}

AVAILABLE REACTIONS:
GIFs: [{gifs}]
Audio: [{audio}]

REACTION GUIDE:
- **Sacrifices/Blunders**: get-out + get-out-sound (shocked reaction)
- **Brilliant Moves**: anime-wow + anime-wow-sound-effect (excitement)
- **Checkmate/Winning**: baby-laughing + baby-laughing-meme (celebration)
- **Quiet/Setup**: vine-boom + vine-boom (suspense)
- **Devastating**: why-are + why-are (disbelief)

RESPONSE FORMAT (JSON only):
{{
  "moves": [
    {{
      "move_number": 1,
      "move_notation": "Qh5+",
      "tactical_type": "sacrifice",
      "gif_choice": "get-out",
      "audio_choice": "get-out-sound"
    }}
  ]
}}

Analyze each move and pick the most fitting reaction. Keep it simple and impactful!"#,
        fen = puzzle.fen,
        moves = puzzle.moves.join(" "),
        gifs = names(gifs),
        audio = names(audio),
    )
}

fn duration_for(choice: &str, durations: &HashMap<String, f64>) -> f64 {
    durations
        .get(&choice.trim().to_ascii_lowercase())
        .copied()
        .unwrap_or(DEFAULT_REACTION_SECONDS)
}

pub fn parse_analysis(response_text: &str, durations: &HashMap<String, f64>) -> Result<VideoAnalysis> {
    let cleaned = strip_code_fence(response_text);
    let raw: RawAnalysis =
        serde_json::from_str(cleaned).context("Analysis response is not valid JSON")?;

    let move_reactions: Vec<MoveReaction> = raw
        .moves
        .into_iter()
        .map(|m| MoveReaction {
            duration: duration_for(&m.audio_choice, durations),
            move_number: m.move_number,
            move_notation: m.move_notation,
            tactical_type: m.tactical_type,
            gif_choice: m.gif_choice,
            audio_choice: m.audio_choice,
        })
        .collect();

    let total_duration = move_reactions.iter().map(|m| m.duration).sum();
    Ok(VideoAnalysis {
        move_reactions,
        total_duration,
    })
}

pub fn fallback_analysis(num_moves: usize, durations: &HashMap<String, f64>) -> VideoAnalysis {
    let duration = duration_for(FALLBACK_REACTION, durations);
    let move_reactions = (1..=num_moves as u32)
        .map(|n| MoveReaction {
            move_number: n,
            move_notation: format!("Move{}", n),
            tactical_type: "quiet".to_string(),
            gif_choice: FALLBACK_REACTION.to_string(),
            audio_choice: FALLBACK_REACTION.to_string(),
            duration,
        })
        .collect();

    VideoAnalysis {
        move_reactions,
        total_duration: duration * num_moves as f64,
    }
}

pub struct GeminiAnalyzer {
    generator: Option<Arc<dyn TextGenerator>>,
    log_path: PathBuf,
}

impl GeminiAnalyzer {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, log_path: impl Into<PathBuf>) -> Self {
        Self {
            generator,
            log_path: log_path.into(),
        }
    }

    pub async fn analyze_puzzle(
        &self,
        puzzle: &Puzzle,
        gifs: &[PathBuf],
        audio: &[PathBuf],
        durations: &HashMap<String, f64>,
    ) -> VideoAnalysis {
        let Some(generator) = self.generator.as_deref() else {
            logw("GEMINI_API_KEY not set; using fallback analysis.");
            return fallback_analysis(puzzle.moves.len(), durations);
        };

        let prompt = build_analysis_prompt(puzzle, gifs, audio);
        let response = match generator.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                logw(format!("Gemini analysis failed for {}: {:#}", puzzle.puzzle_id, e));
                String::new()
            }
        };

        if let Err(e) = append_interaction(&self.log_path, &prompt, &response).await {
            logw(format!("Could not write {}: {:#}", self.log_path.display(), e));
        }

        match parse_analysis(&response, durations) {
            Ok(analysis) if !analysis.move_reactions.is_empty() => {
                logi(format!(
                    "Analysis for {}: {} moves, {:.1}s",
                    puzzle.puzzle_id,
                    analysis.move_reactions.len(),
                    analysis.total_duration
                ));
                analysis
            }
            Ok(_) => fallback_analysis(puzzle.moves.len(), durations),
            Err(e) => {
                logw(format!(
                    "Unusable analysis for {}: {:#}; using fallback.",
                    puzzle.puzzle_id, e
                ));
                fallback_analysis(puzzle.moves.len(), durations)
            }
        }
    }
}

/// Appends one prompt/response exchange, framed and timestamped.
pub async fn append_interaction(log_path: &Path, prompt: &str, response: &str) -> Result<()> {
    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let rule = "=".repeat(80);
    let entry = format!(
        "{rule}\nGEMINI INTERACTION - {ts}\n{rule}\nPROMPT:\n{prompt}\n{dash}\nRESPONSE:\n{response}\n{rule}\n",
        rule = rule,
        ts = chrono::Local::now().to_rfc3339(),
        prompt = prompt,
        dash = "-".repeat(40),
        response = response,
    );

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .await
        .with_context(|| format!("Failed to open {}", log_path.display()))?;
    file.write_all(entry.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn puzzle() -> Puzzle {
        Puzzle {
            puzzle_id: "abc".to_string(),
            fen: "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1".to_string(),
            moves: vec!["d1d8".to_string(), "g8h8".to_string(), "d8e8".to_string()],
            rating: 900,
            themes: "mateIn1 backRankMate".to_string(),
            popularity: 80,
        }
    }

    fn durations() -> HashMap<String, f64> {
        HashMap::from([
            ("vine-boom".to_string(), 0.9),
            ("get-out-sound".to_string(), 1.8),
        ])
    }

    struct Canned(&'static str);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn parses_moves_with_audio_durations() {
        let text = r#"```json
{"moves":[
 {"move_number":1,"move_notation":"Rd8+","tactical_type":"sacrifice","gif_choice":"get-out","audio_choice":"get-out-sound"},
 {"move_number":2,"move_notation":"Qxf7#","tactical_type":"checkmate","gif_choice":"baby-laughing","audio_choice":"baby-laughing-meme"}
]}
```"#;
        let analysis = parse_analysis(text, &durations()).unwrap();
        assert_eq!(analysis.move_reactions.len(), 2);
        assert_eq!(analysis.move_reactions[0].duration, 1.8);
        // unknown audio gets the default reaction length
        assert_eq!(analysis.move_reactions[1].duration, 2.0);
        assert!((analysis.total_duration - 3.8).abs() < 1e-9);
    }

    #[test]
    fn fallback_is_one_vine_boom_per_move() {
        let analysis = fallback_analysis(3, &durations());
        assert_eq!(analysis.move_reactions.len(), 3);
        assert!(analysis.move_reactions.iter().all(|m| m.audio_choice == "vine-boom"));
        assert_eq!(analysis.move_reactions[2].move_notation, "Move3");
        assert!((analysis.total_duration - 2.7).abs() < 1e-9);

        let bare = fallback_analysis(2, &HashMap::new());
        assert_eq!(bare.total_duration, 4.0);
    }

    #[test]
    fn media_is_resolved_by_stem() {
        let files = vec![
            PathBuf::from("a/get-out-sound.mp3"),
            PathBuf::from("a/vine-boom.mp3"),
        ];
        assert_eq!(
            resolve_media("vine-boom", &files),
            Some(PathBuf::from("a/vine-boom.mp3"))
        );
        assert_eq!(
            resolve_media("get-out", &files),
            Some(PathBuf::from("a/get-out-sound.mp3"))
        );
        assert_eq!(resolve_media("nope", &files), None);
    }

    #[test]
    fn prompt_lists_media_stems() {
        let prompt = build_analysis_prompt(
            &puzzle(),
            &[PathBuf::from("g/get-out.gif")],
            &[PathBuf::from("s/vine-boom.mp3")],
        );
        assert!(prompt.contains("GIFs: ['get-out']"));
        assert!(prompt.contains("Audio: ['vine-boom']"));
        assert!(prompt.contains("Moves: d1d8 g8h8 d8e8"));
    }

    #[tokio::test]
    async fn bad_response_is_logged_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("gemini.out");
        let analyzer = GeminiAnalyzer::new(Some(Arc::new(Canned("no json here"))), &log);

        let analysis = analyzer
            .analyze_puzzle(&puzzle(), &[], &[], &durations())
            .await;
        assert_eq!(analysis.move_reactions.len(), 3);
        assert_eq!(analysis.move_reactions[0].gif_choice, "vine-boom");

        let logged = std::fs::read_to_string(&log).unwrap();
        assert!(logged.contains("GEMINI INTERACTION"));
        assert!(logged.contains("no json here"));
    }

    #[tokio::test]
    async fn without_generator_nothing_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("gemini.out");
        let analyzer = GeminiAnalyzer::new(None, &log);
        let analysis = analyzer
            .analyze_puzzle(&puzzle(), &[], &[], &HashMap::new())
            .await;
        assert_eq!(analysis.move_reactions.len(), 3);
        assert!(!log.exists());
    }
}
