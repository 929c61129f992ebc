//! Magnus vs Hikaru story videos.
//!
//! A story is a list of timed beats, each pairing a character's reaction GIF
//! with an emotion sound effect and a puzzle move. Gemini writes the story
//! when a key is configured; otherwise beats alternate between the two
//! characters over a fixed emotion cycle.

use crate::api::TextGenerator;
use crate::puzzle::Puzzle;
use crate::{logi, logw};
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Character {
    Magnus,
    Hikaru,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Calculating,
    Excited,
    Shocked,
    Upset,
    Angry,
    Surprised,
}

impl Character {
    pub fn as_str(self) -> &'static str {
        match self {
            Character::Magnus => "magnus",
            Character::Hikaru => "hikaru",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Character::Magnus => "Magnus",
            Character::Hikaru => "Hikaru",
        }
    }
}

impl Emotion {
    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Calculating => "calculating",
            Emotion::Excited => "excited",
            Emotion::Shocked => "shocked",
            Emotion::Upset => "upset",
            Emotion::Angry => "angry",
            Emotion::Surprised => "surprised",
        }
    }
}

impl fmt::Display for Character {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const CHARACTER_GIFS: [((Character, Emotion), &str); 8] = [
    ((Character::Magnus, Emotion::Angry), "magnus_angry.gif"),
    ((Character::Magnus, Emotion::Excited), "magnus_excited.gif"),
    ((Character::Magnus, Emotion::Shocked), "magnus_shocked.gif"),
    ((Character::Magnus, Emotion::Surprised), "magnus_suprised.gif"),
    ((Character::Hikaru, Emotion::Calculating), "hikaru_calculating.gif"),
    ((Character::Hikaru, Emotion::Excited), "hikaru_excited.gif"),
    ((Character::Hikaru, Emotion::Shocked), "hikaru_shocked.gif"),
    ((Character::Hikaru, Emotion::Upset), "hikaru_upset.gif"),
];

pub const EMOTION_AUDIO: [(Emotion, &str); 6] = [
    (Emotion::Calculating, "vine-boom.mp3"),
    (Emotion::Excited, "baby-laughing-meme.mp3"),
    (Emotion::Shocked, "anime-wow-sound-effect.mp3"),
    (Emotion::Upset, "why-are-you-running.mp3"),
    (Emotion::Angry, "get-out-sound.mp3"),
    (Emotion::Surprised, "anime-wow-sound-effect.mp3"),
];

pub const AUDIO_DURATIONS: [(&str, f64); 5] = [
    ("anime-wow-sound-effect.mp3", 2.8),
    ("baby-laughing-meme.mp3", 4.4),
    ("get-out-sound.mp3", 1.8),
    ("vine-boom.mp3", 0.9),
    ("why-are-you-running.mp3", 4.4),
];

pub const GIF_DURATIONS: [(&str, f64); 8] = [
    ("hikaru_calculating.gif", 6.04),
    ("hikaru_excited.gif", 5.11),
    ("hikaru_shocked.gif", 6.60),
    ("hikaru_upset.gif", 6.71),
    ("magnus_angry.gif", 4.81),
    ("magnus_excited.gif", 1.74),
    ("magnus_shocked.gif", 3.01),
    ("magnus_suprised.gif", 2.24),
];

const DEFAULT_AUDIO: &str = "vine-boom.mp3";
const DEFAULT_GIF_SECONDS: f64 = 3.0;

const EMOTION_CYCLE: [Emotion; 6] = [
    Emotion::Calculating,
    Emotion::Shocked,
    Emotion::Excited,
    Emotion::Upset,
    Emotion::Angry,
    Emotion::Surprised,
];

pub fn character_gif(character: Character, emotion: Emotion) -> Option<&'static str> {
    CHARACTER_GIFS
        .iter()
        .find(|(key, _)| *key == (character, emotion))
        .map(|(_, gif)| *gif)
}

pub fn emotion_audio(emotion: Emotion) -> &'static str {
    EMOTION_AUDIO
        .iter()
        .find(|(e, _)| *e == emotion)
        .map(|(_, audio)| *audio)
        .unwrap_or(DEFAULT_AUDIO)
}

pub fn gif_duration(gif: &str) -> f64 {
    GIF_DURATIONS
        .iter()
        .find(|(name, _)| *name == gif)
        .map(|(_, d)| *d)
        .unwrap_or(DEFAULT_GIF_SECONDS)
}

pub fn audio_duration(audio: &str) -> Option<f64> {
    AUDIO_DURATIONS
        .iter()
        .find(|(name, _)| *name == audio)
        .map(|(_, d)| *d)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryBeat {
    pub character: Character,
    pub emotion: Emotion,
    pub gif_name: String,
    pub audio_name: String,
    pub start_time: f64,
    pub duration: f64,
    pub move_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Story {
    pub puzzle_id: String,
    pub title: String,
    pub beats: Vec<StoryBeat>,
    pub total_duration: f64,
}

#[derive(Debug, Deserialize)]
struct RawBeat {
    character: Character,
    emotion: Emotion,
    move_index: usize,
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct RawStory {
    title: Option<String>,
    beats: Vec<RawBeat>,
}

pub fn build_prompt(puzzle: &Puzzle, target_duration: f64) -> String {
    let num_moves = puzzle.moves.len();

    let gifs: serde_json::Map<String, serde_json::Value> = CHARACTER_GIFS
        .iter()
        .map(|((character, emotion), file)| {
            (
                format!("{}_{}", character, emotion),
                serde_json::json!({"file": file, "duration": gif_duration(file)}),
            )
        })
        .collect();
    let audio: serde_json::Map<String, serde_json::Value> = EMOTION_AUDIO
        .iter()
        .map(|(emotion, file)| {
            (
                emotion.to_string(),
                serde_json::json!({"file": file, "duration": audio_duration(file)}),
            )
        })
        .collect();

    let gifs_json = serde_json::to_string_pretty(&gifs).unwrap_or_default();
    let audio_json = serde_json::to_string_pretty(&audio).unwrap_or_default();

    format!(
        "You are a chess content creator making a dramatic {target:.0}-second YouTube Short about a chess puzzle.\n\n\
Puzzle Details:\n\
- FEN: {fen}\n\
- Moves: {moves}\n\
- Number of moves: {num_moves}\n\n\
Create a dramatic story with Magnus Carlsen vs Hikaru Nakamura reacting to the puzzle moves.\n\n\
Available Character GIFs (with durations in seconds):\n{gifs_json}\n\n\
Available Audio (with durations in seconds):\n{audio_json}\n\n\
Generate a JSON response with story beats. Each beat should:\n\
1. Alternate between Magnus and Hikaru\n\
2. Match emotions to puzzle tension (calculating early, shocked at key moves, excited/upset at resolution)\n\
3. Use move_index to sync with chess moves (0 to {last})\n\
4. Total duration should be approximately {target} seconds\n\
5. IMPORTANT: Set each beat's duration to be a multiple of both the GIF duration and audio duration for that emotion, so both loop smoothly.\n\n\
Response format:\n\
{{\n  \"title\": \"Brief dramatic title\",\n  \"beats\": [\n    {{\n      \"character\": \"magnus\" or \"hikaru\",\n      \"emotion\": \"calculating\" | \"excited\" | \"shocked\" | \"upset\" | \"angry\" | \"surprised\",\n      \"move_index\": 0,\n      \"duration\": 9.0\n    }}\n  ]\n}}\n\n\
Make sure beats cover all moves and create dramatic tension. Start slow, build to climax at the key move, then resolution.",
        target = target_duration,
        fen = puzzle.fen,
        moves = puzzle.moves.join(" "),
        num_moves = num_moves,
        gifs_json = gifs_json,
        audio_json = audio_json,
        last = num_moves.saturating_sub(1),
    )
}

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

/// Removes a surrounding ```json / ``` fence and any prose around the outermost JSON object.
pub fn strip_code_fence(text: &str) -> &str {
    let mut t = text.trim();
    if let Some(rest) = t.strip_prefix("```json") {
        t = rest;
    } else if let Some(rest) = t.strip_prefix("```") {
        t = rest;
    }
    if let Some(rest) = t.strip_suffix("```") {
        t = rest;
    }
    let t = t.trim();
    if t.starts_with('{') {
        return t;
    }
    JSON_OBJECT.find(t).map(|m| m.as_str()).unwrap_or(t)
}

pub fn parse_response(response_text: &str, puzzle: &Puzzle) -> Result<Story> {
    let raw: RawStory = serde_json::from_str(strip_code_fence(response_text))
        .context("Story response is not valid story JSON")?;

    if raw.beats.is_empty() {
        anyhow::bail!("Story response has no beats");
    }

    let mut beats = Vec::with_capacity(raw.beats.len());
    let mut current_time = 0.0;
    for (i, beat) in raw.beats.into_iter().enumerate() {
        if !beat.duration.is_finite() || beat.duration <= 0.0 {
            anyhow::bail!("Story beat {} has unusable duration {}", i, beat.duration);
        }
        let gif_name = character_gif(beat.character, beat.emotion).unwrap_or(CHARACTER_GIFS[0].1);
        beats.push(StoryBeat {
            character: beat.character,
            emotion: beat.emotion,
            gif_name: gif_name.to_string(),
            audio_name: emotion_audio(beat.emotion).to_string(),
            start_time: current_time,
            duration: beat.duration,
            move_index: beat.move_index,
        });
        current_time += beat.duration;
    }

    Ok(Story {
        puzzle_id: puzzle.puzzle_id.clone(),
        title: raw.title.unwrap_or_else(|| "Chess Puzzle".to_string()),
        beats,
        total_duration: current_time,
    })
}

pub fn generate_fallback_story(puzzle: &Puzzle, target_duration: f64) -> Story {
    let num_moves = puzzle.moves.len();
    let beat_duration = target_duration / num_moves.max(1) as f64;

    let mut beats = Vec::with_capacity(num_moves);
    let mut current_time = 0.0;
    for i in 0..num_moves {
        let character = if i % 2 == 0 {
            Character::Magnus
        } else {
            Character::Hikaru
        };
        let wanted = EMOTION_CYCLE[i % EMOTION_CYCLE.len()];

        let (emotion, gif_name) = match character_gif(character, wanted) {
            Some(gif) => (wanted, gif),
            None => {
                let own: Vec<(Emotion, &str)> = CHARACTER_GIFS
                    .iter()
                    .filter(|((c, _), _)| *c == character)
                    .map(|((_, e), gif)| (*e, *gif))
                    .collect();
                own.get(i % own.len().max(1))
                    .copied()
                    .unwrap_or((CHARACTER_GIFS[0].0.1, CHARACTER_GIFS[0].1))
            }
        };

        beats.push(StoryBeat {
            character,
            emotion,
            gif_name: gif_name.to_string(),
            audio_name: emotion_audio(emotion).to_string(),
            start_time: current_time,
            duration: beat_duration,
            move_index: i,
        });
        current_time += beat_duration;
    }

    Story {
        puzzle_id: puzzle.puzzle_id.clone(),
        title: "Chess Puzzle Challenge".to_string(),
        beats,
        total_duration: current_time,
    }
}

/// Asks `generator` for a story, falling back to the alternating story on any failure.
pub async fn generate_story(
    puzzle: &Puzzle,
    target_duration: f64,
    generator: Option<&dyn TextGenerator>,
) -> Story {
    let Some(generator) = generator else {
        return generate_fallback_story(puzzle, target_duration);
    };

    let prompt = build_prompt(puzzle, target_duration);
    let story = match generator.generate(&prompt).await {
        Ok(text) => parse_response(&text, puzzle),
        Err(e) => Err(e),
    };

    match story {
        Ok(story) => {
            logi(format!(
                "Story for {}: \"{}\" ({} beats, {:.1}s)",
                puzzle.puzzle_id,
                story.title,
                story.beats.len(),
                story.total_duration
            ));
            story
        }
        Err(e) => {
            logw(format!(
                "Story generation failed for {}: {:#}; using fallback.",
                puzzle.puzzle_id, e
            ));
            generate_fallback_story(puzzle, target_duration)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn puzzle(moves: usize) -> Puzzle {
        Puzzle {
            puzzle_id: "00sHx".to_string(),
            fen: "q3k1nr/1pp1nQpp/3p4/1P2p3/4P3/B1PP1b2/B5PP/5K2 b k - 0 17".to_string(),
            moves: (0..moves).map(|i| format!("m{}", i)).collect(),
            rating: 1760,
            themes: "mate mateIn2".to_string(),
            popularity: 90,
        }
    }

    struct Canned(Result<String, String>);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.0.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    #[test]
    fn fenced_response_is_parsed_with_running_start_times() {
        let text = "```json\n{\"title\":\"Blunder!\",\"beats\":[\
            {\"character\":\"hikaru\",\"emotion\":\"calculating\",\"move_index\":0,\"duration\":6},\
            {\"character\":\"magnus\",\"emotion\":\"shocked\",\"move_index\":1,\"duration\":9.5},\
            {\"character\":\"magnus\",\"emotion\":\"upset\",\"move_index\":2,\"duration\":4}]}\n```";
        let story = parse_response(text, &puzzle(3)).unwrap();
        assert_eq!(story.title, "Blunder!");
        assert_eq!(story.beats.len(), 3);
        assert_eq!(story.beats[0].gif_name, "hikaru_calculating.gif");
        assert_eq!(story.beats[0].audio_name, "vine-boom.mp3");
        assert_eq!(story.beats[1].start_time, 6.0);
        assert_eq!(story.beats[2].start_time, 15.5);
        // magnus has no upset GIF; the first table entry stands in
        assert_eq!(story.beats[2].gif_name, "magnus_angry.gif");
        assert_eq!(story.beats[2].audio_name, "why-are-you-running.mp3");
        assert_eq!(story.total_duration, 19.5);
    }

    #[test]
    fn prose_around_json_is_ignored() {
        let text = "Here is your story:\n{\"title\":\"T\",\"beats\":[]}\nEnjoy!";
        assert_eq!(strip_code_fence(text), "{\"title\":\"T\",\"beats\":[]}");
    }

    #[test]
    fn missing_title_uses_default() {
        let text = r#"{"beats":[{"character":"hikaru","emotion":"shocked","move_index":0,"duration":2}]}"#;
        let story = parse_response(text, &puzzle(2)).unwrap();
        assert_eq!(story.title, "Chess Puzzle");
        assert_eq!(story.total_duration, 2.0);
    }

    #[test]
    fn empty_or_non_positive_beats_are_rejected() {
        assert!(parse_response(r#"{"title":"T","beats":[]}"#, &puzzle(2)).is_err());
        for duration in ["-4", "0"] {
            let text = format!(
                r#"{{"beats":[{{"character":"magnus","emotion":"excited","move_index":0,"duration":{}}}]}}"#,
                duration
            );
            assert!(parse_response(&text, &puzzle(2)).is_err(), "duration {duration}");
        }
    }

    #[tokio::test]
    async fn negative_durations_fall_back() {
        let bad = Canned(Ok(
            r#"{"title":"Oops","beats":[{"character":"magnus","emotion":"excited","move_index":0,"duration":-4}]}"#
                .to_string(),
        ));
        let story = generate_story(&puzzle(2), 30.0, Some(&bad)).await;
        assert_eq!(story.title, "Chess Puzzle Challenge");
        assert!(story.beats.iter().all(|b| b.duration > 0.0));
    }

    #[test]
    fn unknown_character_is_an_error() {
        let text = r#"{"beats":[{"character":"fabiano","emotion":"shocked","move_index":0,"duration":3}]}"#;
        assert!(parse_response(text, &puzzle(2)).is_err());
    }

    #[test]
    fn fallback_alternates_and_splits_duration() {
        let story = generate_fallback_story(&puzzle(4), 60.0);
        assert_eq!(story.title, "Chess Puzzle Challenge");
        assert_eq!(story.beats.len(), 4);
        assert!(story.beats.iter().all(|b| (b.duration - 15.0).abs() < 1e-9));
        assert_eq!(story.total_duration, 60.0);

        // beat 0: magnus/calculating is missing, so magnus's 0th GIF is used
        assert_eq!(story.beats[0].character, Character::Magnus);
        assert_eq!(story.beats[0].gif_name, "magnus_angry.gif");
        assert_eq!(story.beats[0].emotion, Emotion::Angry);
        assert_eq!(story.beats[0].audio_name, "get-out-sound.mp3");

        assert_eq!(story.beats[1].character, Character::Hikaru);
        assert_eq!(story.beats[1].gif_name, "hikaru_shocked.gif");

        assert_eq!(story.beats[2].gif_name, "magnus_excited.gif");
        assert_eq!(story.beats[3].gif_name, "hikaru_upset.gif");
        assert_eq!(
            story.beats.iter().map(|b| b.move_index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn prompt_mentions_inputs() {
        let prompt = build_prompt(&puzzle(3), 60.0);
        assert!(prompt.contains("FEN: q3k1nr"));
        assert!(prompt.contains("m0 m1 m2"));
        assert!(prompt.contains("(0 to 2)"));
        assert!(prompt.contains("magnus_suprised.gif"));
    }

    #[tokio::test]
    async fn generator_failure_falls_back() {
        let failing = Canned(Err("HTTP 500".to_string()));
        let story = generate_story(&puzzle(2), 30.0, Some(&failing)).await;
        assert_eq!(story.title, "Chess Puzzle Challenge");

        let garbage = Canned(Ok("I cannot help with that".to_string()));
        let story = generate_story(&puzzle(2), 30.0, Some(&garbage)).await;
        assert_eq!(story.title, "Chess Puzzle Challenge");

        let story = generate_story(&puzzle(2), 30.0, None).await;
        assert_eq!(story.beats.len(), 2);
    }

    #[tokio::test]
    async fn generator_story_is_used() {
        let ok = Canned(Ok(
            r#"{"title":"Queen Trap","beats":[{"character":"magnus","emotion":"excited","move_index":1,"duration":3.48}]}"#
                .to_string(),
        ));
        let story = generate_story(&puzzle(2), 30.0, Some(&ok)).await;
        assert_eq!(story.title, "Queen Trap");
        assert_eq!(story.beats[0].gif_name, "magnus_excited.gif");
    }
}
