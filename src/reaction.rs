//! Reaction media selection.
//!
//! Reaction GIFs and sound effects are categorized purely by substrings of
//! their file stems. Two selectors exist: the basic one keys off the move
//! position only, the enhanced one also reads the puzzle's themes and rating
//! and ranks GIFs of known streamers first.

use crate::error::PuzzleError;
use crate::puzzle::Puzzle;
use anyhow::Result;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const QUALITY_STREAMERS: [&str; 2] = ["magnus", "hikaru"];
const BASE_REACTION_SECONDS: f64 = 1.8;

/// Lists `*.{ext}` directly inside `dir`, sorted by path. A missing directory yields nothing.
pub fn list_media(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let want = ext.trim_start_matches('.');
    let mut out: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(want))
                .unwrap_or(false)
        })
        .collect();
    out.sort();
    out
}

pub fn random_file<R: Rng + ?Sized>(dir: &Path, ext: &str, rng: &mut R) -> Result<PathBuf> {
    let kind = if ext.trim_start_matches('.').eq_ignore_ascii_case("gif") {
        "GIF"
    } else {
        "audio"
    };
    list_media(dir, ext)
        .choose(rng)
        .cloned()
        .ok_or_else(|| {
            PuzzleError::NoMedia {
                kind,
                dir: dir.to_path_buf(),
            }
            .into()
        })
}

pub fn stem_lower(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GifCategory {
    Excitement,
    Shock,
    Calculation,
    Anger,
    Celebration,
    Suspense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AudioCategory {
    Excitement,
    Shock,
    Meme,
    HighEnergy,
    Dramatic,
    Suspense,
    Celebration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactionTiming {
    pub duration: f64,
    pub energy_level: EnergyLevel,
    pub priority: u8,
}

/// Per-position reaction duration, scaled up for the opening and closing frames and hard puzzles.
pub fn calculate_move_timing(puzzle: &Puzzle, move_index: usize) -> ReactionTiming {
    let move_count = puzzle.moves.len();
    let (factor, energy_level, priority) = if move_index + 1 == move_count {
        (2.5, EnergyLevel::High, 10)
    } else if move_index == 0 {
        (1.8, EnergyLevel::Medium, 7)
    } else if puzzle.rating > 2000 {
        (2.0, EnergyLevel::High, 8)
    } else if puzzle.rating > 1600 {
        (1.5, EnergyLevel::Medium, 6)
    } else {
        (1.2, EnergyLevel::Low, 5)
    };

    ReactionTiming {
        duration: BASE_REACTION_SECONDS * factor,
        energy_level,
        priority,
    }
}

fn pick_category<C: Ord + Copy, R: Rng + ?Sized>(
    categories: &BTreeMap<C, Vec<PathBuf>>,
    category: C,
    rng: &mut R,
) -> Option<PathBuf> {
    if let Some(files) = categories.get(&category).filter(|f| !f.is_empty()) {
        return files.choose(rng).cloned();
    }
    let all: Vec<&PathBuf> = categories.values().flatten().collect();
    all.choose(rng).map(|p| (*p).clone())
}

/// Position-only selector: calculation on the first move, excitement on the last, shock between.
#[derive(Debug, Clone)]
pub struct ReactionSelector {
    gif_dir: PathBuf,
    audio_dir: PathBuf,
    gif_categories: BTreeMap<GifCategory, Vec<PathBuf>>,
    audio_categories: BTreeMap<AudioCategory, Vec<PathBuf>>,
}

impl ReactionSelector {
    pub fn new(gif_dir: &Path, audio_dir: &Path) -> Self {
        let mut gif_categories: BTreeMap<GifCategory, Vec<PathBuf>> = [
            GifCategory::Excitement,
            GifCategory::Shock,
            GifCategory::Calculation,
            GifCategory::Anger,
        ]
        .into_iter()
        .map(|c| (c, Vec::new()))
        .collect();
        let mut audio_categories: BTreeMap<AudioCategory, Vec<PathBuf>> =
            [AudioCategory::Excitement, AudioCategory::Shock, AudioCategory::Meme]
                .into_iter()
                .map(|c| (c, Vec::new()))
                .collect();

        for gif in list_media(gif_dir, "gif") {
            let stem = stem_lower(&gif);
            let category = if stem.contains("excitement") {
                GifCategory::Excitement
            } else if stem.contains("shocked") {
                GifCategory::Shock
            } else if stem.contains("calculation") {
                GifCategory::Calculation
            } else if stem.contains("pissed") {
                GifCategory::Anger
            } else {
                continue;
            };
            gif_categories.entry(category).or_default().push(gif);
        }

        for audio in list_media(audio_dir, "mp3") {
            let stem = stem_lower(&audio);
            let category = if stem.contains("anime-wow") || stem.contains("baby-laughing") {
                AudioCategory::Excitement
            } else if stem.contains("get-out") || stem.contains("why-are") {
                AudioCategory::Shock
            } else if stem.contains("vine-boom") {
                AudioCategory::Meme
            } else {
                continue;
            };
            audio_categories.entry(category).or_default().push(audio);
        }

        Self {
            gif_dir: gif_dir.to_path_buf(),
            audio_dir: audio_dir.to_path_buf(),
            gif_categories,
            audio_categories,
        }
    }

    pub fn select_reaction<R: Rng + ?Sized>(
        &self,
        puzzle: &Puzzle,
        move_index: usize,
        rng: &mut R,
    ) -> (PathBuf, PathBuf) {
        let (gif_category, audio_category) = if move_index + 1 == puzzle.moves.len() {
            (GifCategory::Excitement, AudioCategory::Excitement)
        } else if move_index == 0 {
            (GifCategory::Calculation, AudioCategory::Meme)
        } else {
            (GifCategory::Shock, AudioCategory::Shock)
        };

        let gif = pick_category(&self.gif_categories, gif_category, rng)
            .unwrap_or_else(|| self.gif_dir.join("default.gif"));
        let audio = pick_category(&self.audio_categories, audio_category, rng)
            .unwrap_or_else(|| self.audio_dir.join("default.mp3"));
        (gif, audio)
    }
}

/// Theme-aware selector with quality-ranked GIFs and energy-matched audio.
#[derive(Debug, Clone)]
pub struct EnhancedReactionSelector {
    gif_dir: PathBuf,
    audio_dir: PathBuf,
    gif_categories: BTreeMap<GifCategory, Vec<PathBuf>>,
    audio_categories: BTreeMap<AudioCategory, Vec<PathBuf>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReactionChoice {
    pub gif: PathBuf,
    pub audio: PathBuf,
    pub timing: ReactionTiming,
}

fn quality_rank_key(path: &Path) -> (bool, usize) {
    let stem = stem_lower(path);
    let streamer = QUALITY_STREAMERS.iter().any(|s| stem.contains(s));
    (streamer, stem.len())
}

impl EnhancedReactionSelector {
    pub fn new(gif_dir: &Path, audio_dir: &Path) -> Self {
        let mut gif_categories: BTreeMap<GifCategory, Vec<PathBuf>> = BTreeMap::new();
        for category in [
            GifCategory::Excitement,
            GifCategory::Shock,
            GifCategory::Calculation,
            GifCategory::Anger,
            GifCategory::Celebration,
            GifCategory::Suspense,
        ] {
            gif_categories.insert(category, Vec::new());
        }
        let mut audio_categories: BTreeMap<AudioCategory, Vec<PathBuf>> = BTreeMap::new();
        for category in [
            AudioCategory::HighEnergy,
            AudioCategory::Dramatic,
            AudioCategory::Suspense,
            AudioCategory::Celebration,
            AudioCategory::Meme,
        ] {
            audio_categories.insert(category, Vec::new());
        }

        for gif in list_media(gif_dir, "gif") {
            let stem = stem_lower(&gif);
            let targets: &[GifCategory] = if stem.contains("excitement") {
                &[GifCategory::Excitement, GifCategory::Celebration]
            } else if stem.contains("shocked") {
                &[GifCategory::Shock]
            } else if stem.contains("calculation") {
                &[GifCategory::Calculation, GifCategory::Suspense]
            } else if stem.contains("pissed") || stem.contains("angry") {
                &[GifCategory::Anger]
            } else {
                &[]
            };
            for category in targets {
                gif_categories.entry(*category).or_default().push(gif.clone());
            }
        }

        for audio in list_media(audio_dir, "mp3") {
            let stem = stem_lower(&audio);
            let targets: &[AudioCategory] =
                if stem.contains("anime-wow") || stem.contains("baby-laughing") {
                    &[AudioCategory::HighEnergy, AudioCategory::Celebration]
                } else if stem.contains("get-out") || stem.contains("why-are") {
                    &[AudioCategory::Dramatic]
                } else if stem.contains("vine-boom") {
                    &[AudioCategory::Suspense, AudioCategory::Meme]
                } else {
                    &[]
                };
            for category in targets {
                audio_categories.entry(*category).or_default().push(audio.clone());
            }
        }

        for files in gif_categories.values_mut() {
            files.sort_by(|a, b| quality_rank_key(b).cmp(&quality_rank_key(a)));
        }

        Self {
            gif_dir: gif_dir.to_path_buf(),
            audio_dir: audio_dir.to_path_buf(),
            gif_categories,
            audio_categories,
        }
    }

    pub fn gifs(&self, category: GifCategory) -> &[PathBuf] {
        self.gif_categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn audio(&self, category: AudioCategory) -> &[PathBuf] {
        self.audio_categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Theme rules are checked in priority order; position only matters when no theme decides.
    pub fn categories_for(puzzle: &Puzzle, move_index: usize) -> (GifCategory, AudioCategory) {
        let themes = puzzle.themes.to_ascii_lowercase();
        let has = |needle: &str| themes.contains(needle);
        let is_final = move_index + 1 == puzzle.moves.len();
        let is_setup = move_index == 0;

        if has("mate") || has("crushing") {
            (GifCategory::Celebration, AudioCategory::Celebration)
        } else if has("hangingpiece") || has("fork") || has("pin") {
            (GifCategory::Shock, AudioCategory::Dramatic)
        } else if has("endgame") || is_final {
            (GifCategory::Excitement, AudioCategory::HighEnergy)
        } else if has("sacrifice") || has("deflection") {
            (GifCategory::Shock, AudioCategory::Dramatic)
        } else if is_setup || has("quiet") {
            (GifCategory::Calculation, AudioCategory::Suspense)
        } else {
            (GifCategory::Suspense, AudioCategory::Meme)
        }
    }

    pub fn select_reaction_by_context<R: Rng + ?Sized>(
        &self,
        puzzle: &Puzzle,
        move_index: usize,
        rng: &mut R,
    ) -> ReactionChoice {
        let timing = calculate_move_timing(puzzle, move_index);
        let (gif_category, audio_category) = Self::categories_for(puzzle, move_index);

        ReactionChoice {
            gif: self.select_quality_gif(gif_category, rng),
            audio: self.select_audio_by_energy(audio_category, timing.energy_level, rng),
            timing,
        }
    }

    fn select_quality_gif<R: Rng + ?Sized>(&self, category: GifCategory, rng: &mut R) -> PathBuf {
        if let Some(best) = self.gifs(category).first() {
            return best.clone();
        }
        if let Some(any) = self.gif_categories.values().flatten().next() {
            return any.clone();
        }
        random_file(&self.gif_dir, "gif", rng).unwrap_or_else(|_| self.gif_dir.join("default.gif"))
    }

    fn select_audio_by_energy<R: Rng + ?Sized>(
        &self,
        category: AudioCategory,
        energy: EnergyLevel,
        rng: &mut R,
    ) -> PathBuf {
        if !self.audio(category).is_empty() {
            let candidates = match energy {
                EnergyLevel::High => self.audio(AudioCategory::HighEnergy),
                EnergyLevel::Low => self.audio(AudioCategory::Suspense),
                EnergyLevel::Medium => self.audio(category),
            };
            let candidates = if candidates.is_empty() {
                self.audio(category)
            } else {
                candidates
            };
            if let Some(choice) = candidates.choose(rng) {
                return choice.clone();
            }
        }
        random_file(&self.audio_dir, "mp3", rng)
            .unwrap_or_else(|_| self.audio_dir.join("default.mp3"))
    }
}
