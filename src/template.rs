use crate::puzzle::Puzzle;
use rand::Rng;
use rand::seq::SliceRandom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifficultyColor {
    Green,
    Yellow,
    Orange,
    Red,
}

impl DifficultyColor {
    pub fn name(self) -> &'static str {
        match self {
            DifficultyColor::Green => "green",
            DifficultyColor::Yellow => "yellow",
            DifficultyColor::Orange => "orange",
            DifficultyColor::Red => "red",
        }
    }

    /// Dark tint used as the segment background.
    pub fn background_rgb(self) -> (u8, u8, u8) {
        match self {
            DifficultyColor::Green => (20, 60, 20),
            DifficultyColor::Yellow => (60, 60, 20),
            DifficultyColor::Orange => (80, 40, 20),
            DifficultyColor::Red => (80, 20, 20),
        }
    }
}

pub fn difficulty_text(rating: u32) -> &'static str {
    match rating {
        0..1200 => "BEGINNER",
        1200..1600 => "INTERMEDIATE",
        1600..2000 => "ADVANCED",
        _ => "MASTER",
    }
}

pub fn difficulty_color(rating: u32) -> DifficultyColor {
    match rating {
        0..1200 => DifficultyColor::Green,
        1200..1600 => DifficultyColor::Yellow,
        1600..2000 => DifficultyColor::Orange,
        _ => DifficultyColor::Red,
    }
}

pub fn engagement_hook<R: Rng + ?Sized>(puzzle: &Puzzle, rng: &mut R) -> String {
    let best_move = if puzzle.themes.to_ascii_lowercase().contains("mate") {
        "Find the winning move!".to_string()
    } else {
        "What's the best move?".to_string()
    };
    let hooks = [
        format!("Can you solve this {} puzzle?", difficulty_text(puzzle.rating)),
        format!("Only {}% find the solution!", rng.gen_range(5..=25)),
        format!("Rate {} chess puzzle - Can you see it?", puzzle.rating),
        best_move,
    ];
    hooks.choose(rng).cloned().unwrap_or_default()
}

pub fn move_indicator(puzzle: &Puzzle, move_index: usize) -> String {
    if move_index == 0 {
        "Find the best move!".to_string()
    } else if move_index + 1 == puzzle.moves.len() {
        "Solution!".to_string()
    } else {
        format!("Move {}", move_index + 1)
    }
}

pub fn difficulty_badge(puzzle: &Puzzle) -> String {
    format!("{} • {}", difficulty_text(puzzle.rating), puzzle.rating)
}

const CELEBRATIONS: [&str; 4] = [
    "Puzzle Solved! 🎉",
    "Well Done! ⭐",
    "Excellent! 👏",
    "Master Move! 🏆",
];

pub fn celebration_text<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    CELEBRATIONS.choose(rng).copied().unwrap_or(CELEBRATIONS[0])
}

pub fn theme_line(puzzle: &Puzzle) -> String {
    format!("Theme: {}", puzzle.theme_list().join(", "))
}
