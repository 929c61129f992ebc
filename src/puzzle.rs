use crate::error::PuzzleError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_RATING: u32 = 1500;
const DEFAULT_POPULARITY: i32 = 50;

/// One row of the Lichess puzzle export, columns in file order.
#[derive(Debug, Clone, Deserialize)]
pub struct PuzzleRecord {
    #[serde(rename = "PuzzleId")]
    pub puzzle_id: String,
    #[serde(rename = "FEN")]
    pub fen: String,
    #[serde(rename = "Moves")]
    pub moves: String,
    #[serde(rename = "Rating")]
    pub rating: Option<u32>,
    #[serde(rename = "RatingDeviation")]
    pub rating_deviation: Option<u32>,
    #[serde(rename = "Popularity")]
    pub popularity: Option<i32>,
    #[serde(rename = "NbPlays")]
    pub nb_plays: Option<u64>,
    #[serde(rename = "Themes")]
    pub themes: Option<String>,
    #[serde(rename = "GameUrl")]
    pub game_url: Option<String>,
    #[serde(rename = "OpeningTags")]
    pub opening_tags: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Puzzle {
    pub puzzle_id: String,
    pub fen: String,
    pub moves: Vec<String>,
    pub rating: u32,
    pub themes: String,
    pub popularity: i32,
}

impl Puzzle {
    pub fn theme_list(&self) -> Vec<&str> {
        self.themes.split_whitespace().collect()
    }

    pub fn move_count(&self) -> usize {
        self.moves.len()
    }
}

impl TryFrom<PuzzleRecord> for Puzzle {
    type Error = PuzzleError;

    fn try_from(record: PuzzleRecord) -> std::result::Result<Self, Self::Error> {
        let moves: Vec<String> = record
            .moves
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if moves.is_empty() {
            return Err(PuzzleError::EmptyMoves {
                puzzle_id: record.puzzle_id,
            });
        }

        Ok(Puzzle {
            puzzle_id: record.puzzle_id,
            fen: record.fen.trim().to_string(),
            moves,
            rating: record.rating.unwrap_or(DEFAULT_RATING),
            themes: record.themes.unwrap_or_default(),
            popularity: record.popularity.unwrap_or(DEFAULT_POPULARITY),
        })
    }
}

// The header row is skipped rather than trusted; columns are assigned by position.
const COLUMNS: [&str; 10] = [
    "PuzzleId",
    "FEN",
    "Moves",
    "Rating",
    "RatingDeviation",
    "Popularity",
    "NbPlays",
    "Themes",
    "GameUrl",
    "OpeningTags",
];

fn reader_for(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open puzzle CSV: {}", path.display()))
}

fn decode_row(row: &csv::StringRecord) -> Result<PuzzleRecord> {
    let header = csv::StringRecord::from(COLUMNS.to_vec());
    let mut padded = row.clone();
    while padded.len() < COLUMNS.len() {
        padded.push_field("");
    }
    padded.truncate(COLUMNS.len());
    padded
        .deserialize(Some(&header))
        .context("Failed to decode puzzle row")
}

pub fn load_puzzles(path: &Path) -> Result<Vec<PuzzleRecord>> {
    let mut reader = reader_for(path)?;
    let mut out = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("CSV row {} unreadable", line + 1))?;
        out.push(decode_row(&row).with_context(|| format!("CSV row {}", line + 1))?);
    }
    Ok(out)
}

/// Reads only as far as `index` instead of loading the whole export.
pub fn get_puzzle(path: &Path, index: usize) -> Result<Puzzle> {
    let mut reader = reader_for(path)?;
    let mut seen = 0usize;
    for row in reader.records() {
        let row = row.with_context(|| format!("CSV row {} unreadable", seen + 1))?;
        if seen == index {
            let record = decode_row(&row).with_context(|| format!("CSV row {}", index + 1))?;
            return Ok(Puzzle::try_from(record)?);
        }
        seen += 1;
    }

    Err(PuzzleError::IndexOutOfRange {
        index,
        available: seen,
        path: path.to_path_buf(),
    }
    .into())
}
