use std::path::PathBuf;
use thiserror::Error;

/// Domain failures raised while turning a puzzle row into frames and media picks.
#[derive(Debug, Error)]
pub enum PuzzleError {
    #[error("puzzle index {index} out of range ({available} puzzles in {})", .path.display())]
    IndexOutOfRange {
        index: usize,
        available: usize,
        path: PathBuf,
    },

    #[error("puzzle {puzzle_id} has no moves")]
    EmptyMoves { puzzle_id: String },

    #[error("invalid FEN {fen:?}")]
    InvalidFen { fen: String },

    #[error("move {index} ({uci:?}) is not valid UCI")]
    MalformedMove { index: usize, uci: String },

    #[error("move {index} ({uci:?}) is illegal in this position")]
    IllegalMove { index: usize, uci: String },

    #[error("no {kind} files found in {}", .dir.display())]
    NoMedia { kind: &'static str, dir: PathBuf },
}
