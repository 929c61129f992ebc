use crate::error::PuzzleError;
use chess::{ALL_SQUARES, Board, BoardBuilder, ChessMove, Color, Piece, Square};
use std::str::FromStr;

/// A board state and the move that led to it (`None` for the starting position).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardFrame {
    pub board: Board,
    pub last_move: Option<ChessMove>,
}

impl BoardFrame {
    /// Square of the side-to-move's king when it is in check.
    pub fn checked_king(&self) -> Option<Square> {
        if self.board.checkers().popcnt() == 0 {
            return None;
        }
        Some(self.board.king_square(self.board.side_to_move()))
    }
}

fn promotion_piece(c: char) -> Option<Piece> {
    match c.to_ascii_lowercase() {
        'q' => Some(Piece::Queen),
        'r' => Some(Piece::Rook),
        'b' => Some(Piece::Bishop),
        'n' => Some(Piece::Knight),
        _ => None,
    }
}

/// Parses `e2e4` / `e7e8q` against `board`; castling is king-two-squares as in UCI.
pub fn parse_uci(board: &Board, uci: &str, index: usize) -> Result<ChessMove, PuzzleError> {
    let malformed = || PuzzleError::MalformedMove {
        index,
        uci: uci.to_string(),
    };

    let uci = uci.trim();
    if !(uci.len() == 4 || uci.len() == 5) || !uci.is_ascii() {
        return Err(malformed());
    }

    let source = Square::from_str(&uci[0..2]).map_err(|_| malformed())?;
    let dest = Square::from_str(&uci[2..4]).map_err(|_| malformed())?;
    let promotion = match uci[4..].chars().next() {
        Some(c) => Some(promotion_piece(c).ok_or_else(malformed)?),
        None => None,
    };

    let mv = ChessMove::new(source, dest, promotion);
    if !board.legal(mv) {
        return Err(PuzzleError::IllegalMove {
            index,
            uci: uci.to_string(),
        });
    }
    Ok(mv)
}

fn placement_is_well_formed(placement: &str) -> bool {
    let ranks: Vec<&str> = placement.split('/').collect();
    ranks.len() == 8
        && ranks.iter().all(|rank| {
            let mut width = 0u32;
            for c in rank.chars() {
                match c.to_digit(10) {
                    Some(n @ 1..=8) => width += n,
                    Some(_) => return false,
                    None if "pnbrqkPNBRQK".contains(c) => width += 1,
                    None => return false,
                }
            }
            width == 8
        })
}

/// `Board::from_str` assumes both kings exist; check the placement before handing it over.
pub fn parse_fen(fen: &str) -> Result<Board, PuzzleError> {
    let invalid = || PuzzleError::InvalidFen {
        fen: fen.to_string(),
    };

    let fen = fen.trim();
    let placement = fen.split_whitespace().next().ok_or_else(invalid)?;
    if !placement_is_well_formed(placement) {
        return Err(invalid());
    }

    let builder = BoardBuilder::from_str(fen).map_err(|_| invalid())?;
    let kings = |color: Color| {
        ALL_SQUARES
            .iter()
            .filter(|sq| builder[**sq] == Some((Piece::King, color)))
            .count()
    };
    if kings(Color::White) != 1 || kings(Color::Black) != 1 {
        return Err(invalid());
    }

    Board::try_from(&builder).map_err(|_| invalid())
}

/// Starting position followed by one frame per applied move.
pub fn board_states(fen: &str, moves: &[String]) -> Result<Vec<BoardFrame>, PuzzleError> {
    let mut board = parse_fen(fen)?;

    let mut frames = Vec::with_capacity(moves.len() + 1);
    frames.push(BoardFrame {
        board,
        last_move: None,
    });

    for (index, uci) in moves.iter().enumerate() {
        let mv = parse_uci(&board, uci, index)?;
        board = board.make_move_new(mv);
        frames.push(BoardFrame {
            board,
            last_move: Some(mv),
        });
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moves(list: &[&str]) -> Vec<String> {
        list.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn frame_count_is_moves_plus_one() {
        let fen = "5rk1/1p3ppp/pq3b2/8/8/1P1Q1N2/P4PPP/3R2K1 w - - 2 27";
        let line = moves(&["d3d6", "f8d8", "d6d8", "f6d8"]);
        let frames = board_states(fen, &line).unwrap();
        assert_eq!(frames.len(), line.len() + 1);
        assert!(frames[0].last_move.is_none());
        assert!(frames[1..].iter().all(|f| f.last_move.is_some()));
    }

    #[test]
    fn last_move_matches_uci() {
        let frames = board_states(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            &moves(&["e2e4"]),
        )
        .unwrap();
        let mv = frames[1].last_move.unwrap();
        assert_eq!(mv.get_source(), Square::from_str("e2").unwrap());
        assert_eq!(mv.get_dest(), Square::from_str("e4").unwrap());
        assert_eq!(
            frames[1].board.piece_on(Square::from_str("e4").unwrap()),
            Some(Piece::Pawn)
        );
    }

    #[test]
    fn mate_is_detected() {
        let frames = board_states(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            &moves(&["f2f3", "e7e5", "g2g4", "d8h4"]),
        )
        .unwrap();
        let last = frames.last().unwrap();
        assert_eq!(last.board.status(), chess::BoardStatus::Checkmate);
        assert_eq!(last.checked_king(), Some(Square::from_str("e1").unwrap()));
    }

    #[test]
    fn positions_without_both_kings_are_rejected() {
        for fen in [
            "8/8/8/8/8/8/8/8 w - - 0 1",
            "pppppppppp/8/8/8/8/8/8/8 w - - 0 1",
            "4k3/8/8/8/8/8/8/8 w - - 0 1",
            "4k3/8/8/8/8/8/8/3KK3 w - - 0 1",
            "9/8/8/8/8/8/8/8 w - - 0 1",
            "",
        ] {
            let err = board_states(fen, &moves(&["e2e4"])).unwrap_err();
            assert!(matches!(err, PuzzleError::InvalidFen { .. }), "{fen:?}");
        }
    }

    #[test]
    fn promotion_is_parsed() {
        let frames = board_states("8/P7/8/8/8/8/k7/7K w - - 0 1", &moves(&["a7a8q"])).unwrap();
        assert_eq!(
            frames[1].board.piece_on(Square::from_str("a8").unwrap()),
            Some(Piece::Queen)
        );
    }

    #[test]
    fn illegal_move_names_index() {
        let err = board_states(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            &moves(&["e2e4", "e2e4"]),
        )
        .unwrap_err();
        assert!(matches!(err, PuzzleError::IllegalMove { index: 1, .. }));
    }

    #[test]
    fn malformed_move_rejected() {
        let err = board_states(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            &moves(&["e2-e4"]),
        )
        .unwrap_err();
        assert!(matches!(err, PuzzleError::MalformedMove { index: 0, .. }));
    }

    #[test]
    fn bad_fen_rejected() {
        let err = board_states("not a fen", &moves(&["e2e4"])).unwrap_err();
        assert!(matches!(err, PuzzleError::InvalidFen { .. }));
    }
}
