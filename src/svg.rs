//! Board drawing. Produces a standalone SVG document for one [`BoardFrame`],
//! seen from White's side, with the last move and a checked king highlighted.

use crate::board::BoardFrame;
use chess::{ALL_SQUARES, Color, Piece, Square};
use std::fmt::Write;

const LIGHT: &str = "#ffce9e";
const DARK: &str = "#d18b47";
const LIGHT_LASTMOVE: &str = "#cdd16a";
const DARK_LASTMOVE: &str = "#aaa23b";

/// Piece glyphs share a 45×45 design box.
const GLYPH_BOX: f64 = 45.0;

fn piece_name(piece: Piece) -> &'static str {
    match piece {
        Piece::Pawn => "pawn",
        Piece::Knight => "knight",
        Piece::Bishop => "bishop",
        Piece::Rook => "rook",
        Piece::Queen => "queen",
        Piece::King => "king",
    }
}

fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

fn glyph_body(piece: Piece) -> &'static str {
    match piece {
        Piece::Pawn => concat!(
            r#"<path d="M 15 37 L 30 37 L 27.5 28 Q 22.5 21.5 17.5 28 Z"/>"#,
            r#"<circle cx="22.5" cy="15" r="5.5"/>"#,
            r#"<rect x="11.5" y="36" width="22" height="4" rx="1"/>"#,
        ),
        Piece::Knight => concat!(
            r#"<path d="M 22 10 C 32.5 11 38.5 18 38 39 L 15 39 C 15 30 25 32.5 23 18"/>"#,
            r#"<path d="M 24 18 C 24.4 20.9 18.5 25.4 16 27 C 13 29 13.2 31.3 11 31 C 10 30.1 12.4 28 11 28 C 10 28 11.2 29.2 10 30 C 9 30 6 31 6 26 C 6 24 12 14 12 14 C 12 14 13.9 12.1 14 10.5 C 13.3 9.5 13.5 8.5 13.5 7.5 C 14.5 6.5 16.5 10 16.5 10 L 18.5 10 C 18.5 10 19.3 8 21 7 C 22 7 22 10 22 10"/>"#,
            r#"<circle class="detail" cx="15" cy="15.5" r="1.2"/>"#,
        ),
        Piece::Bishop => concat!(
            r#"<path d="M 9 36 C 12.4 35 19.1 36.4 22.5 34 C 25.9 36.4 32.6 35 36 36 C 37.6 36.5 39 38 39 38 L 6 38 C 6 38 7.4 36.5 9 36 Z"/>"#,
            r#"<path d="M 15 32 C 17.5 34.5 27.5 34.5 30 32 C 30.5 30.5 30 30 30 30 C 30 27.5 27.5 26 27.5 26 C 33 24.5 33.5 14.5 22.5 10.5 C 11.5 14.5 12 24.5 17.5 26 C 17.5 26 15 27.5 15 30 C 15 30 14.5 30.5 15 32 Z"/>"#,
            r#"<circle cx="22.5" cy="8" r="2.5"/>"#,
            r#"<path class="detail" fill="none" d="M 17.5 26 L 27.5 26 M 15 30 L 30 30 M 22.5 15.5 L 22.5 20.5 M 20 18 L 25 18"/>"#,
        ),
        Piece::Rook => concat!(
            r#"<path d="M 9 39 L 36 39 L 36 36 L 9 36 Z"/>"#,
            r#"<path d="M 12 36 L 12 32 L 33 32 L 33 36 Z"/>"#,
            r#"<path d="M 11 14 L 11 9 L 15 9 L 15 11 L 20 11 L 20 9 L 25 9 L 25 11 L 30 11 L 30 9 L 34 9 L 34 14 Z"/>"#,
            r#"<path d="M 34 14 L 31 17 L 14 17 L 11 14"/>"#,
            r#"<path d="M 31 17 L 31 29.5 L 14 29.5 L 14 17"/>"#,
            r#"<path d="M 31 29.5 L 32.5 32 L 12.5 32 L 14 29.5"/>"#,
        ),
        Piece::Queen => concat!(
            r#"<path d="M 9 26 C 17.5 24.5 30 24.5 36 26 L 38.5 13.5 L 31 25 L 30.7 10.9 L 25.5 24.5 L 22.5 10 L 19.5 24.5 L 14.3 10.9 L 14 25 L 6.5 13.5 Z"/>"#,
            r#"<path d="M 9 26 C 9 28 10.5 28 11.5 30 C 12.5 31.5 12.5 31 12 33.5 C 10.5 34.5 11 36 11 36 C 9.5 37.5 11 38.5 11 38.5 C 17.5 39.5 27.5 39.5 34 38.5 C 34 38.5 35.5 37.5 34 36 C 34 36 34.5 34.5 33 33.5 C 32.5 31 32.5 31.5 33.5 30 C 34.5 28 36 28 36 26 C 27.5 24.5 17.5 24.5 9 26 Z"/>"#,
            r#"<circle cx="6" cy="12" r="2"/>"#,
            r#"<circle cx="14" cy="9" r="2"/>"#,
            r#"<circle cx="22.5" cy="8" r="2"/>"#,
            r#"<circle cx="31" cy="9" r="2"/>"#,
            r#"<circle cx="39" cy="12" r="2"/>"#,
        ),
        Piece::King => concat!(
            r#"<path fill="none" d="M 22.5 11.6 L 22.5 6 M 20 8 L 25 8"/>"#,
            r#"<path d="M 22.5 25 C 22.5 25 27 17.5 25.5 14.5 C 25.5 14.5 24.5 12 22.5 12 C 20.5 12 19.5 14.5 19.5 14.5 C 18 17.5 22.5 25 22.5 25"/>"#,
            r#"<path d="M 12.5 37 C 18 40.5 27 40.5 32.5 37 L 32.5 30 C 32.5 30 41.5 25.5 38.5 19.5 C 34.5 13 25 16 22.5 23.5 L 22.5 27 L 22.5 23.5 C 20 16 10.5 13 6.5 19.5 C 3.5 25.5 12.5 30 12.5 30 L 12.5 37"/>"#,
            r#"<path class="detail" fill="none" d="M 12.5 30 C 18 27 27 27 32.5 30 M 12.5 33.5 C 18 30.5 27 30.5 32.5 33.5 M 12.5 37 C 18 34 27 34 32.5 37"/>"#,
        ),
    }
}

const PIECES: [Piece; 6] = [
    Piece::Pawn,
    Piece::Knight,
    Piece::Bishop,
    Piece::Rook,
    Piece::Queen,
    Piece::King,
];

fn write_defs(out: &mut String) {
    out.push_str("<defs>");
    out.push_str(concat!(
        r#"<radialGradient id="check_gradient" r="0.5">"#,
        r##"<stop offset="0%" stop-color="#ff0000" stop-opacity="1.0"/>"##,
        r##"<stop offset="50%" stop-color="#e70000" stop-opacity="1.0"/>"##,
        r##"<stop offset="100%" stop-color="#9e0000" stop-opacity="0.0"/>"##,
        "</radialGradient>",
    ));
    for color in [Color::White, Color::Black] {
        let (fill, stroke, detail) = match color {
            Color::White => ("#ffffff", "#000000", "#000000"),
            Color::Black => ("#000000", "#000000", "#ffffff"),
        };
        for piece in PIECES {
            // Detail strokes are inverted on black pieces so they stay visible.
            let body = glyph_body(piece).replace(
                r#"class="detail""#,
                &format!(r#"stroke="{}""#, detail),
            );
            write!(
                out,
                r#"<g id="{}-{}" fill="{}" stroke="{}" stroke-width="1.5" stroke-linecap="round" stroke-linejoin="round">{}</g>"#,
                color_name(color),
                piece_name(piece),
                fill,
                stroke,
                body
            ).ok();
        }
    }
    out.push_str("</defs>");
}

/// Top-left corner of `square` in board pixels, White at the bottom.
pub fn square_origin(square: Square, square_size: f64) -> (f64, f64) {
    let file = square.get_file().to_index() as f64;
    let rank = square.get_rank().to_index() as f64;
    (file * square_size, (7.0 - rank) * square_size)
}

fn is_dark(square: Square) -> bool {
    (square.get_file().to_index() + square.get_rank().to_index()) % 2 == 0
}

pub fn board_svg(frame: &BoardFrame, size: u32) -> String {
    let size = size.max(8) as f64;
    let sq = size / 8.0;
    let highlighted: Vec<Square> = frame
        .last_move
        .map(|mv| vec![mv.get_source(), mv.get_dest()])
        .unwrap_or_default();

    let mut out = String::with_capacity(16 * 1024);
    write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" version="1.1" width="{s}" height="{s}" viewBox="0 0 {s} {s}">"#,
        s = size
    ).ok();
    write_defs(&mut out);

    for square in ALL_SQUARES {
        let (x, y) = square_origin(square, sq);
        let lit = highlighted.contains(&square);
        let fill = match (is_dark(square), lit) {
            (true, false) => DARK,
            (false, false) => LIGHT,
            (true, true) => DARK_LASTMOVE,
            (false, true) => LIGHT_LASTMOVE,
        };
        let class = if lit { "square lastmove" } else { "square" };
        write!(
            out,
            r#"<rect class="{}" x="{:.3}" y="{:.3}" width="{:.3}" height="{:.3}" fill="{}"/>"#,
            class, x, y, sq, sq, fill
        ).ok();
    }

    if let Some(king) = frame.checked_king() {
        let (x, y) = square_origin(king, sq);
        write!(
            out,
            r#"<rect class="check" x="{:.3}" y="{:.3}" width="{:.3}" height="{:.3}" fill="url(#check_gradient)"/>"#,
            x, y, sq, sq
        ).ok();
    }

    let scale = sq / GLYPH_BOX;
    for square in ALL_SQUARES {
        let (Some(piece), Some(color)) = (frame.board.piece_on(square), frame.board.color_on(square))
        else {
            continue;
        };
        let (x, y) = square_origin(square, sq);
        write!(
            out,
            r##"<use class="piece" xlink:href="#{}-{}" transform="translate({:.3},{:.3}) scale({:.5})"/>"##,
            color_name(color),
            piece_name(piece),
            x,
            y,
            scale
        ).ok();
    }

    out.push_str("</svg>");
    out
}
