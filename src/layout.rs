//! Placement arithmetic for the composited frame. Sizes are rounded down to
//! even numbers since yuv420p output needs even dimensions.

fn even(v: f64) -> u32 {
    let v = v.max(2.0) as u32;
    v & !1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

/// Board below, one reaction GIF above it for the whole video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyLayout {
    pub board: Placement,
    /// `None` when the scaled board leaves no room above it.
    pub gif: Option<Placement>,
}

impl LegacyLayout {
    pub fn compute(
        board_w: u32,
        board_h: u32,
        gif_w: u32,
        gif_h: u32,
        target_w: u32,
        target_h: u32,
    ) -> Self {
        let tw = target_w as f64;

        let main_w = even(tw);
        let main_h = even(board_h.max(1) as f64 * tw / board_w.max(1) as f64);
        let gif_area = target_h as i64 - main_h as i64;

        let board = Placement {
            width: main_w,
            height: main_h,
            x: ((target_w as i64 - main_w as i64) / 2) as i32,
            y: gif_area.max(0) as i32,
        };

        if gif_area <= 0 {
            return Self { board, gif: None };
        }

        let aspect = gif_h.max(1) as f64 / gif_w.max(1) as f64;
        let (mut w, mut h) = (tw, tw * aspect);
        if h > gif_area as f64 {
            h = gif_area as f64;
            w = h / aspect;
        }
        let (w, h) = (even(w), even(h));

        let gif = Placement {
            width: w,
            height: h,
            x: ((tw - w as f64) / 2.0).floor() as i32,
            y: ((gif_area as f64 - h as f64) / 2.0).floor() as i32,
        };

        Self {
            board,
            gif: Some(gif),
        }
    }
}

/// Per-segment layout: square board near the top, GIF centered beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    pub board: Placement,
    /// The GIF keeps its aspect ratio, so only its height and top edge are fixed here.
    pub gif_height: u32,
    pub gif_y: i32,
}

const BOARD_TOP: i32 = 50;
const GIF_GAP: i32 = 25;
const TEXT_RESERVE: i64 = 100;

impl SegmentLayout {
    pub fn compute(target_w: u32, target_h: u32) -> Self {
        let board_size = even((target_h as u64 * 3 / 5) as f64);
        let gif_area = (target_h as i64 - board_size as i64 - TEXT_RESERVE).max(2);
        let gif_height = even(gif_area.min(target_w as i64) as f64);

        Self {
            board: Placement {
                width: board_size,
                height: board_size,
                // negative when the board is wider than the frame; overlay crops it
                x: ((target_w as i64 - board_size as i64) / 2) as i32,
                y: BOARD_TOP,
            },
            gif_height,
            gif_y: board_size as i32 + BOARD_TOP + GIF_GAP,
        }
    }
}
