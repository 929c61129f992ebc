use crate::board::{self, BoardFrame};
use crate::svg::board_svg;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub fn frame_file_name(frame_num: usize) -> String {
    format!("frame_{:03}.png", frame_num)
}

/// Rasterizes an SVG document to a PNG at its intrinsic size.
pub fn rasterize_svg(svg: &str, out_png: &Path) -> Result<(u32, u32)> {
    let opts = resvg::usvg::Options::default();
    let tree = resvg::usvg::Tree::from_str(svg, &opts).context("Failed to parse board SVG")?;

    let size = tree.size();
    let width = (size.width().ceil() as u32).max(1);
    let height = (size.height().ceil() as u32).max(1);

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .with_context(|| format!("Failed to allocate {}x{} pixmap", width, height))?;
    resvg::render(&tree, resvg::tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    let image = image::RgbaImage::from_raw(width, height, rgba)
        .context("Pixmap buffer size mismatch")?;
    image
        .save_with_format(out_png, image::ImageFormat::Png)
        .with_context(|| format!("Failed to write {}", out_png.display()))?;

    Ok((width, height))
}

pub fn render_frames(frames: &[BoardFrame], temp_dir: &Path, size: u32) -> Result<Vec<PathBuf>> {
    let mut png_files = Vec::with_capacity(frames.len());
    for (frame_num, frame) in frames.iter().enumerate() {
        let png_path = temp_dir.join(frame_file_name(frame_num));
        rasterize_svg(&board_svg(frame, size), &png_path)?;
        png_files.push(png_path);
    }
    Ok(png_files)
}

/// Applies `moves` from `fen` and writes one PNG per resulting position.
pub fn render_board_sequence(
    fen: &str,
    moves: &[String],
    temp_dir: &Path,
    size: u32,
) -> Result<Vec<PathBuf>> {
    let frames = board::board_states(fen, moves)?;
    render_frames(&frames, temp_dir, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_writes_one_png_per_position() {
        let dir = tempfile::tempdir().unwrap();
        let moves: Vec<String> = ["e2e4", "e7e5", "g1f3"].iter().map(|m| m.to_string()).collect();
        let files = render_board_sequence(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            &moves,
            dir.path(),
            160,
        )
        .unwrap();

        assert_eq!(files.len(), moves.len() + 1);
        assert_eq!(files[0].file_name().unwrap(), "frame_000.png");
        assert_eq!(files[3].file_name().unwrap(), "frame_003.png");
        for file in &files {
            let img = image::open(file).unwrap();
            assert_eq!((img.width(), img.height()), (160, 160));
        }
    }

    #[test]
    fn rasterized_board_is_opaque() {
        let dir = tempfile::tempdir().unwrap();
        let frames = board::board_states("8/8/8/8/8/8/k7/7K w - - 0 1", &["h1g1".to_string()]).unwrap();
        let out = dir.path().join("board.png");
        rasterize_svg(&board_svg(&frames[1], 80), &out).unwrap();

        let img = image::open(&out).unwrap().to_rgba8();
        assert!(img.pixels().all(|p| p.0[3] == 255));
    }
}
