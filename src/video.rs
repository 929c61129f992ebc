use crate::analyzer::{VideoAnalysis, resolve_media};
use crate::api::elevenlabs;
use crate::config::Config;
use crate::ffmpeg::{self, SegmentSpec};
use crate::generator::timestamped_path;
use crate::layout::{LegacyLayout, SegmentLayout};
use crate::puzzle::Puzzle;
use crate::reaction::{
    EnergyLevel, EnhancedReactionSelector, ReactionSelector, list_media, random_file,
};
use crate::story::Story;
use crate::template;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Caption for board frame `frame` of `frame_count`; frame 0 is the starting position.
pub fn frame_caption(puzzle: &Puzzle, frame: usize, frame_count: usize, hook: &str) -> String {
    if frame == 0 {
        hook.to_string()
    } else if frame + 1 == frame_count {
        template::move_indicator(puzzle, puzzle.moves.len().saturating_sub(1))
    } else {
        format!("Move {}", frame)
    }
}

/// One segment per board frame; frame `k` takes the reaction and timing the selector gives position `k`.
pub fn enhanced_segments<R: Rng + ?Sized>(
    puzzle: &Puzzle,
    png_files: &[PathBuf],
    selector: &EnhancedReactionSelector,
    rng: &mut R,
) -> Vec<SegmentSpec> {
    let hook = template::engagement_hook(puzzle, rng);
    let background = background_for(puzzle);

    png_files
        .iter()
        .enumerate()
        .map(|(frame, png)| {
            let choice = selector.select_reaction_by_context(puzzle, frame, rng);
            SegmentSpec {
                board_png: png.clone(),
                gif: choice.gif,
                audio: choice.audio,
                duration: choice.timing.duration,
                fade_in: choice.timing.energy_level == EnergyLevel::High,
                background,
                caption: Some(frame_caption(puzzle, frame, png_files.len(), &hook)),
            }
        })
        .collect()
}

/// The basic selector's reaction to the final move, or any GIF in `gif_dir` when that file is absent.
pub fn legacy_gif<R: Rng + ?Sized>(
    puzzle: &Puzzle,
    selector: &ReactionSelector,
    gif_dir: &Path,
    rng: &mut R,
) -> Result<PathBuf> {
    let (gif, _) = selector.select_reaction(puzzle, puzzle.moves.len().saturating_sub(1), rng);
    if gif.is_file() {
        return Ok(gif);
    }
    random_file(gif_dir, "gif", rng)
}

fn background_for(puzzle: &Puzzle) -> (u8, u8, u8) {
    template::difficulty_color(puzzle.rating).background_rgb()
}

pub struct VideoEditor<'a> {
    cfg: &'a Config,
    http: &'a reqwest::Client,
    work_dir: PathBuf,
}

impl<'a> VideoEditor<'a> {
    pub fn new(cfg: &'a Config, http: &'a reqwest::Client, work_dir: &Path) -> Self {
        Self {
            cfg,
            http,
            work_dir: work_dir.to_path_buf(),
        }
    }

    fn gif_dir(&self) -> &Path {
        Path::new(&self.cfg.reaction_gif_dir)
    }

    fn audio_dir(&self) -> &Path {
        Path::new(&self.cfg.reaction_audio_dir)
    }

    fn font(&self) -> Option<&Path> {
        self.cfg.font_path.as_deref().map(Path::new)
    }

    /// Board frames at the configured fps, the solution's reaction GIF above, random sounds underneath.
    pub async fn render_legacy(
        &self,
        puzzle: &Puzzle,
        png_files: &[PathBuf],
        selector: &ReactionSelector,
        out_mp4: &Path,
    ) -> Result<bool> {
        let mut rng = StdRng::from_entropy();
        let fps = self.cfg.video_fps.max(1);
        let duration = png_files.len() as f64 / fps as f64;

        let base = timestamped_path(&self.work_dir, "base", ".mp4");
        logi(format!("Encoding {} frames -> {}", png_files.len(), base.display()));
        if !ffmpeg::make_base_video(&self.work_dir, fps, &base).await? {
            logw("Base video was not produced.");
            return Ok(false);
        }

        let gif = legacy_gif(puzzle, selector, self.gif_dir(), &mut rng)?;
        let (board_w, board_h) = ffmpeg::ffprobe_video_dimensions(&base).await?;
        let (gif_w, gif_h) = ffmpeg::ffprobe_video_dimensions(&gif).await?;
        let layout = LegacyLayout::compute(
            board_w,
            board_h,
            gif_w,
            gif_h,
            self.cfg.target_width,
            self.cfg.target_height,
        );

        let mut candidates = Vec::new();
        for file in list_media(self.audio_dir(), "mp3") {
            match ffmpeg::ffprobe_duration_seconds(&file).await {
                Ok(d) => candidates.push((file, d)),
                Err(e) => logw(format!("Skipping unreadable audio: {:#}", e)),
            }
        }
        let playlist = ffmpeg::plan_playlist(&candidates, duration, &mut rng);
        if playlist.files.is_empty() {
            logw(format!(
                "No usable MP3 in {}; video will be silent.",
                self.audio_dir().display()
            ));
        }

        ffmpeg::composite_legacy(
            &base,
            &gif,
            &playlist.files,
            &layout,
            self.cfg.target_width,
            self.cfg.target_height,
            duration,
            out_mp4,
        )
        .await
    }

    /// One segment per board frame, reactions picked from themes and position.
    pub async fn render_enhanced(
        &self,
        puzzle: &Puzzle,
        png_files: &[PathBuf],
        selector: &EnhancedReactionSelector,
        out_mp4: &Path,
    ) -> Result<bool> {
        let mut rng = StdRng::from_entropy();
        let specs = enhanced_segments(puzzle, png_files, selector, &mut rng);
        self.render_segments(&specs, out_mp4).await
    }

    /// One segment per story beat, showing the board at the beat's move.
    pub async fn render_story(
        &self,
        puzzle: &Puzzle,
        png_files: &[PathBuf],
        story: &Story,
        out_mp4: &Path,
    ) -> Result<bool> {
        let Some(last_frame) = png_files.len().checked_sub(1) else {
            return Ok(false);
        };
        let mut rng = StdRng::from_entropy();
        let background = background_for(puzzle);

        let mut specs = Vec::with_capacity(story.beats.len());
        for beat in &story.beats {
            let mut gif = self.gif_dir().join(&beat.gif_name);
            if !gif.exists() {
                logw(format!("Missing {}; using a random GIF.", gif.display()));
                gif = random_file(self.gif_dir(), "gif", &mut rng)?;
            }
            let mut audio = self.audio_dir().join(&beat.audio_name);
            if !audio.exists() {
                logw(format!("Missing {}; using a random sound.", audio.display()));
                audio = random_file(self.audio_dir(), "mp3", &mut rng)?;
            }

            specs.push(SegmentSpec {
                board_png: png_files[beat.move_index.min(last_frame)].clone(),
                gif,
                audio,
                duration: beat.duration,
                fade_in: false,
                background,
                caption: Some(format!("{} is {}", beat.character.display_name(), beat.emotion)),
            });
        }

        logi(format!("Story \"{}\": {} beats", story.title, specs.len()));
        self.render_segments(&specs, out_mp4).await
    }

    /// One segment per analyzed move, with the recommended GIF and sound.
    pub async fn render_analyzed(
        &self,
        puzzle: &Puzzle,
        png_files: &[PathBuf],
        analysis: &VideoAnalysis,
        out_mp4: &Path,
    ) -> Result<bool> {
        let Some(last_frame) = png_files.len().checked_sub(1) else {
            return Ok(false);
        };
        let mut rng = StdRng::from_entropy();
        let gifs = list_media(self.gif_dir(), "gif");
        let sounds = list_media(self.audio_dir(), "mp3");
        let background = background_for(puzzle);

        let mut specs = Vec::with_capacity(analysis.move_reactions.len());
        for (i, reaction) in analysis.move_reactions.iter().enumerate() {
            let gif = match resolve_media(&reaction.gif_choice, &gifs) {
                Some(gif) => gif,
                None => random_file(self.gif_dir(), "gif", &mut rng)?,
            };
            let audio = match resolve_media(&reaction.audio_choice, &sounds) {
                Some(audio) => audio,
                None => random_file(self.audio_dir(), "mp3", &mut rng)?,
            };
            let frame = (reaction.move_number as usize).max(1).min(last_frame);

            specs.push(SegmentSpec {
                board_png: png_files[frame].clone(),
                gif,
                audio,
                duration: reaction.duration,
                fade_in: i + 1 == analysis.move_reactions.len(),
                background,
                caption: Some(if i + 1 == analysis.move_reactions.len() {
                    template::celebration_text(&mut rng).to_string()
                } else {
                    template::move_indicator(puzzle, i)
                }),
            });
        }

        self.render_segments(&specs, out_mp4).await
    }

    async fn render_segments(&self, specs: &[SegmentSpec], out_mp4: &Path) -> Result<bool> {
        if specs.is_empty() {
            logw("Nothing to render.");
            return Ok(false);
        }

        let layout = SegmentLayout::compute(self.cfg.target_width, self.cfg.target_height);
        let mut parts = Vec::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            let part = self.work_dir.join(format!("seg_{:03}.mp4", i));
            let ok = ffmpeg::render_segment(
                spec,
                &layout,
                self.cfg.target_width,
                self.cfg.target_height,
                self.font(),
                &part,
            )
            .await
            .with_context(|| format!("Segment {} failed", i))?;
            if !ok {
                logw(format!("Segment {} was not produced.", i));
                return Ok(false);
            }
            parts.push(part);
        }

        ffmpeg::concat_videos(&parts, &self.work_dir, out_mp4).await
    }

    /// Mixes a spoken engagement hook over the finished video, in place.
    pub async fn narrate_hook(&self, puzzle: &Puzzle, video: &Path) -> Result<bool> {
        let hook = {
            let mut rng = StdRng::from_entropy();
            template::engagement_hook(puzzle, &mut rng)
        };
        let voice = self.work_dir.join("hook.mp3");
        if !elevenlabs::tts_to_mp3(self.http, self.cfg, &hook, &voice).await? {
            return Ok(false);
        }

        let mixed = self.work_dir.join("narrated.mp4");
        if !ffmpeg::mix_narration(video, &voice, &mixed).await? {
            logw("Narration mix failed; keeping the unnarrated video.");
            return Ok(false);
        }
        fs::rename(&mixed, video)
            .await
            .or_else(|_| std::fs::copy(&mixed, video).map(|_| ()))
            .with_context(|| format!("Failed to replace {}", video.display()))?;
        logok(format!("Narrated hook: \"{}\"", hook));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn puzzle() -> Puzzle {
        Puzzle {
            puzzle_id: "x".to_string(),
            fen: String::new(),
            moves: vec!["a".into(), "b".into(), "c".into()],
            rating: 1500,
            themes: String::new(),
            popularity: 50,
        }
    }

    #[test]
    fn captions_follow_frames() {
        let p = puzzle();
        assert_eq!(frame_caption(&p, 0, 4, "Hook!"), "Hook!");
        assert_eq!(frame_caption(&p, 1, 4, "Hook!"), "Move 1");
        assert_eq!(frame_caption(&p, 2, 4, "Hook!"), "Move 2");
        assert_eq!(frame_caption(&p, 3, 4, "Hook!"), "Solution!");
    }

    #[test]
    fn enhanced_frames_take_their_own_position_timing() {
        let dir = tempfile::tempdir().unwrap();
        let selector = EnhancedReactionSelector::new(&dir.path().join("g"), &dir.path().join("a"));
        let pngs: Vec<PathBuf> = (0..4).map(|i| PathBuf::from(format!("frame_{:03}.png", i))).collect();
        let mut rng = StdRng::seed_from_u64(3);

        let specs = enhanced_segments(&puzzle(), &pngs, &selector, &mut rng);
        let durations: Vec<f64> = specs.iter().map(|s| s.duration).collect();
        let expected = [1.8 * 1.8, 1.8 * 1.2, 1.8 * 2.5, 1.8 * 1.2];
        for (got, want) in durations.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{durations:?}");
        }
        assert_eq!(
            specs.iter().map(|s| s.fade_in).collect::<Vec<_>>(),
            vec![false, false, true, false]
        );
        assert_eq!(specs[3].caption.as_deref(), Some("Solution!"));
        assert_eq!(specs[1].board_png, pngs[1]);
    }

    #[test]
    fn legacy_gif_falls_back_to_any_gif() {
        let dir = tempfile::tempdir().unwrap();
        let gif_dir = dir.path().join("gifs");
        let audio_dir = dir.path().join("audio");
        std::fs::create_dir_all(&gif_dir).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let empty = ReactionSelector::new(&gif_dir, &audio_dir);
        assert!(legacy_gif(&puzzle(), &empty, &gif_dir, &mut rng).is_err());

        std::fs::write(gif_dir.join("random_clip.gif"), b"x").unwrap();
        let uncategorized = ReactionSelector::new(&gif_dir, &audio_dir);
        assert_eq!(
            legacy_gif(&puzzle(), &uncategorized, &gif_dir, &mut rng).unwrap(),
            gif_dir.join("random_clip.gif")
        );

        std::fs::write(gif_dir.join("magnus_excitement.gif"), b"x").unwrap();
        let categorized = ReactionSelector::new(&gif_dir, &audio_dir);
        assert_eq!(
            legacy_gif(&puzzle(), &categorized, &gif_dir, &mut rng).unwrap(),
            gif_dir.join("magnus_excitement.gif")
        );
    }
}
