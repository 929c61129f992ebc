use crate::analyzer::{GeminiAnalyzer, probe_audio_durations};
use crate::api::TextGenerator;
use crate::api::gemini::GeminiClient;
use crate::config::{Config, VideoMode};
use crate::puzzle::{self, Puzzle};
use crate::reaction::{EnhancedReactionSelector, ReactionSelector, list_media};
use crate::render;
use crate::story;
use crate::template;
use crate::video::VideoEditor;
use crate::{GeneratorLogHook, logi, logok, logw, set_log_hook};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use walkdir::WalkDir;

async fn dir_exists(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

pub async fn ensure_directory(path: &Path) -> Result<()> {
    if !dir_exists(path).await {
        fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;
    }
    Ok(())
}

async fn clear_directory_contents(dir_path: &Path) -> Result<()> {
    for entry in WalkDir::new(dir_path).min_depth(1).contents_first(true) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_dir() {
            fs::remove_dir(path).await.ok();
        } else {
            fs::remove_file(path).await.ok();
        }
    }
    Ok(())
}

/// Leaves `path` as an existing, empty directory.
pub async fn prepare_directory(path: &Path) -> Result<()> {
    if dir_exists(path).await {
        clear_directory_contents(path).await?;
        fs::remove_dir(path).await.ok();
    }
    fs::create_dir_all(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))
}

/// `{dir}/{prefix}_{YYYYmmdd_HHMMSS_micros}{suffix}`
pub fn timestamped_path(base_dir: &Path, prefix: &str, suffix: &str) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%6f");
    base_dir.join(format!("{}_{}{}", prefix, timestamp, suffix))
}

pub fn job_temp_dir(cfg: &Config, index: usize) -> PathBuf {
    PathBuf::from(format!("{}_{}", cfg.temp_png_dir, index))
}

pub fn job_output_path(cfg: &Config, index: usize) -> PathBuf {
    Path::new(&cfg.output_dir).join(format!("{}.mp4", index))
}

/// Shared, read-only state for every job of a batch.
pub struct JobContext {
    pub cfg: Config,
    pub http: reqwest::Client,
    pub basic_selector: ReactionSelector,
    pub selector: EnhancedReactionSelector,
    pub text_generator: Option<Arc<dyn TextGenerator>>,
    pub analyzer: GeminiAnalyzer,
}

impl JobContext {
    pub fn new(cfg: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        let text_generator: Option<Arc<dyn TextGenerator>> =
            match GeminiClient::from_config(&http, &cfg) {
                Some(client) => {
                    logi(format!("Gemini enabled (model {})", client.model()));
                    Some(Arc::new(client))
                }
                None => None,
            };

        let gif_dir = Path::new(&cfg.reaction_gif_dir);
        let audio_dir = Path::new(&cfg.reaction_audio_dir);
        let basic_selector = ReactionSelector::new(gif_dir, audio_dir);
        let selector = EnhancedReactionSelector::new(gif_dir, audio_dir);
        let analyzer = GeminiAnalyzer::new(text_generator.clone(), &cfg.gemini_log_path);

        Ok(Self {
            cfg,
            http,
            basic_selector,
            selector,
            text_generator,
            analyzer,
        })
    }
}

pub async fn load_puzzle(cfg: &Config, index: usize) -> Result<Puzzle> {
    let csv = PathBuf::from(&cfg.csv_file_path);
    tokio::task::spawn_blocking(move || puzzle::get_puzzle(&csv, index))
        .await
        .context("Puzzle loader panicked")?
}

async fn render_frames(puzzle: &Puzzle, temp_dir: &Path, size: u32) -> Result<Vec<PathBuf>> {
    let fen = puzzle.fen.clone();
    let moves = puzzle.moves.clone();
    let dir = temp_dir.to_path_buf();
    tokio::task::spawn_blocking(move || render::render_board_sequence(&fen, &moves, &dir, size))
        .await
        .context("Frame renderer panicked")?
}

/// Writes puzzle `index`'s frames into `out_dir`. Other files already there are left alone.
pub async fn export_frames(cfg: &Config, index: usize, out_dir: &Path) -> Result<(Puzzle, Vec<PathBuf>)> {
    ensure_directory(out_dir).await?;
    let puzzle = load_puzzle(cfg, index).await?;
    let files = render_frames(&puzzle, out_dir, cfg.board_size).await?;
    Ok((puzzle, files))
}

async fn build_video(ctx: &JobContext, index: usize, temp_dir: &Path, out_mp4: &Path) -> Result<bool> {
    let cfg = &ctx.cfg;
    let puzzle = load_puzzle(cfg, index).await?;
    logi(format!(
        "Puzzle {} (#{}): {} ({}), {} moves, {}",
        puzzle.puzzle_id,
        index,
        template::difficulty_badge(&puzzle),
        template::difficulty_color(puzzle.rating).name(),
        puzzle.moves.len(),
        template::theme_line(&puzzle)
    ));

    let png_files = render_frames(&puzzle, temp_dir, cfg.board_size).await?;
    logok(format!("Rendered {} frames for #{}", png_files.len(), index));

    let editor = VideoEditor::new(cfg, &ctx.http, temp_dir);
    let made = match cfg.mode {
        VideoMode::Legacy => {
            editor
                .render_legacy(&puzzle, &png_files, &ctx.basic_selector, out_mp4)
                .await?
        }
        VideoMode::Enhanced => {
            editor
                .render_enhanced(&puzzle, &png_files, &ctx.selector, out_mp4)
                .await?
        }
        VideoMode::Story => {
            let story = story::generate_story(
                &puzzle,
                cfg.target_video_duration,
                ctx.text_generator.as_deref(),
            )
            .await;
            editor.render_story(&puzzle, &png_files, &story, out_mp4).await?
        }
        VideoMode::Analyzed => {
            let gifs = list_media(Path::new(&cfg.reaction_gif_dir), "gif");
            let audio = list_media(Path::new(&cfg.reaction_audio_dir), "mp3");
            let durations = probe_audio_durations(&audio).await;
            let analysis = ctx
                .analyzer
                .analyze_puzzle(&puzzle, &gifs, &audio, &durations)
                .await;
            editor
                .render_analyzed(&puzzle, &png_files, &analysis, out_mp4)
                .await?
        }
    };

    if made && cfg.narrate_hook {
        if let Err(e) = editor.narrate_hook(&puzzle, out_mp4).await {
            logw(format!("Hook narration failed for #{}: {:#}", index, e));
        }
    }

    Ok(made)
}

/// Renders puzzle `index` to `{output_dir}/{index}.mp4`. The job's temp directory is removed either way.
pub async fn generate_single_video(index: usize, ctx: &JobContext) -> Result<PathBuf> {
    let temp_dir = job_temp_dir(&ctx.cfg, index);
    let out_mp4 = job_output_path(&ctx.cfg, index);

    prepare_directory(&temp_dir).await?;
    ensure_directory(Path::new(&ctx.cfg.output_dir)).await?;

    let result = build_video(ctx, index, &temp_dir, &out_mp4).await;

    if let Err(e) = fs::remove_dir_all(&temp_dir).await {
        logw(format!("Could not remove {}: {}", temp_dir.display(), e));
    }

    if !result? {
        anyhow::bail!("No video produced for puzzle #{}", index);
    }
    logok(format!("Video created: {}", out_mp4.display()));
    Ok(out_mp4)
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<(usize, PathBuf)>,
    pub failed: Vec<(usize, String)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

type JobOutcome = (usize, Result<PathBuf>);

fn record_outcome(
    report: &mut BatchReport,
    job_index: &HashMap<task::Id, usize>,
    joined: Result<(task::Id, JobOutcome), JoinError>,
) {
    match joined {
        Ok((_, (index, Ok(path)))) => report.succeeded.push((index, path)),
        Ok((_, (index, Err(e)))) => {
            logw(format!("Puzzle #{} failed: {:#}", index, e));
            report.failed.push((index, format!("{:#}", e)));
        }
        Err(e) => match job_index.get(&e.id()) {
            Some(&index) => {
                logw(format!("Puzzle #{} worker aborted: {}", index, e));
                report.failed.push((index, format!("worker aborted: {}", e)));
            }
            None => logw(format!("Unknown worker aborted: {}", e)),
        },
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏ ");
    pb.set_style(style);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Generates `num_videos` puzzles from `start_index`, at most `max_workers` at a time.
pub async fn run_batch(cfg: Config) -> Result<BatchReport> {
    let start = cfg.start_index;
    let count = cfg.num_videos;
    let workers = cfg.max_workers.max(1);
    let ctx = Arc::new(JobContext::new(cfg)?);

    logi(format!(
        "Generating {} videos from index {} ({} mode, {} workers)",
        count, start, ctx.cfg.mode, workers
    ));

    let pb = progress_bar(count as u64);
    let hook_pb = pb.clone();
    let hook: GeneratorLogHook = Arc::new(Mutex::new(move |line: &str| hook_pb.println(line)));
    set_log_hook(Some(hook));

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut jobs = JoinSet::new();
    let mut job_index: HashMap<task::Id, usize> = HashMap::new();
    let mut report = BatchReport::default();
    for index in start..start + count {
        let permit = semaphore.clone().acquire_owned().await?;
        let ctx = ctx.clone();
        let job_pb = pb.clone();
        let handle = jobs.spawn(async move {
            job_pb.set_message(format!("#{}", index));
            let result = generate_single_video(index, &ctx).await;
            drop(permit);
            (index, result)
        });
        job_index.insert(handle.id(), index);

        while let Some(joined) = jobs.try_join_next_with_id() {
            record_outcome(&mut report, &job_index, joined);
            pb.inc(1);
        }
    }

    while let Some(joined) = jobs.join_next_with_id().await {
        record_outcome(&mut report, &job_index, joined);
        pb.inc(1);
    }

    set_log_hook(None);
    pb.finish_and_clear();
    report.succeeded.sort_by_key(|(i, _)| *i);
    report.failed.sort_by_key(|(i, _)| *i);
    Ok(report)
}
