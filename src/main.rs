use anyhow::{Context, Result};
use chess_puzzle_shorts::api::TextGenerator;
use chess_puzzle_shorts::api::gemini::GeminiClient;
use chess_puzzle_shorts::config::{Config, VideoMode};
use chess_puzzle_shorts::generator::{self, run_batch};
use chess_puzzle_shorts::{init, platform, story};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chess-puzzle-shorts")]
#[command(about = "Turns Lichess puzzles into vertical reaction videos", long_about = None)]
struct Args {
    /// Number of puzzles to render (overrides NUM_VIDEOS)
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// First CSV row to render (overrides START_INDEX)
    #[arg(short, long)]
    start: Option<usize>,

    /// Concurrent jobs (overrides MAX_WORKERS)
    #[arg(short, long)]
    workers: Option<usize>,

    /// legacy, enhanced, story or analyzed (overrides VIDEO_MODE)
    #[arg(short, long)]
    mode: Option<VideoMode>,

    /// Open the output folder when the batch finishes
    #[arg(long)]
    open: bool,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Render the videos (default)
    Generate,
    /// Write the board PNGs of one puzzle without making a video
    Frames {
        index: usize,
        #[arg(short, long, default_value = "frames")]
        out: PathBuf,
    },
    /// Print the story JSON for one puzzle
    Story { index: usize },
}

fn apply_overrides(cfg: &mut Config, args: &Args) -> Result<()> {
    if let Some(n) = args.count {
        cfg.num_videos = n;
    }
    if let Some(s) = args.start {
        cfg.start_index = s;
    }
    if let Some(w) = args.workers {
        cfg.max_workers = w;
    }
    if let Some(m) = args.mode {
        cfg.mode = m;
    }
    cfg.validate()
}

async fn generate(cfg: Config, open: bool) -> Result<i32> {
    init::ensure_directories(&cfg).await?;
    if !init::check_ffmpeg().await {
        tracing::warn!("ffmpeg/ffprobe not found in PATH. Please install FFmpeg.");
    }

    let output_dir = PathBuf::from(&cfg.output_dir);
    let report = run_batch(cfg).await?;

    for (index, path) in &report.succeeded {
        tracing::info!(index, "{}", path.display());
    }
    for (index, err) in &report.failed {
        tracing::warn!(index, "failed: {}", err);
    }
    println!(
        "Done: {} of {} videos written to {}",
        report.succeeded.len(),
        report.total(),
        output_dir.display()
    );

    if open {
        if let Err(e) = platform::open_folder(&output_dir) {
            tracing::warn!("{:#}", e);
        }
    }

    Ok(if report.failed.is_empty() { 0 } else { 1 })
}

async fn frames(cfg: &Config, index: usize, out: &Path) -> Result<i32> {
    let (pz, files) = generator::export_frames(cfg, index, out).await?;
    println!("{} frames for {} in {}", files.len(), pz.puzzle_id, out.display());
    Ok(0)
}

async fn print_story(cfg: &Config, index: usize) -> Result<i32> {
    let pz = generator::load_puzzle(cfg, index).await?;
    let http = reqwest::Client::new();
    let gemini = GeminiClient::from_config(&http, cfg);
    let generator = gemini.as_ref().map(|g| g as &dyn TextGenerator);
    let story = story::generate_story(&pz, cfg.target_video_duration, generator).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&story).context("Failed to serialize story")?
    );
    Ok(0)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut cfg = Config::from_env()?;
    apply_overrides(&mut cfg, &args)?;

    let code = match &args.command {
        None | Some(Cmd::Generate) => generate(cfg, args.open).await?,
        Some(Cmd::Frames { index, out }) => frames(&cfg, *index, out).await?,
        Some(Cmd::Story { index }) => print_story(&cfg, *index).await?,
    };
    std::process::exit(code);
}
