use crate::layout::{LegacyLayout, SegmentLayout};
use crate::{logi, logw};
use anyhow::{Context, Result};
use rand::Rng;
use rand::seq::SliceRandom;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub const SEGMENT_FPS: u32 = 30;
const AUDIO_RATE: u32 = 44_100;
const FADE_IN_SECONDS: f64 = 0.2;

async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    let status = cmd.status().await.context("Command execution failed")?;
    if !status.success() {
        return Err(anyhow::anyhow!("Command failed: {:?}", args));
    }

    Ok(())
}

fn strings<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn ffmpeg_prelude() -> Vec<String> {
    strings(["ffmpeg", "-y", "-hide_banner", "-loglevel", "error"])
}

fn h264_video_args() -> Vec<String> {
    strings([
        "-c:v", "libx264", "-pix_fmt", "yuv420p", "-preset", "veryfast", "-crf", "22",
    ])
}

fn aac_audio_args() -> Vec<String> {
    let mut args = strings(["-c:a", "aac", "-b:a", "192k", "-ac", "2"]);
    args.push("-ar".to_string());
    args.push(AUDIO_RATE.to_string());
    args
}

pub async fn ffprobe_video_dimensions(path: &Path) -> Result<(u32, u32)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe execution failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed on {}", path.display()));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    parse_dimensions(&text)
        .with_context(|| format!("Invalid dimensions {:?} for {}", text, path.display()))
}

fn parse_dimensions(text: &str) -> Option<(u32, u32)> {
    let mut parts = text.lines().next()?.split('x');
    let w = parts.next()?.trim().parse::<u32>().ok()?;
    let h = parts.next()?.trim().parse::<u32>().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

pub async fn ffprobe_duration_seconds(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe duration failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed on {}", path.display()));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.0 {
        return Err(anyhow::anyhow!("Invalid duration for {}", path.display()));
    }
    Ok(duration)
}

/// Encodes `frame_000.png, frame_001.png, ...` in `frames_dir` at `fps`.
pub async fn make_base_video(frames_dir: &Path, fps: u32, out_mp4: &Path) -> Result<bool> {
    let mut args = ffmpeg_prelude();
    args.extend([
        "-framerate".to_string(),
        fps.to_string(),
        "-start_number".to_string(),
        "0".to_string(),
        "-i".to_string(),
        frames_dir.join("frame_%03d.png").display().to_string(),
        "-vf".to_string(),
        "pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string(),
    ]);
    args.extend(h264_video_args());
    args.extend(["-r".to_string(), fps.to_string(), out_mp4.display().to_string()]);

    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

/// Audio files chosen to cover a video, in play order.
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub files: Vec<PathBuf>,
    /// Sum of the chosen files' durations; at least the video length unless `files` is empty.
    pub total: f64,
}

/// Draws random files until their cumulative duration covers `video_duration`.
pub fn plan_playlist<R: Rng + ?Sized>(
    candidates: &[(PathBuf, f64)],
    video_duration: f64,
    rng: &mut R,
) -> Playlist {
    let usable: Vec<&(PathBuf, f64)> = candidates.iter().filter(|(_, d)| *d > 0.0).collect();
    let mut files = Vec::new();
    let mut total = 0.0;

    while total < video_duration {
        let Some((file, duration)) = usable.choose(rng).map(|c| (*c).clone()) else {
            break;
        };
        files.push(file);
        total += duration;
    }

    Playlist { files, total }
}

/// Filter graph for the legacy composite: inputs are 0 = board video, 1 = GIF, 2.. = playlist.
pub fn legacy_filter_graph(
    layout: &LegacyLayout,
    target_w: u32,
    target_h: u32,
    duration: f64,
    audio_inputs: usize,
) -> String {
    let board = layout.board;
    let Some(gif) = layout.gif else {
        return format!("[0:v]scale={}:{},setsar=1[v]", board.width, board.height);
    };

    let mut graph = format!(
        "color=c=black:s={tw}x{th}:r={fps}:d={d:.3}[bg];\
         [0:v]scale={bw}:{bh},setsar=1[main];\
         [1:v]scale={gw}:{gh},setsar=1[gif];\
         [bg][main]overlay=x={bx}:y={by}:shortest=1[base];\
         [base][gif]overlay=x={gx}:y={gy}:shortest=1[v]",
        tw = target_w,
        th = target_h,
        fps = SEGMENT_FPS,
        d = duration,
        bw = board.width,
        bh = board.height,
        gw = gif.width,
        gh = gif.height,
        bx = board.x,
        by = board.y,
        gx = gif.x,
        gy = gif.y,
    );

    if audio_inputs > 0 {
        let mut labels = String::new();
        for i in 0..audio_inputs {
            write!(
                graph,
                ";[{}:a]aresample={},aformat=channel_layouts=stereo[a{}]",
                i + 2,
                AUDIO_RATE,
                i
            ).ok();
            write!(labels, "[a{}]", i).ok();
        }
        write!(
            graph,
            ";{}concat=n={}:v=0:a=1,atrim=0:{:.3},asetpts=PTS-STARTPTS[a]",
            labels, audio_inputs, duration
        ).ok();
    }

    graph
}

/// Board video below a looping GIF, over a random sound playlist. Board-only when there is no GIF room.
pub async fn composite_legacy(
    base_mp4: &Path,
    gif: &Path,
    playlist: &[PathBuf],
    layout: &LegacyLayout,
    target_w: u32,
    target_h: u32,
    duration: f64,
    out_mp4: &Path,
) -> Result<bool> {
    let mut args = ffmpeg_prelude();
    args.extend(["-i".to_string(), base_mp4.display().to_string()]);

    let audio_inputs = if layout.gif.is_some() {
        args.extend([
            "-ignore_loop".to_string(),
            "0".to_string(),
            "-i".to_string(),
            gif.display().to_string(),
        ]);
        for file in playlist {
            args.extend(["-i".to_string(), file.display().to_string()]);
        }
        playlist.len()
    } else {
        logw("Board fills the frame; writing board-only video.");
        0
    };

    args.extend([
        "-filter_complex".to_string(),
        legacy_filter_graph(layout, target_w, target_h, duration, audio_inputs),
        "-map".to_string(),
        "[v]".to_string(),
    ]);
    if audio_inputs > 0 {
        args.extend(["-map".to_string(), "[a]".to_string()]);
        args.extend(aac_audio_args());
    }
    args.extend(h264_video_args());
    args.extend([
        "-t".to_string(),
        format!("{:.3}", duration),
        "-movflags".to_string(),
        "+faststart".to_string(),
        out_mp4.display().to_string(),
    ]);

    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

/// One slice of a per-move video.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSpec {
    pub board_png: PathBuf,
    pub gif: PathBuf,
    pub audio: PathBuf,
    pub duration: f64,
    pub fade_in: bool,
    pub background: (u8, u8, u8),
    pub caption: Option<String>,
}

/// Escapes text for a single-quoted drawtext `text=` value.
pub fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\\\\\"),
            '\'' => out.push_str("'\\\\\\''"),
            ':' => out.push_str("\\:"),
            '%' => out.push_str("\\%"),
            _ => out.push(c),
        }
    }
    out
}

/// Inputs are 0 = color background, 1 = board still, 2 = GIF, 3 = audio.
pub fn segment_filter_graph(
    spec: &SegmentSpec,
    layout: &SegmentLayout,
    font: Option<&Path>,
) -> String {
    let fade = if spec.fade_in {
        format!(",fade=t=in:st=0:d={}", FADE_IN_SECONDS)
    } else {
        String::new()
    };

    let mut graph = format!(
        "[1:v]scale={b}:{b},setsar=1[board];\
         [2:v]scale=-2:{gh},setsar=1{fade}[gif];\
         [0:v][board]overlay=x={bx}:y={by}[t0];\
         [t0][gif]overlay=x=(main_w-overlay_w)/2:y={gy}:shortest=1[t1]",
        b = layout.board.width,
        gh = layout.gif_height,
        fade = fade,
        bx = layout.board.x,
        by = layout.board.y,
        gy = layout.gif_y,
    );

    match (font, spec.caption.as_deref()) {
        (Some(font), Some(caption)) if !caption.is_empty() => {
            write!(
                graph,
                ";[t1]drawtext=fontfile='{}':text='{}':fontsize=48:fontcolor=white:borderw=2:bordercolor=black:x=(w-text_w)/2:y=h-text_h-40[v]",
                escape_drawtext(&font.display().to_string()),
                escape_drawtext(caption)
            ).ok();
        }
        _ => graph.push_str(";[t1]null[v]"),
    }

    write!(
        graph,
        ";[3:a]aresample={},aformat=channel_layouts=stereo,atrim=0:{:.3},asetpts=PTS-STARTPTS[a]",
        AUDIO_RATE, spec.duration
    ).ok();
    graph
}

pub async fn render_segment(
    spec: &SegmentSpec,
    layout: &SegmentLayout,
    target_w: u32,
    target_h: u32,
    font: Option<&Path>,
    out_mp4: &Path,
) -> Result<bool> {
    let (r, g, b) = spec.background;
    let dur = format!("{:.3}", spec.duration);

    let mut args = ffmpeg_prelude();
    args.extend([
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!(
            "color=c=0x{:02X}{:02X}{:02X}:s={}x{}:r={}:d={}",
            r, g, b, target_w, target_h, SEGMENT_FPS, dur
        ),
        "-loop".to_string(),
        "1".to_string(),
        "-t".to_string(),
        dur.clone(),
        "-i".to_string(),
        spec.board_png.display().to_string(),
        "-ignore_loop".to_string(),
        "0".to_string(),
        "-t".to_string(),
        dur.clone(),
        "-i".to_string(),
        spec.gif.display().to_string(),
        "-stream_loop".to_string(),
        "-1".to_string(),
        "-t".to_string(),
        dur.clone(),
        "-i".to_string(),
        spec.audio.display().to_string(),
        "-filter_complex".to_string(),
        segment_filter_graph(spec, layout, font),
        "-map".to_string(),
        "[v]".to_string(),
        "-map".to_string(),
        "[a]".to_string(),
    ]);
    args.extend(h264_video_args());
    args.extend(aac_audio_args());
    args.extend([
        "-r".to_string(),
        SEGMENT_FPS.to_string(),
        "-t".to_string(),
        dur,
        out_mp4.display().to_string(),
    ]);

    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

/// Concat demuxer list with paths relative to the list file's directory.
pub fn concat_list(list_dir: &Path, parts: &[PathBuf]) -> String {
    let mut out = String::new();
    for part in parts {
        let rel = pathdiff::diff_paths(part, list_dir).unwrap_or_else(|| part.clone());
        let quoted = rel.display().to_string().replace('\'', "'\\''");
        writeln!(out, "file '{}'", quoted).ok();
    }
    out
}

pub async fn concat_videos(parts: &[PathBuf], work_dir: &Path, out_mp4: &Path) -> Result<bool> {
    if parts.is_empty() {
        return Ok(false);
    }

    let list_txt = work_dir.join("segments.txt");
    tokio::fs::write(&list_txt, concat_list(work_dir, parts))
        .await
        .with_context(|| format!("Failed to write {}", list_txt.display()))?;

    let mut args = ffmpeg_prelude();
    args.extend([
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_txt.display().to_string(),
    ]);
    args.extend(h264_video_args());
    args.extend(aac_audio_args());
    args.extend([
        "-movflags".to_string(),
        "+faststart".to_string(),
        out_mp4.display().to_string(),
    ]);

    logi(format!("Concatenating {} segments", parts.len()));
    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

/// Lays `narration` over the start of the video's own audio track.
pub async fn mix_narration(video_in: &Path, narration: &Path, video_out: &Path) -> Result<bool> {
    let mut args = ffmpeg_prelude();
    args.extend([
        "-i".to_string(),
        video_in.display().to_string(),
        "-i".to_string(),
        narration.display().to_string(),
        "-filter_complex".to_string(),
        "[0:a]volume=0.6[a0];[1:a]volume=1.8[a1];[a0][a1]amix=inputs=2:duration=first:dropout_transition=2[a]".to_string(),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "[a]".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
    ]);
    args.extend(aac_audio_args());
    args.extend([
        "-movflags".to_string(),
        "+faststart".to_string(),
        video_out.display().to_string(),
    ]);

    run_cmd(&args).await?;
    Ok(video_out.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn dimensions_are_parsed() {
        assert_eq!(parse_dimensions("480x270\n"), Some((480, 270)));
        assert_eq!(parse_dimensions("0x270"), None);
        assert_eq!(parse_dimensions("N/A"), None);
    }

    #[test]
    fn playlist_covers_the_video() {
        let mut rng = StdRng::seed_from_u64(5);
        let candidates = vec![
            (PathBuf::from("a.mp3"), 0.9),
            (PathBuf::from("b.mp3"), 2.8),
            (PathBuf::from("c.mp3"), 4.4),
        ];
        let playlist = plan_playlist(&candidates, 10.0, &mut rng);
        assert!(playlist.total >= 10.0);
        assert!(!playlist.files.is_empty());

        let without_last: f64 = playlist.files[..playlist.files.len() - 1]
            .iter()
            .map(|f| candidates.iter().find(|(p, _)| p == f).unwrap().1)
            .sum();
        assert!(without_last < 10.0);
    }

    #[test]
    fn playlist_without_usable_audio_is_empty() {
        let mut rng = StdRng::seed_from_u64(5);
        let playlist = plan_playlist(&[(PathBuf::from("x.mp3"), 0.0)], 5.0, &mut rng);
        assert!(playlist.files.is_empty());
        assert_eq!(playlist.total, 0.0);
    }

    #[test]
    fn legacy_graph_stacks_gif_over_board() {
        let layout = LegacyLayout::compute(1080, 1080, 480, 270, 1080, 1920);
        let graph = legacy_filter_graph(&layout, 1080, 1920, 5.0, 2);
        assert!(graph.contains("color=c=black:s=1080x1920"));
        assert!(graph.contains("[bg][main]overlay=x=0:y=840"));
        assert!(graph.contains("[1:v]scale=1080:606"));
        assert!(graph.contains("[2:a]aresample"));
        assert!(graph.contains("[3:a]aresample"));
        assert!(graph.contains("[a0][a1]concat=n=2:v=0:a=1,atrim=0:5.000"));
    }

    #[test]
    fn legacy_graph_board_only() {
        let layout = LegacyLayout::compute(500, 1000, 100, 100, 1080, 1920);
        let graph = legacy_filter_graph(&layout, 1080, 1920, 5.0, 0);
        assert_eq!(graph, "[0:v]scale=1080:2160,setsar=1[v]");
    }

    fn spec(fade_in: bool, caption: Option<&str>) -> SegmentSpec {
        SegmentSpec {
            board_png: PathBuf::from("frame_000.png"),
            gif: PathBuf::from("hikaru_shocked.gif"),
            audio: PathBuf::from("vine-boom.mp3"),
            duration: 3.24,
            fade_in,
            background: (20, 60, 20),
            caption: caption.map(str::to_string),
        }
    }

    #[test]
    fn segment_graph_fade_and_caption() {
        let layout = SegmentLayout::compute(1080, 1920);
        let plain = segment_filter_graph(&spec(false, Some("Move 2")), &layout, None);
        assert!(!plain.contains("fade="));
        assert!(plain.contains("[t1]null[v]"));
        assert!(plain.contains("overlay=x=-36:y=50"));
        assert!(plain.contains("atrim=0:3.240"));

        let font = PathBuf::from("/fonts/Arial Bold.ttf");
        let fancy = segment_filter_graph(&spec(true, Some("Solution: Qh5!")), &layout, Some(&font));
        assert!(fancy.contains("fade=t=in:st=0:d=0.2"));
        assert!(fancy.contains("text='Solution\\: Qh5!'"));
        assert!(fancy.contains("fontfile='/fonts/Arial Bold.ttf'"));
    }

    #[test]
    fn drawtext_escaping() {
        assert_eq!(escape_drawtext("50%"), "50\\%");
        assert_eq!(escape_drawtext("a:b"), "a\\:b");
    }

    #[test]
    fn concat_list_uses_relative_paths() {
        let dir = PathBuf::from("/tmp/work_3");
        let parts = vec![dir.join("seg_000.mp4"), dir.join("seg_001.mp4")];
        assert_eq!(
            concat_list(&dir, &parts),
            "file 'seg_000.mp4'\nfile 'seg_001.mp4'\n"
        );
    }
}
