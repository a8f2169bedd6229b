use std::{path::Path, process::Output};

use tokio::process::Command;
use tracing::debug;

use crate::{
    config::AudioSettings,
    error::{ReelError, Result},
    reconcile::{MediaAsset, atempo_chain},
};

/// Run an ffmpeg-family tool, turning a non-zero exit into `MediaTool`.
pub(crate) async fn run_tool(tool: &'static str, command: &mut Command) -> Result<Output> {
    debug!("Running {:?}", command.as_std());
    let output = command.output().await?;

    if !output.status.success() {
        return Err(ReelError::MediaTool {
            tool,
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

fn parse_duration_output(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .find_map(|line| line.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

fn parse_dimensions_output(stdout: &str) -> Option<(u32, u32)> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (w, h) = line.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Container duration in seconds, via ffprobe.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let output = run_tool(
        "ffprobe",
        Command::new("ffprobe")
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(path),
    )
    .await?;

    parse_duration_output(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        ReelError::MediaTool {
            tool: "ffprobe",
            reason: format!("no duration reported for {}", path.display()),
        }
    })
}

/// Width and height of the first video stream, if there is one.
pub async fn probe_dimensions(path: &Path) -> Result<Option<(u32, u32)>> {
    let output = run_tool(
        "ffprobe",
        Command::new("ffprobe")
            .arg("-v")
            .arg("error")
            .arg("-select_streams")
            .arg("v:0")
            .arg("-show_entries")
            .arg("stream=width,height")
            .arg("-of")
            .arg("csv=s=x:p=0")
            .arg(path),
    )
    .await?;

    Ok(parse_dimensions_output(&String::from_utf8_lossy(
        &output.stdout,
    )))
}

/// Whether the file carries at least one audio stream.
pub async fn probe_has_audio(path: &Path) -> Result<bool> {
    let output = run_tool(
        "ffprobe",
        Command::new("ffprobe")
            .arg("-v")
            .arg("error")
            .arg("-select_streams")
            .arg("a:0")
            .arg("-show_entries")
            .arg("stream=codec_type")
            .arg("-of")
            .arg("csv=p=0")
            .arg(path),
    )
    .await?;

    Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
}

pub async fn probe_asset(path: &Path) -> Result<MediaAsset> {
    Ok(MediaAsset {
        path: path.to_path_buf(),
        duration: probe_duration(path).await?,
        dimensions: probe_dimensions(path).await?,
        has_audio: probe_has_audio(path).await?,
    })
}

/// Grab one still frame as PNG.
pub async fn extract_frame(video_path: &Path, at_seconds: f64, frame_path: &Path) -> Result<()> {
    run_tool(
        "ffmpeg",
        Command::new("ffmpeg")
            .arg("-y")
            .arg("-ss")
            .arg(format!("{:.3}", at_seconds.max(0.0)))
            .arg("-i")
            .arg(video_path)
            .arg("-frames:v")
            .arg("1")
            .arg(frame_path),
    )
    .await?;
    Ok(())
}

/// Decode any audio input to PCM WAV in the mixer's format, optionally tempo-shifted.
pub async fn decode_to_wav(
    input: &Path,
    output: &Path,
    settings: &AudioSettings,
    tempo: Option<f64>,
) -> Result<()> {
    let mut command = Command::new("ffmpeg");
    command.arg("-y").arg("-i").arg(input).arg("-vn");
    if let Some(ratio) = tempo {
        command.arg("-af").arg(atempo_chain(ratio));
    }
    command
        .arg("-acodec")
        .arg("pcm_s16le")
        .arg("-ar")
        .arg(settings.sample_rate.to_string())
        .arg("-ac")
        .arg(settings.channels.to_string())
        .arg(output);

    run_tool("ffmpeg", &mut command).await?;
    Ok(())
}
