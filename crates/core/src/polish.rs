//! Turns the draft into the final artifact: burned-in captions plus the mixed
//! audio bed.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::process::Command;
use tracing::info;

use crate::{
    audio::{AudioLayer, PcmTrack, mix_layers},
    config::{AudioFallback, CaptionStyle, ReelConfig},
    error::{ReelError, Result},
    media::{decode_to_wav, probe_duration, run_tool},
    overlay::{CaptionBlock, drawtext_filter, layout_captions},
    script::{Script, Segment},
};

/// How caption timing relates to the draft.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptionTiming {
    /// Use the script's own durations.
    Nominal,
    /// Rescale durations to the measured length of the draft.
    FitVideo,
}

/// Audio sources for one polish pass. Any of them may be absent.
#[derive(Clone, Debug, Default)]
pub struct AudioInputs {
    pub voice: Option<PcmTrack>,
    pub music: Option<PathBuf>,
    pub song: Option<PathBuf>,
}

impl AudioInputs {
    pub fn is_empty(&self) -> bool {
        self.voice.is_none() && self.music.is_none() && self.song.is_none()
    }
}

pub struct PolishRequest<'a> {
    pub script: &'a Script,
    pub draft_path: &'a Path,
    pub output_path: &'a Path,
    pub timing: CaptionTiming,
    pub audio: &'a AudioInputs,
}

/// Segments as captioned on a video `video_duration` seconds long.
///
/// Evaluators sample frames from the same segments so each frame shows the
/// caption it is labelled with.
pub fn caption_segments(
    script: &Script,
    timing: CaptionTiming,
    video_duration: f64,
) -> Result<Vec<Segment>> {
    match timing {
        CaptionTiming::Nominal => Ok(script.segments().to_vec()),
        CaptionTiming::FitVideo => {
            let total = (video_duration.round() as u32).max(script.len() as u32);
            script.retimed_to(total)
        }
    }
}

/// Write each caption line to its own text file and chain one `drawtext` per line.
///
/// Returns `null` when there is nothing to draw.
pub async fn caption_filter_chain(
    blocks: &[CaptionBlock],
    scratch: &Path,
    style: &CaptionStyle,
) -> Result<String> {
    let mut filters = Vec::new();
    for block in blocks {
        for (n, line) in block.lines.iter().enumerate() {
            let textfile = scratch.join(format!("caption_{:02}_{}.txt", block.segment, n));
            tokio::fs::write(&textfile, &line.text).await?;
            filters.push(drawtext_filter(block, line, &textfile, style));
        }
    }

    if filters.is_empty() {
        return Ok("null".to_string());
    }
    Ok(filters.join(","))
}

async fn decoded_layer(
    name: &'static str,
    source: &Path,
    scratch: &Path,
    config: &ReelConfig,
    gain: f32,
) -> Result<AudioLayer> {
    let wav = scratch.join(format!("{}.wav", name));
    decode_to_wav(source, &wav, &config.audio, None).await?;
    Ok(AudioLayer {
        name,
        track: PcmTrack::read_wav(&wav)?,
        gain,
    })
}

async fn audio_layers(inputs: &AudioInputs, scratch: &Path, config: &ReelConfig) -> Result<Vec<AudioLayer>> {
    let settings = &config.audio;
    let mut layers = Vec::new();

    if let Some(song) = &inputs.song {
        layers.push(decoded_layer("song", song, scratch, config, settings.song_gain).await?);
    }
    if let Some(music) = &inputs.music {
        layers.push(decoded_layer("music", music, scratch, config, settings.music_gain).await?);
    }
    if let Some(voice) = &inputs.voice {
        layers.push(AudioLayer {
            name: "voice",
            track: voice.clone(),
            gain: settings.voice_gain,
        });
    }
    Ok(layers)
}

/// ffmpeg audio mapping for the final encode.
pub fn audio_mapping(has_mix: bool, fallback: AudioFallback) -> Vec<&'static str> {
    match (has_mix, fallback) {
        (true, _) => vec!["-map", "1:a", "-c:a", "aac"],
        (false, AudioFallback::KeepDraftAudio) => vec!["-map", "0:a?", "-c:a", "aac"],
        (false, AudioFallback::Silent) => vec!["-an"],
    }
}

/// Caption and mix the draft into `output_path`, overwriting any earlier final.
pub async fn polish(request: PolishRequest<'_>, config: &ReelConfig) -> Result<PathBuf> {
    if !request.draft_path.exists() {
        return Err(ReelError::DraftMissing {
            path: request.draft_path.to_path_buf(),
        });
    }

    let video_duration = probe_duration(request.draft_path).await?;
    let segments = caption_segments(request.script, request.timing, video_duration)?;
    let blocks = layout_captions(&segments, config.frame, &config.caption);

    let scratch = TempDir::new()?;
    let video_filter = caption_filter_chain(&blocks, scratch.path(), &config.caption).await?;

    let layers = audio_layers(request.audio, scratch.path(), config).await?;
    let layer_names: Vec<&str> = layers.iter().map(|l| l.name).collect();
    let mix_path = scratch.path().join("mix.wav");
    let has_mix = match mix_layers(&layers, video_duration)? {
        Some(mix) => {
            mix.write_wav(&mix_path)?;
            true
        }
        None => false,
    };

    if let Some(parent) = request.output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut command = Command::new("ffmpeg");
    command.arg("-y").arg("-i").arg(request.draft_path);
    if has_mix {
        command.arg("-i").arg(&mix_path);
    }
    command
        .arg("-filter:v")
        .arg(video_filter)
        .arg("-map")
        .arg("0:v")
        .args(audio_mapping(has_mix, config.audio.fallback))
        .arg("-c:v")
        .arg("libx264")
        .arg("-pix_fmt")
        .arg("yuv420p")
        .arg(request.output_path);

    run_tool("ffmpeg", &mut command).await?;
    info!(
        "Polished {} ({:.1}s, {} captions, audio: {})",
        request.output_path.display(),
        video_duration,
        blocks.len(),
        if layer_names.is_empty() {
            "none".to_string()
        } else {
            layer_names.join("+")
        }
    );

    Ok(request.output_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrameSize;

    const SCRIPT: &str = "SEGMENT: desk\nTEXT: Small habits compound into remarkable results\nDURATION: 5\n---\n\
                          SEGMENT: ocean\nDURATION: 4\n---\n\
                          SEGMENT: runner\nTEXT: Start today\nDURATION: 6\n";

    #[tokio::test]
    async fn polishing_without_a_draft_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let script = Script::parse(SCRIPT).unwrap();
        let draft = dir.path().join("demo_draft.mp4");
        let output = dir.path().join("demo_final.mp4");

        let err = polish(
            PolishRequest {
                script: &script,
                draft_path: &draft,
                output_path: &output,
                timing: CaptionTiming::Nominal,
                audio: &AudioInputs::default(),
            },
            &ReelConfig::rooted_at(dir.path()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ReelError::DraftMissing { .. }));
        assert!(err.to_string().contains("Run assemble first"));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn one_drawtext_per_caption_line() {
        let dir = tempfile::tempdir().unwrap();
        let style = CaptionStyle::default();
        let script = Script::parse(SCRIPT).unwrap();
        let blocks = layout_captions(script.segments(), FrameSize::VERTICAL_1080P, &style);

        let chain = caption_filter_chain(&blocks, dir.path(), &style).await.unwrap();

        assert_eq!(chain.matches("drawtext=").count(), 3);
        assert!(chain.contains("enable='between(t,9.000,15.000)'"));
        let first = std::fs::read_to_string(dir.path().join("caption_00_0.txt")).unwrap();
        assert_eq!(first, "Small habits compound");
    }

    #[tokio::test]
    async fn nothing_to_draw_is_a_null_filter() {
        let dir = tempfile::tempdir().unwrap();
        let chain = caption_filter_chain(&[], dir.path(), &CaptionStyle::default())
            .await
            .unwrap();
        assert_eq!(chain, "null");
    }

    #[test]
    fn fit_video_rescales_captions_to_the_draft() {
        let script = Script::parse(SCRIPT).unwrap();
        let nominal = caption_segments(&script, CaptionTiming::Nominal, 30.2).unwrap();
        assert_eq!(nominal.iter().map(|s| s.duration_seconds()).sum::<u32>(), 15);

        let fitted = caption_segments(&script, CaptionTiming::FitVideo, 30.2).unwrap();
        assert_eq!(fitted.iter().map(|s| s.duration_seconds()).sum::<u32>(), 30);
    }

    #[test]
    fn no_layers_follow_the_fallback() {
        assert_eq!(audio_mapping(false, AudioFallback::Silent), vec!["-an"]);
        assert_eq!(
            audio_mapping(false, AudioFallback::KeepDraftAudio),
            vec!["-map", "0:a?", "-c:a", "aac"]
        );
        assert_eq!(audio_mapping(true, AudioFallback::Silent)[1], "1:a");
    }
}
