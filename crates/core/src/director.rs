//! Renders a planned [`Timeline`] into the draft video.

use std::path::Path;

use tokio::process::Command;
use tracing::info;

use crate::{
    artifacts::find_clips_in_order,
    config::{AudioSettings, FrameSize, ReelConfig},
    error::{ReelError, Result},
    media::{probe_asset, run_tool},
    reconcile::{Timeline, fill_crop, plan_per_segment, plan_shared},
    script::Segment,
};

fn channel_layout(channels: u16) -> &'static str {
    if channels == 1 { "mono" } else { "stereo" }
}

/// `filter_complex` graph for a timeline whose slice `i` is fed by input `i`.
///
/// Every slice is trimmed, scaled to fill and cropped to `frame`, and given an
/// audio leg (its own audio, or silence for clips without any) so the concat
/// lines up. Output pads are `[v]` and `[a]`.
pub fn draft_filter_graph(
    timeline: &Timeline,
    frame: FrameSize,
    fps: u32,
    audio: &AudioSettings,
) -> Result<String> {
    let layout = channel_layout(audio.channels);
    let mut chains = Vec::new();
    let mut pads = String::new();

    for (i, slice) in timeline.slices().iter().enumerate() {
        let asset = timeline.asset_for(slice);
        let dimensions = asset.dimensions.ok_or_else(|| ReelError::InvalidInput {
            reason: format!("{} has no video stream", asset.path.display()),
        })?;

        chains.push(format!(
            "[{i}:v]trim=duration={d:.3},setpts=PTS-STARTPTS,{crop},fps={fps}[v{i}]",
            i = i,
            d = slice.duration,
            crop = fill_crop(dimensions, frame).filter(),
            fps = fps,
        ));
        if asset.has_audio {
            chains.push(format!(
                "[{i}:a]atrim=duration={d:.3},asetpts=PTS-STARTPTS,aformat=sample_rates={rate}:channel_layouts={layout}[a{i}]",
                i = i,
                d = slice.duration,
                rate = audio.sample_rate,
                layout = layout,
            ));
        } else {
            chains.push(format!(
                "anullsrc=r={rate}:cl={layout},atrim=duration={d:.3}[a{i}]",
                i = i,
                d = slice.duration,
                rate = audio.sample_rate,
                layout = layout,
            ));
        }
        pads.push_str(&format!("[v{i}][a{i}]"));
    }

    chains.push(format!(
        "{}concat=n={}:v=1:a=1[v][a]",
        pads,
        timeline.slices().len()
    ));
    Ok(chains.join(";"))
}

/// Encode the timeline to `output_path`.
pub async fn render_draft(timeline: &Timeline, config: &ReelConfig, output_path: &Path) -> Result<()> {
    let graph = draft_filter_graph(timeline, config.frame, config.fps, &config.audio)?;
    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut command = Command::new("ffmpeg");
    command.arg("-y");
    for slice in timeline.slices() {
        command.arg("-i").arg(&timeline.asset_for(slice).path);
    }
    command
        .arg("-filter_complex")
        .arg(graph)
        .arg("-map")
        .arg("[v]")
        .arg("-map")
        .arg("[a]")
        .arg("-c:v")
        .arg("libx264")
        .arg("-pix_fmt")
        .arg("yuv420p")
        .arg("-c:a")
        .arg("aac")
        .arg(output_path);

    run_tool("ffmpeg", &mut command).await?;
    info!(
        "Draft rendered to {} ({:.1}s, {} slices)",
        output_path.display(),
        timeline.duration(),
        timeline.slices().len()
    );
    Ok(())
}

/// One clip per segment, in segment order.
pub async fn assemble_per_segment(
    segments: &[Segment],
    clips_dir: &Path,
    config: &ReelConfig,
    output_path: &Path,
) -> Result<Timeline> {
    let clips = find_clips_in_order(clips_dir);
    if clips.len() < segments.len() {
        return Err(ReelError::NotEnoughClips {
            found: clips.len(),
            needed: segments.len(),
        });
    }

    let mut assets = Vec::with_capacity(segments.len());
    for clip in clips.iter().take(segments.len()) {
        assets.push(probe_asset(clip).await?);
    }

    let timeline = plan_per_segment(segments, &assets)?;
    render_draft(&timeline, config, output_path).await?;
    Ok(timeline)
}

/// The first clip alone, tiled or trimmed to exactly `target` seconds.
pub async fn assemble_shared(
    clips_dir: &Path,
    target: f64,
    config: &ReelConfig,
    output_path: &Path,
) -> Result<Timeline> {
    let clip = find_clips_in_order(clips_dir)
        .into_iter()
        .next()
        .ok_or(ReelError::NotEnoughClips {
            found: 0,
            needed: 1,
        })?;

    let timeline = plan_shared(probe_asset(&clip).await?, target)?;
    render_draft(&timeline, config, output_path).await?;
    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::reconcile::MediaAsset;

    fn asset(name: &str, duration: f64, has_audio: bool) -> MediaAsset {
        MediaAsset {
            path: PathBuf::from(name),
            duration,
            dimensions: Some((1920, 1080)),
            has_audio,
        }
    }

    #[test]
    fn graph_trims_crops_and_concats_each_slice() {
        let segments = vec![
            Segment::new("desk", "a", 5).unwrap(),
            Segment::new("ocean", "b", 6).unwrap(),
        ];
        let clips = vec![asset("a.mp4", 12.0, true), asset("b.mp4", 4.0, false)];
        let timeline = plan_per_segment(&segments, &clips).unwrap();

        let graph = draft_filter_graph(
            &timeline,
            FrameSize::VERTICAL_1080P,
            30,
            &AudioSettings::default(),
        )
        .unwrap();

        assert!(graph.contains(
            "[0:v]trim=duration=5.000,setpts=PTS-STARTPTS,scale=3414:1920,crop=1080:1920:1167:0,setsar=1,fps=30[v0]"
        ));
        assert!(graph.contains("[0:a]atrim=duration=5.000"));
        assert!(graph.contains("anullsrc=r=44100:cl=stereo,atrim=duration=4.000[a1]"));
        assert!(graph.ends_with("[v0][a0][v1][a1]concat=n=2:v=1:a=1[v][a]"));
    }

    #[test]
    fn tiled_copies_each_get_an_input() {
        let timeline = plan_shared(asset("long.mp4", 12.0, false), 30.0).unwrap();
        let graph = draft_filter_graph(
            &timeline,
            FrameSize::VERTICAL_1080P,
            30,
            &AudioSettings::default(),
        )
        .unwrap();

        assert!(graph.contains("[2:v]trim=duration=6.000"));
        assert!(graph.contains("concat=n=3:v=1:a=1"));
    }

    #[test]
    fn audio_only_asset_is_rejected() {
        let mut song = asset("song.mp3", 30.0, true);
        song.dimensions = None;
        let timeline = plan_shared(song, 30.0).unwrap();
        let result = draft_filter_graph(
            &timeline,
            FrameSize::VERTICAL_1080P,
            30,
            &AudioSettings::default(),
        );
        assert!(matches!(result, Err(ReelError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn missing_clips_name_the_shortfall() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("segment_00_desk.mp4"), b"").unwrap();
        let segments = vec![
            Segment::new("desk", "", 5).unwrap(),
            Segment::new("ocean", "", 5).unwrap(),
        ];
        let config = ReelConfig::rooted_at(dir.path());

        let err = assemble_per_segment(&segments, dir.path(), &config, &dir.path().join("d.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::NotEnoughClips { found: 1, needed: 2 }));
        assert!(err.to_string().contains("Run fetch first"));
    }

    #[tokio::test]
    async fn shared_mode_needs_a_clip() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReelConfig::rooted_at(dir.path());
        let err = assemble_shared(dir.path(), 30.0, &config, &dir.path().join("d.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::NotEnoughClips { found: 0, needed: 1 }));
    }
}
