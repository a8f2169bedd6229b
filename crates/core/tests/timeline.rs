use std::path::PathBuf;

use reelforge_core::{
    CaptionStyle, FrameSize, MediaAsset, ReelError, Script, layout_captions, plan_per_segment,
    plan_shared,
};

const SCRIPT: &str = "\
SEGMENT: Person studying at desk
TEXT: Focus is a skill you can train
DURATION: 5
---
TEXT: this block has no footage query
DURATION: 9
---
segment: Sunset over ocean
lyrics: Rest is part
of the work
duration: 5 seconds
---
";

fn clip(name: &str, duration: f64) -> MediaAsset {
    MediaAsset {
        path: PathBuf::from(name),
        duration,
        dimensions: Some((1920, 1080)),
        has_audio: true,
    }
}

#[test]
fn blocks_without_a_query_are_dropped() {
    let script = Script::parse(SCRIPT).unwrap();

    assert_eq!(script.len(), 2);
    assert!(script.segments().iter().all(|s| s.duration_seconds() == 5));
    assert_eq!(script.segments()[1].caption_text(), "Rest is part of the work");
    assert_eq!(script.nominal_duration(), 10);
}

#[test]
fn per_segment_timeline_never_exceeds_the_script() {
    let script = Script::parse(SCRIPT).unwrap();
    let clips = vec![clip("a.mp4", 30.0), clip("b.mp4", 3.5), clip("extra.mp4", 9.0)];

    let timeline = plan_per_segment(script.segments(), &clips).unwrap();
    let durations: Vec<f64> = timeline.slices().iter().map(|s| s.duration).collect();

    assert_eq!(durations, vec![5.0, 3.5]);
    assert_eq!(timeline.duration(), 8.5);
    assert!(timeline.duration() <= f64::from(script.nominal_duration()));
}

#[test]
fn too_few_clips_is_a_resource_error() {
    let script = Script::parse(SCRIPT).unwrap();
    let err = plan_per_segment(script.segments(), &[clip("a.mp4", 30.0)]).unwrap_err();
    assert!(matches!(err, ReelError::NotEnoughClips { found: 1, needed: 2 }));
}

#[test]
fn shared_clip_is_tiled_to_the_exact_target() {
    let timeline = plan_shared(clip("long.mp4", 12.0), 30.0).unwrap();
    let durations: Vec<f64> = timeline.slices().iter().map(|s| s.duration).collect();

    assert_eq!(durations, vec![12.0, 12.0, 6.0]);
    assert_eq!(timeline.duration(), 30.0);

    let ten = plan_shared(clip("ten.mp4", 10.0), 35.0).unwrap();
    assert_eq!(ten.slices().len(), 4);
    assert_eq!(ten.duration(), 35.0);
}

#[test]
fn caption_starts_follow_the_running_sum() {
    let script = Script::parse(SCRIPT).unwrap();
    let blocks = layout_captions(
        script.segments(),
        FrameSize::VERTICAL_1080P,
        &CaptionStyle::default(),
    );

    let starts: Vec<f64> = blocks.iter().map(|b| b.start).collect();
    assert_eq!(starts, vec![0.0, 5.0]);
    assert!(blocks.iter().all(|b| b.lines.iter().all(|l| l.y < 1920)));
}

#[test]
fn retimed_captions_fill_a_song() {
    let script = Script::parse(SCRIPT).unwrap();
    let retimed = script.retimed_to(31).unwrap();

    assert_eq!(retimed.iter().map(|s| s.duration_seconds()).sum::<u32>(), 31);
    assert!(retimed.iter().all(|s| s.duration_seconds() >= 1));
}
