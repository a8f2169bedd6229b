use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Output frame dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    /// Vertical 9:16 reel.
    pub const VERTICAL_1080P: FrameSize = FrameSize {
        width: 1080,
        height: 1920,
    };
}

/// How captions are wrapped, sized and placed.
#[derive(Clone, Debug)]
pub struct CaptionStyle {
    pub max_chars_per_line: usize,
    pub min_font_size: u32,
    pub max_font_size: u32,
    /// Font size is `frame width / font_divisor`, clamped to the min/max range.
    pub font_divisor: u32,
    /// Vertical center of the caption group, as a fraction of frame height.
    pub anchor: f64,
    pub line_gap: u32,
    pub padding: u32,
    pub font_color: String,
    pub box_color: String,
    pub font_file: Option<PathBuf>,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            max_chars_per_line: 25,
            min_font_size: 44,
            max_font_size: 72,
            font_divisor: 16,
            anchor: 0.72,
            line_gap: 10,
            padding: 18,
            font_color: "white".to_string(),
            box_color: "0x1E1E1E@0.85".to_string(),
            font_file: None,
        }
    }
}

/// What the final artifact carries when no audio layer was supplied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioFallback {
    Silent,
    KeepDraftAudio,
}

/// Gain and alignment settings for the audio layers.
#[derive(Clone, Debug)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub voice_gain: f32,
    pub music_gain: f32,
    pub song_gain: f32,
    /// Natural vs. target duration difference tolerated before time-stretching.
    pub tempo_tolerance: f64,
    /// Stretch ratios outside this range are logged as quality warnings.
    pub stretch_warn_range: (f64, f64),
    pub fallback: AudioFallback,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            voice_gain: 1.0,
            music_gain: 0.15,
            song_gain: 1.0,
            tempo_tolerance: 0.3,
            stretch_warn_range: (0.7, 1.5),
            fallback: AudioFallback::Silent,
        }
    }
}

/// Everything a pipeline run needs, threaded explicitly into each stage.
#[derive(Clone, Debug)]
pub struct ReelConfig {
    pub output_dir: PathBuf,
    pub clips_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub music_dir: PathBuf,
    pub frame: FrameSize,
    pub fps: u32,
    pub caption: CaptionStyle,
    pub audio: AudioSettings,
    pub request_timeout: Duration,
}

impl ReelConfig {
    /// Standard layout under a project root: `output/`, `clips/`, `scripts/`, `assets/music/`.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            output_dir: root.join("output"),
            clips_dir: root.join("clips"),
            scripts_dir: root.join("scripts"),
            music_dir: root.join("assets").join("music"),
            frame: FrameSize::VERTICAL_1080P,
            fps: 30,
            caption: CaptionStyle::default(),
            audio: AudioSettings::default(),
            request_timeout: Duration::from_secs(180),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooted_layout() {
        let cfg = ReelConfig::rooted_at(Path::new("/work"));
        assert_eq!(cfg.output_dir, PathBuf::from("/work/output"));
        assert_eq!(cfg.music_dir, PathBuf::from("/work/assets/music"));
        assert_eq!(cfg.frame, FrameSize::VERTICAL_1080P);
    }
}
