//! Duration reconciliation between segments and independently sourced media.
//!
//! Planning here is pure arithmetic; rendering the plans is left to
//! [`crate::director`] and [`crate::audio`].

use std::path::PathBuf;

use tracing::warn;

use crate::{
    config::{AudioSettings, FrameSize},
    error::{ReelError, Result},
    script::Segment,
};

/// An externally obtained media resource with its native duration.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAsset {
    pub path: PathBuf,
    pub duration: f64,
    /// Width and height for video assets.
    pub dimensions: Option<(u32, u32)>,
    pub has_audio: bool,
}

/// A piece of one asset placed on the timeline, always read from the asset's start.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub asset: usize,
    pub start: f64,
    pub duration: f64,
}

/// Ordered, gap-free sequence of slices.
#[derive(Debug, Clone)]
pub struct Timeline {
    assets: Vec<MediaAsset>,
    slices: Vec<Slice>,
}

impl Timeline {
    pub fn assets(&self) -> &[MediaAsset] {
        &self.assets
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    pub fn asset_for(&self, slice: &Slice) -> &MediaAsset {
        &self.assets[slice.asset]
    }

    pub fn duration(&self) -> f64 {
        self.slices.iter().map(|s| s.duration).sum()
    }
}

fn ensure_playable(asset: &MediaAsset) -> Result<()> {
    if asset.duration.is_finite() && asset.duration > 0.0 {
        Ok(())
    } else {
        Err(ReelError::InvalidInput {
            reason: format!("{} has no playable duration", asset.path.display()),
        })
    }
}

/// Pair each segment with its own clip, trimming to `min(segment, clip)`.
///
/// Clips are never stretched: a short clip shortens its segment. Extra clips
/// beyond the segment count are ignored.
pub fn plan_per_segment(segments: &[Segment], clips: &[MediaAsset]) -> Result<Timeline> {
    if segments.is_empty() {
        return Err(ReelError::NoSegments);
    }
    if clips.len() < segments.len() {
        return Err(ReelError::NotEnoughClips {
            found: clips.len(),
            needed: segments.len(),
        });
    }

    let assets = clips[..segments.len()].to_vec();
    let mut slices = Vec::with_capacity(segments.len());
    let mut cursor = 0.0;

    for (i, (segment, clip)) in segments.iter().zip(&assets).enumerate() {
        ensure_playable(clip)?;
        let duration = f64::from(segment.duration_seconds()).min(clip.duration);
        slices.push(Slice {
            asset: i,
            start: cursor,
            duration,
        });
        cursor += duration;
    }

    Ok(Timeline { assets, slices })
}

/// Whole copies of an asset of `native` seconds needed to cover `target` seconds.
pub fn tile_count(native: f64, target: f64) -> usize {
    if target <= native {
        1
    } else {
        (target / native).ceil() as usize
    }
}

/// Cover exactly `target` seconds with one shared asset, tiling it whole when short.
pub fn plan_shared(asset: MediaAsset, target: f64) -> Result<Timeline> {
    ensure_playable(&asset)?;
    if !(target.is_finite() && target > 0.0) {
        return Err(ReelError::InvalidInput {
            reason: format!("target duration must be positive, got {}", target),
        });
    }

    let copies = tile_count(asset.duration, target);
    let mut slices = Vec::with_capacity(copies);
    for copy in 0..copies {
        let start = copy as f64 * asset.duration;
        let duration = if copy + 1 == copies {
            target - start
        } else {
            asset.duration
        };
        slices.push(Slice {
            asset: 0,
            start,
            duration,
        });
    }

    Ok(Timeline {
        assets: vec![asset],
        slices,
    })
}

/// Scale-to-fill then center-crop geometry for one source frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillCrop {
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub crop_x: u32,
    pub crop_y: u32,
    pub width: u32,
    pub height: u32,
}

fn round_up_even(value: f64) -> u32 {
    // absorb float noise such as 1919.9999999999998
    let v = (value - 1e-6).ceil() as u32;
    v + (v % 2)
}

/// Scale by the larger of the width/height ratios so the frame is covered,
/// then crop the overflow equally from both sides.
pub fn fill_crop(source: (u32, u32), frame: FrameSize) -> FillCrop {
    let (src_w, src_h) = (source.0.max(1), source.1.max(1));
    let scale = (f64::from(frame.width) / f64::from(src_w))
        .max(f64::from(frame.height) / f64::from(src_h));

    let scaled_width = round_up_even(f64::from(src_w) * scale).max(frame.width);
    let scaled_height = round_up_even(f64::from(src_h) * scale).max(frame.height);

    FillCrop {
        scaled_width,
        scaled_height,
        crop_x: (scaled_width - frame.width) / 2,
        crop_y: (scaled_height - frame.height) / 2,
        width: frame.width,
        height: frame.height,
    }
}

impl FillCrop {
    /// ffmpeg filter chain applying this geometry.
    pub fn filter(&self) -> String {
        format!(
            "scale={}:{},crop={}:{}:{}:{},setsar=1",
            self.scaled_width,
            self.scaled_height,
            self.width,
            self.height,
            self.crop_x,
            self.crop_y
        )
    }
}

/// Tempo factor (natural / target) for a spoken slice, or `None` when the
/// recording is already within tolerance.
pub fn plan_tempo(natural: f64, target: f64, settings: &AudioSettings) -> Option<f64> {
    if natural <= 0.0 || target <= 0.0 {
        return None;
    }
    if (natural - target).abs() <= settings.tempo_tolerance {
        return None;
    }

    let ratio = natural / target;
    let (low, high) = settings.stretch_warn_range;
    if ratio < low || ratio > high {
        warn!(
            "Voice stretch ratio {:.2} is outside {:.1}x-{:.1}x ({:.2}s recorded for a {:.2}s caption)",
            ratio, low, high, natural, target
        );
    }
    Some(ratio)
}

/// `atempo` filter chain for a tempo factor, split into steps ffmpeg accepts (0.5..=2.0).
pub fn atempo_chain(ratio: f64) -> String {
    let mut remaining = ratio;
    let mut steps = Vec::new();
    while remaining > 2.0 {
        steps.push("atempo=2.0".to_string());
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        steps.push("atempo=0.5".to_string());
        remaining /= 0.5;
    }
    steps.push(format!("atempo={:.6}", remaining));
    steps.join(",")
}
