//! Still frames sampled from a rendered video for the evaluators.

use std::path::Path;

use base64::{Engine as _, engine::general_purpose};
use tempfile::TempDir;

use crate::{error::Result, media::extract_frame, script::Segment};

/// A point in the video to grab, tied to the segment it belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSample {
    pub segment: usize,
    pub at: f64,
}

/// `per_segment` evenly spaced samples inside each segment (one sample is the
/// midpoint), clamped to the video's length and thinned to at most `max_frames`.
pub fn sample_times(
    segments: &[Segment],
    video_duration: f64,
    per_segment: usize,
    max_frames: usize,
) -> Vec<FrameSample> {
    let last = (video_duration - 0.1).max(0.0);
    let mut samples = Vec::new();
    let mut cursor = 0.0;

    for (i, segment) in segments.iter().enumerate() {
        let duration = f64::from(segment.duration_seconds());
        for k in 1..=per_segment {
            let at = cursor + duration * k as f64 / (per_segment + 1) as f64;
            samples.push(FrameSample {
                segment: i,
                at: at.min(last),
            });
        }
        cursor += duration;
    }

    if max_frames == 0 || samples.len() <= max_frames {
        return samples;
    }
    let total = samples.len();
    (0..max_frames).map(|i| samples[i * total / max_frames]).collect()
}

/// Grab each sample as PNG and return them as base64 data URLs, in order.
///
/// Frames live in a scratch directory that is removed before returning.
pub async fn capture_data_urls(video_path: &Path, samples: &[FrameSample]) -> Result<Vec<String>> {
    let scratch = TempDir::new()?;
    let mut urls = Vec::with_capacity(samples.len());

    for (i, sample) in samples.iter().enumerate() {
        let frame_path = scratch.path().join(format!("frame_{:02}.png", i));
        extract_frame(video_path, sample.at, &frame_path).await?;
        let bytes = tokio::fs::read(&frame_path).await?;
        urls.push(png_data_url(&bytes));
    }

    Ok(urls)
}

pub fn png_data_url(bytes: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(durations: &[u32]) -> Vec<Segment> {
        durations
            .iter()
            .map(|d| Segment::new("footage", "", *d).unwrap())
            .collect()
    }

    #[test]
    fn one_sample_per_segment_is_the_midpoint() {
        let samples = sample_times(&segments(&[4, 6, 10]), 20.0, 1, 0);
        let times: Vec<f64> = samples.iter().map(|s| s.at).collect();
        assert_eq!(times, vec![2.0, 7.0, 15.0]);
    }

    #[test]
    fn samples_past_the_end_are_clamped() {
        // Clips were shorter than the script asked for.
        let samples = sample_times(&segments(&[5, 5]), 6.0, 1, 0);
        assert!((samples[1].at - 5.9).abs() < 1e-9);
        assert_eq!(samples[1].segment, 1);
    }

    #[test]
    fn two_per_segment_are_capped() {
        let samples = sample_times(&segments(&[6; 8]), 48.0, 2, 12);
        assert_eq!(samples.len(), 12);
        assert_eq!(samples[0], FrameSample { segment: 0, at: 2.0 });
        assert!(samples.windows(2).all(|w| w[0].at < w[1].at));
    }

    #[test]
    fn data_url_is_base64_png() {
        assert_eq!(png_data_url(b"png"), "data:image/png;base64,cG5n");
    }
}
