//! Song generation from script lyrics (ElevenLabs music).

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::{
    error::{ReelError, Result},
    media::probe_duration,
    provider::{Service, check_response},
    script::Segment,
};

pub const MAX_LINE_CHARS: usize = 200;
pub const MIN_SECTION_MS: u32 = 3_000;
pub const MAX_SECTION_MS: u32 = 120_000;

const GLOBAL_STYLES: [&str; 4] = [
    "Female lead vocal",
    "Educational pop",
    "Clear enunciation",
    "Upbeat and engaging",
];
const LOCAL_STYLES: [&str; 2] = ["Clear vocals", "Melodic"];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Section {
    pub section_name: String,
    pub positive_local_styles: Vec<String>,
    pub negative_local_styles: Vec<String>,
    pub duration_ms: u32,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompositionPlan {
    pub positive_global_styles: Vec<String>,
    pub negative_global_styles: Vec<String>,
    pub sections: Vec<Section>,
}

impl CompositionPlan {
    /// Planned length; the rendered song is probed for the real one.
    pub fn planned_seconds(&self) -> f64 {
        self.sections.iter().map(|s| f64::from(s.duration_ms)).sum::<f64>() / 1000.0
    }
}

/// Byte offset of the `n`th char, or the end of the string.
fn char_offset(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map(|(i, _)| i).unwrap_or(text.len())
}

/// Split lyrics at commas and newlines, then at word boundaries so no line
/// exceeds [`MAX_LINE_CHARS`].
pub fn split_lyric_lines(lyrics: &str) -> Vec<String> {
    let mut lines = Vec::new();

    for part in lyrics.split([',', '\n']) {
        let mut part = part.trim();
        while part.chars().count() > MAX_LINE_CHARS {
            let cut = char_offset(part, MAX_LINE_CHARS);
            let chunk = &part[..cut];
            let space = chunk
                .rfind(' ')
                .filter(|&at| chunk[..at].chars().count() > MAX_LINE_CHARS / 2);
            match space {
                Some(at) => {
                    lines.push(chunk[..at].trim().to_string());
                    part = part[at + 1..].trim();
                }
                None => {
                    lines.push(chunk.trim().to_string());
                    part = part[cut..].trim();
                }
            }
        }
        if !part.is_empty() {
            lines.push(part.to_string());
        }
    }

    if lines.is_empty() {
        let head = &lyrics[..char_offset(lyrics, MAX_LINE_CHARS)];
        lines.push(if head.is_empty() { " " } else { head }.to_string());
    }
    lines
}

/// One verse per segment, timed by the segment's duration.
pub fn build_composition_plan(segments: &[Segment]) -> Result<CompositionPlan> {
    if segments.is_empty() {
        return Err(ReelError::NoSegments);
    }

    let sections = segments
        .iter()
        .enumerate()
        .map(|(i, segment)| Section {
            section_name: format!("Verse {}", i + 1),
            positive_local_styles: LOCAL_STYLES.iter().map(|s| s.to_string()).collect(),
            negative_local_styles: Vec::new(),
            duration_ms: segment.duration_seconds().saturating_mul(1000).clamp(MIN_SECTION_MS, MAX_SECTION_MS),
            lines: split_lyric_lines(segment.spoken_text()),
        })
        .collect();

    Ok(CompositionPlan {
        positive_global_styles: GLOBAL_STYLES.iter().map(|s| s.to_string()).collect(),
        negative_global_styles: Vec::new(),
        sections,
    })
}

pub struct SongClient {
    http: reqwest::Client,
    api_key: String,
    base_url: &'static str,
}

impl SongClient {
    pub fn new(http: reqwest::Client) -> Result<Self> {
        let api_key = Service::ElevenLabs.validate_api_key()?;
        Ok(Self {
            http,
            api_key,
            base_url: Service::ElevenLabs.config().base_url,
        })
    }

    /// Render the plan to an MP3 at `output_path` and return its measured duration.
    pub async fn compose(&self, plan: &CompositionPlan, output_path: &Path) -> Result<f64> {
        info!(
            "Composing {} sections (~{:.1}s planned)",
            plan.sections.len(),
            plan.planned_seconds()
        );

        let response = self
            .http
            .post(format!("{}/music", self.base_url))
            .query(&[("output_format", "mp3_44100_128")])
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "composition_plan": plan,
                "model_id": "music_v1",
            }))
            .send()
            .await?;
        let bytes = check_response(Service::ElevenLabs, response)
            .await?
            .bytes()
            .await?;

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output_path, &bytes).await?;

        let duration = probe_duration(output_path).await?;
        info!("Song saved to {} ({:.1}s)", output_path.display(), duration);
        Ok(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_commas_and_newlines() {
        let lines = split_lyric_lines("Breathe in slow, let it go\nFeel the calm ,");
        assert_eq!(lines, vec!["Breathe in slow", "let it go", "Feel the calm"]);
    }

    #[test]
    fn long_lines_break_at_word_boundaries() {
        let word = "steady ";
        let long = word.repeat(40);
        let lines = split_lyric_lines(&long);

        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= MAX_LINE_CHARS));
        assert!(lines.iter().all(|l| l.split(' ').all(|w| w == "steady")));
    }

    #[test]
    fn unbroken_text_is_cut_hard() {
        let blob = "x".repeat(450);
        let lines = split_lyric_lines(&blob);
        let lengths: Vec<usize> = lines.iter().map(|l| l.len()).collect();
        assert_eq!(lengths, vec![200, 200, 50]);
    }

    #[test]
    fn blank_lyrics_still_yield_a_line() {
        assert_eq!(split_lyric_lines(" , "), vec![" , "]);
        assert_eq!(split_lyric_lines(""), vec![" "]);
    }

    #[test]
    fn plan_has_one_clamped_verse_per_segment() {
        let segments = vec![
            Segment::new("city", "Rise and shine", 2).unwrap(),
            Segment::new("ocean waves", "", 6).unwrap(),
            Segment::new("mountain", "Keep on climbing", 200).unwrap(),
        ];
        let plan = build_composition_plan(&segments).unwrap();

        let names: Vec<&str> = plan.sections.iter().map(|s| s.section_name.as_str()).collect();
        assert_eq!(names, vec!["Verse 1", "Verse 2", "Verse 3"]);
        let durations: Vec<u32> = plan.sections.iter().map(|s| s.duration_ms).collect();
        assert_eq!(durations, vec![3_000, 6_000, 120_000]);
        assert_eq!(plan.sections[1].lines, vec!["ocean waves"]);
        assert_eq!(plan.planned_seconds(), 129.0);

        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["sections"][0]["lines"][0], "Rise and shine");
        assert_eq!(json["positive_global_styles"][1], "Educational pop");
    }
}
