use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::fs;
use tracing::info;

use crate::{
    artifacts::get_rating_path,
    error::{ReelError, Result},
    frames::{capture_data_urls, sample_times},
    media::probe_duration,
    openai::{OpenAiClient, VISION_MODEL, strip_code_fence},
    polish::{CaptionTiming, caption_segments},
    script::Script,
};

/// Structured quality feedback for one rendered reel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingReport {
    pub overall_score: f64,
    #[serde(rename = "pass")]
    pub passed: bool,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl RatingReport {
    /// Score at or above `min_score`, marked as passing, and nothing left to fix.
    pub fn meets(&self, min_score: f64) -> bool {
        self.overall_score >= min_score && self.passed && self.issues.is_empty()
    }
}

/// What the rater should listen for besides the pictures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingContext {
    pub has_voiceover: bool,
    pub has_music: bool,
}

pub fn build_rating_prompt(script_text: &str, context: RatingContext) -> String {
    let mut criteria = String::new();
    let mut score_keys = String::from(
        r#""text_readability": <1-10>,
    "visual_quality": <1-10>,
    "footage_relevance": <1-10>,
    "production_quality": <1-10>"#,
    );
    let mut next = 5;

    if context.has_voiceover {
        criteria.push_str(&format!(
            "{}. **voiceover_caption_sync** (1-10): Video has voiceover. Does the caption text amount per segment suit a typical speaking pace? Flag segments with too much text for their duration (voice would race ahead of the caption) or too little. Add to issues if a mismatch is suspected.\n",
            next
        ));
        score_keys.push_str(",\n    \"voiceover_caption_sync\": <1-10>");
        next += 1;
    }
    if context.has_music {
        criteria.push_str(&format!(
            "{}. **audio_balance** (1-10): Video has background music. Judging from pacing and mood, does the music suit the content without overpowering it?\n",
            next
        ));
        score_keys.push_str(",\n    \"audio_balance\": <1-10>");
    }

    format!(
        r#"You are rating a short educational reel video. Here is the script:

{script}

You will see one frame from each segment (in order).

MANDATORY FIRST STEP - Text cutoff check: Look at EACH frame's overlay text. Scan the left and right edges. If ANY letter, character, or word is partially cut off or clipped at the frame edge, you MUST add "segment N has text cut off at left/right edge" to issues and set pass=false. This is a critical failure.

Then rate on these criteria:

1. **text_readability** (1-10): Clear, legible, fully visible? Score LOW (<=5) if text is cut off.
2. **visual_quality** (1-10): Sharp, well-lit, good colors? Watch for GRAY/WASHED OUT clips.
3. **footage_relevance** (1-10): Does footage match the segment topic?
4. **production_quality** (1-10): Technical issues including TEXT CUT OFF, letterboxing, film reel effect.
{criteria}
Respond with ONLY valid JSON (no markdown, no extra text):
{{
  "overall_score": <1-10>,
  "pass": <true if overall_score>=6 and no critical issues, else false>,
  "scores": {{
    {score_keys}
  }},
  "issues": ["specific problems, e.g. segment 2 is gray/washed out"],
  "suggestions": ["actionable improvements"]
}}"#,
        script = script_text.trim(),
        criteria = criteria,
        score_keys = score_keys,
    )
}

/// Parse an evaluator reply; anything that doesn't fit the report shape is a hard failure.
pub fn parse_rating(raw: &str) -> Result<RatingReport> {
    serde_json::from_str(strip_code_fence(raw)).map_err(|e| ReelError::MalformedReport {
        evaluator: "rating",
        reason: e.to_string(),
    })
}

pub async fn rate_video(
    client: &OpenAiClient,
    video_path: &Path,
    script: &Script,
    timing: CaptionTiming,
    context: RatingContext,
) -> Result<RatingReport> {
    let video_duration = probe_duration(video_path).await?;
    let segments = caption_segments(script, timing, video_duration)?;
    let samples = sample_times(&segments, video_duration, 1, 0);
    let frames = capture_data_urls(video_path, &samples).await?;

    let mut content = vec![serde_json::json!({
        "type": "text",
        "text": build_rating_prompt(script.source(), context),
    })];
    content.extend(frames.into_iter().map(|url| {
        serde_json::json!({
            "type": "image_url",
            "image_url": { "url": url },
        })
    }));

    info!("Rating {} ({} frames)", video_path.display(), samples.len());
    let reply = client
        .chat(
            VISION_MODEL,
            serde_json::Value::Array(content),
            None,
            Some(1024),
        )
        .await?;
    let report = parse_rating(&reply)?;

    save_report(&report, &get_rating_path(video_path)).await?;
    Ok(report)
}

/// Load a report from a file
pub async fn load_report<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json_content = fs::read_to_string(path).await?;
    let report: T = serde_json::from_str(&json_content)?;
    Ok(report)
}

/// Save a report to a file
pub async fn save_report<T: Serialize>(report: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let pretty_json = serde_json::to_string_pretty(report)?;
    fs::write(path, &pretty_json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(score: f64, passed: bool, issues: &[&str]) -> RatingReport {
        RatingReport {
            overall_score: score,
            passed,
            scores: BTreeMap::new(),
            issues: issues.iter().map(|s| s.to_string()).collect(),
            suggestions: Vec::new(),
        }
    }

    #[test]
    fn success_needs_score_pass_and_no_issues() {
        assert!(report(8.0, true, &[]).meets(8.0));
        assert!(!report(7.5, true, &[]).meets(8.0));
        assert!(!report(9.0, false, &[]).meets(8.0));
        assert!(!report(9.0, true, &["segment 2 is washed out"]).meets(8.0));
    }

    #[test]
    fn parses_fenced_reply() {
        let raw = "```json\n{\"overall_score\": 7, \"pass\": true, \"scores\": {\"visual_quality\": 8}, \"issues\": []}\n```";
        let report = parse_rating(raw).unwrap();
        assert_eq!(report.overall_score, 7.0);
        assert!(report.passed);
        assert_eq!(report.scores["visual_quality"], 8.0);
        assert!(report.suggestions.is_empty());
    }

    #[test]
    fn malformed_reply_is_an_error() {
        let err = parse_rating("Looks great to me!").unwrap_err();
        assert!(matches!(err, ReelError::MalformedReport { evaluator: "rating", .. }));

        let missing_pass = parse_rating("{\"overall_score\": 9}");
        assert!(missing_pass.is_err());
    }

    #[test]
    fn prompt_adds_context_criteria() {
        let plain = build_rating_prompt("SEGMENT: desk", RatingContext::default());
        assert!(!plain.contains("voiceover_caption_sync"));
        assert!(!plain.contains("audio_balance"));

        let full = build_rating_prompt(
            "SEGMENT: desk",
            RatingContext {
                has_voiceover: true,
                has_music: true,
            },
        );
        assert!(full.contains("5. **voiceover_caption_sync**"));
        assert!(full.contains("6. **audio_balance**"));
        assert!(full.contains("\"audio_balance\": <1-10>"));
    }

    #[tokio::test]
    async fn report_is_saved_with_pass_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reel_final_rating.json");
        let original = report(8.5, true, &[]);

        save_report(&original, &path).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"pass\": true"));

        let loaded: RatingReport = load_report(&path).await.unwrap();
        assert_eq!(loaded, original);
    }
}
