//! Single-pass content safety gate.
//!
//! Two independent inputs are combined: the text moderation classifier run
//! over the script, and a vision model's review of sampled frames. A hard
//! moderation flag always rejects, whatever the vision review concluded.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    artifacts::get_safety_path,
    error::{ReelError, Result},
    frames::{FrameSample, capture_data_urls, sample_times},
    media::probe_duration,
    openai::{ModerationResult, OpenAiClient, VISION_MODEL, strip_code_fence},
    polish::{CaptionTiming, caption_segments},
    rate::save_report,
    script::Script,
};

pub const FRAMES_PER_SEGMENT: usize = 2;
pub const MAX_FRAMES: usize = 12;
pub const MODERATION_CHUNK_CHARS: usize = 8_000;

/// Moderation categories that reject outright.
pub const HARD_FLAG_CATEGORIES: [&str; 6] = [
    "sexual",
    "sexual/minors",
    "violence/graphic",
    "hate/threatening",
    "self-harm/intent",
    "self-harm/instructions",
];

/// Tri-state verdict, ordered from least to most strict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    NeedsReview,
    Rejected,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approved => "approved",
            Verdict::NeedsReview => "needs_review",
            Verdict::Rejected => "rejected",
        }
    }
}

/// Score bands: any score <= 3 rejects, any 4-6 needs review, all >= 7 approve.
///
/// No scores at all cannot approve anything.
pub fn verdict_from_scores(scores: &BTreeMap<String, f64>) -> Verdict {
    if scores.is_empty() {
        return Verdict::NeedsReview;
    }
    scores.values().fold(Verdict::Approved, |verdict, &score| {
        let band = if score <= 3.0 {
            Verdict::Rejected
        } else if score < 7.0 {
            Verdict::NeedsReview
        } else {
            Verdict::Approved
        };
        verdict.max(band)
    })
}

/// Aggregated text classifier result over every chunk of the script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextModeration {
    pub flagged: bool,
    pub hard_flags: Vec<String>,
    /// Highest score seen per category.
    pub category_scores: BTreeMap<String, f64>,
}

impl TextModeration {
    pub fn absorb(&mut self, result: &ModerationResult) {
        self.flagged |= result.flagged;
        for (category, score) in &result.category_scores {
            if let Some(score) = score {
                let entry = self.category_scores.entry(category.clone()).or_insert(0.0);
                *entry = entry.max(*score);
            }
        }
        for (category, triggered) in &result.categories {
            if *triggered == Some(true)
                && HARD_FLAG_CATEGORIES.contains(&category.as_str())
                && !self.hard_flags.contains(category)
            {
                self.hard_flags.push(category.clone());
            }
        }
    }

    /// Categories with elevated scores, for the vision prompt.
    pub fn elevated(&self, threshold: f64) -> Vec<&str> {
        self.category_scores
            .iter()
            .filter(|(_, score)| **score > threshold)
            .map(|(category, _)| category.as_str())
            .collect()
    }

    /// The `n` highest category scores, highest first.
    pub fn top_scores(&self, n: usize) -> Vec<CategoryScore> {
        let mut scores: Vec<CategoryScore> = self
            .category_scores
            .iter()
            .map(|(category, score)| CategoryScore {
                category: category.clone(),
                score: (score * 10_000.0).round() / 10_000.0,
            })
            .collect();
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        scores.truncate(n);
        scores
    }
}

/// Split text into chunks of at most `max_chars` characters.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// What the vision reviewer returns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VisualAssessment {
    #[serde(default)]
    pub safe: bool,
    pub verdict: Verdict,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationSummary {
    pub flagged: bool,
    pub top_scores: Vec<CategoryScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyReport {
    pub safe: bool,
    pub verdict: Verdict,
    pub scores: BTreeMap<String, f64>,
    pub flags: Vec<String>,
    pub details: String,
    pub moderation_api: ModerationSummary,
}

/// Merge both inputs into the final verdict.
///
/// The vision model's verdict is tightened by its own score bands and by a
/// plain moderation flag; a hard moderation flag rejects unconditionally.
pub fn combine(visual: VisualAssessment, moderation: &TextModeration) -> SafetyReport {
    let mut verdict = visual.verdict.max(verdict_from_scores(&visual.scores));
    if moderation.flagged {
        verdict = verdict.max(Verdict::NeedsReview);
    }

    let mut flags = visual.flags;
    if !moderation.hard_flags.is_empty() {
        flags.extend(
            moderation
                .hard_flags
                .iter()
                .map(|category| format!("Moderation hard flag: {}", category)),
        );
        verdict = Verdict::Rejected;
    }

    SafetyReport {
        safe: verdict == Verdict::Approved,
        verdict,
        scores: visual.scores,
        flags,
        details: visual.details,
        moderation_api: ModerationSummary {
            flagged: moderation.flagged,
            top_scores: moderation.top_scores(5),
        },
    }
}

pub fn parse_assessment(raw: &str) -> Result<VisualAssessment> {
    serde_json::from_str(strip_code_fence(raw)).map_err(|e| ReelError::MalformedReport {
        evaluator: "safety",
        reason: e.to_string(),
    })
}

/// Script text plus every caption, as fed to the text classifier.
fn moderation_input(script: &Script) -> String {
    std::iter::once(script.source())
        .chain(script.segments().iter().map(|s| s.caption_text()))
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn moderate_script(client: &OpenAiClient, script: &Script) -> Result<TextModeration> {
    let mut moderation = TextModeration::default();
    let input = moderation_input(script);
    if input.trim().is_empty() {
        return Ok(moderation);
    }

    for chunk in chunk_text(&input, MODERATION_CHUNK_CHARS) {
        for result in client.moderate(&chunk).await? {
            moderation.absorb(&result);
        }
    }
    Ok(moderation)
}

fn frame_index(script: &Script, samples: &[FrameSample]) -> String {
    samples
        .iter()
        .enumerate()
        .map(|(n, sample)| {
            let label: String = script.segments()[sample.segment]
                .spoken_text()
                .chars()
                .take(60)
                .collect();
            format!(
                "  Frame {}: segment {} at {:.1}s - \"{}\"",
                n + 1,
                sample.segment + 1,
                sample.at,
                label.replace('\n', " ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_safety_prompt(script: &Script, samples: &[FrameSample], moderation: &TextModeration) -> String {
    let moderation_note = if moderation.flagged {
        format!(
            "\n\nNOTE: The moderation classifier flagged this script text. Elevated scores in: {}. Weight your evaluation accordingly.",
            moderation.elevated(0.2).join(", ")
        )
    } else {
        String::new()
    };

    format!(
        r#"You are a content safety reviewer for short-form educational social media reels.
Your job is to evaluate whether this reel is safe and appropriate to publish publicly.

SCRIPT:
{script}{note}

You will see {count} frames sampled from the video:
{index}

Evaluate on the following SAFETY criteria. Each is scored 1-10 where:
  10 = completely safe, no concerns
   7 = minor/borderline concern, likely fine
   4 = moderate concern, needs human review
   1 = serious safety violation, must not publish

CRITERIA:
1. **text_safety**: overlay text free from hate speech, slurs, threats, violent language, sexual content, profanity, or content that could incite harm.
2. **visual_safety**: frames free from graphic violence, gore, sexual or suggestive imagery, disturbing content; suitable for minors.
3. **topic_safety**: the topic does not normalise self-harm, illegal activity, substance abuse, weapons, or dangerous pseudoscience.
4. **factual_plausibility**: no dangerous misinformation (unverified medical claims, dangerous DIY instructions, denial of established science).
5. **audience_suitability**: appropriate for all ages (13+) in tone, text and imagery together.
6. **platform_compliance**: would pass Instagram, TikTok and YouTube Shorts community guidelines (logos, political framing, misleading captions).

VERDICT RULES:
  "approved"     - all scores >= 7 AND no hard flags
  "needs_review" - any score between 4 and 6 (inclusive), OR the moderation classifier flagged the text
  "rejected"     - any score <= 3, OR the script contains dangerous misinformation

Respond with ONLY valid JSON (no markdown, no extra text):
{{
  "safe": <true if verdict is "approved", else false>,
  "verdict": "approved" | "needs_review" | "rejected",
  "scores": {{
    "text_safety": <1-10>,
    "visual_safety": <1-10>,
    "topic_safety": <1-10>,
    "factual_plausibility": <1-10>,
    "audience_suitability": <1-10>,
    "platform_compliance": <1-10>
  }},
  "flags": ["specific concern"],
  "details": "one paragraph summary of your safety assessment"
}}"#,
        script = script.source().trim(),
        note = moderation_note,
        count = samples.len(),
        index = frame_index(script, samples),
    )
}

/// Run the gate on a finished reel and save `<video>_safety.json` next to it.
pub async fn safety_check(
    client: &OpenAiClient,
    video_path: &Path,
    script: &Script,
    timing: CaptionTiming,
) -> Result<SafetyReport> {
    let moderation = moderate_script(client, script).await?;
    if !moderation.hard_flags.is_empty() {
        warn!("Moderation hard flags: {}", moderation.hard_flags.join(", "));
    }

    let video_duration = probe_duration(video_path).await?;
    let segments = caption_segments(script, timing, video_duration)?;
    let samples = sample_times(&segments, video_duration, FRAMES_PER_SEGMENT, MAX_FRAMES);
    let frames = capture_data_urls(video_path, &samples).await?;

    let mut content = vec![serde_json::json!({
        "type": "text",
        "text": build_safety_prompt(script, &samples, &moderation),
    })];
    content.extend(frames.into_iter().map(|url| {
        serde_json::json!({
            "type": "image_url",
            "image_url": { "url": url, "detail": "low" },
        })
    }));

    let reply = client
        .chat(
            VISION_MODEL,
            serde_json::Value::Array(content),
            None,
            Some(1024),
        )
        .await?;
    let report = combine(parse_assessment(&reply)?, &moderation);

    save_report(&report, &get_safety_path(video_path)).await?;
    info!("Safety verdict for {}: {}", video_path.display(), report.verdict.as_str());
    Ok(report)
}
