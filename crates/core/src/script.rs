//! Script documents and the segments they describe.
//!
//! A script is a sequence of blocks separated by a line holding only `---`.
//! Inside a block the recognized labels (case-insensitive) are `SEGMENT:`,
//! `TEXT:` / `LYRICS:` and `DURATION:`. Caption labels accept continuation
//! lines until the next label or the end of the block.

use std::{path::Path, sync::LazyLock};

use regex::Regex;
use tokio::fs;
use tracing::debug;

use crate::error::{ReelError, Result};

pub const DEFAULT_DURATION_SECONDS: u32 = 5;
/// Longest duration a single segment may ask for.
pub const MAX_DURATION_SECONDS: u32 = 3_600;
pub const BLOCK_DELIMITER: &str = "---";

static FIRST_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("static regex is valid"));

/// One timed unit of the output video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    visual_query: String,
    caption_text: String,
    duration_seconds: u32,
}

impl Segment {
    pub fn new(
        visual_query: impl Into<String>,
        caption_text: impl Into<String>,
        duration_seconds: u32,
    ) -> Result<Self> {
        let visual_query = visual_query.into().trim().to_string();
        if visual_query.is_empty() {
            return Err(ReelError::InvalidSegment {
                reason: "visual query must not be empty".to_string(),
            });
        }
        if duration_seconds == 0 {
            return Err(ReelError::InvalidSegment {
                reason: format!("duration for \"{}\" must be positive", visual_query),
            });
        }
        if duration_seconds > MAX_DURATION_SECONDS {
            return Err(ReelError::InvalidSegment {
                reason: format!(
                    "duration {}s for \"{}\" exceeds {}s",
                    duration_seconds, visual_query, MAX_DURATION_SECONDS
                ),
            });
        }
        Ok(Self {
            visual_query,
            caption_text: caption_text.into().trim().to_string(),
            duration_seconds,
        })
    }

    pub fn visual_query(&self) -> &str {
        &self.visual_query
    }

    pub fn caption_text(&self) -> &str {
        &self.caption_text
    }

    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    /// Text to speak or sing for this segment: the caption, else the visual query.
    pub fn spoken_text(&self) -> &str {
        if self.caption_text.is_empty() {
            &self.visual_query
        } else {
            &self.caption_text
        }
    }

    fn with_duration(&self, duration_seconds: u32) -> Result<Self> {
        Segment::new(
            self.visual_query.clone(),
            self.caption_text.clone(),
            duration_seconds,
        )
    }
}

/// A parsed script: the source text plus its ordered segments.
#[derive(Debug, Clone)]
pub struct Script {
    source: String,
    segments: Vec<Segment>,
}

impl Script {
    pub fn parse(text: &str) -> Result<Self> {
        let segments = parse_segments(text)?;
        Ok(Self {
            source: text.to_string(),
            segments,
        })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).await?;
        if text.trim().is_empty() {
            return Err(ReelError::EmptyScript);
        }
        Self::parse(&text)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Sum of the segment durations. A target, not a guarantee.
    pub fn nominal_duration(&self) -> u32 {
        self.segments
            .iter()
            .fold(0u32, |total, s| total.saturating_add(s.duration_seconds))
    }

    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.segments.is_empty() {
            return Err(ReelError::NoSegments);
        }
        Ok(())
    }

    /// Fails unless at least one segment has something to sing or say.
    pub fn ensure_captions(&self) -> Result<()> {
        self.ensure_not_empty()?;
        if self.segments.iter().all(|s| s.caption_text.is_empty()) {
            return Err(ReelError::NoCaptions);
        }
        Ok(())
    }

    /// Derived copy whose durations are rescaled to sum to `total_seconds`.
    ///
    /// Used when one shared asset defines the real length of the video. Each
    /// segment keeps at least one second; rounding error lands on the last one.
    pub fn retimed_to(&self, total_seconds: u32) -> Result<Vec<Segment>> {
        self.ensure_not_empty()?;
        let count = self.segments.len() as u32;
        if total_seconds < count {
            return Err(ReelError::InvalidInput {
                reason: format!(
                    "cannot fit {} segments into {} seconds",
                    count, total_seconds
                ),
            });
        }

        let nominal = f64::from(self.nominal_duration());
        let total = f64::from(total_seconds);
        let mut retimed = Vec::with_capacity(self.segments.len());
        let mut cumulative = 0u64;
        let mut previous_boundary = 0u32;

        for (i, seg) in self.segments.iter().enumerate() {
            cumulative += u64::from(seg.duration_seconds);
            let remaining_after = count - i as u32 - 1;
            let boundary = if remaining_after == 0 {
                total_seconds
            } else {
                let scaled = (cumulative as f64 * total / nominal).round() as u32;
                scaled.clamp(previous_boundary + 1, total_seconds - remaining_after)
            };
            retimed.push(seg.with_duration(boundary - previous_boundary)?);
            previous_boundary = boundary;
        }

        Ok(retimed)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Label {
    Segment,
    Caption,
    Duration,
}

fn split_label(line: &str) -> Option<(Label, &str)> {
    let (head, rest) = line.split_once(':')?;
    let label = match head.trim().to_ascii_uppercase().as_str() {
        "SEGMENT" => Label::Segment,
        "TEXT" | "LYRICS" => Label::Caption,
        "DURATION" => Label::Duration,
        _ => return None,
    };
    Some((label, rest.trim()))
}

/// First integer in a duration field ("5", "5 seconds", "5s").
fn parse_duration_field(raw: &str) -> Option<u32> {
    FIRST_INTEGER
        .find(raw)
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

fn split_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = vec![Vec::new()];
    for line in text.lines() {
        if line.trim() == BLOCK_DELIMITER {
            blocks.push(Vec::new());
        } else if let Some(block) = blocks.last_mut() {
            block.push(line);
        }
    }
    blocks
}

/// Parse script text into segments.
///
/// Blocks without a `SEGMENT:` line are dropped. Malformed durations fall back
/// to [`DEFAULT_DURATION_SECONDS`]; an explicit zero is rejected.
pub fn parse_segments(text: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();

    for (index, block) in split_blocks(text).into_iter().enumerate() {
        let mut query = String::new();
        let mut caption: Vec<&str> = Vec::new();
        let mut duration = DEFAULT_DURATION_SECONDS;
        let mut in_caption = false;

        for raw in block {
            let line = raw.trim();
            match split_label(line) {
                Some((Label::Segment, value)) => {
                    query = value.to_string();
                    in_caption = false;
                }
                Some((Label::Caption, value)) => {
                    caption.clear();
                    if !value.is_empty() {
                        caption.push(value);
                    }
                    in_caption = true;
                }
                Some((Label::Duration, value)) => {
                    duration = parse_duration_field(value).unwrap_or(DEFAULT_DURATION_SECONDS);
                    in_caption = false;
                }
                None if in_caption && !line.is_empty() => caption.push(line),
                None => {}
            }
        }

        if query.is_empty() {
            debug!("Dropping script block {} without a SEGMENT line", index);
            continue;
        }

        let caption = caption.join(" ");
        let caption = caption.trim_matches(|c| c == '"' || c == '\'');
        segments.push(Segment::new(query, caption, duration)?);
    }

    Ok(segments)
}

/// Convert a topic to a safe file stem.
pub fn slugify(topic: &str) -> String {
    let cleaned: String = topic
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(50)
        .collect();
    let slug = cleaned.trim().replace(' ', "_").to_lowercase();
    if slug.is_empty() {
        "script".to_string()
    } else {
        slug
    }
}
