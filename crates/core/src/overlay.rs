//! Caption timing and placement.
//!
//! Each caption line becomes its own tightly padded box. Lines of one caption
//! are stacked and centered as a group around the style's vertical anchor.

use std::path::Path;

use crate::{
    config::{CaptionStyle, FrameSize},
    script::Segment,
};

/// One rendered line of a caption.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLine {
    pub text: String,
    /// Top of the glyph area; the box extends `padding` above it.
    pub y: u32,
}

/// A segment's caption: when it shows and where its lines go.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionBlock {
    pub segment: usize,
    pub start: f64,
    pub duration: f64,
    pub font_size: u32,
    pub lines: Vec<CaptionLine>,
}

impl CaptionBlock {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Wrap at word boundaries so no line exceeds `max_chars` unless a single word does.
pub fn wrap_words(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

pub fn font_size_for(frame_width: u32, style: &CaptionStyle) -> u32 {
    (frame_width / style.font_divisor.max(1)).clamp(style.min_font_size, style.max_font_size)
}

/// Vertical positions of `line_count` stacked lines centered on the anchor.
fn stack_lines(line_count: u32, font_size: u32, frame: FrameSize, style: &CaptionStyle) -> Vec<u32> {
    let box_height = font_size + 2 * style.padding;
    let group_height = line_count * box_height + line_count.saturating_sub(1) * style.line_gap;
    let anchor = (f64::from(frame.height) * style.anchor).round() as u32;
    let top = anchor
        .saturating_sub(group_height / 2)
        .min(frame.height.saturating_sub(group_height));

    (0..line_count)
        .map(|i| top + i * (box_height + style.line_gap) + style.padding)
        .collect()
}

/// Lay out captions on a forward cursor: segment `i` starts at the sum of all
/// earlier durations and lasts its own duration. Empty captions only advance
/// the cursor.
pub fn layout_captions(
    segments: &[Segment],
    frame: FrameSize,
    style: &CaptionStyle,
) -> Vec<CaptionBlock> {
    let font_size = font_size_for(frame.width, style);
    let mut blocks = Vec::new();
    let mut cursor = 0.0;

    for (i, segment) in segments.iter().enumerate() {
        let duration = f64::from(segment.duration_seconds());
        let wrapped = wrap_words(segment.caption_text(), style.max_chars_per_line);

        if !wrapped.is_empty() {
            let positions = stack_lines(wrapped.len() as u32, font_size, frame, style);
            blocks.push(CaptionBlock {
                segment: i,
                start: cursor,
                duration,
                font_size,
                lines: wrapped
                    .into_iter()
                    .zip(positions)
                    .map(|(text, y)| CaptionLine { text, y })
                    .collect(),
            });
        }
        cursor += duration;
    }

    blocks
}

/// Quote a value for use inside an ffmpeg filter option.
pub fn quote_filter_value(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "'\\''"))
}

/// `drawtext` filter for one line whose text was written to `textfile`.
pub fn drawtext_filter(
    block: &CaptionBlock,
    line: &CaptionLine,
    textfile: &Path,
    style: &CaptionStyle,
) -> String {
    let font = style
        .font_file
        .as_ref()
        .map(|f| format!("fontfile={}:", quote_filter_value(&f.to_string_lossy())))
        .unwrap_or_default();

    format!(
        "drawtext={}textfile={}:fontsize={}:fontcolor={}:box=1:boxcolor={}:boxborderw={}:x=(w-text_w)/2:y={}:enable='between(t,{:.3},{:.3})'",
        font,
        quote_filter_value(&textfile.to_string_lossy()),
        block.font_size,
        style.font_color,
        style.box_color,
        style.padding,
        line.y,
        block.start,
        block.end()
    )
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn seg(caption: &str, duration: u32) -> Segment {
        Segment::new("footage", caption, duration).unwrap()
    }

    #[test]
    fn wraps_without_splitting_words() {
        let lines = wrap_words("Small habits compound into remarkable results over time", 25);
        assert_eq!(
            lines,
            vec!["Small habits compound", "into remarkable results", "over time"]
        );
        assert!(lines.iter().all(|l| l.chars().count() <= 25));
    }

    #[test]
    fn overlong_word_gets_its_own_line() {
        let lines = wrap_words("a supercalifragilisticexpialidocious word", 10);
        assert_eq!(lines, vec!["a", "supercalifragilisticexpialidocious", "word"]);
    }

    #[test]
    fn font_size_is_clamped() {
        let style = CaptionStyle::default();
        assert_eq!(font_size_for(1080, &style), 67);
        assert_eq!(font_size_for(480, &style), 44);
        assert_eq!(font_size_for(2160, &style), 72);
    }

    #[test]
    fn cursor_accumulates_and_skips_empty_captions() {
        let segments = vec![seg("One", 5), seg("", 4), seg("Three", 6)];
        let blocks = layout_captions(&segments, FrameSize::VERTICAL_1080P, &CaptionStyle::default());

        assert_eq!(blocks.len(), 2);
        assert_eq!((blocks[0].start, blocks[0].duration), (0.0, 5.0));
        assert_eq!(blocks[1].segment, 2);
        assert_eq!((blocks[1].start, blocks[1].duration), (9.0, 6.0));
    }

    #[test]
    fn lines_stack_around_the_anchor() {
        let style = CaptionStyle::default();
        let frame = FrameSize::VERTICAL_1080P;
        let segments = vec![seg("Small habits compound into remarkable results", 5)];
        let block = &layout_captions(&segments, frame, &style)[0];

        assert_eq!(block.lines.len(), 2);
        let box_height = block.font_size + 2 * style.padding;
        assert_eq!(block.lines[1].y - block.lines[0].y, box_height + style.line_gap);

        let group_top = block.lines[0].y - style.padding;
        let group_bottom = block.lines[1].y - style.padding + box_height;
        let anchor = (1920.0 * style.anchor).round() as u32;
        assert!(group_top < anchor && anchor < group_bottom);
        assert!(group_bottom <= frame.height);
    }

    #[test]
    fn drawtext_carries_timing_and_position() {
        let style = CaptionStyle::default();
        let block = CaptionBlock {
            segment: 0,
            start: 5.0,
            duration: 4.0,
            font_size: 67,
            lines: vec![CaptionLine {
                text: "hello".to_string(),
                y: 1300,
            }],
        };
        let filter = drawtext_filter(&block, &block.lines[0], &PathBuf::from("/tmp/it's.txt"), &style);
        assert!(filter.starts_with("drawtext=textfile='/tmp/it'\\''s.txt':fontsize=67"));
        assert!(filter.contains(":y=1300:"));
        assert!(filter.ends_with("enable='between(t,5.000,9.000)'"));
    }
}
