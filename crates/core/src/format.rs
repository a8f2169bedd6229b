use std::collections::BTreeMap;

use crate::{rate::RatingReport, safety::SafetyReport};

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Ten-cell bar for a 1-10 score.
pub fn score_bar(score: f64) -> String {
    let filled = score.round().clamp(0.0, 10.0) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

fn push_scores(output: &mut String, scores: &BTreeMap<String, f64>) {
    for (criterion, score) in scores {
        output.push_str(&format!(
            "  {:<25} {} {}/10\n",
            criterion,
            score_bar(*score),
            score
        ));
    }
}

fn push_list(output: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    output.push_str(&format!("{}:\n", heading));
    for item in items {
        output.push_str(&format!("  • {}\n", item));
    }
}

pub fn format_rating_readable(report: &RatingReport) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Rating: {}/10 | Pass: {}\n",
        report.overall_score, report.passed
    ));
    push_scores(&mut output, &report.scores);
    push_list(&mut output, "Issues", &report.issues);
    push_list(&mut output, "Suggestions", &report.suggestions);
    output
}

pub fn format_safety_readable(report: &SafetyReport) -> String {
    let mut output = String::new();
    let icon = if report.safe { "✓" } else { "✗" };
    output.push_str(&format!(
        "Safety: {} {}\n",
        icon,
        report.verdict.as_str().to_uppercase()
    ));
    push_scores(&mut output, &report.scores);
    push_list(&mut output, "Flags", &report.flags);

    if !report.details.is_empty() {
        output.push_str(&format!("Summary: {}\n", report.details));
    }

    if report.moderation_api.flagged {
        output.push_str("Moderation: FLAGGED\n");
        for entry in report
            .moderation_api
            .top_scores
            .iter()
            .filter(|entry| entry.score > 0.01)
        {
            output.push_str(&format!("  {}: {:.3}\n", entry.category, entry.score));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::{CategoryScore, ModerationSummary, Verdict};

    #[test]
    fn timestamps_and_bars() {
        assert_eq!(format_timestamp(75.4), "01:15");
        assert_eq!(score_bar(7.0), "███████░░░");
        assert_eq!(score_bar(12.0), "██████████");
    }

    #[test]
    fn rating_lists_issues() {
        let report = RatingReport {
            overall_score: 6.0,
            passed: false,
            scores: [("visual_quality".to_string(), 5.0)].into_iter().collect(),
            issues: vec!["segment 2 is washed out".to_string()],
            suggestions: Vec::new(),
        };
        let text = format_rating_readable(&report);
        assert!(text.starts_with("Rating: 6/10 | Pass: false"));
        assert!(text.contains("visual_quality"));
        assert!(text.contains("  • segment 2 is washed out"));
        assert!(!text.contains("Suggestions"));
    }

    #[test]
    fn safety_shows_verdict_and_moderation() {
        let report = SafetyReport {
            safe: false,
            verdict: Verdict::Rejected,
            scores: BTreeMap::new(),
            flags: vec!["Moderation hard flag: violence/graphic".to_string()],
            details: String::new(),
            moderation_api: ModerationSummary {
                flagged: true,
                top_scores: vec![
                    CategoryScore {
                        category: "violence/graphic".to_string(),
                        score: 0.93,
                    },
                    CategoryScore {
                        category: "harassment".to_string(),
                        score: 0.001,
                    },
                ],
            },
        };
        let text = format_safety_readable(&report);
        assert!(text.starts_with("Safety: ✗ REJECTED"));
        assert!(text.contains("violence/graphic: 0.930"));
        assert!(!text.contains("harassment"));
    }
}
