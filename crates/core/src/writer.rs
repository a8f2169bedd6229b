use std::path::{Path, PathBuf};

use tracing::info;

use crate::{
    error::{ReelError, Result},
    openai::{OpenAiClient, SCRIPT_MODEL, strip_code_fence},
    script::{Script, slugify},
};

/// Voice of the generated captions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScriptStyle {
    #[default]
    Standard,
    /// Rhymed, rhythmic TEXT lines.
    Lyrical,
    /// LYRICS lines written to be sung over a generated song.
    Flow,
}

#[derive(Clone, Debug)]
pub struct ScriptRequest {
    pub topic: String,
    pub segments: u32,
    pub total_duration: u32,
    pub style: ScriptStyle,
}

const SCRIPT_FORMAT: &str = "Each segment uses this format:
SEGMENT: <visual search query for stock footage, e.g. \"Person studying at desk\">
TEXT: <text to overlay on screen - short, punchy, 1-2 sentences max>
DURATION: <seconds, 4-8 typical>
---";

const FLOW_FORMAT: &str = "Each segment uses this format:
SEGMENT: <visual search query for stock footage, e.g. \"City skyline at night\">
LYRICS: <one or two sung lines carrying the lesson>
DURATION: <seconds, 4-8 typical>
---";

fn style_rules(style: ScriptStyle) -> &'static str {
    match style {
        ScriptStyle::Standard => {
            "- TEXT is the educational content - clear, engaging, one or two short sentences."
        }
        ScriptStyle::Lyrical => {
            "- TEXT must rhyme across consecutive segments and read with a steady beat, like song lyrics, while still teaching the topic."
        }
        ScriptStyle::Flow => {
            "- Use LYRICS instead of TEXT. Lyrics are sung by a female pop vocalist: short phrases, strong rhythm, easy to enunciate.\n- Lines should flow into each other as verses of one song."
        }
    }
}

/// Prompt sent to the script model.
pub fn build_prompt(request: &ScriptRequest) -> String {
    let format = match request.style {
        ScriptStyle::Flow => FLOW_FORMAT,
        _ => SCRIPT_FORMAT,
    };

    format!(
        "You are a script writer for short educational reels (like Instagram Reels or TikTok).

Create a script for a {duration}-second educational video about: {topic}

Requirements:
- Write exactly {segments} segments.
- SEGMENT should be a short phrase that would find good stock video on Pexels (e.g. \"Person writing in notebook\", \"Sunset over ocean\").
{rules}
- DURATION per segment: 4-8 seconds. Total should add up to ~{duration} seconds.
- Use the exact format below. Separate segments with ---
- DURATION must be a number only (e.g. DURATION: 5), not \"5 seconds\".

{format}

Output only the script, no preamble.",
        duration = request.total_duration,
        topic = request.topic,
        segments = request.segments,
        rules = style_rules(request.style),
        format = format,
    )
}

pub async fn generate_script(client: &OpenAiClient, request: &ScriptRequest) -> Result<String> {
    if request.topic.trim().is_empty() {
        return Err(ReelError::InvalidInput {
            reason: "topic is empty".to_string(),
        });
    }
    if request.segments == 0 || request.total_duration == 0 {
        return Err(ReelError::InvalidInput {
            reason: "segment count and duration must be positive".to_string(),
        });
    }

    info!(
        "Writing {:?} script for {:?} ({} segments, {}s)",
        request.style, request.topic, request.segments, request.total_duration
    );
    let reply = client
        .chat(
            SCRIPT_MODEL,
            serde_json::Value::String(build_prompt(request)),
            Some(0.7),
            None,
        )
        .await?;

    Ok(strip_code_fence(&reply).to_string())
}

/// Default location for a topic's generated script.
pub fn script_path_for(scripts_dir: &Path, topic: &str) -> PathBuf {
    scripts_dir.join(format!("{}.txt", slugify(topic)))
}

/// Generate a script, check that it parses, and save it.
pub async fn write_script(
    client: &OpenAiClient,
    request: &ScriptRequest,
    output_path: &Path,
) -> Result<Script> {
    let text = generate_script(client, request).await?;
    let script = Script::parse(&text)?;
    script.ensure_not_empty()?;

    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output_path, &text).await?;
    info!("Script written to {}", output_path.display());

    Ok(script)
}
